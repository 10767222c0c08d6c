//! Frame sources

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use tracing::{debug, info};

use crate::{CameraConfig, CameraError, VideoFrame};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Supplies sequential frames to the monitoring loop.
///
/// `Ok(None)` marks the end of the stream. An `Err` means no frame could be
/// obtained; callers stop feeding ticks in both cases.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;
}

/// Ordered directory of still images, played back as a video stream
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    config: CameraConfig,
}

impl ImageSequenceSource {
    /// Collect every image file in `dir`, sorted by file name
    pub fn open(dir: impl AsRef<Path>, config: CameraConfig) -> Result<Self, CameraError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CameraError::Open(format!("{} is not a directory", dir.display())));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CameraError::Open(format!("no image files in {}", dir.display())));
        }

        info!(frames = paths.len(), dir = %dir.display(), "Opened image sequence");

        Ok(Self {
            paths,
            cursor: 0,
            config,
        })
    }

    /// Number of frames in the sequence
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };

        let img = image::open(path).map_err(|e| CameraError::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let sequence = self.cursor as u32;
        let timestamp_ns = self.cursor as u64 * self.config.frame_interval_ns();
        self.cursor += 1;

        let mut rgb = img.to_rgb8();
        if let Some((w, h)) = self.config.resize_to.filter(|&(w, h)| w > 0 && h > 0) {
            rgb = imageops::resize(&rgb, w, h, FilterType::Triangle);
        }
        let frame = VideoFrame::from_rgb_image(rgb, timestamp_ns, sequence);

        debug!(sequence, width = frame.width, height = frame.height, "Frame decoded");
        Ok(Some(frame))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
