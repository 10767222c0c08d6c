//! Camera Capture Library for the Drowsiness Monitor
//!
//! Supplies sequential RGB frames to the monitoring pipeline:
//! - `VideoFrame`: decoded RGB24 frame with crop/grayscale/resize helpers
//! - `FrameSource`: anything that yields frames until the stream ends
//! - `ImageSequenceSource`: ordered directory of still images (recorded sessions)

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{FrameSource, ImageSequenceSource};

use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open frame source: {0}")]
    Open(String),

    #[error("Failed to decode frame {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frame source configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Nominal frame rate, used to derive frame timestamps
    pub fps: u32,
    /// Optional downscale applied to every frame (width, height)
    pub resize_to: Option<(u32, u32)>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fps: 15,
            resize_to: None,
        }
    }
}

impl CameraConfig {
    /// Nanoseconds between two consecutive frames at the nominal rate
    pub fn frame_interval_ns(&self) -> u64 {
        1_000_000_000 / u64::from(self.fps.max(1))
    }
}
