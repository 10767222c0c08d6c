//! Face/eye region detection and eye-state classification

use camera_capture::VideoFrame;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tract_onnx::prelude::*;
use tracing::{debug, info, warn};

use crate::observation::{EyeReadings, EyeSignal, FrameObservation};
use crate::DmsError;

/// Eye crop side length expected by the classifier
pub const EYE_CROP_SIZE: usize = 24;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Axis-aligned region in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Intersect with a `width x height` frame; `None` if nothing is left
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Rect::new(self.x, self.y, w, h))
    }
}

/// Regions found in one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detections {
    pub faces: Vec<Rect>,
    pub left_eyes: Vec<Rect>,
    pub right_eyes: Vec<Rect>,
}

impl Detections {
    /// Observation carrying only detection counts
    pub fn observation_counts(&self) -> FrameObservation {
        FrameObservation::detected(
            self.faces.len() as u32,
            self.left_eyes.len() as u32,
            self.right_eyes.len() as u32,
        )
    }
}

/// Finds face and eye regions. Zero matches is a valid result.
pub trait RegionDetector {
    fn detect(&self, frame: &VideoFrame) -> Result<Detections, DmsError>;
}

/// Closed/open eye classifier.
///
/// Never fails: any inference problem degrades to [`EyeSignal::Unavailable`].
pub trait EyeClassifier {
    fn classify(&self, crop: &EyeCrop) -> EyeSignal;
}

/// 24x24 grayscale eye image, pixels normalized to `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct EyeCrop {
    pixels: Vec<f32>,
}

impl EyeCrop {
    /// Cut `region` out of the frame and bring it to classifier format.
    ///
    /// Downscaling is filtered (triangle), matching the bilinear resize the
    /// classifier was trained with.
    pub fn from_frame(frame: &VideoFrame, region: &Rect) -> Option<Self> {
        let region = region.clamp_to(frame.width, frame.height)?;
        let img = frame.as_rgb_image()?;
        let img = image::RgbImage::from_raw(img.width(), img.height(), img.into_raw().to_vec())?;
        let crop =
            imageops::crop_imm(&img, region.x, region.y, region.width, region.height).to_image();
        let resized = imageops::resize(
            &crop,
            EYE_CROP_SIZE as u32,
            EYE_CROP_SIZE as u32,
            FilterType::Triangle,
        );

        let pixels = imageops::grayscale(&resized)
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / 255.0)
            .collect();
        Some(Self { pixels })
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }
}

/// Build the engine observation for one frame.
///
/// Only the first region per side is classified. Classification is skipped
/// when the eyes are not observable, since the engine ignores it then.
pub fn observe(
    frame: &VideoFrame,
    detections: &Detections,
    classifier: Option<&dyn EyeClassifier>,
) -> FrameObservation {
    let mut obs = detections.observation_counts();
    let Some(classifier) = classifier else {
        return obs;
    };
    if !obs.eyes_observable() {
        obs.classification = Some(EyeReadings::default());
        return obs;
    }

    let classify_side = |regions: &[Rect]| {
        regions
            .first()
            .and_then(|region| EyeCrop::from_frame(frame, region))
            .map(|crop| classifier.classify(&crop))
            .unwrap_or(EyeSignal::Unavailable)
    };

    obs.classification = Some(EyeReadings::new(
        classify_side(&detections.left_eyes),
        classify_side(&detections.right_eyes),
    ));
    obs
}

fn load_plan(path: &Path, input_shape: [usize; 4]) -> Result<OnnxPlan, DmsError> {
    info!("Loading ONNX model from {}", path.display());
    tract_onnx::onnx()
        .model_for_path(path)
        .and_then(|model| model.with_input_fact(0, f32::fact(input_shape).into()))
        .and_then(|model| model.into_optimized())
        .and_then(|model| model.into_runnable())
        .map_err(|e| DmsError::ModelLoad(format!("{}: {}", path.display(), e)))
}

fn run_plan(plan: &OnnxPlan, shape: &[usize], data: &[f32]) -> Result<Vec<f32>, DmsError> {
    let input = Tensor::from_shape(shape, data).map_err(|e| DmsError::Inference(e.to_string()))?;
    let outputs = plan
        .run(tvec!(input.into()))
        .map_err(|e| DmsError::Inference(e.to_string()))?;
    let output = outputs
        .first()
        .ok_or_else(|| DmsError::Inference("model produced no output".into()))?;
    let values = output
        .as_slice::<f32>()
        .map_err(|e| DmsError::Inference(e.to_string()))?;
    Ok(values.to_vec())
}

/// CNN eye-state classifier (input `[1, 24, 24, 1]`, output `[closed]` or `[closed, open]`)
pub struct OnnxEyeClassifier {
    plan: OnnxPlan,
}

impl OnnxEyeClassifier {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DmsError> {
        let plan = load_plan(path.as_ref(), [1, EYE_CROP_SIZE, EYE_CROP_SIZE, 1])?;
        Ok(Self { plan })
    }
}

impl EyeClassifier for OnnxEyeClassifier {
    fn classify(&self, crop: &EyeCrop) -> EyeSignal {
        match run_plan(&self.plan, &[1, EYE_CROP_SIZE, EYE_CROP_SIZE, 1], crop.pixels()) {
            Ok(values) => EyeSignal::from_output(&values),
            Err(e) => {
                warn!("Eye classification failed: {}", e);
                EyeSignal::Unavailable
            }
        }
    }
}

/// Columns per YuNet detection row:
/// `[x, y, w, h, x_re, y_re, x_le, y_le, x_n, y_n, x_ml, y_ml, x_mr, y_mr, score]`
const YUNET_ROW_LEN: usize = 15;
const YUNET_SCORE: usize = 14;
const YUNET_RIGHT_EYE: usize = 4;
const YUNET_LEFT_EYE: usize = 6;

/// Eye box side as a fraction of the face width
const EYE_BOX_SCALE: f32 = 0.3;

/// YuNet face detector.
///
/// Input `[1, 3, S, S]` BGR with raw `0..255` values. The model must be exported
/// with its post-processing, so the output is `N` rows of 15 values in
/// input-image pixels (the layout OpenCV's `FaceDetectorYN` returns). Eye
/// regions are square boxes centred on the eye landmarks, sized from the face.
pub struct OnnxRegionDetector {
    plan: OnnxPlan,
    input_size: u32,
    min_confidence: f32,
}

impl OnnxRegionDetector {
    pub fn load(
        path: impl AsRef<Path>,
        input_size: u32,
        min_confidence: f32,
    ) -> Result<Self, DmsError> {
        if input_size == 0 {
            return Err(DmsError::Config("detector input size must be positive".into()));
        }
        let s = input_size as usize;
        let plan = load_plan(path.as_ref(), [1, 3, s, s])?;
        Ok(Self {
            plan,
            input_size,
            min_confidence,
        })
    }

    fn preprocess(&self, frame: &VideoFrame) -> Result<Vec<f32>, DmsError> {
        let img = frame
            .as_rgb_image()
            .ok_or_else(|| DmsError::ImageProcessing("frame data does not match its size".into()))?;
        let resized =
            imageops::resize(&img, self.input_size, self.input_size, FilterType::Triangle);

        let plane = (self.input_size * self.input_size) as usize;
        let mut planar = vec![0.0f32; 3 * plane];
        for (i, pixel) in resized.pixels().enumerate() {
            let [r, g, b] = pixel.0;
            planar[i] = f32::from(b);
            planar[plane + i] = f32::from(g);
            planar[2 * plane + i] = f32::from(r);
        }
        Ok(planar)
    }
}

impl RegionDetector for OnnxRegionDetector {
    fn detect(&self, frame: &VideoFrame) -> Result<Detections, DmsError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(DmsError::ImageProcessing("empty frame".into()));
        }
        let s = self.input_size as usize;
        let input = self.preprocess(frame)?;
        let rows = run_plan(&self.plan, &[1, 3, s, s], &input)?;

        let scale = (
            frame.width as f32 / self.input_size as f32,
            frame.height as f32 / self.input_size as f32,
        );
        let detections =
            decode_yunet(&rows, scale, frame.width, frame.height, self.min_confidence);

        debug!(
            faces = detections.faces.len(),
            left_eyes = detections.left_eyes.len(),
            right_eyes = detections.right_eyes.len(),
            sequence = frame.sequence,
            "Regions detected"
        );
        Ok(detections)
    }
}

/// Turn YuNet rows into face and eye rectangles in frame pixels
fn decode_yunet(
    rows: &[f32],
    scale: (f32, f32),
    width: u32,
    height: u32,
    min_confidence: f32,
) -> Detections {
    let (sx, sy) = scale;
    let mut detections = Detections::default();

    for row in rows.chunks_exact(YUNET_ROW_LEN) {
        let score = row[YUNET_SCORE];
        if score.is_nan() || score < min_confidence {
            continue;
        }

        let (x, y, w, h) = (row[0] * sx, row[1] * sy, row[2] * sx, row[3] * sy);
        let Some(face) = pixel_rect(x, y, x + w, y + h, width, height) else {
            continue;
        };
        detections.faces.push(face);

        let half = w * EYE_BOX_SCALE / 2.0;
        let eye_box = |col: usize| {
            let (cx, cy) = (row[col] * sx, row[col + 1] * sy);
            pixel_rect(cx - half, cy - half, cx + half, cy + half, width, height)
        };
        detections.left_eyes.extend(eye_box(YUNET_LEFT_EYE));
        detections.right_eyes.extend(eye_box(YUNET_RIGHT_EYE));
    }
    detections
}

/// Corner coordinates to a rectangle inside the frame; `None` if empty or not finite
fn pixel_rect(x0: f32, y0: f32, x1: f32, y1: f32, width: u32, height: u32) -> Option<Rect> {
    if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let clamp = |v: f32, extent: u32| v.round().clamp(0.0, extent as f32) as u32;
    let (left, top) = (clamp(x0, width), clamp(y0, height));
    let (right, bottom) = (clamp(x1, width), clamp(y1, height));
    Rect::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top))
        .clamp_to(width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Reports closed when the crop is dark
    struct DarknessClassifier {
        calls: Cell<usize>,
    }

    impl EyeClassifier for DarknessClassifier {
        fn classify(&self, crop: &EyeCrop) -> EyeSignal {
            self.calls.set(self.calls.get() + 1);
            let mean = crop.pixels().iter().sum::<f32>() / crop.pixels().len() as f32;
            EyeSignal::Scalar(1.0 - mean)
        }
    }

    fn frame(shade: u8) -> VideoFrame {
        VideoFrame::new(vec![shade; 64 * 48 * 3], 64, 48, 0, 0)
    }

    #[test]
    fn test_rect_clamp() {
        assert_eq!(Rect::new(60, 40, 10, 10).clamp_to(64, 48), Some(Rect::new(60, 40, 4, 8)));
        assert_eq!(Rect::new(64, 0, 10, 10).clamp_to(64, 48), None);
        assert_eq!(Rect::new(0, 0, 0, 10).clamp_to(64, 48), None);
    }

    #[test]
    fn test_eye_crop_format() {
        let crop = EyeCrop::from_frame(&frame(255), &Rect::new(10, 10, 30, 12)).unwrap();
        assert_eq!(crop.pixels().len(), EYE_CROP_SIZE * EYE_CROP_SIZE);
        assert!(crop.pixels().iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_observe_classifies_first_region_per_side() {
        let classifier = DarknessClassifier { calls: Cell::new(0) };
        let detections = Detections {
            faces: vec![Rect::new(0, 0, 64, 48)],
            left_eyes: vec![Rect::new(5, 5, 10, 10), Rect::new(30, 5, 10, 10)],
            right_eyes: vec![],
        };

        let obs = observe(&frame(0), &detections, Some(&classifier));

        assert_eq!(classifier.calls.get(), 1);
        assert_eq!(obs.left_eye_regions, 2);
        let readings = obs.classification.unwrap();
        assert!(readings.left.is_closed());
        assert_eq!(readings.right, EyeSignal::Unavailable);
    }

    #[test]
    fn test_observe_skips_classifier_when_not_observable() {
        let classifier = DarknessClassifier { calls: Cell::new(0) };
        let detections = Detections {
            faces: vec![],
            left_eyes: vec![Rect::new(5, 5, 10, 10)],
            right_eyes: vec![],
        };

        let obs = observe(&frame(0), &detections, Some(&classifier));
        assert_eq!(classifier.calls.get(), 0);
        assert!(!obs.eyes_observable());
        assert!(obs.classification.is_some());
    }

    #[test]
    fn test_observe_without_classifier_uses_counts() {
        let detections = Detections {
            faces: vec![Rect::new(0, 0, 64, 48)],
            left_eyes: vec![Rect::new(5, 5, 10, 10)],
            right_eyes: vec![Rect::new(30, 5, 10, 10)],
        };
        let obs = observe(&frame(0), &detections, None);
        assert_eq!(obs, FrameObservation::detected(1, 1, 1));
    }

    #[test]
    fn test_striped_eye_crop_keeps_mean_brightness() {
        // Alternating black and white columns
        let mut data = Vec::with_capacity(48 * 48 * 3);
        for _ in 0..48 {
            for x in 0..48u32 {
                let v = if x % 2 == 0 { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        let frame = VideoFrame::new(data, 48, 48, 0, 0);

        let crop = EyeCrop::from_frame(&frame, &Rect::new(0, 0, 48, 48)).unwrap();
        let mean = crop.pixels().iter().sum::<f32>() / crop.pixels().len() as f32;
        assert!((mean - 0.5).abs() < 0.05, "crop mean {mean}");
    }

    #[test]
    fn test_decode_yunet_rows() {
        #[rustfmt::skip]
        let rows = [
            // face at (40, 30) 80x100 in a 320 input, eyes at (60, 60) and (100, 60)
            40.0, 30.0, 80.0, 100.0, 60.0, 60.0, 100.0, 60.0, 80.0, 80.0, 65.0, 110.0, 95.0, 110.0, 0.95,
            // below threshold
            200.0, 30.0, 80.0, 100.0, 220.0, 60.0, 260.0, 60.0, 240.0, 80.0, 225.0, 110.0, 255.0, 110.0, 0.4,
        ];
        // 640x480 frame: x scaled by 2, y by 1.5
        let detections = decode_yunet(&rows, (2.0, 1.5), 640, 480, 0.9);

        assert_eq!(detections.faces, vec![Rect::new(80, 45, 160, 150)]);
        // Eye boxes are 0.3 x face width (48 px) centred on the landmarks
        assert_eq!(detections.right_eyes, vec![Rect::new(96, 66, 48, 48)]);
        assert_eq!(detections.left_eyes, vec![Rect::new(176, 66, 48, 48)]);
    }

    #[test]
    fn test_decode_yunet_clips_to_frame() {
        #[rustfmt::skip]
        let rows = [
            -10.0, -5.0, 40.0, 40.0, 0.0, 0.0, f32::NAN, 10.0, 10.0, 20.0, 5.0, 25.0, 15.0, 25.0, 0.99,
        ];
        let detections = decode_yunet(&rows, (1.0, 1.0), 64, 48, 0.9);

        assert_eq!(detections.faces, vec![Rect::new(0, 0, 30, 35)]);
        assert_eq!(detections.right_eyes, vec![Rect::new(0, 0, 6, 6)]);
        assert!(detections.left_eyes.is_empty());
    }

    #[test]
    fn test_missing_model_file() {
        assert!(matches!(
            OnnxEyeClassifier::load("/nonexistent/eye.onnx"),
            Err(DmsError::ModelLoad(_))
        ));
    }
}
