//! Per-frame perception summary consumed by the engine

use serde::{Deserialize, Serialize};

/// Eye classifier output for one side.
///
/// Normalized once into a closed/not-closed decision by [`EyeSignal::is_closed`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeSignal {
    /// No classification for this side (region missing or inference failed)
    #[default]
    Unavailable,
    /// Single closed-eye likelihood in `[0, 1]`
    Scalar(f32),
    /// Two-class output
    Pair { closed: f32, open: f32 },
}

impl EyeSignal {
    /// Whether this signal reports a closed eye. Missing classifications are neutral.
    pub fn is_closed(&self) -> bool {
        match *self {
            EyeSignal::Unavailable => false,
            EyeSignal::Scalar(likelihood) => likelihood > 0.5,
            EyeSignal::Pair { closed, open } => closed > open,
        }
    }

    /// Interpret a raw model output vector
    pub fn from_output(values: &[f32]) -> Self {
        match values {
            [] => EyeSignal::Unavailable,
            [likelihood] => EyeSignal::Scalar(*likelihood),
            [closed, open, ..] => EyeSignal::Pair {
                closed: *closed,
                open: *open,
            },
        }
    }
}

/// Classifier results for both eyes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyeReadings {
    #[serde(default)]
    pub left: EyeSignal,
    #[serde(default)]
    pub right: EyeSignal,
}

impl EyeReadings {
    pub fn new(left: EyeSignal, right: EyeSignal) -> Self {
        Self { left, right }
    }

    /// Either eye closed is enough: a turned face can hide one open eye
    pub fn either_closed(&self) -> bool {
        self.left.is_closed() || self.right.is_closed()
    }
}

/// One frame's worth of perception, produced outside the engine
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameObservation {
    /// Number of detected faces
    pub face_count: u32,
    /// Number of detected left-eye regions
    pub left_eye_regions: u32,
    /// Number of detected right-eye regions
    pub right_eye_regions: u32,
    /// Classifier output, or `None` when no classifier is loaded
    pub classification: Option<EyeReadings>,
}

impl FrameObservation {
    /// Nothing detected
    pub fn absent() -> Self {
        Self::default()
    }

    /// Detection counts without classifier output (fallback path)
    pub fn detected(face_count: u32, left_eye_regions: u32, right_eye_regions: u32) -> Self {
        Self {
            face_count,
            left_eye_regions,
            right_eye_regions,
            classification: None,
        }
    }

    /// One face, both eyes detected and classified
    pub fn classified(left: EyeSignal, right: EyeSignal) -> Self {
        Self {
            face_count: 1,
            left_eye_regions: 1,
            right_eye_regions: 1,
            classification: Some(EyeReadings::new(left, right)),
        }
    }

    /// A face and at least one eye region are visible
    pub fn eyes_observable(&self) -> bool {
        self.face_count > 0 && (self.left_eye_regions > 0 || self.right_eye_regions > 0)
    }

    /// Eyes expected from the face count
    pub fn expected_eyes(&self) -> u32 {
        self.face_count.saturating_mul(2)
    }

    /// Eye regions actually detected
    pub fn detected_eyes(&self) -> u32 {
        self.left_eye_regions.saturating_add(self.right_eye_regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_normalization() {
        assert!(EyeSignal::Pair { closed: 0.9, open: 0.1 }.is_closed());
        assert!(!EyeSignal::Pair { closed: 0.5, open: 0.5 }.is_closed());
        assert!(EyeSignal::Scalar(0.51).is_closed());
        assert!(!EyeSignal::Scalar(0.5).is_closed());
        assert!(!EyeSignal::Unavailable.is_closed());
    }

    #[test]
    fn test_from_output() {
        assert_eq!(EyeSignal::from_output(&[]), EyeSignal::Unavailable);
        assert_eq!(EyeSignal::from_output(&[0.7]), EyeSignal::Scalar(0.7));
        assert_eq!(
            EyeSignal::from_output(&[0.2, 0.8]),
            EyeSignal::Pair { closed: 0.2, open: 0.8 }
        );
    }

    #[test]
    fn test_either_eye_closes() {
        let open = EyeSignal::Pair { closed: 0.1, open: 0.9 };
        let closed = EyeSignal::Pair { closed: 0.9, open: 0.1 };

        assert!(EyeReadings::new(open, closed).either_closed());
        assert!(EyeReadings::new(closed, EyeSignal::Unavailable).either_closed());
        assert!(!EyeReadings::new(open, EyeSignal::Unavailable).either_closed());
    }

    #[test]
    fn test_observability() {
        assert!(!FrameObservation::absent().eyes_observable());
        assert!(!FrameObservation::detected(0, 1, 1).eyes_observable());
        assert!(!FrameObservation::detected(1, 0, 0).eyes_observable());
        assert!(FrameObservation::detected(1, 0, 1).eyes_observable());
        assert_eq!(FrameObservation::detected(2, 1, 1).expected_eyes(), 4);
    }

    #[test]
    fn test_trace_format() {
        let obs: FrameObservation = serde_json::from_str(
            r#"{"face_count":1,"left_eye_regions":1,"right_eye_regions":0,
                "classification":{"left":{"pair":{"closed":0.8,"open":0.2}}}}"#,
        )
        .unwrap();

        let readings = obs.classification.unwrap();
        assert!(readings.left.is_closed());
        assert_eq!(readings.right, EyeSignal::Unavailable);

        let bare: FrameObservation =
            serde_json::from_str(r#"{"face_count":0,"left_eye_regions":0,"right_eye_regions":0}"#).unwrap();
        assert!(bare.classification.is_none());
    }
}
