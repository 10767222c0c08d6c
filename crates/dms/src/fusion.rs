//! Signal fusion: one observation in, updated scores and a status label out

use tracing::trace;

use crate::analysis::EyeStatus;
use crate::observation::FrameObservation;
use crate::state::EngineState;
use crate::EngineConfig;

/// Closure evidence extracted from one observable tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closure {
    /// Classifier says at least one eye is closed
    Closed,
    /// Too few eye regions for the visible faces
    DetectionDropout,
    Open,
}

/// Fold one observation into the scores. Both accumulators stay non-negative.
pub(crate) fn fuse(
    state: &mut EngineState,
    obs: &FrameObservation,
    config: &EngineConfig,
) -> EyeStatus {
    if !obs.eyes_observable() {
        if config.absence_enabled {
            state.absence_counter += 1.0;
        }
        state.drowsiness_score = (state.drowsiness_score - config.absent_drowsiness_decay).max(0.0);
        return EyeStatus::NotObservable {
            face_visible: obs.face_count > 0,
        };
    }

    state.absence_counter = (state.absence_counter - config.absence_recovery_step).max(0.0);
    state.drowsiness_threshold = config.drowsiness_threshold_for(obs.classification.is_some());

    let closure = closure(obs, config);
    trace!(?closure, "Eye closure evidence");

    match closure {
        Closure::Closed | Closure::DetectionDropout => {
            state.drowsiness_score += state.sensitivity_step;
        }
        Closure::Open => {
            state.drowsiness_score = (state.drowsiness_score - state.sensitivity_step).max(0.0);
        }
    }

    match closure {
        Closure::Closed => EyeStatus::Closed,
        Closure::DetectionDropout => EyeStatus::PossibleSleepiness,
        Closure::Open => EyeStatus::Open,
    }
}

fn closure(obs: &FrameObservation, config: &EngineConfig) -> Closure {
    match &obs.classification {
        Some(readings) if readings.either_closed() => Closure::Closed,
        Some(_) => Closure::Open,
        None if config.fallback_enabled => {
            let expected = f64::from(obs.expected_eyes());
            let detected = f64::from(obs.detected_eyes());
            if detected < config.fallback_detection_ratio * expected {
                Closure::DetectionDropout
            } else {
                Closure::Open
            }
        }
        None => Closure::Open,
    }
}
