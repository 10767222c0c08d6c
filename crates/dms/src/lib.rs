//! Driver Monitoring System (DMS)
//!
//! Drowsiness and absence detection from a live camera feed:
//! - Face and eye region detection
//! - Eye open/closed classification (with a detection-dropout fallback)
//! - Decaying drowsiness/absence scores with Normal/Warning/Alarm levels
//! - Alarm cooldown shared across tracks, pause and sensitivity controls

pub mod analysis;
pub mod config;
pub mod detector;
pub mod engine;
mod fusion;
pub mod observation;
pub mod state;

pub use analysis::{AlertDecision, EyeStatus};
pub use config::EngineConfig;
pub use detector::{
    observe, Detections, EyeClassifier, EyeCrop, OnnxEyeClassifier, OnnxRegionDetector, Rect,
    RegionDetector,
};
pub use engine::DrowsinessEngine;
pub use observation::{EyeReadings, EyeSignal, FrameObservation};
pub use state::{AlertLevel, EngineState};

use alerting::{AlertSink, CueSet};
use camera_capture::VideoFrame;
use std::time::Instant;
use thiserror::Error;
use tracing::warn;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}

/// Hand the decision's alarm, if any, to the sink. Sink errors are logged and dropped.
pub fn sound_alarm(decision: &AlertDecision, cues: &CueSet, sink: &dyn AlertSink) {
    let Some(track) = decision.should_play_alarm else {
        return;
    };
    let cue = cues.cue_for(track);
    if let Err(e) = sink.play(&cue) {
        warn!(%track, cue = %cue.name(), "Alarm playback failed: {}", e);
    }
}

/// Driver monitoring module: detector → classifier → engine → sink, one frame at a time
pub struct DmsModule {
    detector: Box<dyn RegionDetector>,
    classifier: Option<Box<dyn EyeClassifier>>,
    engine: DrowsinessEngine,
    sink: Box<dyn AlertSink>,
    cues: CueSet,
}

impl DmsModule {
    /// Create a new DMS module. Without a classifier the engine uses the fallback path.
    pub fn new(
        config: EngineConfig,
        detector: Box<dyn RegionDetector>,
        classifier: Option<Box<dyn EyeClassifier>>,
        sink: Box<dyn AlertSink>,
        cues: CueSet,
    ) -> Result<Self, DmsError> {
        if classifier.is_none() {
            warn!("No eye classifier loaded. Using detection-dropout heuristic.");
        }
        Ok(Self {
            detector,
            classifier,
            engine: DrowsinessEngine::new(config)?,
            sink,
            cues,
        })
    }

    /// Analyze a single frame captured at `now`
    pub fn analyze(&mut self, frame: &VideoFrame, now: Instant) -> AlertDecision {
        // Paused sessions skip perception entirely
        if self.engine.is_paused() {
            return self.engine.process_tick(&FrameObservation::absent(), now);
        }

        let detections = match self.detector.detect(frame) {
            Ok(detections) => detections,
            Err(e) => {
                warn!(sequence = frame.sequence, "Region detection failed: {}", e);
                Detections::default()
            }
        };

        let obs = observe(frame, &detections, self.classifier.as_deref());
        let decision = self.engine.process_tick(&obs, now);
        sound_alarm(&decision, &self.cues, self.sink.as_ref());
        decision
    }

    pub fn engine(&self) -> &DrowsinessEngine {
        &self.engine
    }

    /// Control surface access; call between frames
    pub fn engine_mut(&mut self) -> &mut DrowsinessEngine {
        &mut self.engine
    }
}
