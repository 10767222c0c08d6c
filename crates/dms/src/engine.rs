//! Drowsiness/absence state engine

use alerting::AlertTrack;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::analysis::{active_track, AlertDecision, EyeStatus};
use crate::fusion::fuse;
use crate::observation::FrameObservation;
use crate::state::{AlertLevel, EngineState};
use crate::{DmsError, EngineConfig};

/// Turns per-frame observations into alert decisions.
///
/// Holds the only cross-frame state of the pipeline. Ticks and control
/// actions both take `&mut self`, so they are serialized by construction.
#[derive(Debug, Clone)]
pub struct DrowsinessEngine {
    config: EngineConfig,
    state: EngineState,
}

impl DrowsinessEngine {
    /// Create an engine; the configuration is validated first
    pub fn new(config: EngineConfig) -> Result<Self, DmsError> {
        let config = config.validate()?;
        info!(
            drowsiness_threshold = config.drowsiness_threshold,
            absence_threshold = config.absence_threshold,
            cooldown_secs = config.cooldown_secs,
            fallback = config.fallback_enabled,
            absence = config.absence_enabled,
            "Creating drowsiness engine"
        );
        Ok(Self {
            state: EngineState::new(&config),
            config,
        })
    }

    /// Process one observation taken at `now`
    pub fn process_tick(&mut self, obs: &FrameObservation, now: Instant) -> AlertDecision {
        if self.state.paused {
            trace!("Tick skipped: paused");
            return self.decision(EyeStatus::Paused, None);
        }

        let status = fuse(&mut self.state, obs, &self.config);

        let ratio = self.config.warning_ratio;
        let drowsiness = self.state.drowsiness_level(ratio);
        let absence = self.state.absence_level(ratio);
        self.log_transitions(drowsiness, absence);

        // Drowsiness is checked first; one gate serves both tracks
        let eligible = if drowsiness == AlertLevel::Alarm {
            Some(AlertTrack::Drowsiness)
        } else if absence == AlertLevel::Alarm {
            Some(AlertTrack::Absence)
        } else {
            None
        };

        let should_play_alarm = eligible.filter(|_| self.state.gate.try_fire(now));
        if let Some(track) = should_play_alarm {
            warn!(
                %track,
                drowsiness_score = self.state.drowsiness_score,
                absence_counter = self.state.absence_counter,
                "Alarm triggered"
            );
        }

        trace!(
            drowsiness_score = self.state.drowsiness_score,
            absence_counter = self.state.absence_counter,
            %status,
            "Tick processed"
        );

        self.decision(status, should_play_alarm)
    }

    /// Flip the pause flag; returns the new value
    pub fn toggle_pause(&mut self) -> bool {
        self.state.paused = !self.state.paused;
        info!(
            paused = self.state.paused,
            "Detection {}",
            if self.state.paused { "paused" } else { "resumed" }
        );
        self.state.paused
    }

    /// Move the absence threshold one step in the direction of `delta`.
    ///
    /// Negative = more sensitive (alerts sooner). The result is clamped to the
    /// configured bounds; a zero delta is a no-op. Returns the new threshold.
    pub fn adjust_absence_sensitivity(&mut self, delta: f64) -> f64 {
        if delta == 0.0 || delta.is_nan() {
            return self.state.absence_threshold;
        }

        let step = self.config.absence_threshold_step.copysign(delta);
        let before = self.state.absence_threshold;
        let after = self.config.clamp_absence_threshold(before + step);
        self.state.absence_threshold = after;

        if after != before {
            info!(from = before, to = after, "Absence threshold adjusted");
        } else {
            debug!(threshold = after, "Absence threshold already at bound");
        }
        after
    }

    /// Back to session-start state: zero scores, not paused, default thresholds.
    ///
    /// The alarm gate survives, so a reset cannot cut a cooldown short.
    pub fn reset(&mut self) {
        info!("Engine state reset");
        let fresh = EngineState::new(&self.config);
        let gate = std::mem::replace(&mut self.state, fresh).gate;
        self.state.gate = gate;
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    fn decision(&self, status: EyeStatus, should_play_alarm: Option<AlertTrack>) -> AlertDecision {
        let ratio = self.config.warning_ratio;
        let drowsiness_level = self.state.drowsiness_level(ratio);
        let absence_level = self.state.absence_level(ratio);

        AlertDecision {
            drowsiness_score: self.state.drowsiness_score,
            absence_counter: self.state.absence_counter,
            drowsiness_threshold: self.state.drowsiness_threshold,
            absence_threshold: self.state.absence_threshold,
            drowsiness_level,
            absence_level,
            status,
            active_track: active_track(drowsiness_level, absence_level),
            should_play_alarm,
            paused: self.state.paused,
        }
    }

    fn log_transitions(&mut self, drowsiness: AlertLevel, absence: AlertLevel) {
        let (prev_drowsiness, prev_absence) = self.state.last_levels;
        if drowsiness != prev_drowsiness {
            info!(
                track = "drowsiness",
                from = prev_drowsiness.as_str(),
                to = drowsiness.as_str(),
                "Level changed"
            );
        }
        if absence != prev_absence {
            info!(
                track = "absence",
                from = prev_absence.as_str(),
                to = absence.as_str(),
                "Level changed"
            );
        }
        self.state.last_levels = (drowsiness, absence);
    }
}
