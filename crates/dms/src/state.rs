//! Engine state tracking

use alerting::AlarmGate;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::EngineConfig;

/// Alert level of one track, a pure function of score vs threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// `score < warning_ratio * threshold`
    #[default]
    Normal,
    /// `warning_ratio * threshold <= score < threshold`
    Warning,
    /// `score >= threshold`
    Alarm,
}

impl AlertLevel {
    pub fn of(score: f64, threshold: f64, warning_ratio: f64) -> Self {
        if score >= threshold {
            AlertLevel::Alarm
        } else if score >= threshold * warning_ratio {
            AlertLevel::Warning
        } else {
            AlertLevel::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Normal => "normal",
            AlertLevel::Warning => "warning",
            AlertLevel::Alarm => "alarm",
        }
    }
}

/// Cross-frame state owned by the engine for one monitoring session
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Decaying accumulator of eyes-closed evidence
    pub(crate) drowsiness_score: f64,

    /// Decaying accumulator of face/eyes-not-observable evidence
    pub(crate) absence_counter: f64,

    /// Scoring and alarms suspended
    pub(crate) paused: bool,

    /// Threshold in force for the detection path of the last observable tick
    pub(crate) drowsiness_threshold: f64,

    /// Operator-adjustable, always within the configured bounds
    pub(crate) absence_threshold: f64,

    pub(crate) sensitivity_step: f64,

    /// Shared cooldown gate; remembers the last alarm instant
    pub(crate) gate: AlarmGate,

    /// Levels seen on the previous scored tick, for transition logging
    pub(crate) last_levels: (AlertLevel, AlertLevel),
}

impl EngineState {
    /// Fresh session state with the configured defaults
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            drowsiness_score: 0.0,
            absence_counter: 0.0,
            paused: false,
            drowsiness_threshold: config.drowsiness_threshold,
            absence_threshold: config.clamp_absence_threshold(config.absence_threshold),
            sensitivity_step: config.sensitivity_step,
            gate: AlarmGate::new(config.cooldown()),
            last_levels: (AlertLevel::Normal, AlertLevel::Normal),
        }
    }

    pub fn drowsiness_score(&self) -> f64 {
        self.drowsiness_score
    }

    pub fn absence_counter(&self) -> f64 {
        self.absence_counter
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn drowsiness_threshold(&self) -> f64 {
        self.drowsiness_threshold
    }

    pub fn absence_threshold(&self) -> f64 {
        self.absence_threshold
    }

    pub fn sensitivity_step(&self) -> f64 {
        self.sensitivity_step
    }

    /// Last instant any alarm fired
    pub fn last_alarm_time(&self) -> Option<Instant> {
        self.gate.last_fired()
    }

    /// Alarms fired this session
    pub fn alarm_count(&self) -> usize {
        self.gate.fire_count()
    }

    pub fn drowsiness_level(&self, warning_ratio: f64) -> AlertLevel {
        AlertLevel::of(self.drowsiness_score, self.drowsiness_threshold, warning_ratio)
    }

    pub fn absence_level(&self, warning_ratio: f64) -> AlertLevel {
        AlertLevel::of(self.absence_counter, self.absence_threshold, warning_ratio)
    }
}
