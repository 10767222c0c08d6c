//! Per-tick decisions and display labels

use alerting::AlertTrack;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::AlertLevel;

/// Human-readable eye status for display. Not consumed by the alert logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EyeStatus {
    /// Eyes visible and open
    #[default]
    Open,
    /// Classifier reports at least one closed eye
    Closed,
    /// No classifier; fewer eye regions than expected
    PossibleSleepiness,
    /// Face or eyes could not be observed
    NotObservable { face_visible: bool },
    /// Detection paused by the operator
    Paused,
}

impl EyeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EyeStatus::Open => "Eyes Open",
            EyeStatus::Closed => "Eyes Closed",
            EyeStatus::PossibleSleepiness => "Possible Sleepiness",
            EyeStatus::NotObservable { face_visible: true } => "Eyes Not Detected!",
            EyeStatus::NotObservable { face_visible: false } => "No Face Detected!",
            EyeStatus::Paused => "Detection Paused",
        }
    }
}

impl fmt::Display for EyeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of processing one observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDecision {
    pub drowsiness_score: f64,
    pub absence_counter: f64,
    pub drowsiness_threshold: f64,
    pub absence_threshold: f64,
    pub drowsiness_level: AlertLevel,
    pub absence_level: AlertLevel,

    /// Display status for this tick
    pub status: EyeStatus,

    /// Most urgent track for display:
    /// drowsiness alarm > absence alarm > drowsiness warning > absence warning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_track: Option<AlertTrack>,

    /// Track whose cue the alert sink should play this tick (cooldown respected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_play_alarm: Option<AlertTrack>,

    pub paused: bool,
}

impl AlertDecision {
    /// Level of a given track
    pub fn level(&self, track: AlertTrack) -> AlertLevel {
        match track {
            AlertTrack::Drowsiness => self.drowsiness_level,
            AlertTrack::Absence => self.absence_level,
        }
    }

    /// Check if any track is at Alarm level
    pub fn is_alarming(&self) -> bool {
        self.drowsiness_level == AlertLevel::Alarm || self.absence_level == AlertLevel::Alarm
    }

    /// On-screen banner for the active track, if any
    pub fn headline(&self) -> Option<&'static str> {
        let track = self.active_track?;
        Some(match (track, self.level(track)) {
            (AlertTrack::Drowsiness, AlertLevel::Alarm) => "DROWSINESS DETECTED! WAKE UP!",
            (AlertTrack::Absence, AlertLevel::Alarm) => "EYES NOT DETECTED! LOOK AT CAMERA!",
            (AlertTrack::Drowsiness, _) => "Getting Sleepy...",
            (AlertTrack::Absence, _) => "Eyes Missing...",
        })
    }
}

/// Display priority across both tracks
pub(crate) fn active_track(drowsiness: AlertLevel, absence: AlertLevel) -> Option<AlertTrack> {
    if drowsiness == AlertLevel::Alarm {
        Some(AlertTrack::Drowsiness)
    } else if absence == AlertLevel::Alarm {
        Some(AlertTrack::Absence)
    } else if drowsiness == AlertLevel::Warning {
        Some(AlertTrack::Drowsiness)
    } else if absence == AlertLevel::Warning {
        Some(AlertTrack::Absence)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AlertLevel::*;

    #[test]
    fn test_active_track_priority() {
        assert_eq!(active_track(Alarm, Alarm), Some(AlertTrack::Drowsiness));
        assert_eq!(active_track(Warning, Alarm), Some(AlertTrack::Absence));
        assert_eq!(active_track(Warning, Warning), Some(AlertTrack::Drowsiness));
        assert_eq!(active_track(Normal, Warning), Some(AlertTrack::Absence));
        assert_eq!(active_track(Normal, Normal), None);
    }

    #[test]
    fn test_headline() {
        let decision = AlertDecision {
            drowsiness_score: 11.0,
            absence_counter: 0.0,
            drowsiness_threshold: 15.0,
            absence_threshold: 30.0,
            drowsiness_level: Warning,
            absence_level: Normal,
            status: EyeStatus::Closed,
            active_track: Some(AlertTrack::Drowsiness),
            should_play_alarm: None,
            paused: false,
        };

        assert_eq!(decision.headline(), Some("Getting Sleepy..."));
        assert!(!decision.is_alarming());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(
            EyeStatus::NotObservable { face_visible: false }.to_string(),
            "No Face Detected!"
        );
        assert_eq!(EyeStatus::PossibleSleepiness.label(), "Possible Sleepiness");
    }
}
