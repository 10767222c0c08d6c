//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::DmsError;

/// State engine configuration.
///
/// Every constant that differs between monitoring profiles lives here, so one
/// engine covers all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Drowsiness score at which the drowsiness track reaches Alarm
    pub drowsiness_threshold: f64,

    /// Drowsiness threshold while ticks carry no classification (the
    /// detection-dropout path); `None` uses `drowsiness_threshold`
    pub fallback_drowsiness_threshold: Option<f64>,

    /// Track face/eye absence; when off the absence counter stays at zero
    pub absence_enabled: bool,

    /// Absence counter at which the absence track reaches Alarm
    pub absence_threshold: f64,

    /// Lower bound for the operator-adjustable absence threshold
    pub absence_threshold_min: f64,

    /// Upper bound for the operator-adjustable absence threshold
    pub absence_threshold_max: f64,

    /// Step applied per sensitivity adjustment
    pub absence_threshold_step: f64,

    /// Drowsiness score change per observable tick
    pub sensitivity_step: f64,

    /// Drowsiness decay per tick while the eyes cannot be observed
    pub absent_drowsiness_decay: f64,

    /// Absence counter decay per tick while the eyes are observable
    pub absence_recovery_step: f64,

    /// Fraction of a threshold at which a track enters Warning
    pub warning_ratio: f64,

    /// Without a classifier, a tick counts as closed when fewer than this
    /// fraction of the expected eyes were detected
    pub fallback_detection_ratio: f64,

    /// Use the detection-dropout heuristic when no classifier is loaded
    pub fallback_enabled: bool,

    /// Minimum time between two alarms, shared by both tracks (seconds)
    pub cooldown_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            drowsiness_threshold: 15.0,
            fallback_drowsiness_threshold: None,
            absence_enabled: true,
            absence_threshold: 30.0,
            absence_threshold_min: 5.0,
            absence_threshold_max: 100.0,
            absence_threshold_step: 5.0,
            sensitivity_step: 1.0,
            absent_drowsiness_decay: 0.5,
            absence_recovery_step: 2.0,
            warning_ratio: 0.7,
            fallback_detection_ratio: 0.7,
            fallback_enabled: true,
            cooldown_secs: 3.0,
        }
    }
}

impl EngineConfig {
    /// Classifier-only drowsiness monitor: alarm at score 10 on every tick
    /// above threshold, no absence track
    pub fn enhanced() -> Self {
        Self {
            drowsiness_threshold: 10.0,
            absence_enabled: false,
            fallback_enabled: false,
            cooldown_secs: 0.0,
            ..Default::default()
        }
    }

    /// Drowsiness monitor that tolerates a missing classifier: alarm at 5 with
    /// the classifier, at 10 on the detection-dropout path, no absence track
    pub fn fixed() -> Self {
        Self {
            drowsiness_threshold: 5.0,
            fallback_drowsiness_threshold: Some(10.0),
            absence_enabled: false,
            cooldown_secs: 0.0,
            ..Default::default()
        }
    }

    /// First-generation monitor: any sustained closure (score 1) alarms,
    /// absence alarms after 30 ticks, 3 s shared cooldown
    pub fn basic() -> Self {
        Self {
            drowsiness_threshold: 1.0,
            fallback_enabled: false,
            ..Default::default()
        }
    }

    /// Default thresholds with the detection-dropout heuristic disabled
    pub fn without_fallback() -> Self {
        Self {
            fallback_enabled: false,
            ..Default::default()
        }
    }

    /// Look up a named preset: `default` (alias `enhanced-with-absence`),
    /// `enhanced`, `fixed`, `basic` or `no-fallback`
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "default" | "enhanced-with-absence" => Some(Self::default()),
            "enhanced" => Some(Self::enhanced()),
            "fixed" => Some(Self::fixed()),
            "basic" => Some(Self::basic()),
            "no-fallback" => Some(Self::without_fallback()),
            _ => None,
        }
    }

    /// Drowsiness threshold for a tick, by whether it was classified
    pub fn drowsiness_threshold_for(&self, classified: bool) -> f64 {
        match self.fallback_drowsiness_threshold {
            Some(threshold) if !classified => threshold,
            _ => self.drowsiness_threshold,
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::try_from_secs_f64(self.cooldown_secs).unwrap_or(Duration::ZERO)
    }

    /// Clamp an absence threshold into the configured bounds
    pub fn clamp_absence_threshold(&self, value: f64) -> f64 {
        value.clamp(self.absence_threshold_min, self.absence_threshold_max)
    }

    /// Check the configuration and clamp the initial absence threshold into bounds
    pub fn validate(mut self) -> Result<Self, DmsError> {
        positive("drowsiness_threshold", self.drowsiness_threshold)?;
        if let Some(threshold) = self.fallback_drowsiness_threshold {
            positive("fallback_drowsiness_threshold", threshold)?;
        }
        positive("absence_threshold", self.absence_threshold)?;
        positive("absence_threshold_min", self.absence_threshold_min)?;
        positive("absence_threshold_step", self.absence_threshold_step)?;
        positive("sensitivity_step", self.sensitivity_step)?;
        non_negative("absent_drowsiness_decay", self.absent_drowsiness_decay)?;
        non_negative("absence_recovery_step", self.absence_recovery_step)?;
        non_negative("cooldown_secs", self.cooldown_secs)?;
        ratio("warning_ratio", self.warning_ratio)?;
        ratio("fallback_detection_ratio", self.fallback_detection_ratio)?;

        if self.absence_threshold_max.is_nan()
            || self.absence_threshold_max < self.absence_threshold_min
        {
            return Err(DmsError::Config(format!(
                "absence threshold bounds inverted: [{}, {}]",
                self.absence_threshold_min, self.absence_threshold_max
            )));
        }

        self.absence_threshold = self.clamp_absence_threshold(self.absence_threshold);
        Ok(self)
    }
}

fn positive(field: &str, value: f64) -> Result<(), DmsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DmsError::Config(format!("{field} must be positive, got {value}")))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), DmsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DmsError::Config(format!("{field} must not be negative, got {value}")))
    }
}

fn ratio(field: &str, value: f64) -> Result<(), DmsError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(DmsError::Config(format!("{field} must be in (0, 1], got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default().validate().unwrap();
        assert_eq!(config.absence_threshold, 30.0);
        assert_eq!(config.cooldown(), Duration::from_secs(3));
    }

    #[test]
    fn test_default_preset_tracks_absence() {
        let config = EngineConfig::preset("enhanced-with-absence").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.drowsiness_threshold, 15.0);
        assert_eq!(config.absence_threshold, 30.0);
        assert!(config.absence_enabled);
        assert_eq!(config.fallback_drowsiness_threshold, None);
        assert_eq!(config.cooldown_secs, 3.0);
    }

    #[test]
    fn test_enhanced_preset() {
        let config = EngineConfig::preset("enhanced").unwrap().validate().unwrap();
        assert_eq!(config.drowsiness_threshold, 10.0);
        assert!(!config.absence_enabled);
        assert!(!config.fallback_enabled);
        assert_eq!(config.cooldown(), Duration::ZERO);
    }

    #[test]
    fn test_fixed_preset_thresholds_by_path() {
        let config = EngineConfig::preset("fixed").unwrap().validate().unwrap();
        assert!(config.fallback_enabled);
        assert!(!config.absence_enabled);
        assert_eq!(config.drowsiness_threshold_for(true), 5.0);
        assert_eq!(config.drowsiness_threshold_for(false), 10.0);
        assert_eq!(config.cooldown(), Duration::ZERO);
    }

    #[test]
    fn test_basic_preset() {
        let config = EngineConfig::preset("basic").unwrap().validate().unwrap();
        assert_eq!(config.drowsiness_threshold, 1.0);
        assert_eq!(config.absence_threshold, 30.0);
        assert!(config.absence_enabled);
        assert_eq!(config.cooldown(), Duration::from_secs(3));
    }

    #[test]
    fn test_other_presets() {
        assert!(!EngineConfig::preset("no-fallback").unwrap().fallback_enabled);
        assert_eq!(EngineConfig::default().drowsiness_threshold_for(false), 15.0);
        assert!(EngineConfig::preset("paranoid").is_none());
    }

    #[test]
    fn test_initial_threshold_clamped() {
        let config = EngineConfig {
            absence_threshold: 250.0,
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap().absence_threshold, 100.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        let zero_threshold = EngineConfig {
            drowsiness_threshold: 0.0,
            ..Default::default()
        };
        assert!(matches!(zero_threshold.validate(), Err(DmsError::Config(_))));

        let inverted = EngineConfig {
            absence_threshold_min: 50.0,
            absence_threshold_max: 10.0,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let bad_fallback = EngineConfig {
            fallback_drowsiness_threshold: Some(-2.0),
            ..Default::default()
        };
        assert!(bad_fallback.validate().is_err());

        let bad_ratio = EngineConfig {
            warning_ratio: 1.5,
            ..Default::default()
        };
        assert!(bad_ratio.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "drowsiness_threshold": 12 }"#).unwrap();
        assert_eq!(config.drowsiness_threshold, 12.0);
        assert_eq!(config.absence_threshold_step, 5.0);
    }
}
