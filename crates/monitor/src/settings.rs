//! Layered monitor settings
//!
//! Sources, lowest priority first:
//! - built-in defaults (optionally an engine preset)
//! - TOML file: `--config <path>`, or `drowsy-monitor.toml` in the working directory
//! - environment: `DROWSY__<SECTION>__<KEY>`, e.g. `DROWSY__ENGINE__DROWSINESS_THRESHOLD=12`
//! - CLI flags, applied by the caller afterwards

use config::{Config, ConfigError, Environment, File};
use dms::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default settings file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "drowsy-monitor";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DROWSY";

/// Top-level monitor settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// State engine thresholds and decay constants
    pub engine: EngineConfig,
    /// Perception models
    pub models: ModelSettings,
    /// Alarm sounds and player
    pub alerts: AlertSettings,
    /// Session pacing and output
    pub session: SessionSettings,
}

/// Model file settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Face/eye region detector (required for camera sessions)
    pub region_detector: PathBuf,
    /// Eye classifier candidates, tried in order; none loading means fallback mode
    pub eye_classifiers: Vec<PathBuf>,
    /// Square detector input size in pixels
    pub detector_input_size: u32,
    /// Minimum detection score
    pub detector_min_confidence: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            region_detector: PathBuf::from("models/face_detection_yunet.onnx"),
            eye_classifiers: vec![
                PathBuf::from("models/cnn_eye_classification.onnx"),
                PathBuf::from("models/cnn.onnx"),
            ],
            detector_input_size: 320,
            detector_min_confidence: 0.9,
        }
    }
}

/// Alarm cue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub drowsiness_cue: PathBuf,
    /// Falls back to the drowsiness cue when missing
    pub absence_cue: PathBuf,
    /// External audio player; empty disables sound
    pub player: String,
    pub player_args: Vec<String>,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            drowsiness_cue: PathBuf::from("alarm2.wav"),
            absence_cue: PathBuf::from("TFALARM.WAV"),
            player: "aplay".to_string(),
            player_args: vec!["-q".to_string()],
        }
    }
}

/// Decision output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Session loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Frames per second for camera sessions
    pub fps: u32,
    pub output: OutputFormat,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            fps: 15,
            output: OutputFormat::Text,
        }
    }
}

impl MonitorSettings {
    /// Load settings from defaults, file and environment
    pub fn load(path: Option<&Path>, preset: Option<&str>) -> Result<Self, ConfigError> {
        let mut defaults = MonitorSettings::default();
        if let Some(name) = preset {
            defaults.engine = EngineConfig::preset(name)
                .ok_or_else(|| ConfigError::Message(format!("unknown engine preset '{name}'")))?;
        }

        let builder = Config::builder().add_source(Config::try_from(&defaults)?);
        let builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings: MonitorSettings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        debug!(?settings, "Settings loaded");
        Ok(settings)
    }
}
