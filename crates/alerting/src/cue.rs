//! Alert tracks and their audio cues

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Alert lineage that raised an alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTrack {
    /// Sustained eye-closure evidence
    Drowsiness,
    /// Sustained inability to observe the face or eyes
    Absence,
}

impl AlertTrack {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTrack::Drowsiness => "drowsiness",
            AlertTrack::Absence => "absence",
        }
    }
}

impl fmt::Display for AlertTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named audio cue to play for a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertCue {
    pub track: AlertTrack,
    /// Sound file, if one is available
    pub path: Option<PathBuf>,
}

impl AlertCue {
    /// Cue name used in logs
    pub fn name(&self) -> String {
        match &self.path {
            Some(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            None => format!("{}-silent", self.track),
        }
    }
}

/// Cue file per track
#[derive(Debug, Clone, Default)]
pub struct CueSet {
    drowsiness: Option<PathBuf>,
    absence: Option<PathBuf>,
}

impl CueSet {
    /// Resolve cue files that exist on disk.
    ///
    /// A missing absence cue falls back to the drowsiness cue.
    pub fn resolve(drowsiness: Option<&Path>, absence: Option<&Path>) -> Self {
        let drowsiness = drowsiness.and_then(existing);
        let absence = absence.and_then(existing).or_else(|| drowsiness.clone());

        match (&drowsiness, &absence) {
            (None, None) => warn!("No alarm sound files found; alarms will be logged only"),
            (Some(d), Some(a)) if d == a => {
                info!(cue = %d.display(), "Using one alarm sound for both tracks")
            }
            _ => info!("Alarm sounds loaded"),
        }

        Self { drowsiness, absence }
    }

    /// Cue for a track
    pub fn cue_for(&self, track: AlertTrack) -> AlertCue {
        let path = match track {
            AlertTrack::Drowsiness => self.drowsiness.clone(),
            AlertTrack::Absence => self.absence.clone(),
        };
        AlertCue { track, path }
    }
}

fn existing(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        Some(path.to_path_buf())
    } else {
        warn!(cue = %path.display(), "Alarm sound not found");
        None
    }
}
