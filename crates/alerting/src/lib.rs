//! Alerting System
//!
//! Provides the shared alarm cooldown gate, audio cue resolution, and
//! fire-and-forget alert sinks.

mod cue;
mod gate;
mod sink;

pub use cue::{AlertCue, AlertTrack, CueSet};
pub use gate::AlarmGate;
pub use sink::{AlertSink, CommandSink, LogSink, MultiSink};

use thiserror::Error;

/// Alert sink errors. Callers log these and carry on.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Cue file not found: {0}")]
    MissingCue(String),

    #[error("Failed to start player '{player}': {source}")]
    Spawn {
        player: String,
        #[source]
        source: std::io::Error,
    },
}
