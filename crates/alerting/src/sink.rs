//! Alert sinks
//!
//! Playback is best-effort and fire-and-forget: a sink starts the cue and
//! returns without waiting for it to finish.

use std::process::{Command, Stdio};
use tracing::{debug, warn};

use crate::{AlertCue, AlertError};

/// Destination for alarm cues
pub trait AlertSink: Send {
    /// Start playing a cue. Errors are reported to the caller, which ignores them.
    fn play(&self, cue: &AlertCue) -> Result<(), AlertError>;
}

/// Logs every cue at `warn`
#[derive(Debug, Default, Clone)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn play(&self, cue: &AlertCue) -> Result<(), AlertError> {
        warn!(track = %cue.track, cue = %cue.name(), "ALARM");
        Ok(())
    }
}

/// Plays cue files through an external audio player (e.g. `aplay`, `paplay`)
#[derive(Debug, Clone)]
pub struct CommandSink {
    player: String,
    args: Vec<String>,
}

impl CommandSink {
    pub fn new(player: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            player: player.into(),
            args,
        }
    }
}

impl AlertSink for CommandSink {
    fn play(&self, cue: &AlertCue) -> Result<(), AlertError> {
        let path = cue.path.as_ref().ok_or_else(|| AlertError::MissingCue(cue.name()))?;

        let mut child = Command::new(&self.player)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AlertError::Spawn {
                player: self.player.clone(),
                source,
            })?;

        debug!(player = %self.player, cue = %cue.name(), pid = child.id(), "Cue playback started");

        // Reap the player in the background so playback never blocks a tick
        std::thread::spawn(move || {
            if let Err(e) = child.wait() {
                debug!("Audio player wait failed: {}", e);
            }
        });

        Ok(())
    }
}

/// Fans a cue out to several sinks; every sink is tried
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl AlertSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl AlertSink for MultiSink {
    /// Returns the first error after every sink has been tried
    fn play(&self, cue: &AlertCue) -> Result<(), AlertError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.play(cue) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlertTrack;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cue(path: Option<&str>) -> AlertCue {
        AlertCue {
            track: AlertTrack::Drowsiness,
            path: path.map(PathBuf::from),
        }
    }

    #[test]
    fn test_command_sink_requires_cue_file() {
        let sink = CommandSink::new("true", vec![]);
        assert!(matches!(sink.play(&cue(None)), Err(AlertError::MissingCue(_))));
    }

    #[test]
    fn test_command_sink_missing_player() {
        let sink = CommandSink::new("/nonexistent/player", vec![]);
        assert!(matches!(
            sink.play(&cue(Some("alarm2.wav"))),
            Err(AlertError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_sink_does_not_wait() {
        let sink = CommandSink::new("sleep", vec![]);
        let start = std::time::Instant::now();
        // `sleep 5` would block for five seconds if playback were awaited
        sink.play(&cue(Some("5"))).unwrap();
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
    }

    struct CountingSink(Arc<AtomicUsize>);

    impl AlertSink for CountingSink {
        fn play(&self, _cue: &AlertCue) -> Result<(), AlertError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_multi_sink_tries_every_sink() {
        let played = Arc::new(AtomicUsize::new(0));
        let sink = MultiSink::new()
            .with(CommandSink::new("/nonexistent/player", vec![]))
            .with(CountingSink(played.clone()));

        assert!(sink.play(&cue(Some("alarm2.wav"))).is_err());
        assert_eq!(played.load(Ordering::SeqCst), 1);
        assert!(MultiSink::new().with(LogSink).play(&cue(None)).is_ok());
    }
}
