//! Operator controls
//!
//! Commands arrive on a channel and are applied between ticks, never during one.

use dms::DrowsinessEngine;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Operator command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCommand {
    /// Pause or resume detection
    TogglePause,
    /// Lower the absence threshold (alert sooner)
    MoreSensitive,
    /// Raise the absence threshold (alert later)
    LessSensitive,
    /// Zero the scores and restore default thresholds
    Reset,
    /// End the session
    Quit,
}

impl ControlCommand {
    /// Parse one input line: space/`p` pause, `+`/`-` sensitivity, `r` reset, `q` quit
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == " " {
            return Some(ControlCommand::TogglePause);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" | "resume" => Some(ControlCommand::TogglePause),
            "+" | "up" => Some(ControlCommand::MoreSensitive),
            "-" | "down" => Some(ControlCommand::LessSensitive),
            "r" | "reset" => Some(ControlCommand::Reset),
            "q" | "quit" | "exit" => Some(ControlCommand::Quit),
            _ => None,
        }
    }

    /// Apply to the engine. `Break` ends the session.
    pub fn apply(self, engine: &mut DrowsinessEngine) -> ControlFlow<()> {
        match self {
            ControlCommand::TogglePause => {
                engine.toggle_pause();
            }
            ControlCommand::MoreSensitive => {
                let threshold = engine.adjust_absence_sensitivity(-1.0);
                info!("Absence Sensitivity: {}", threshold);
            }
            ControlCommand::LessSensitive => {
                let threshold = engine.adjust_absence_sensitivity(1.0);
                info!("Absence Sensitivity: {}", threshold);
            }
            ControlCommand::Reset => engine.reset(),
            ControlCommand::Quit => {
                info!("Detection stopped by operator");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }
}

/// Apply every pending command without waiting
pub fn drain(
    rx: &mut mpsc::UnboundedReceiver<ControlCommand>,
    engine: &mut DrowsinessEngine,
) -> ControlFlow<()> {
    while let Ok(command) = rx.try_recv() {
        debug!(?command, "Control command");
        if command.apply(engine).is_break() {
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

/// Read commands from stdin on a background task
pub fn spawn_stdin_controls() -> mpsc::UnboundedReceiver<ControlCommand> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match ControlCommand::parse(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    None => warn!(
                        "Unknown command {:?} (p = pause, + / - = sensitivity, r = reset, q = quit)",
                        line
                    ),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read controls from stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::EngineConfig;

    #[test]
    fn test_parse() {
        assert_eq!(ControlCommand::parse(" "), Some(ControlCommand::TogglePause));
        assert_eq!(ControlCommand::parse("P\n"), Some(ControlCommand::TogglePause));
        assert_eq!(ControlCommand::parse("+"), Some(ControlCommand::MoreSensitive));
        assert_eq!(ControlCommand::parse("-\r\n"), Some(ControlCommand::LessSensitive));
        assert_eq!(ControlCommand::parse("q"), Some(ControlCommand::Quit));
        assert_eq!(ControlCommand::parse("x"), None);
        assert_eq!(ControlCommand::parse(""), None);
    }

    #[test]
    fn test_sensitivity_direction() {
        let mut engine = DrowsinessEngine::new(EngineConfig::default()).unwrap();

        let _ = ControlCommand::MoreSensitive.apply(&mut engine);
        assert_eq!(engine.state().absence_threshold(), 25.0);

        let _ = ControlCommand::LessSensitive.apply(&mut engine);
        let _ = ControlCommand::LessSensitive.apply(&mut engine);
        assert_eq!(engine.state().absence_threshold(), 35.0);
    }

    #[tokio::test]
    async fn test_drain_applies_in_order_and_stops_at_quit() {
        let mut engine = DrowsinessEngine::new(EngineConfig::default()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(ControlCommand::TogglePause).unwrap();
        tx.send(ControlCommand::MoreSensitive).unwrap();
        tx.send(ControlCommand::Quit).unwrap();
        tx.send(ControlCommand::TogglePause).unwrap();

        assert!(drain(&mut rx, &mut engine).is_break());
        assert!(engine.is_paused());
        assert_eq!(engine.state().absence_threshold(), 25.0);

        // Commands after quit stay queued
        assert_eq!(rx.try_recv(), Ok(ControlCommand::TogglePause));
    }
}
