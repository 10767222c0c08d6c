//! Per-tick decision output

use chrono::{DateTime, Utc};
use dms::AlertDecision;
use serde::Serialize;
use std::io::Write;
use uuid::Uuid;

use crate::settings::OutputFormat;

/// One JSON output line
#[derive(Debug, Serialize)]
struct DecisionRecord<'a> {
    session_id: Uuid,
    tick: u64,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    decision: &'a AlertDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    headline: Option<&'static str>,
}

/// Writes one line per tick, as text or JSON
pub struct DecisionWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    session_id: Uuid,
}

impl<W: Write> DecisionWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            session_id: Uuid::new_v4(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn write(&mut self, tick: u64, decision: &AlertDecision) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.writer, "{}", format_text(tick, decision)),
            OutputFormat::Json => {
                let record = DecisionRecord {
                    session_id: self.session_id,
                    tick,
                    timestamp: Utc::now(),
                    decision,
                    headline: decision.headline(),
                };
                serde_json::to_writer(&mut self.writer, &record)?;
                writeln!(self.writer)
            }
        }
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Status line in the layout of the on-screen panel
pub fn format_text(tick: u64, d: &AlertDecision) -> String {
    let mut line = format!(
        "[{tick:>6}] Drowsiness Score: {}/{} ({}) | Absence Counter: {}/{} ({}) | {}",
        d.drowsiness_score,
        d.drowsiness_threshold,
        d.drowsiness_level.as_str(),
        d.absence_counter,
        d.absence_threshold,
        d.absence_level.as_str(),
        d.status,
    );
    if let Some(headline) = d.headline() {
        line.push_str(" | ");
        line.push_str(headline);
    }
    if let Some(track) = d.should_play_alarm {
        line.push_str(&format!(" | ALARM ({track})"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::{DrowsinessEngine, EngineConfig, FrameObservation};
    use std::time::Instant;

    fn absent_decision(ticks: usize) -> AlertDecision {
        let mut engine = DrowsinessEngine::new(EngineConfig::default()).unwrap();
        let now = Instant::now();
        let mut decision = engine.process_tick(&FrameObservation::absent(), now);
        for _ in 1..ticks {
            decision = engine.process_tick(&FrameObservation::absent(), now);
        }
        decision
    }

    #[test]
    fn test_text_line() {
        let line = format_text(7, &absent_decision(22));
        assert!(line.starts_with("[     7] Drowsiness Score: 0/15 (normal)"));
        assert!(line.contains("Absence Counter: 22/30 (warning)"));
        assert!(line.contains("No Face Detected!"));
        assert!(line.ends_with("Eyes Missing..."));
    }

    #[test]
    fn test_json_line() {
        let mut out = DecisionWriter::new(Vec::new(), OutputFormat::Json);
        let session_id = out.session_id();
        out.write(3, &absent_decision(30)).unwrap();

        let text = String::from_utf8(out.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();

        assert_eq!(value["session_id"], session_id.to_string());
        assert_eq!(value["tick"], 3);
        assert_eq!(value["absence_level"], "alarm");
        assert_eq!(value["should_play_alarm"], "absence");
        assert_eq!(value["status"]["kind"], "not_observable");
        assert_eq!(value["headline"], "EYES NOT DETECTED! LOOK AT CAMERA!");
    }
}
