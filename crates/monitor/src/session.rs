//! Session loops: live frames and recorded traces

use alerting::{AlertSink, AlertTrack, CueSet};
use anyhow::Context;
use camera_capture::FrameSource;
use dms::{sound_alarm, AlertDecision, DmsModule, DrowsinessEngine, FrameObservation};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::controls::{drain, ControlCommand};
use crate::output::DecisionWriter;

/// Totals for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub ticks: u64,
    pub paused_ticks: u64,
    pub drowsiness_alarms: u64,
    pub absence_alarms: u64,
    pub quit_by_operator: bool,
}

impl SessionSummary {
    pub fn record(&mut self, decision: &AlertDecision) {
        self.ticks += 1;
        if decision.paused {
            self.paused_ticks += 1;
        }
        match decision.should_play_alarm {
            Some(AlertTrack::Drowsiness) => self.drowsiness_alarms += 1,
            Some(AlertTrack::Absence) => self.absence_alarms += 1,
            None => {}
        }
    }

    pub fn total_alarms(&self) -> u64 {
        self.drowsiness_alarms + self.absence_alarms
    }
}

/// Run the monitor over a frame source at `fps`, applying operator controls between ticks.
///
/// Ends when the source is exhausted, a frame cannot be read, or the operator quits.
pub async fn run_camera<W: Write>(
    source: &mut dyn FrameSource,
    dms: &mut DmsModule,
    controls: &mut mpsc::UnboundedReceiver<ControlCommand>,
    out: &mut DecisionWriter<W>,
    fps: u32,
) -> anyhow::Result<SessionSummary> {
    let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut summary = SessionSummary::default();
    info!(session_id = %out.session_id(), fps, "Monitoring started");

    loop {
        ticker.tick().await;

        if drain(controls, dms.engine_mut()).is_break() {
            summary.quit_by_operator = true;
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Frame source exhausted");
                break;
            }
            Err(e) => {
                warn!("Failed to read frame: {}", e);
                break;
            }
        };

        let decision = dms.analyze(&frame, Instant::now());
        summary.record(&decision);
        out.write(summary.ticks, &decision)
            .context("Failed to write decision")?;
    }

    out.flush().context("Failed to flush output")?;
    Ok(summary)
}

/// One line of a recorded observation trace
///
/// ```json
/// {"t_ms": 66, "observation": {"face_count": 1, "left_eye_regions": 1, "right_eye_regions": 1, "classification": null}}
/// {"t_ms": 132, "control": "toggle_pause"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Milliseconds since the start of the trace
    pub t_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<FrameObservation>,
    /// Applied before the observation on the same line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<ControlCommand>,
}

/// Parse a JSONL trace. Blank lines and `#` comments are skipped.
pub fn read_trace(reader: impl BufRead) -> anyhow::Result<Vec<TraceRecord>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read trace line {}", index + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record: TraceRecord = serde_json::from_str(line)
            .with_context(|| format!("Invalid trace record on line {}", index + 1))?;
        records.push(record);
    }
    debug!(records = records.len(), "Trace loaded");
    Ok(records)
}

/// Replay a trace through the engine. Tick times are `start + t_ms`.
pub fn replay<W: Write>(
    records: &[TraceRecord],
    engine: &mut DrowsinessEngine,
    cues: &CueSet,
    sink: &dyn AlertSink,
    out: &mut DecisionWriter<W>,
    start: Instant,
) -> anyhow::Result<SessionSummary> {
    let mut summary = SessionSummary::default();

    for record in records {
        if let Some(command) = record.control {
            debug!(t_ms = record.t_ms, ?command, "Trace control");
            if let ControlFlow::Break(()) = command.apply(engine) {
                summary.quit_by_operator = true;
                break;
            }
        }

        let Some(obs) = &record.observation else {
            continue;
        };

        let now = start + Duration::from_millis(record.t_ms);
        let decision = engine.process_tick(obs, now);
        sound_alarm(&decision, cues, sink);
        summary.record(&decision);
        out.write(summary.ticks, &decision)
            .context("Failed to write decision")?;
    }

    out.flush().context("Failed to flush output")?;
    Ok(summary)
}
