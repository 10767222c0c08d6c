//! Drowsiness monitor session runner
//!
//! Wires frame sources, perception, the drowsiness engine and alarm sinks
//! into a paced session loop, with operator controls and trace replay.

pub mod check;
pub mod controls;
pub mod logging;
pub mod output;
pub mod session;
pub mod settings;

pub use check::{report, run_checks, CheckItem};
pub use controls::{drain, spawn_stdin_controls, ControlCommand};
pub use logging::init_logging;
pub use output::{format_text, DecisionWriter};
pub use session::{read_trace, replay, run_camera, SessionSummary, TraceRecord};
pub use settings::{AlertSettings, ModelSettings, MonitorSettings, OutputFormat, SessionSettings};
