//! Drowsiness Monitor - Main Entry Point

use alerting::{AlertSink, CommandSink, CueSet, LogSink, MultiSink};
use anyhow::{bail, Context};
use camera_capture::{CameraConfig, ImageSequenceSource};
use clap::{Parser, Subcommand};
use dms::{DmsModule, DrowsinessEngine, EyeClassifier, OnnxEyeClassifier, OnnxRegionDetector};
use monitor::{
    init_logging, read_trace, replay, report, run_camera, run_checks, spawn_stdin_controls,
    AlertSettings, DecisionWriter, ModelSettings, MonitorSettings, OutputFormat, SessionSummary,
};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "drowsy-monitor", version, about = "Driver drowsiness and attention monitor")]
struct Cli {
    /// Settings file (TOML); defaults to ./drowsy-monitor.toml when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Engine preset: default (enhanced-with-absence), enhanced, fixed, basic, no-fallback
    #[arg(long, global = true)]
    preset: Option<String>,

    /// Override the drowsiness alarm threshold
    #[arg(long, global = true)]
    drowsiness_threshold: Option<f64>,

    /// Override the initial absence alarm threshold
    #[arg(long, global = true)]
    absence_threshold: Option<f64>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Monitor a directory of frames in real time
    Run {
        /// Directory of image frames, played in file name order
        frames: PathBuf,

        /// Frames per second
        #[arg(long)]
        fps: Option<u32>,

        /// Emit decisions as JSON lines
        #[arg(long)]
        json: bool,

        /// Log alarms without playing sounds
        #[arg(long)]
        no_sound: bool,
    },
    /// Replay a recorded observation trace (JSONL) through the engine
    Replay {
        trace: PathBuf,

        /// Emit decisions as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Check that model and sound files are in place
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json)?;

    info!("=== Drowsy Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let mut settings = MonitorSettings::load(cli.config.as_deref(), cli.preset.as_deref())
        .context("Failed to load settings")?;
    if let Some(threshold) = cli.drowsiness_threshold {
        settings.engine.drowsiness_threshold = threshold;
    }
    if let Some(threshold) = cli.absence_threshold {
        settings.engine.absence_threshold = threshold;
    }

    match cli.command {
        Command::Run {
            frames,
            fps,
            json,
            no_sound,
        } => {
            if let Some(fps) = fps {
                settings.session.fps = fps;
            }
            if json {
                settings.session.output = OutputFormat::Json;
            }
            let summary = run(&settings, &frames, no_sound).await?;
            log_summary(&summary);
        }
        Command::Replay { trace, json } => {
            if json {
                settings.session.output = OutputFormat::Json;
            }
            let summary = replay_trace(&settings, &trace)?;
            log_summary(&summary);
        }
        Command::Check => {
            let ready = report(&run_checks(&settings), std::io::stdout().lock())?;
            if !ready {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run(
    settings: &MonitorSettings,
    frames: &Path,
    no_sound: bool,
) -> anyhow::Result<SessionSummary> {
    if settings.session.fps == 0 {
        bail!("fps must be positive");
    }

    let models = &settings.models;
    let detector = OnnxRegionDetector::load(
        &models.region_detector,
        models.detector_input_size,
        models.detector_min_confidence,
    )
    .with_context(|| {
        format!("Failed to load region detector {}", models.region_detector.display())
    })?;
    info!(path = %models.region_detector.display(), "Region detector loaded");

    let classifier = load_classifier(models);
    let cues = CueSet::resolve(
        Some(settings.alerts.drowsiness_cue.as_path()),
        Some(settings.alerts.absence_cue.as_path()),
    );

    let mut dms = DmsModule::new(
        settings.engine.clone(),
        Box::new(detector),
        classifier,
        build_sink(&settings.alerts, no_sound),
        cues,
    )?;

    let mut source = ImageSequenceSource::open(
        frames,
        CameraConfig {
            fps: settings.session.fps,
            ..CameraConfig::default()
        },
    )?;

    info!("Controls: p = pause/resume, + / - = absence sensitivity, r = reset, q = quit");
    let mut controls = spawn_stdin_controls();
    let mut out = DecisionWriter::new(std::io::stdout(), settings.session.output);

    run_camera(&mut source, &mut dms, &mut controls, &mut out, settings.session.fps).await
}

fn replay_trace(settings: &MonitorSettings, trace: &Path) -> anyhow::Result<SessionSummary> {
    let file = File::open(trace)
        .with_context(|| format!("Failed to open trace {}", trace.display()))?;
    let records = read_trace(BufReader::new(file))?;
    info!(records = records.len(), trace = %trace.display(), "Replaying trace");

    let mut engine = DrowsinessEngine::new(settings.engine.clone())?;
    let cues = CueSet::resolve(
        Some(settings.alerts.drowsiness_cue.as_path()),
        Some(settings.alerts.absence_cue.as_path()),
    );
    let mut out = DecisionWriter::new(std::io::stdout(), settings.session.output);

    // Replays are faster than real time; alarms are logged only
    replay(&records, &mut engine, &cues, &LogSink, &mut out, Instant::now())
}

/// First classifier candidate that loads, if any
fn load_classifier(models: &ModelSettings) -> Option<Box<dyn EyeClassifier>> {
    for path in &models.eye_classifiers {
        if !path.is_file() {
            continue;
        }
        match OnnxEyeClassifier::load(path) {
            Ok(classifier) => {
                info!(path = %path.display(), "Eye classifier loaded");
                return Some(Box::new(classifier));
            }
            Err(e) => warn!(path = %path.display(), "Could not load eye classifier: {}", e),
        }
    }
    None
}

fn build_sink(alerts: &AlertSettings, no_sound: bool) -> Box<dyn AlertSink> {
    let mut sink = MultiSink::new().with(LogSink);
    if !no_sound && !alerts.player.is_empty() {
        sink = sink.with(CommandSink::new(alerts.player.clone(), alerts.player_args.clone()));
    }
    Box::new(sink)
}

fn log_summary(summary: &SessionSummary) {
    info!(
        ticks = summary.ticks,
        paused_ticks = summary.paused_ticks,
        drowsiness_alarms = summary.drowsiness_alarms,
        absence_alarms = summary.absence_alarms,
        quit_by_operator = summary.quit_by_operator,
        "Session finished"
    );
}
