//! Logging setup

use anyhow::Context;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Map `-v` occurrences to a level (0 = info)
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialize logging. Logs go to stderr; stdout carries decisions.
pub fn init_logging(verbosity: u8, json: bool) -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(level_for(verbosity))
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    result.context("Failed to set tracing subscriber")
}
