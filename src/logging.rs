//! `tracing` subscriber setup for the `msm` binary.
//!
//! Logs go to stderr so that stdout stays reserved for reports. An optional
//! log file receives the same events without ANSI colours.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

use crate::error::AppError;

/// Map `-v` occurrences / `--quiet` to a level filter.
pub fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber.
///
/// Calling this twice is not an error; the second registration is ignored.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<(), AppError> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(level_filter(verbosity, quiet))
        .with(stderr_layer);

    if let Some(path) = log_file {
        let file = File::create(path).map_err(|e| AppError::write(path, e))?;
        let file_layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);
        let _ = subscriber.with(file_layer).try_init();
    } else {
        let _ = subscriber.try_init();
    }

    Ok(())
}
