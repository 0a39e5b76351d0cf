//! tracing-subscriber setup.
//!
//! Two layers: human-readable console output on stderr (`info`, or `debug`
//! with `--verbose`/`DEBUG`, overridable through `RUST_LOG`) and a JSON log of
//! every `debug`+ event in `<home>/honeycomb.debug.log`.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::Config;
use crate::error::{HoneycombError, Result};

/// Console level before `RUST_LOG` is consulted.
pub fn console_level(verbose: bool, debug_env: bool) -> LevelFilter {
    if verbose || debug_env {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Install the global subscriber. The home directory must already exist
/// for the debug log to be written; without it only the console layer runs.
pub fn init(config: &Config, verbose: bool, debug_env: bool) -> Result<()> {
    let console_filter = EnvFilter::builder()
        .with_default_directive(console_level(verbose, debug_env).into())
        .from_env_lossy();
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    let debug_log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.debug_log_path())
        .ok()
        .map(|file| {
            fmt::layer()
                .json()
                .with_writer(Mutex::new(file))
                .with_filter(LevelFilter::DEBUG)
        });

    tracing_subscriber::registry()
        .with(console)
        .with(debug_log)
        .try_init()
        .map_err(|e| HoneycombError::Runtime(format!("Failed to initialize logging: {}", e)))
}
