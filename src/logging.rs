//! # Logging
//!
//! Diagnostics are written through the `log` facade to standard error by `env_logger`.
//! `RUST_LOG` overrides the level chosen here.

use crate::error::{ManageError, ManageResult};
use log::LevelFilter;

/// Parse a level name such as `INFO` or `debug`.
pub fn parse_level(level: &str) -> ManageResult<LevelFilter> {
    match level.to_ascii_uppercase().as_str() {
        "TRACE" => Ok(LevelFilter::Trace),
        "DEBUG" => Ok(LevelFilter::Debug),
        "INFO" => Ok(LevelFilter::Info),
        "WARN" => Ok(LevelFilter::Warn),
        "ERROR" => Ok(LevelFilter::Error),
        "OFF" => Ok(LevelFilter::Off),
        _ => Err(ManageError::config(format!("Invalid log level: {}", level))),
    }
}

/// Initialize logging at `info`.
pub fn init() {
    init_with_level(LevelFilter::Info);
}

/// Initialize logging at the given level unless `RUST_LOG` says otherwise.
///
/// Calling this more than once is harmless.
pub fn init_with_level(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .try_init()
        .unwrap_or(());
}
