//! Logging configuration for channelsweep.
//!
//! This module provides initialization and configuration for the tracing-based
//! logging system used throughout channelsweep.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

/// Crates whose events the default filter lets through.
const LOG_TARGETS: [&str; 3] = ["channelsweep", "channelsweep_linux", "chsweep"];

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// The filter directive used when `RUST_LOG` is not set.
    #[must_use]
    pub fn default_directive(&self) -> String {
        let level = self.to_level_filter();
        LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Initialize the logging system.
///
/// This should be called once at application startup. The logging level can be
/// controlled via:
/// 1. The `verbosity` parameter
/// 2. The `RUST_LOG` environment variable (takes precedence)
///
/// When `log_file` is given, records are also appended to that file without
/// ANSI colours. Its parent directory is created if needed.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
///
/// # Examples
///
/// ```no_run
/// use channelsweep::{init_logging, logging::Verbosity};
///
/// // Normal verbosity, console only
/// init_logging(Verbosity::Normal, None).unwrap();
/// ```
pub fn init_logging(verbosity: Verbosity, log_file: Option<&Path>) -> Result<()> {
    let default_filter = verbosity.default_directive();

    // Allow RUST_LOG to override
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(file_layer);

    // Install the subscriber (ignore error if already set)
    let _ = subscriber.try_init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Initialize logging for tests.
///
/// This sets up a minimal logging configuration suitable for tests.
/// It only logs warnings and errors by default to keep test output clean.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_to_level() {
        assert_eq!(Verbosity::Quiet.to_level_filter(), Level::ERROR);
        assert_eq!(Verbosity::Normal.to_level_filter(), Level::INFO);
        assert_eq!(Verbosity::Verbose.to_level_filter(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level_filter(), Level::TRACE);
    }

    #[test]
    fn test_verbosity_default() {
        assert_eq!(Verbosity::default(), Verbosity::Normal);
    }

    #[test]
    fn test_default_directive_covers_all_targets() {
        let directive = Verbosity::Verbose.default_directive();
        assert_eq!(
            directive,
            "channelsweep=DEBUG,channelsweep_linux=DEBUG,chsweep=DEBUG"
        );
        assert!(EnvFilter::try_new(&directive).is_ok());
    }

    #[test]
    fn test_open_log_file_creates_parent() {
        let dir = std::env::temp_dir().join(format!("channelsweep-logs-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("debug.log");

        assert!(open_log_file(&path).is_ok());
        assert!(path.exists());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_init_logging_does_not_panic() {
        // The subscriber may already be set from a previous test, which is fine.
        assert!(init_logging(Verbosity::Normal, None).is_ok());
    }

    #[test]
    fn test_init_logging_with_all_verbosity_levels() {
        // Only the first call actually initializes the subscriber
        assert!(init_logging(Verbosity::Quiet, None).is_ok());
        assert!(init_logging(Verbosity::Normal, None).is_ok());
        assert!(init_logging(Verbosity::Verbose, None).is_ok());
        assert!(init_logging(Verbosity::Trace, None).is_ok());
    }

    #[test]
    fn test_init_test_logging_does_not_panic() {
        init_test_logging();
    }
}
