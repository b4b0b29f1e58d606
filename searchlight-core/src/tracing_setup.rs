//! Logging for Searchlight
//!
//! Two sinks: the console at the level picked on the command line, and a
//! per-run file for post-mortems. The file keeps DEBUG detail for the cache,
//! search and server paths but leaves out the per-request chatter of body
//! streaming and the HTTP stack.

use std::fmt;
use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt as fmt_layer};

/// Log file name inside the logs directory, overwritten on every run.
pub const LOG_FILE_NAME: &str = "searchlight-last-run.log";

/// Directives for the log file unless `SEARCHLIGHT_FILE_LOG` replaces them.
pub const FILE_LOG_DIRECTIVES: &str = "debug,\
    searchlight_core::streaming::range=warn,\
    searchlight_core::streaming=info,\
    tower_http=info,\
    hyper=warn,\
    hyper_util=warn";

const FILE_LOG_ENV: &str = "SEARCHLIGHT_FILE_LOG";
const DEFAULT_LOGS_DIR: &str = "logs";

/// Installs the console and file layers as the global subscriber.
///
/// `RUST_LOG` takes precedence over `console_level` for the console.
/// Returns the path of the log file, `<logs_dir>/searchlight-last-run.log`.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - The logs directory or file cannot be
///   created, `SEARCHLIGHT_FILE_LOG` holds invalid directives, or a global
///   subscriber is already set
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new(DEFAULT_LOGS_DIR));
    create_dir_all(logs_path)?;

    let log_file_path = logs_path.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt_layer::layer()
        .with_target(false)
        .compact()
        .with_filter(console_filter);

    let file_layer = fmt_layer::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(file_filter(std::env::var(FILE_LOG_ENV).ok())?);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(
        "Logging to console at {} and to {}",
        console_level,
        log_file_path.display()
    );

    Ok(log_file_path)
}

/// Filter for the file layer; `directives` replaces the defaults when set.
fn file_filter(
    directives: Option<String>,
) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    match directives.filter(|d| !d.trim().is_empty()) {
        Some(custom) => EnvFilter::try_new(custom),
        None => EnvFilter::try_new(FILE_LOG_DIRECTIVES),
    }
}

/// Console verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for Level {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.to_possible_value().ok_or(fmt::Error)?;
        f.write_str(value.get_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_map_to_tracing() {
        assert_eq!(Level::from(CliLogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(CliLogLevel::Trace), Level::TRACE);
        assert_eq!(CliLogLevel::default(), CliLogLevel::Info);
        assert_eq!(CliLogLevel::Warn.to_string(), "warn");
    }

    #[test]
    fn test_default_file_filter_quiets_streaming() {
        let filter = file_filter(None).unwrap().to_string();
        assert!(filter.contains("searchlight_core::streaming::range=warn"));
        assert!(filter.contains("tower_http=info"));
    }

    #[test]
    fn test_file_filter_override() {
        let filter = file_filter(Some("searchlight_search=trace".to_string()))
            .unwrap()
            .to_string();
        assert!(filter.contains("searchlight_search=trace"));
        assert!(!filter.contains("tower_http"));

        assert!(file_filter(Some("  ".to_string())).is_ok());
        assert!(file_filter(Some("searchlight=loud".to_string())).is_err());
    }
}
