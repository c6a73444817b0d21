/*!
 * Logging and tracing initialization
 *
 * One subscriber per process: an `EnvFilter` (from `RUST_LOG`, else the
 * profile's level) over either a compact stderr layer or a JSON file layer.
 */

use std::fs::{self, File};
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::BackupProfile;
use crate::error::{BackupError, Result};

/// Where log lines go
enum LogSink {
    Stderr,
    JsonFile(File),
}

impl LogSink {
    fn for_profile(profile: &BackupProfile) -> Result<Self> {
        match profile.log_file.as_deref() {
            Some(path) => open_log_file(path).map(LogSink::JsonFile),
            None => Ok(LogSink::Stderr),
        }
    }
}

/// Install the global subscriber described by the job profile.
///
/// Fails if the filter or log file cannot be set up, or if a subscriber is
/// already installed.
pub fn init_logging(profile: &BackupProfile) -> Result<()> {
    let filter = env_filter(effective_level(profile))?;
    let sink = LogSink::for_profile(profile)?;

    // Exactly one of the two layers is present
    let (console, json) = match sink {
        LogSink::Stderr => (
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .compact(),
            ),
            None,
        ),
        LogSink::JsonFile(file) => (
            None,
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_ansi(false)
                    .json(),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(json)
        .try_init()
        .map_err(|e| BackupError::Config(format!("Failed to install log subscriber: {}", e)))
}

fn effective_level(profile: &BackupProfile) -> Level {
    if profile.verbose {
        Level::DEBUG
    } else {
        profile.log_level.to_tracing_level()
    }
}

fn env_filter(level: Level) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("mergevault={}", level)))
        .map_err(|e| BackupError::Config(format!("Failed to create log filter: {}", e)))
}

/// Create (or truncate) the log file, creating its directory if needed
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    File::create(path).map_err(|e| {
        BackupError::Config(format!(
            "Failed to create log file {}: {}",
            path.display(),
            e
        ))
    })
}

/// Initialize logging with custom format for testing
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("mergevault=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_verbose_overrides_log_level() {
        let profile = BackupProfile {
            log_level: LogLevel::Error,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(effective_level(&profile), Level::DEBUG);
    }

    #[test]
    fn test_configured_level_used() {
        let profile = BackupProfile {
            log_level: LogLevel::Warn,
            ..Default::default()
        };
        assert_eq!(effective_level(&profile), Level::WARN);
    }

    #[test]
    fn test_log_sink_follows_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/nested/run.json");

        let console = LogSink::for_profile(&BackupProfile::default()).unwrap();
        assert!(matches!(console, LogSink::Stderr));

        let profile = BackupProfile {
            log_file: Some(path.clone()),
            ..Default::default()
        };
        let file = LogSink::for_profile(&profile).unwrap();
        assert!(matches!(file, LogSink::JsonFile(_)));
        assert!(path.is_file());
    }

    #[test]
    fn test_unwritable_log_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let profile = BackupProfile {
            log_file: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(
            LogSink::for_profile(&profile),
            Err(BackupError::Config(_))
        ));
    }

    #[test]
    fn test_second_subscriber_is_rejected() {
        init_test_logging();
        assert!(init_logging(&BackupProfile::default()).is_err());
    }

    #[test]
    fn test_init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
        tracing::debug!("test logging initialised");
    }
}
