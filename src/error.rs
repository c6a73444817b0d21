/*!
 * Error types for MergeVault
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, BackupError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_PARTIAL: i32 = 2;
pub const EXIT_CANCELLED: i32 = 3;

#[derive(Debug)]
pub enum BackupError {
    /// Job profile violates a run invariant
    Config(String),

    /// Source root does not exist
    SourceNotFound(PathBuf),

    /// A directory could not be enumerated
    Enumeration { path: PathBuf, source: io::Error },

    /// I/O error
    Io(io::Error),

    /// Post-copy verification found different lengths
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Post-copy verification found different digests
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Timestamp preservation failed
    Metadata(String),

    /// Worker pool could not be started
    Parallel(String),

    /// Run stopped by a cancellation token
    Cancelled,
}

impl BackupError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BackupError::Cancelled => EXIT_CANCELLED,
            BackupError::SizeMismatch { .. } | BackupError::ChecksumMismatch { .. } => {
                EXIT_PARTIAL
            }
            _ => EXIT_FATAL,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            BackupError::Config(_) => ErrorCategory::Configuration,
            BackupError::SourceNotFound(_) | BackupError::Enumeration { .. } => {
                ErrorCategory::Enumeration
            }
            BackupError::Io(_) => ErrorCategory::IoError,
            BackupError::SizeMismatch { .. } | BackupError::ChecksumMismatch { .. } => {
                ErrorCategory::Integrity
            }
            BackupError::Metadata(_) => ErrorCategory::Metadata,
            BackupError::Parallel(_) => ErrorCategory::Concurrency,
            BackupError::Cancelled => ErrorCategory::Cancellation,
        }
    }
}

/// Error categories for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid or incomplete job profile
    Configuration,
    /// Missing source roots and unreadable directories
    Enumeration,
    /// Read/write failures
    IoError,
    /// Verification failures
    Integrity,
    /// Timestamp preservation
    Metadata,
    /// Worker pool failures
    Concurrency,
    /// Deliberate stop
    Cancellation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Enumeration => write!(f, "enumeration"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Integrity => write!(f, "integrity"),
            ErrorCategory::Metadata => write!(f, "metadata"),
            ErrorCategory::Concurrency => write!(f, "concurrency"),
            ErrorCategory::Cancellation => write!(f, "cancellation"),
        }
    }
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            BackupError::SourceNotFound(path) => {
                write!(f, "Source does not exist: {}", path.display())
            }
            BackupError::Enumeration { path, source } => {
                write!(f, "Cannot enumerate {}: {}", path.display(), source)
            }
            BackupError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            BackupError::SizeMismatch {
                path,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Verification failed: size mismatch for {} (expected {} bytes, found {})",
                    path.display(),
                    expected,
                    actual
                )
            }
            BackupError::ChecksumMismatch {
                path,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Verification failed: checksum mismatch for {} (expected {}, got {})",
                    path.display(),
                    expected,
                    actual
                )
            }
            BackupError::Metadata(msg) => {
                write!(f, "Metadata operation failed: {}", msg)
            }
            BackupError::Parallel(msg) => {
                write!(f, "Parallel processing error: {}", msg)
            }
            BackupError::Cancelled => {
                write!(f, "Operation cancelled")
            }
        }
    }
}

impl std::error::Error for BackupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackupError::Io(err) => Some(err),
            BackupError::Enumeration { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for BackupError {
    fn from(err: io::Error) -> Self {
        BackupError::Io(err)
    }
}

impl From<walkdir::Error> for BackupError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(PathBuf::from).unwrap_or_default();
        let message = err.to_string();
        let source = err
            .into_io_error()
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message));
        BackupError::Enumeration { path, source }
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        BackupError::Config(format!("JSON parse error: {}", err))
    }
}

impl From<toml::de::Error> for BackupError {
    fn from(err: toml::de::Error) -> Self {
        BackupError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for BackupError {
    fn from(err: toml::ser::Error) -> Self {
        BackupError::Config(format!("TOML write error: {}", err))
    }
}
