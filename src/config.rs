/*!
 * Configuration types for MergeVault
 *
 * A backup job is described by a [`BackupProfile`]. Profiles are stored as
 * TOML by default; files ending in `.json` are read and written as JSON.
 * Every field carries a serde default so hand-edited documents may omit
 * anything they do not care about. PascalCase keys such as `SourceDrives`
 * and `DryRun` are accepted as aliases, so existing JSON job files load
 * unchanged.
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BackupError, Result};

/// Name of the primary merge tree under the output root
pub const MERGED_TREE_NAME: &str = "Merged-By-Project";

/// How an existing file at a destination path is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateHandling {
    /// Trust a (size, file name) match in the destination index
    #[serde(alias = "SkipBySizeAndName")]
    SkipBySizeAndName,

    /// Skip only when the existing file has identical content, else rename
    #[default]
    #[serde(alias = "SkipOnlyWhenContentMatches")]
    SkipOnlyWhenContentMatches,

    /// Never skip; always write next to the existing file under a new name
    #[serde(alias = "KeepBothWithRename")]
    KeepBothWithRename,
}

/// Security-related filtering and quarantine options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityProfile {
    /// Informational: whether the destination may live on an encrypted volume
    #[serde(default = "default_true", alias = "AllowEncryptedDestination")]
    pub allow_encrypted_destination: bool,

    /// Skip files flagged hidden or system
    #[serde(default, alias = "BlockHiddenSystemFiles")]
    pub block_hidden_system_files: bool,

    /// Copy `.exe`/`.msi` files into the quarantine tree as well
    #[serde(default = "default_true", alias = "QuarantineUntrustedExecutables")]
    pub quarantine_untrusted_executables: bool,

    /// Quarantine folder name under the output root
    #[serde(default = "default_quarantine_folder", alias = "QuarantineFolderName")]
    pub quarantine_folder_name: String,
}

impl Default for SecurityProfile {
    fn default() -> Self {
        Self {
            allow_encrypted_destination: true,
            block_hidden_system_files: false,
            quarantine_untrusted_executables: true,
            quarantine_folder_name: default_quarantine_folder(),
        }
    }
}

/// Main configuration for a backup run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupProfile {
    /// Display name of the job
    #[serde(default = "default_job_name", alias = "JobName")]
    pub job_name: String,

    /// Source roots, indexed in order
    #[serde(default, alias = "SourceDrives")]
    pub source_roots: Vec<PathBuf>,

    /// Destination root receiving all copies
    #[serde(default, alias = "OutputRoot")]
    pub output_root: PathBuf,

    /// Mirror photo-like files into a year/month tree
    #[serde(default = "default_true", alias = "EnablePhotoDatabaseMirror")]
    pub enable_photo_mirror: bool,

    /// Photo mirror folder name under the output root
    #[serde(default = "default_photo_root", alias = "PhotoDatabaseRoot")]
    pub photo_root: String,

    /// Pre-check destination duplicates by (size, file name)
    #[serde(default = "default_true", alias = "UseFastFileSizeDuplicateCheck")]
    pub use_fast_size_name_check: bool,

    /// Verify the primary copy after writing it
    #[serde(default = "default_true", alias = "VerifyCopiedFiles")]
    pub verify_copied_files: bool,

    /// During verification, hash both files when timestamps differ
    #[serde(default = "default_true", alias = "UseHashCheckForMismatchedTimestamp")]
    pub hash_check_on_timestamp_mismatch: bool,

    /// Prefix relative paths with an identifier of their source root
    #[serde(default = "default_true", alias = "PreserveWorkingDirectoryPattern")]
    pub preserve_working_directory_pattern: bool,

    /// Copy source modification times onto destinations
    #[serde(default = "default_true", alias = "PreserveTimestamps")]
    pub preserve_timestamps: bool,

    /// Record and skip unreadable directories instead of aborting
    #[serde(default = "default_true", alias = "ContinueOnAccessDenied")]
    pub continue_on_access_denied: bool,

    /// Resolve and count everything, write nothing
    #[serde(default, alias = "DryRun")]
    pub dry_run: bool,

    /// Maximum number of copy operations in flight
    #[serde(default = "default_max_parallel_copies", alias = "MaxParallelCopies")]
    pub max_parallel_copies: usize,

    /// Security options
    #[serde(default, alias = "Security")]
    pub security: SecurityProfile,

    /// Duplicate handling policy
    #[serde(default, alias = "DuplicateHandling")]
    pub duplicate_handling: DuplicateHandling,

    /// Directory names excluded wherever they appear as a path segment
    #[serde(default = "default_ignore_directories", alias = "IgnoreDirectories")]
    pub ignore_directories: Vec<String>,

    /// Lowercase extensions (with leading dot) treated as photos
    #[serde(default = "default_photo_extensions")]
    pub photo_extensions: Vec<String>,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for BackupProfile {
    fn default() -> Self {
        Self {
            job_name: default_job_name(),
            source_roots: Vec::new(),
            output_root: PathBuf::new(),
            enable_photo_mirror: true,
            photo_root: default_photo_root(),
            use_fast_size_name_check: true,
            verify_copied_files: true,
            hash_check_on_timestamp_mismatch: true,
            preserve_working_directory_pattern: true,
            preserve_timestamps: true,
            continue_on_access_denied: true,
            dry_run: false,
            max_parallel_copies: default_max_parallel_copies(),
            security: SecurityProfile::default(),
            duplicate_handling: DuplicateHandling::default(),
            ignore_directories: default_ignore_directories(),
            photo_extensions: default_photo_extensions(),
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_job_name() -> String {
    "Default Backup Job".to_string()
}

fn default_photo_root() -> String {
    "Photo-Database".to_string()
}

fn default_quarantine_folder() -> String {
    "Quarantine".to_string()
}

fn default_max_parallel_copies() -> usize {
    get_cpu_count().max(2)
}

fn default_ignore_directories() -> Vec<String> {
    vec![
        "$Recycle.Bin".to_string(),
        "System Volume Information".to_string(),
    ]
}

fn default_photo_extensions() -> Vec<String> {
    [
        ".jpg", ".jpeg", ".png", ".tif", ".tiff", ".heic", ".webp", ".gif", ".bmp", ".raw",
        ".dng",
    ]
    .iter()
    .map(|ext| ext.to_string())
    .collect()
}

impl BackupProfile {
    /// Load a profile from disk (JSON for `.json`, TOML otherwise)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let profile = if is_json(path) {
            serde_json::from_str(&contents)?
        } else {
            toml::from_str(&contents)?
        };
        Ok(profile)
    }

    /// Save the profile to disk in the format implied by the extension
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// A template written for first-time users; dry-run so nothing is copied
    /// until the paths are edited
    pub fn starter() -> Self {
        Self {
            job_name: "My Backup Job".to_string(),
            source_roots: vec![PathBuf::from("/mnt/drive-d"), PathBuf::from("/mnt/drive-e")],
            output_root: PathBuf::from("/mnt/backup/merged-output"),
            duplicate_handling: DuplicateHandling::SkipOnlyWhenContentMatches,
            dry_run: true,
            ..Default::default()
        }
    }

    /// Check the invariants a run needs before any file is touched
    pub fn validate(&self) -> Result<()> {
        if self.source_roots.is_empty() {
            return Err(BackupError::Config(
                "At least one source root is required".to_string(),
            ));
        }
        if self.output_root.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(BackupError::Config("Output root is required".to_string()));
        }
        Ok(())
    }

    /// Effective worker count (never below one)
    pub fn worker_count(&self) -> usize {
        self.max_parallel_copies.max(1)
    }

    /// Whether `extension` (lowercase, with leading dot) is photo-like
    pub fn is_photo_extension(&self, extension: &str) -> bool {
        self.photo_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Get the number of available CPU cores
fn get_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}
