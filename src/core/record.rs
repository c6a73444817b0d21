/*!
 * Discovered files and planned copy operations
 */

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// A source file found during indexing. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute source path
    pub source_path: PathBuf,
    /// Path below the source root, optionally prefixed by a root identifier
    pub relative_path: PathBuf,
    /// Lowercase extension with leading dot, empty if none
    pub extension: String,
    pub size: u64,
    pub last_write_utc: DateTime<Utc>,
    pub category: String,
    pub is_photo: bool,
}

impl FileRecord {
    /// File name component of the source path
    pub fn file_name(&self) -> String {
        file_name_of(&self.source_path)
    }
}

/// One record with every destination it fans out to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOperation {
    pub record: FileRecord,
    /// `<output>/Merged-By-Project/<relative path>`
    pub primary_destination: PathBuf,
    /// `<output>/<photo root>/<yyyy>/<mm>/<file name>`
    pub photo_mirror_destination: Option<PathBuf>,
    /// `<output>/<quarantine>/<category>/<file name>`
    pub quarantine_destination: Option<PathBuf>,
    /// (size, file name) already present in the destination snapshot.
    /// A hint for the orchestrator, not a verdict.
    pub likely_duplicate: bool,
}

impl CopyOperation {
    /// Secondary targets written after the primary one: photo mirror first,
    /// then quarantine
    pub fn fan_out_destinations(&self) -> impl Iterator<Item = &Path> {
        self.photo_mirror_destination
            .as_deref()
            .into_iter()
            .chain(self.quarantine_destination.as_deref())
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lowercase extension with its leading dot, or an empty string
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
