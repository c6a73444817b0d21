/*!
 * Source indexing
 *
 * Walks every configured source root in order, drops files matched by the
 * skip rules and turns the rest into [`FileRecord`]s. Indexing runs on the
 * calling thread and finishes before any planning or copying starts.
 */

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::cancel::CancellationToken;
use super::category::categorize;
use super::record::{extension_of, file_name_of, FileRecord};
use super::report::BackupReport;
use super::walker::{TreeWalker, WalkedFile};
use crate::config::BackupProfile;
use crate::error::{BackupError, Result};

/// Identifier used when a root yields neither a drive nor a directory name
const FALLBACK_ROOT_NAME: &str = "Drive";

/// Index all source roots of `profile`.
///
/// Missing roots and tolerated enumeration faults are appended to
/// `report.errors`; every record built bumps `report.files_scanned`.
/// Returns `Err(Cancelled)` if `cancel` fires part-way.
pub fn index_sources(
    profile: &BackupProfile,
    report: &mut BackupReport,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<FileRecord>> {
    let mut records = Vec::new();
    let walker =
        TreeWalker::new(profile.continue_on_access_denied).with_cancellation(cancel);

    for source in &profile.source_roots {
        if let Some(token) = cancel {
            token.check()?;
        }

        if !source.is_dir() {
            let message = BackupError::SourceNotFound(source.clone()).to_string();
            warn!("{}", message);
            report.errors.push(message);
            continue;
        }

        let root_name = drive_root_name(source);
        let before = records.len();
        let files_scanned = &mut report.files_scanned;

        walker.walk(source, &mut report.errors, |file| {
            if should_skip(profile, &file) {
                debug!("Skipping excluded file: {}", file.path.display());
                return;
            }
            records.push(build_record(profile, source, &root_name, file));
            *files_scanned += 1;
        })?;

        info!(
            "Indexed {} files from {}",
            records.len() - before,
            source.display()
        );
    }

    Ok(records)
}

fn build_record(
    profile: &BackupProfile,
    source_root: &Path,
    root_name: &str,
    file: WalkedFile,
) -> FileRecord {
    let WalkedFile { path, metadata } = file;

    let relative_in_root = path
        .strip_prefix(source_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(file_name_of(&path)));
    let relative_path = if profile.preserve_working_directory_pattern {
        Path::new(root_name).join(relative_in_root)
    } else {
        relative_in_root
    };

    let extension = extension_of(&path);
    let is_photo = profile.is_photo_extension(&extension);
    let category = categorize(&extension, &file_name_of(&path)).to_string();
    let last_write_utc = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_default();

    FileRecord {
        source_path: path,
        relative_path,
        extension,
        size: metadata.len(),
        last_write_utc,
        category,
        is_photo,
    }
}

/// Excluded directory segment anywhere above the file, or a blocked
/// hidden/system file
fn should_skip(profile: &BackupProfile, file: &WalkedFile) -> bool {
    if in_ignored_directory(&file.path, &profile.ignore_directories) {
        return true;
    }
    profile.security.block_hidden_system_files && is_hidden_or_system(file)
}

fn in_ignored_directory(path: &Path, ignored: &[String]) -> bool {
    if ignored.is_empty() {
        return false;
    }
    let Some(parent) = path.parent() else {
        return false;
    };
    parent.components().any(|component| match component {
        Component::Normal(segment) => {
            let segment = segment.to_string_lossy();
            ignored
                .iter()
                .any(|name| segment.to_lowercase() == name.to_lowercase())
        }
        _ => false,
    })
}

#[cfg(windows)]
fn is_hidden_or_system(file: &WalkedFile) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
    file.metadata.file_attributes() & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM) != 0
}

#[cfg(not(windows))]
fn is_hidden_or_system(file: &WalkedFile) -> bool {
    file.path
        .file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Sanitized identifier for a source root.
///
/// A drive prefix such as `D:` becomes `D_`; otherwise the last path
/// segment is used, falling back to a fixed placeholder.
pub fn drive_root_name(source: &Path) -> String {
    if let Some(Component::Prefix(prefix)) = source.components().next() {
        let prefix = prefix.as_os_str().to_string_lossy();
        if prefix.ends_with(':') {
            return prefix.replace(':', "_");
        }
    }

    match source.file_name() {
        Some(name) if !name.to_string_lossy().trim().is_empty() => {
            name.to_string_lossy().into_owned()
        }
        _ => FALLBACK_ROOT_NAME.to_string(),
    }
}
