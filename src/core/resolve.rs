/*!
 * Duplicate resolution
 *
 * Decides, for one destination path, whether to write there, skip it or
 * write next to it under a new name. Decisions are taken against a
 * [`DestinationView`]: the live file system for real runs, or the file
 * system plus the writes already decided for a dry run. The destination
 * index only feeds the fast-path hint.
 */

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::checksum::files_have_same_content;
use crate::config::DuplicateHandling;
use crate::error::Result;

/// What currently occupies destination paths
pub trait DestinationView: Send + Sync {
    /// A readable file holding the content found at `destination`, or
    /// `None` when the path is free
    fn occupant(&self, destination: &Path) -> Result<Option<PathBuf>>;
}

/// The output tree exactly as it is on disk
pub struct LiveDestination;

impl DestinationView for LiveDestination {
    fn occupant(&self, destination: &Path) -> Result<Option<PathBuf>> {
        if destination.try_exists()? {
            Ok(Some(destination.to_path_buf()))
        } else {
            Ok(None)
        }
    }
}

/// Outcome of resolving one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Destination is free
    UseAsIs(PathBuf),
    /// An equivalent file is already there
    Skip,
    /// Destination is taken by something else; write here instead
    UseRenamed(PathBuf),
}

impl Resolution {
    /// Path to write to, if any
    pub fn target(&self) -> Option<&Path> {
        match self {
            Resolution::UseAsIs(path) | Resolution::UseRenamed(path) => Some(path),
            Resolution::Skip => None,
        }
    }
}

/// Resolve `destination` for a copy of `source` under `policy`.
///
/// `hinted_duplicate` is the (size, name) index hit; it is honoured only by
/// [`DuplicateHandling::SkipBySizeAndName`], which then skips without looking
/// at the destination at all.
pub fn resolve_destination(
    policy: DuplicateHandling,
    source: &Path,
    destination: &Path,
    hinted_duplicate: bool,
    view: &dyn DestinationView,
) -> Result<Resolution> {
    if policy == DuplicateHandling::SkipBySizeAndName && hinted_duplicate {
        return Ok(Resolution::Skip);
    }

    let Some(occupant) = view.occupant(destination)? else {
        return Ok(Resolution::UseAsIs(destination.to_path_buf()));
    };

    let resolution = match policy {
        DuplicateHandling::KeepBothWithRename => {
            Resolution::UseRenamed(next_available_path(destination, view)?)
        }
        DuplicateHandling::SkipBySizeAndName => Resolution::Skip,
        DuplicateHandling::SkipOnlyWhenContentMatches => {
            let source_len = fs::metadata(source)?.len();
            let occupant_len = fs::metadata(&occupant)?.len();
            if source_len == occupant_len && files_have_same_content(source, &occupant)? {
                Resolution::Skip
            } else {
                Resolution::UseRenamed(next_available_path(destination, view)?)
            }
        }
    };

    debug!("{} resolved to {:?}", destination.display(), resolution);
    Ok(resolution)
}

/// First free `"<stem> (n)<ext>"` sibling of `path`, probing from n = 1
pub fn next_available_path(path: &Path, view: &dyn DestinationView) -> Result<PathBuf> {
    let stem = path.file_stem().map(OsString::from).unwrap_or_default();
    let extension = path.extension();

    let mut index: u64 = 1;
    loop {
        let mut name = stem.clone();
        name.push(format!(" ({})", index));
        if let Some(ext) = extension {
            name.push(".");
            name.push(ext);
        }

        let candidate = path.with_file_name(name);
        if view.occupant(&candidate)?.is_none() {
            return Ok(candidate);
        }
        index += 1;
    }
}
