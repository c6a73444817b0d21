/*!
 * Staged byte copy, timestamp preservation and post-copy verification
 *
 * A copy is streamed into a hidden staging file in the destination's
 * directory and renamed onto the destination once every check has passed.
 */

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use filetime::{set_file_times, FileTime};
use tempfile::{Builder, NamedTempFile};
use tracing::trace;

use super::checksum::digest_file;
use crate::error::{BackupError, Result};

/// Buffer size for sequential copy I/O
pub const COPY_BUFFER_SIZE: usize = 1024 * 1024;

const STAGING_PREFIX: &str = ".mergevault-";
const STAGING_SUFFIX: &str = ".partial";

/// Bytes of one file written next to their final destination but not yet
/// visible under its name.
///
/// Dropping a `StagedCopy` without [`commit`](StagedCopy::commit) removes the
/// staging file, so a failed copy, timestamp update or verification never
/// leaves anything at the destination path.
pub struct StagedCopy {
    file: NamedTempFile,
    destination: PathBuf,
    bytes: u64,
}

impl StagedCopy {
    /// Where the bytes currently live
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn preserve_timestamps(&self, source: &Path) -> Result<()> {
        preserve_timestamps(source, self.path())
    }

    /// Compare the staged bytes with `source`. Failures name the final
    /// destination.
    pub fn verify(&self, source: &Path, hash_on_timestamp_mismatch: bool) -> Result<()> {
        check_copy(
            source,
            self.path(),
            &self.destination,
            hash_on_timestamp_mismatch,
        )
    }

    /// Move the staged file onto its destination. A rename keeps the
    /// timestamps already set on the staging file.
    pub fn commit(self) -> Result<u64> {
        let StagedCopy {
            file,
            destination,
            bytes,
        } = self;
        file.persist(&destination).map_err(|e| BackupError::Io(e.error))?;
        trace!("Committed {} ({} bytes)", destination.display(), bytes);
        Ok(bytes)
    }
}

/// Stream `source` into a staging file in the destination's directory,
/// creating that directory first.
pub fn stage_copy(source: &Path, destination: &Path) -> Result<StagedCopy> {
    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, File::open(source)?);

    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut file = Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(STAGING_SUFFIX)
        .tempfile_in(parent)?;

    let bytes = {
        let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, file.as_file_mut());
        let written = io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
        written
    };

    trace!(
        "Staged {} bytes: {} -> {}",
        bytes,
        source.display(),
        file.path().display()
    );
    Ok(StagedCopy {
        file,
        destination: destination.to_path_buf(),
        bytes,
    })
}

/// Overwrite the destination's access and modification times with the
/// source's. Creation time is left alone; it cannot be set portably.
fn preserve_timestamps(source: &Path, destination: &Path) -> Result<()> {
    let metadata = fs::metadata(source).map_err(|e| {
        BackupError::Metadata(format!(
            "Failed to read source metadata of {}: {}",
            source.display(),
            e
        ))
    })?;

    let accessed = FileTime::from_last_access_time(&metadata);
    let modified = FileTime::from_last_modification_time(&metadata);

    set_file_times(destination, accessed, modified).map_err(|e| {
        BackupError::Metadata(format!(
            "Failed to set timestamps on {}: {}",
            destination.display(),
            e
        ))
    })
}

/// Check a copy against its source, reporting failures under `reported`.
///
/// Lengths must match. With `hash_on_timestamp_mismatch`, files whose
/// modification times differ are additionally compared by digest; equal
/// timestamps pass without hashing.
fn check_copy(
    source: &Path,
    copy: &Path,
    reported: &Path,
    hash_on_timestamp_mismatch: bool,
) -> Result<()> {
    let source_meta = fs::metadata(source)?;
    let copy_meta = fs::metadata(copy)?;

    if source_meta.len() != copy_meta.len() {
        return Err(BackupError::SizeMismatch {
            path: reported.to_path_buf(),
            expected: source_meta.len(),
            actual: copy_meta.len(),
        });
    }

    if !hash_on_timestamp_mismatch {
        return Ok(());
    }
    if FileTime::from_last_modification_time(&source_meta)
        == FileTime::from_last_modification_time(&copy_meta)
    {
        return Ok(());
    }

    let expected = digest_file(source)?;
    let actual = digest_file(copy)?;
    if expected != actual {
        return Err(BackupError::ChecksumMismatch {
            path: reported.to_path_buf(),
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        });
    }

    Ok(())
}
