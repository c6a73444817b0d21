/*!
 * Destination duplicate index
 *
 * A one-time snapshot of the output tree keyed by (byte length, file name).
 * It is only a pre-filter: files written later in the same run are not in
 * it, and no copy is ever skipped on its word alone.
 */

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use super::record::file_name_of;
use crate::error::Result;

type IndexKey = (u64, String);

/// (size, file name) keys of the files already in the output tree
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    keys: HashSet<IndexKey>,
    file_count: usize,
}

impl DuplicateIndex {
    /// Scan `output_root`. A missing root yields an empty index.
    ///
    /// The destination is assumed to be under the engine's control, so a
    /// read failure anywhere in it is returned rather than tolerated.
    pub fn build(output_root: &Path) -> Result<Self> {
        let mut index = Self::default();
        if !output_root.is_dir() {
            debug!(
                "Output root {} does not exist yet, duplicate index is empty",
                output_root.display()
            );
            return Ok(index);
        }

        for entry in WalkDir::new(output_root).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let size = entry.metadata()?.len();
            index.insert(size, file_name_of(entry.path()));
        }

        debug!(
            "Indexed {} existing destination files under {}",
            index.file_count,
            output_root.display()
        );
        Ok(index)
    }

    fn insert(&mut self, size: u64, name: String) {
        self.keys.insert((size, name));
        self.file_count += 1;
    }

    pub fn contains(&self, size: u64, file_name: &str) -> bool {
        self.keys.contains(&(size, file_name.to_string()))
    }

    /// Number of files indexed
    pub fn len(&self) -> usize {
        self.file_count
    }

    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }
}
