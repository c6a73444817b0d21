/*!
 * Copy-plan construction
 */

use chrono::Datelike;

use super::dest_index::DuplicateIndex;
use super::record::{CopyOperation, FileRecord};
use crate::config::{BackupProfile, MERGED_TREE_NAME};

/// Extensions routed into the quarantine tree
const QUARANTINED_EXTENSIONS: &[&str] = &[".exe", ".msi"];

/// Compute every destination of `record`.
///
/// Pure: the result depends only on the profile, the record and the
/// duplicate index snapshot.
pub fn build_copy_operation(
    profile: &BackupProfile,
    record: FileRecord,
    index: &DuplicateIndex,
) -> CopyOperation {
    let file_name = record.file_name();

    let primary_destination = profile
        .output_root
        .join(MERGED_TREE_NAME)
        .join(&record.relative_path);

    let photo_mirror_destination = (profile.enable_photo_mirror && record.is_photo).then(|| {
        profile
            .output_root
            .join(&profile.photo_root)
            .join(format!("{:04}", record.last_write_utc.year()))
            .join(format!("{:02}", record.last_write_utc.month()))
            .join(&file_name)
    });

    let quarantine_destination = (profile.security.quarantine_untrusted_executables
        && QUARANTINED_EXTENSIONS.contains(&record.extension.as_str()))
    .then(|| {
        profile
            .output_root
            .join(&profile.security.quarantine_folder_name)
            .join(&record.category)
            .join(&file_name)
    });

    let likely_duplicate =
        profile.use_fast_size_name_check && index.contains(record.size, &file_name);

    CopyOperation {
        record,
        primary_destination,
        photo_mirror_destination,
        quarantine_destination,
        likely_duplicate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn record(name: &str, extension: &str, category: &str, is_photo: bool) -> FileRecord {
        FileRecord {
            source_path: PathBuf::from("/src/laptop").join(name),
            relative_path: PathBuf::from("laptop").join(name),
            extension: extension.to_string(),
            size: 4,
            last_write_utc: Utc.with_ymd_and_hms(2021, 3, 7, 12, 0, 0).unwrap(),
            category: category.to_string(),
            is_photo,
        }
    }

    fn profile() -> BackupProfile {
        BackupProfile {
            source_roots: vec![PathBuf::from("/src/laptop")],
            output_root: PathBuf::from("/out"),
            ..Default::default()
        }
    }

    #[test]
    fn test_primary_only() {
        let op = build_copy_operation(
            &profile(),
            record("notes.txt", ".txt", "Documents", false),
            &DuplicateIndex::default(),
        );
        assert_eq!(
            op.primary_destination,
            PathBuf::from("/out/Merged-By-Project/laptop/notes.txt")
        );
        assert!(op.photo_mirror_destination.is_none());
        assert!(op.quarantine_destination.is_none());
        assert!(!op.likely_duplicate);
    }

    #[test]
    fn test_photo_mirror_by_date() {
        let op = build_copy_operation(
            &profile(),
            record("IMG_7.jpg", ".jpg", "General", true),
            &DuplicateIndex::default(),
        );
        assert_eq!(
            op.photo_mirror_destination,
            Some(PathBuf::from("/out/Photo-Database/2021/03/IMG_7.jpg"))
        );

        let mut no_mirror = profile();
        no_mirror.enable_photo_mirror = false;
        let op = build_copy_operation(
            &no_mirror,
            record("IMG_7.jpg", ".jpg", "General", true),
            &DuplicateIndex::default(),
        );
        assert!(op.photo_mirror_destination.is_none());
    }

    #[test]
    fn test_quarantine_executables() {
        let op = build_copy_operation(
            &profile(),
            record("setup.msi", ".msi", "Software", false),
            &DuplicateIndex::default(),
        );
        assert_eq!(
            op.quarantine_destination,
            Some(PathBuf::from("/out/Quarantine/Software/setup.msi"))
        );

        let op = build_copy_operation(
            &profile(),
            record("helper.dll", ".dll", "Software", false),
            &DuplicateIndex::default(),
        );
        assert!(op.quarantine_destination.is_none());
    }

    #[test]
    fn test_duplicate_hint_needs_fast_check() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"abcd").unwrap();
        let index = DuplicateIndex::build(dir.path()).unwrap();

        let op = build_copy_operation(
            &profile(),
            record("notes.txt", ".txt", "Documents", false),
            &index,
        );
        assert!(op.likely_duplicate);

        let mut slow = profile();
        slow.use_fast_size_name_check = false;
        let op = build_copy_operation(
            &slow,
            record("notes.txt", ".txt", "Documents", false),
            &index,
        );
        assert!(!op.likely_duplicate);
    }
}
