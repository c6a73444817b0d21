/*!
 * Run report and the shared accumulator copy workers update
 */

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::progress::{EnginePhase, ProgressSnapshot};

/// Final counters and recorded errors of a backup run.
/// Owned by the caller once `run` returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupReport {
    pub files_scanned: u64,
    pub files_copied: u64,
    pub duplicates_skipped: u64,
    pub files_failed: u64,
    pub bytes_copied: u64,
    /// Human-readable errors in the order they were recorded
    pub errors: Vec<String>,
    pub duration: Duration,
    /// The run stopped early because its cancellation token fired
    pub cancelled: bool,
}

impl BackupReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_failures(&self) -> bool {
        self.files_failed > 0
    }

    pub(crate) fn snapshot(&self, phase: EnginePhase, message: impl Into<String>) -> ProgressSnapshot {
        ProgressSnapshot {
            phase,
            scanned_files: self.files_scanned,
            copied_files: self.files_copied,
            skipped_duplicates: self.duplicates_skipped,
            failed_files: self.files_failed,
            message: message.into(),
        }
    }
}

impl fmt::Display for BackupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scanned: {}, Copied: {}, Duplicates: {}, Failed: {}, Bytes: {}",
            self.files_scanned,
            self.files_copied,
            self.duplicates_skipped,
            self.files_failed,
            self.bytes_copied
        )
    }
}

/// Mutex-guarded report shared by every copy worker.
///
/// Each method takes the lock once, so a counter update and the snapshot
/// taken alongside it are always consistent.
#[derive(Debug, Default)]
pub struct SharedReport {
    inner: Mutex<BackupReport>,
}

impl SharedReport {
    pub fn new(report: BackupReport) -> Self {
        Self {
            inner: Mutex::new(report),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackupReport> {
        // A panicking worker must not take the counters down with it
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_skipped_duplicate(&self) {
        self.lock().duplicates_skipped += 1;
    }

    pub fn add_copied(&self, bytes: u64) {
        let mut report = self.lock();
        report.files_copied += 1;
        report.bytes_copied += bytes;
    }

    pub fn add_failed(&self, error: String) {
        let mut report = self.lock();
        report.files_failed += 1;
        report.errors.push(error);
    }

    pub fn snapshot(&self, phase: EnginePhase, message: impl Into<String>) -> ProgressSnapshot {
        self.lock().snapshot(phase, message)
    }

    pub fn into_inner(self) -> BackupReport {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_display_summary() {
        let report = BackupReport {
            files_scanned: 5,
            files_copied: 3,
            duplicates_skipped: 1,
            files_failed: 1,
            bytes_copied: 2048,
            ..Default::default()
        };
        assert_eq!(
            report.to_string(),
            "Scanned: 5, Copied: 3, Duplicates: 1, Failed: 1, Bytes: 2048"
        );
        assert!(report.has_failures());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let shared = Arc::new(SharedReport::default());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        shared.add_copied(2);
                        shared.add_skipped_duplicate();
                    }
                    shared.add_failed(format!("worker {} -> boom", i));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = Arc::try_unwrap(shared).unwrap().into_inner();
        assert_eq!(report.files_copied, 4000);
        assert_eq!(report.bytes_copied, 8000);
        assert_eq!(report.duplicates_skipped, 4000);
        assert_eq!(report.files_failed, 8);
        assert_eq!(report.errors.len(), 8);
    }

    #[test]
    fn test_snapshot_reflects_counters() {
        let shared = SharedReport::new(BackupReport {
            files_scanned: 9,
            ..Default::default()
        });
        shared.add_copied(10);

        let snap = shared.snapshot(EnginePhase::Copy, "a.txt");
        assert_eq!(snap.scanned_files, 9);
        assert_eq!(snap.copied_files, 1);
        assert_eq!(snap.message, "a.txt");
    }
}
