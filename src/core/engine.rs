/*!
 * Backup engine
 *
 * A run goes through four phases:
 * - Initialize: validate the profile and prepare the output root
 * - Index: walk every source root (single-threaded)
 * - Copy: snapshot the destination, plan every file, then copy with at most
 *   `max_parallel_copies` operations in flight
 * - Complete: seal the report
 *
 * Planned operations are fed through a bounded channel into a rayon pool
 * sized to the worker count, so admission is first-come-first-served and
 * each pool thread runs one operation at a time.
 *
 * Every target is written to a staging file beside it and moved into place
 * only after timestamps and verification succeed.
 */

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use crossbeam_channel::bounded;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::cancel::CancellationToken;
use super::concurrency::{DestinationLocks, PlannedWrites};
use super::dest_index::DuplicateIndex;
use super::indexer::index_sources;
use super::plan::build_copy_operation;
use super::progress::{EnginePhase, ProgressObserver, ProgressSnapshot};
use super::record::CopyOperation;
use super::report::{BackupReport, SharedReport};
use super::resolve::{resolve_destination, DestinationView, LiveDestination, Resolution};
use super::transfer::stage_copy;
use crate::config::BackupProfile;
use crate::error::{BackupError, Result};

/// Instrumentation called around every copy operation a worker runs
pub trait OperationHook: Send + Sync {
    /// A worker has admitted `operation` and is about to process it
    fn on_start(&self, _operation: &CopyOperation) {}

    /// The bytes for one target of `operation` sit in `staged` and have not
    /// been checked or moved into place yet
    fn on_staged(&self, _operation: &CopyOperation, _staged: &Path) {}

    /// `operation` has finished, whatever the outcome
    fn on_finish(&self, _operation: &CopyOperation) {}
}

/// Run a backup job.
///
/// Fails before touching the file system if the profile is invalid. Per-file
/// failures and tolerated enumeration faults end up in the returned report;
/// a cancelled run returns what was done so far with `cancelled` set.
pub fn run(
    profile: &BackupProfile,
    observer: Option<&dyn ProgressObserver>,
    cancel: Option<&CancellationToken>,
) -> Result<BackupReport> {
    BackupEngine::new(profile)
        .with_observer(observer)
        .with_cancellation(cancel)
        .run()
}

enum OperationOutcome {
    Copied(u64),
    SkippedDuplicate,
}

/// Destination state shared by the workers of one copy phase
struct DestinationTable {
    locks: DestinationLocks,
    /// Present in a dry run
    planned: Option<PlannedWrites>,
}

impl DestinationTable {
    fn new(dry_run: bool) -> Self {
        Self {
            locks: DestinationLocks::new(),
            planned: dry_run.then(PlannedWrites::new),
        }
    }

    fn view(&self) -> &dyn DestinationView {
        match &self.planned {
            Some(planned) => planned,
            None => &LiveDestination,
        }
    }
}

/// Configured backup run
pub struct BackupEngine<'a> {
    profile: &'a BackupProfile,
    observer: Option<&'a dyn ProgressObserver>,
    cancel: Option<&'a CancellationToken>,
    hook: Option<&'a dyn OperationHook>,
    progress_gate: Mutex<()>,
}

impl<'a> BackupEngine<'a> {
    pub fn new(profile: &'a BackupProfile) -> Self {
        Self {
            profile,
            observer: None,
            cancel: None,
            hook: None,
            progress_gate: Mutex::new(()),
        }
    }

    pub fn with_observer(mut self, observer: Option<&'a dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, cancel: Option<&'a CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_hook(mut self, hook: &'a dyn OperationHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn run(&self) -> Result<BackupReport> {
        self.profile.validate()?;

        let started = Instant::now();
        let profile = self.profile;
        let mut report = BackupReport::new();

        info!(
            "Starting backup job '{}' ({} source roots -> {})",
            profile.job_name,
            profile.source_roots.len(),
            profile.output_root.display()
        );
        if profile.dry_run {
            info!("Dry run: no destination file will be created or modified");
        }
        self.emit(report.snapshot(EnginePhase::Initialize, "Starting scan"));

        if !profile.dry_run {
            std::fs::create_dir_all(&profile.output_root)?;
        }

        let records = match index_sources(profile, &mut report, self.cancel) {
            Ok(records) => records,
            Err(BackupError::Cancelled) => return Ok(self.finish(report, started)),
            Err(e) => return Err(e),
        };
        info!(
            "Indexed {} files ({} errors recorded)",
            report.files_scanned,
            report.errors.len()
        );
        self.emit(report.snapshot(
            EnginePhase::Index,
            format!("Indexed {} files", report.files_scanned),
        ));

        let index = DuplicateIndex::build(&profile.output_root)?;
        debug!("Destination snapshot holds {} files", index.len());

        let mut operations = Vec::with_capacity(records.len());
        for record in records {
            if self.is_cancelled() {
                return Ok(self.finish(report, started));
            }
            operations.push(build_copy_operation(profile, record, &index));
        }

        self.emit(report.snapshot(
            EnginePhase::Copy,
            format!("Copying {} files", operations.len()),
        ));

        let shared = SharedReport::new(report);
        self.copy_all(operations, &shared)?;

        Ok(self.finish(shared.into_inner(), started))
    }

    fn copy_all(&self, operations: Vec<CopyOperation>, shared: &SharedReport) -> Result<()> {
        let workers = self.profile.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("mergevault-copy-{}", i))
            .build()
            .map_err(|e| BackupError::Parallel(e.to_string()))?;

        info!(
            "Copying {} operations with {} workers",
            operations.len(),
            workers
        );

        let table = DestinationTable::new(self.profile.dry_run);
        let (tx, rx) = bounded::<CopyOperation>(workers.max(16));

        thread::scope(|scope| {
            scope.spawn(move || {
                for operation in operations {
                    if tx.send(operation).is_err() {
                        break;
                    }
                }
            });

            pool.install(|| {
                rx.into_iter()
                    .par_bridge()
                    .for_each(|operation| self.process(&operation, &table, shared));
            });
        });

        Ok(())
    }

    /// Run one operation and account for it
    fn process(&self, operation: &CopyOperation, table: &DestinationTable, shared: &SharedReport) {
        if self.is_cancelled() {
            return;
        }
        if let Some(hook) = self.hook {
            hook.on_start(operation);
        }

        let source = &operation.record.source_path;
        match self.copy_operation(operation, table) {
            Ok(OperationOutcome::Copied(bytes)) => shared.add_copied(bytes),
            Ok(OperationOutcome::SkippedDuplicate) => {
                debug!("Duplicate skipped: {}", source.display());
                shared.add_skipped_duplicate();
            }
            Err(e) => {
                warn!(
                    "Copy failed for {} [{}]: {}",
                    source.display(),
                    e.category(),
                    e
                );
                shared.add_failed(format!("{} -> {}", source.display(), e));
            }
        }

        if let Some(hook) = self.hook {
            hook.on_finish(operation);
        }

        if self.observer.is_some() {
            // Snapshot and emission share one critical section so observers
            // see counters that never go backwards.
            let _gate = self
                .progress_gate
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.emit(shared.snapshot(EnginePhase::Copy, operation.record.file_name()));
        }
    }

    /// Primary destination first; a duplicate there ends the operation.
    /// Otherwise the photo mirror and quarantine targets are resolved and
    /// written independently of each other.
    fn copy_operation(
        &self,
        operation: &CopyOperation,
        table: &DestinationTable,
    ) -> Result<OperationOutcome> {
        let policy = self.profile.duplicate_handling;
        let source = &operation.record.source_path;

        {
            let _lock = table.locks.acquire(&operation.primary_destination);
            let resolution = resolve_destination(
                policy,
                source,
                &operation.primary_destination,
                operation.likely_duplicate,
                table.view(),
            )?;
            let Some(target) = resolution.target() else {
                return Ok(OperationOutcome::SkippedDuplicate);
            };
            if let Resolution::UseRenamed(renamed) = &resolution {
                debug!(
                    "{} is taken, writing {}",
                    operation.primary_destination.display(),
                    renamed.display()
                );
            }
            self.write_target(operation, target, table, self.profile.verify_copied_files)?;
        }

        for destination in operation.fan_out_destinations() {
            let _lock = table.locks.acquire(destination);
            let resolution =
                resolve_destination(policy, source, destination, false, table.view())?;
            let Some(target) = resolution.target() else {
                debug!("Already present: {}", destination.display());
                continue;
            };
            self.write_target(operation, target, table, false)?;
        }

        Ok(OperationOutcome::Copied(operation.record.size))
    }

    /// Copy the source to `target`, or only record the write in a dry run.
    /// Nothing appears at `target` unless every step succeeded.
    fn write_target(
        &self,
        operation: &CopyOperation,
        target: &Path,
        table: &DestinationTable,
        verify: bool,
    ) -> Result<()> {
        let profile = self.profile;
        let source = &operation.record.source_path;

        if let Some(planned) = &table.planned {
            planned.record(target, source);
            return Ok(());
        }

        let staged = stage_copy(source, target)?;
        if let Some(hook) = self.hook {
            hook.on_staged(operation, staged.path());
        }
        if profile.preserve_timestamps {
            staged.preserve_timestamps(source)?;
        }
        if verify {
            staged.verify(source, profile.hash_check_on_timestamp_mismatch)?;
        }
        staged.commit()?;
        Ok(())
    }

    fn finish(&self, mut report: BackupReport, started: Instant) -> BackupReport {
        report.duration = started.elapsed();
        report.cancelled = self.is_cancelled();

        let message = if report.cancelled {
            "Backup cancelled"
        } else {
            "Backup complete"
        };
        info!("{}: {} in {:?}", message, report, report.duration);
        self.emit(report.snapshot(EnginePhase::Complete, message));
        report
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.map(CancellationToken::is_cancelled).unwrap_or(false)
    }

    fn emit(&self, snapshot: ProgressSnapshot) {
        if let Some(observer) = self.observer {
            observer.on_progress(&snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn profile(source: &Path, output: &Path) -> BackupProfile {
        BackupProfile {
            source_roots: vec![source.to_path_buf()],
            output_root: output.to_path_buf(),
            max_parallel_copies: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_profile_fails_before_io() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out");
        let empty = BackupProfile {
            output_root: output.clone(),
            ..Default::default()
        };

        let result = run(&empty, None, None);
        assert!(matches!(result, Err(BackupError::Config(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_phases_in_order() {
        crate::logging::init_test_logging();
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("a.txt"), b"a").unwrap();
        std::fs::write(source.join("b.txt"), b"b").unwrap();

        let phases = Mutex::new(Vec::new());
        let observer = |s: &ProgressSnapshot| phases.lock().unwrap().push(s.phase);

        let report = run(&profile(&source, &dir.path().join("out")), Some(&observer), None).unwrap();
        assert_eq!(report.files_copied, 2);

        let phases = phases.into_inner().unwrap();
        assert_eq!(
            phases,
            vec![
                EnginePhase::Initialize,
                EnginePhase::Index,
                EnginePhase::Copy,
                EnginePhase::Copy,
                EnginePhase::Copy,
                EnginePhase::Complete,
            ]
        );
    }

    #[test]
    fn test_fan_out_writes_every_destination() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("pc");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("setup.exe"), b"MZ").unwrap();

        let report = run(&profile(&source, &output), None, None).unwrap();
        assert_eq!(report.files_copied, 1);
        assert_eq!(report.bytes_copied, 2);
        assert!(output.join("Merged-By-Project/pc/setup.exe").is_file());
        assert!(output.join("Quarantine/Software/setup.exe").is_file());
    }

    #[test]
    fn test_fan_out_continues_past_skipped_mirror() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("cam");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("IMG_1.jpg"), b"jpeg").unwrap();

        let mut job = profile(&source, &output);
        job.preserve_working_directory_pattern = false;
        run(&job, None, None).unwrap();

        // Remove only the primary copy; the mirror copy stays behind
        std::fs::remove_file(output.join("Merged-By-Project/IMG_1.jpg")).unwrap();
        let report = run(&job, None, None).unwrap();

        assert_eq!(report.files_copied, 1);
        assert!(output.join("Merged-By-Project/IMG_1.jpg").is_file());
        let mirrored: Vec<PathBuf> = walkdir::WalkDir::new(output.join("Photo-Database"))
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        assert_eq!(mirrored.len(), 1);
    }

    #[test]
    fn test_per_file_failure_does_not_abort_run() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        let output = dir.path().join("out");
        std::fs::create_dir_all(source.join("sub")).unwrap();
        std::fs::write(source.join("good.txt"), b"good").unwrap();
        std::fs::write(source.join("sub/blocked.txt"), b"bad").unwrap();

        // A plain file where the destination directory should be
        std::fs::create_dir_all(output.join("Merged-By-Project")).unwrap();
        std::fs::write(output.join("Merged-By-Project/sub"), b"squatter").unwrap();

        let mut job = profile(&source, &output);
        job.preserve_working_directory_pattern = false;

        let report = run(&job, None, None).unwrap();
        assert_eq!(report.files_copied, 1);
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("blocked.txt ->"));
        assert!(report.has_failures());
    }
}
