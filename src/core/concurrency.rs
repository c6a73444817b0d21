/*!
 * Per-destination path locks
 *
 * Two copy operations may compute the same destination path (for example
 * two photos with the same name and month in the date mirror). Holding a
 * lock on the path across resolution and copy makes the second operation
 * see the first one's file on disk and resolve against it, instead of
 * both writing the same path.
 *
 * A dry run writes nothing, so it records each decided write in
 * [`PlannedWrites`] and later operations resolve against those records.
 */

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use super::resolve::DestinationView;
use crate::error::Result;

/// Table of destination paths currently being written
#[derive(Clone, Default)]
pub struct DestinationLocks {
    state: Arc<LockTable>,
}

#[derive(Default)]
struct LockTable {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

impl LockTable {
    fn held(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DestinationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `path` (blocks while another operation holds it)
    pub fn acquire(&self, path: &Path) -> PathLock {
        let mut held = self.state.held();

        while held.contains(path) {
            held = self
                .state
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }

        held.insert(path.to_path_buf());

        PathLock {
            state: self.state.clone(),
            path: path.to_path_buf(),
        }
    }
}

/// Exclusive claim on one destination path, released on drop
pub struct PathLock {
    state: Arc<LockTable>,
    path: PathBuf,
}

impl Drop for PathLock {
    fn drop(&mut self) {
        let mut held = self.state.held();
        held.remove(&self.path);
        self.state.released.notify_all();
    }
}

/// Destinations a dry run would have written, each mapped to the source
/// that would fill it
#[derive(Default)]
pub struct PlannedWrites {
    planned: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl PlannedWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `destination` would now hold a copy of `source`
    pub fn record(&self, destination: &Path, source: &Path) {
        self.planned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(destination.to_path_buf(), source.to_path_buf());
    }
}

impl DestinationView for PlannedWrites {
    fn occupant(&self, destination: &Path) -> Result<Option<PathBuf>> {
        if destination.try_exists()? {
            return Ok(Some(destination.to_path_buf()));
        }
        Ok(self
            .planned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(destination)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicateHandling;
    use crate::core::resolve::{resolve_destination, Resolution};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_waiter_runs_after_release() {
        let locks = DestinationLocks::new();
        let a = Path::new("/out/a.txt");
        let acquired = Arc::new(AtomicBool::new(false));

        let lock_a = locks.acquire(a);
        let waiter = {
            let locks = locks.clone();
            let acquired = acquired.clone();
            thread::spawn(move || {
                let _lock = locks.acquire(Path::new("/out/a.txt"));
                acquired.store(true, Ordering::SeqCst);
            })
        };

        // Other paths stay available while `a` is held
        drop(locks.acquire(Path::new("/out/b.txt")));
        thread::sleep(Duration::from_millis(20));
        assert!(!acquired.load(Ordering::SeqCst));

        drop(lock_a);
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        drop(locks.acquire(a));
    }

    #[test]
    fn test_same_path_is_serialized() {
        let locks = DestinationLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                thread::spawn(move || {
                    let _lock = locks.acquire(Path::new("/out/shared.jpg"));
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_planned_writes_occupy_destinations() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("one.txt");
        let same = dir.path().join("same.txt");
        let other = dir.path().join("other.txt");
        std::fs::write(&first, b"payload").unwrap();
        std::fs::write(&same, b"payload").unwrap();
        std::fs::write(&other, b"changed").unwrap();
        let dest = dir.path().join("out/x.txt");

        let planned = PlannedWrites::new();
        assert_eq!(planned.occupant(&dest).unwrap(), None);
        planned.record(&dest, &first);
        assert_eq!(planned.occupant(&dest).unwrap(), Some(first.clone()));
        assert_eq!(planned.occupant(&first).unwrap(), Some(first.clone()));

        let policy = DuplicateHandling::SkipOnlyWhenContentMatches;
        assert_eq!(
            resolve_destination(policy, &same, &dest, false, &planned).unwrap(),
            Resolution::Skip
        );

        let renamed = dir.path().join("out/x (1).txt");
        assert_eq!(
            resolve_destination(policy, &other, &dest, false, &planned).unwrap(),
            Resolution::UseRenamed(renamed.clone())
        );
        planned.record(&renamed, &other);
        let keep_both = DuplicateHandling::KeepBothWithRename;
        assert_eq!(
            resolve_destination(keep_both, &same, &dest, false, &planned).unwrap(),
            Resolution::UseRenamed(dir.path().join("out/x (2).txt"))
        );
    }
}
