/*!
 * Progress reporting for backup runs
 *
 * The engine hands point-in-time [`ProgressSnapshot`]s to whatever
 * [`ProgressObserver`] the caller supplied:
 * - at phase boundaries (Initialize, Index, Copy, Complete)
 * - after every finished copy operation, successful or not
 *
 * Observers are called on worker threads and must return quickly. The
 * channel-backed [`ProgressPublisher`] never blocks: when its buffer is full
 * the snapshot is dropped.
 */

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::fmt;

/// Engine phase a snapshot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnginePhase {
    Initialize,
    Index,
    Copy,
    Complete,
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnginePhase::Initialize => write!(f, "Initialize"),
            EnginePhase::Index => write!(f, "Index"),
            EnginePhase::Copy => write!(f, "Copy"),
            EnginePhase::Complete => write!(f, "Complete"),
        }
    }
}

/// Immutable view of the run counters at one moment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub phase: EnginePhase,
    pub scanned_files: u64,
    pub copied_files: u64,
    pub skipped_duplicates: u64,
    pub failed_files: u64,
    pub message: String,
}

impl ProgressSnapshot {
    /// Operations finished so far, whatever their outcome
    pub fn completed(&self) -> u64 {
        self.copied_files + self.skipped_duplicates + self.failed_files
    }
}

/// Sink for progress snapshots
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressSnapshot) + Send + Sync,
{
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self(snapshot)
    }
}

/// Progress publisher - forwards snapshots to a subscriber over a channel
#[derive(Clone)]
pub struct ProgressPublisher {
    sender: Sender<ProgressSnapshot>,
}

impl ProgressPublisher {
    /// Create a publisher whose channel buffers `buffer_size` snapshots
    pub fn new(buffer_size: usize) -> (Self, ProgressSubscriber) {
        let (sender, receiver) = bounded(buffer_size);
        (
            ProgressPublisher { sender },
            ProgressSubscriber { receiver },
        )
    }

    /// Publish a snapshot without waiting
    pub fn publish(&self, snapshot: ProgressSnapshot) {
        match self.sender.try_send(snapshot) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Progress subscriber lagging, snapshot dropped");
            }
        }
    }
}

impl ProgressObserver for ProgressPublisher {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.publish(snapshot.clone());
    }
}

/// Progress subscriber - receives snapshots
pub struct ProgressSubscriber {
    receiver: Receiver<ProgressSnapshot>,
}

impl ProgressSubscriber {
    /// Receive a snapshot (blocking until one arrives or every publisher is gone)
    pub fn recv(&self) -> Option<ProgressSnapshot> {
        self.receiver.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn snapshot(phase: EnginePhase, copied: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            phase,
            scanned_files: 10,
            copied_files: copied,
            skipped_duplicates: 1,
            failed_files: 0,
            message: String::new(),
        }
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(EnginePhase::Initialize.to_string(), "Initialize");
        assert_eq!(EnginePhase::Complete.to_string(), "Complete");
    }

    #[test]
    fn test_publisher_subscriber() {
        let (publisher, subscriber) = ProgressPublisher::new(10);
        publisher.on_progress(&snapshot(EnginePhase::Copy, 4));
        drop(publisher);

        let received = subscriber.recv().unwrap();
        assert_eq!(received.phase, EnginePhase::Copy);
        assert_eq!(received.completed(), 5);
        assert!(subscriber.recv().is_none());
    }

    #[test]
    fn test_full_channel_does_not_block() {
        let (publisher, subscriber) = ProgressPublisher::new(1);
        publisher.publish(snapshot(EnginePhase::Copy, 1));
        publisher.publish(snapshot(EnginePhase::Copy, 2));
        drop(publisher);

        let mut events = Vec::new();
        while let Some(event) = subscriber.recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].copied_files, 1);
    }

    #[test]
    fn test_publish_after_subscriber_dropped() {
        let (publisher, subscriber) = ProgressPublisher::new(4);
        drop(subscriber);
        publisher.publish(snapshot(EnginePhase::Index, 0));
    }

    #[test]
    fn test_closure_observer() {
        let seen = Mutex::new(Vec::new());
        let observer = |s: &ProgressSnapshot| seen.lock().unwrap().push(s.phase);

        observer.on_progress(&snapshot(EnginePhase::Initialize, 0));
        observer.on_progress(&snapshot(EnginePhase::Complete, 0));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EnginePhase::Initialize, EnginePhase::Complete]
        );
    }
}
