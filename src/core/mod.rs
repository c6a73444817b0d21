/*!
 * Core backup engine: indexing, planning, duplicate resolution and the
 * bounded parallel copy pipeline
 */

pub mod cancel;
pub mod category;
pub mod checksum;
pub mod concurrency;
pub mod dest_index;
pub mod engine;
pub mod indexer;
pub mod plan;
pub mod progress;
pub mod record;
pub mod report;
pub mod resolve;
pub mod transfer;
pub mod walker;

pub use cancel::CancellationToken;
pub use engine::{run, BackupEngine, OperationHook};
pub use progress::{EnginePhase, ProgressObserver, ProgressPublisher, ProgressSnapshot};
pub use record::{CopyOperation, FileRecord};
pub use report::BackupReport;
