/*!
 * MergeVault - multi-source merge backup
 *
 * Copies any number of source trees into one destination with:
 * - A merged primary tree that keeps each root's layout
 * - An optional year/month mirror for photos
 * - An optional quarantine tree for installers
 * - Duplicate handling by size and name, by SHA-256 content or by renaming
 * - Post-copy verification
 * - Bounded parallel copying with cooperative cancellation
 */

pub mod cli_progress;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{BackupProfile, DuplicateHandling, LogLevel, SecurityProfile};
pub use crate::core::{
    run, BackupEngine, BackupReport, CancellationToken, CopyOperation, EnginePhase, FileRecord,
    OperationHook, ProgressObserver, ProgressPublisher, ProgressSnapshot,
};
pub use error::{BackupError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
