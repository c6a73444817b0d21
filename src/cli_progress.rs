/*!
 * CLI progress renderer for interactive terminal display
 *
 * Consumes progress snapshots from a [`ProgressSubscriber`] on a background
 * thread and draws a single progress bar. Rendering stops once every
 * publisher has been dropped.
 */

use crate::core::progress::{EnginePhase, ProgressSnapshot, ProgressSubscriber};
use indicatif::{ProgressBar, ProgressStyle};
use std::thread;

/// CLI progress renderer
pub struct CliProgressRenderer {
    subscriber: ProgressSubscriber,
    verbose: bool,
    bar: Option<ProgressBar>,
}

impl CliProgressRenderer {
    pub fn new(subscriber: ProgressSubscriber, verbose: bool) -> Self {
        Self {
            subscriber,
            verbose,
            bar: None,
        }
    }

    /// Run the renderer in the current thread
    pub fn run(mut self) {
        while let Some(snapshot) = self.subscriber.recv() {
            self.handle_snapshot(&snapshot);
        }
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    /// Spawn the renderer in a background thread
    pub fn spawn(self) -> thread::JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    fn handle_snapshot(&mut self, snapshot: &ProgressSnapshot) {
        match snapshot.phase {
            EnginePhase::Initialize => {
                eprintln!("Scanning sources...");
            }
            EnginePhase::Index => {
                eprintln!("{}", snapshot.message);
            }
            EnginePhase::Copy => {
                let bar = self
                    .bar
                    .get_or_insert_with(|| copy_bar(snapshot.scanned_files));
                bar.set_position(snapshot.completed());
                bar.set_message(format!(
                    "copied {}, duplicates {}, failed {}",
                    snapshot.copied_files, snapshot.skipped_duplicates, snapshot.failed_files
                ));
                if self.verbose && snapshot.completed() > 0 {
                    bar.println(format!("  {}", snapshot.message));
                }
            }
            EnginePhase::Complete => {
                if let Some(bar) = self.bar.take() {
                    bar.set_position(snapshot.completed());
                    bar.finish_with_message(snapshot.message.clone());
                }
            }
        }
    }
}

fn copy_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg} ({eta})")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::ProgressPublisher;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1_048_576), "1.00 MB");
        assert_eq!(format_bytes(1_073_741_824), "1.00 GB");
    }

    #[test]
    fn test_renderer_stops_when_publisher_dropped() {
        let (publisher, subscriber) = ProgressPublisher::new(16);
        let handle = CliProgressRenderer::new(subscriber, false).spawn();

        for (phase, copied) in [
            (EnginePhase::Initialize, 0),
            (EnginePhase::Index, 0),
            (EnginePhase::Copy, 1),
            (EnginePhase::Complete, 1),
        ] {
            publisher.publish(ProgressSnapshot {
                phase,
                scanned_files: 1,
                copied_files: copied,
                skipped_duplicates: 0,
                failed_files: 0,
                message: "x".to_string(),
            });
        }
        drop(publisher);

        handle.join().unwrap();
    }
}
