/*!
 * Fault-tolerant tree enumeration
 *
 * Directories are visited from an explicit work stack rather than by
 * recursion, so deeply nested user trees cannot exhaust the call stack.
 * Sibling visitation order is unspecified.
 */

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{trace, warn};

use super::cancel::CancellationToken;
use crate::error::{BackupError, Result};

/// A regular file yielded by the walker
#[derive(Debug)]
pub struct WalkedFile {
    pub path: PathBuf,
    pub metadata: Metadata,
}

/// Explicit-stack directory walker
pub struct TreeWalker<'a> {
    continue_on_fault: bool,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> TreeWalker<'a> {
    /// Create a walker. With `continue_on_fault` an unreadable directory is
    /// recorded and skipped; without it the whole walk fails.
    pub fn new(continue_on_fault: bool) -> Self {
        Self {
            continue_on_fault,
            cancel: None,
        }
    }

    /// Check `token` on every iteration
    pub fn with_cancellation(mut self, token: Option<&'a CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Walk `root`, calling `on_file` for every regular file found.
    ///
    /// Recorded faults are appended to `errors`. Symbolic links are neither
    /// followed nor yielded.
    pub fn walk<F>(&self, root: &Path, errors: &mut Vec<String>, mut on_file: F) -> Result<()>
    where
        F: FnMut(WalkedFile),
    {
        let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

        while let Some(current) = pending.pop() {
            if let Some(token) = self.cancel {
                token.check()?;
            }

            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(e) => {
                    self.fault(
                        &current,
                        e,
                        "Skipping directory due to access issue",
                        errors,
                    )?;
                    continue;
                }
            };

            // Subdirectories are queued as they are seen and files reported
            // straight away, so a listing that breaks off part-way keeps
            // whatever it already produced.
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        self.fault(
                            &current,
                            e,
                            "Skipping remaining entries due to access issue",
                            errors,
                        )?;
                        break;
                    }
                };

                let path = entry.path();
                let file_type = match entry.file_type() {
                    Ok(file_type) => file_type,
                    Err(e) => {
                        self.fault(&path, e, "Skipping unreadable entry", errors)?;
                        continue;
                    }
                };

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    match entry.metadata() {
                        Ok(metadata) => on_file(WalkedFile { path, metadata }),
                        Err(e) => {
                            self.fault(&path, e, "Skipping file due to access issue", errors)?;
                        }
                    }
                } else {
                    trace!("Not a regular file, skipping: {}", path.display());
                }
            }
        }

        Ok(())
    }

    fn fault(
        &self,
        path: &Path,
        err: io::Error,
        what: &str,
        errors: &mut Vec<String>,
    ) -> Result<()> {
        if !self.continue_on_fault {
            return Err(BackupError::Enumeration {
                path: path.to_path_buf(),
                source: err,
            });
        }

        let message = format!("{}: {} ({})", what, path.display(), err);
        warn!("{}", message);
        errors.push(message);
        Ok(())
    }
}
