//! Undelivered-report journal.
//!
//! Reports whose delivery exhausted every retry are appended here, one JSON
//! object per line, so they can be replayed later (`subnet-agent resubmit`).
//! The stored report is the signed payload, so a replay is byte-identical to
//! the original attempt.
//!
//! Clones share one lock. Each entry is written with a single `write_all`
//! while holding it, so concurrent appends never interleave within a line.
//!
//! # Entry Format
//!
//! - `ts`: RFC3339 time the delivery was given up
//! - `host`: machine that gave up
//! - `reason`: last error
//! - `report`: the signed execution report

use crate::error::{AgentError, Result};
use crate::fs::atomic_write;
use crate::protocol::SignedExecutionReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: DateTime<Utc>,
    pub host: String,
    pub reason: String,
    pub report: SignedExecutionReport,
}

impl JournalEntry {
    pub fn new(report: SignedExecutionReport, reason: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            host: host_name(),
            reason: reason.into(),
            report,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndeliveredJournal {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl UndeliveredJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and sync it to disk.
    pub fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| AgentError::Io(format!("failed to serialize journal entry: {}", e)))?;
        line.push('\n');

        let _guard = self.guard();

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                AgentError::Io(format!(
                    "failed to create journal directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error("open", e))?;
        file.write_all(line.as_bytes()).map_err(|e| self.io_error("write", e))?;
        file.sync_all().map_err(|e| self.io_error("sync", e))?;
        Ok(())
    }

    /// All entries, oldest first. A missing journal is empty.
    pub fn read(&self) -> Result<Vec<JournalEntry>> {
        let content = {
            let _guard = self.guard();
            fs::read_to_string(&self.path)
        };
        let content = match content {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error("read", e)),
        };

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| {
                    AgentError::Io(format!(
                        "malformed journal entry at {}:{}: {}",
                        self.path.display(),
                        n + 1,
                        e
                    ))
                })
            })
            .collect()
    }

    /// Replace the journal with `entries`. An empty list removes the file.
    pub fn rewrite(&self, entries: &[JournalEntry]) -> Result<()> {
        let _guard = self.guard();
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.io_error("remove", e)),
            };
        }

        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                AgentError::Io(format!("failed to serialize journal entry: {}", e))
            })?;
            content.push_str(&line);
            content.push('\n');
        }
        atomic_write(&self.path, content.as_bytes())
    }

    /// Run a journal operation on the blocking thread pool.
    pub async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&UndeliveredJournal) -> Result<T> + Send + 'static,
    {
        let journal = self.clone();
        tokio::task::spawn_blocking(move || op(&journal))
            .await
            .map_err(|e| AgentError::Io(format!("journal task failed: {}", e)))?
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded data is (); a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn io_error(&self, action: &str, e: std::io::Error) -> AgentError {
        AgentError::Io(format!(
            "failed to {} journal '{}': {}",
            action,
            self.path.display(),
            e
        ))
    }
}

fn host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
