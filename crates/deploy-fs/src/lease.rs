//! Advisory lease guarding a deployment target root
//!
//! A lease is a lock file holding a small JSON record. The holder keeps an
//! exclusive `fs2` lock on the file for the lifetime of its [`LeaseGuard`];
//! dropping the guard clears the record and releases the lock. A record left
//! behind by a holder that died without cleanup blocks new sessions until it
//! is older than the staleness timeout.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The record stored inside a lease file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseRecord {
    /// Session holding the lease
    pub session_id: String,
    /// Process id of the holder
    pub pid: u32,
    /// When the lease was taken
    pub acquired_at: DateTime<Utc>,
}

impl LeaseRecord {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    /// Whether the record is older than `stale_after`.
    pub fn is_stale(&self, stale_after: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.acquired_at);
        age.to_std().map(|age| age > stale_after).unwrap_or(false)
    }
}

/// Entry point for acquiring and inspecting leases.
pub struct Lease;

impl Lease {
    /// Try to take the lease at `path` for `session_id` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LeaseHeld`] when another session holds the lock, or
    /// when a non-stale record from a vanished holder is still present.
    pub fn acquire(path: &Path, session_id: &str, stale_after: Duration) -> Result<LeaseGuard> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        if file.try_lock_exclusive().is_err() {
            let holder = Self::inspect(path)
                .ok()
                .flatten()
                .map(|record| record.session_id)
                .unwrap_or_else(|| "unknown".to_string());
            tracing::debug!(path = %path.display(), %holder, "Lease busy");
            return Err(Error::LeaseHeld {
                path: path.to_path_buf(),
                holder,
            });
        }

        match read_record(&file, path) {
            Ok(Some(existing)) if !existing.is_stale(stale_after) => {
                let _ = file.unlock();
                return Err(Error::LeaseHeld {
                    path: path.to_path_buf(),
                    holder: existing.session_id,
                });
            }
            Ok(Some(existing)) => tracing::warn!(
                path = %path.display(),
                holder = %existing.session_id,
                "Taking over stale deployment lease"
            ),
            Ok(None) => {}
            // The OS lock is ours, so nobody is writing this record.
            Err(Error::LeaseCorrupt { message, .. }) => tracing::warn!(
                path = %path.display(),
                error = %message,
                "Taking over unreadable deployment lease"
            ),
            Err(e) => {
                let _ = file.unlock();
                return Err(e);
            }
        }

        let record = LeaseRecord::new(session_id);
        write_record(&file, path, Some(&record))?;

        Ok(LeaseGuard {
            file,
            path: path.to_path_buf(),
            record,
        })
    }

    /// Read the current lease record without taking the lease.
    pub fn inspect(path: &Path) -> Result<Option<LeaseRecord>> {
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        read_record(&file, path)
    }
}

/// Proof of lease ownership. Releases the lease on drop.
#[derive(Debug)]
pub struct LeaseGuard {
    file: File,
    path: PathBuf,
    record: LeaseRecord,
}

impl LeaseGuard {
    /// The record written for this holder.
    pub fn record(&self) -> &LeaseRecord {
        &self.record
    }

    /// The lease file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if let Err(e) = write_record(&self.file, &self.path, None) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to clear lease record");
        }
        let _ = self.file.unlock();
    }
}

/// Blocking exclusive lock on a sidecar file, released on drop.
///
/// Serializes read-modify-write cycles on shared state files such as backup
/// manifests. Unlike a [`Lease`] it waits for the current holder and stores
/// nothing in the file.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Wait for an exclusive lock on `path`, creating the file if needed.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        file.lock_exclusive().map_err(|e| {
            tracing::debug!(path = %path.display(), error = %e, "Exclusive lock failed");
            Error::LockFailed {
                path: path.to_path_buf(),
            }
        })?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn read_record(mut file: &File, path: &Path) -> Result<Option<LeaseRecord>> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0))
        .map_err(|e| Error::io(path, e))?;
    file.read_to_string(&mut content)
        .map_err(|e| Error::io(path, e))?;

    if content.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| Error::LeaseCorrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn write_record(mut file: &File, path: &Path, record: Option<&LeaseRecord>) -> Result<()> {
    file.set_len(0).map_err(|e| Error::io(path, e))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| Error::io(path, e))?;
    if let Some(record) = record {
        let content = serde_json::to_vec(record).map_err(|e| Error::LeaseCorrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.write_all(&content).map_err(|e| Error::io(path, e))?;
    }
    file.sync_all().map_err(|e| Error::io(path, e))
}
