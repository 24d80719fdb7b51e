//! Backup records and the per-platform manifest

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use deploy_fs::NormalizedPath;
use deploy_meta::Platform;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Layout version written into every record.
pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// Metadata for one immutable backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub platform: Platform,
    /// Root the files were backed up from
    pub source_path: PathBuf,
    /// A directory of copies, or a single archive file
    pub backup_path: PathBuf,
    /// Artifact checksum for archives, combined per-file checksum for copies
    pub checksum: String,
    /// Backed-up files, relative to `source_path`
    pub files: Vec<String>,
    /// Paths covered by the backup that did not exist when it was taken
    #[serde(default)]
    pub created_paths: Vec<String>,
    pub compressed: bool,
    pub encrypted: bool,
    /// Artifact size in bytes
    pub size: u64,
    pub version: String,
}

impl BackupRecord {
    /// Whether the artifact is a single archive file rather than copies.
    pub fn is_archive(&self) -> bool {
        self.compressed || self.encrypted
    }

    /// Whether restoring this record accounts for `relative`.
    pub fn covers(&self, relative: &str) -> bool {
        self.files.iter().chain(&self.created_paths).any(|p| p == relative)
    }
}

/// All records for one platform, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupManifest {
    #[serde(default)]
    pub backups: Vec<BackupRecord>,
}

impl BackupManifest {
    /// Load a manifest, or an empty one when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = deploy_fs::io::read_bytes(&NormalizedPath::new(path))?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Persist atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_vec_pretty(self)?;
        content.push(b'\n');
        deploy_fs::io::write_atomic(&NormalizedPath::new(path), &content)?;
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<&BackupRecord> {
        self.backups.iter().find(|r| r.id == id)
    }

    /// The newest record; on equal timestamps the later-appended one.
    pub fn latest(&self) -> Option<&BackupRecord> {
        self.backups.iter().max_by_key(|r| r.timestamp)
    }

    /// Remove and return the oldest records beyond `keep`.
    ///
    /// Ordering is by timestamp, ties broken by creation order.
    pub fn evict_beyond(&mut self, keep: usize) -> Vec<BackupRecord> {
        if self.backups.len() <= keep {
            return Vec::new();
        }
        let mut order: Vec<usize> = (0..self.backups.len()).collect();
        order.sort_by_key(|&i| self.backups[i].timestamp);
        let doomed: Vec<usize> = order[..self.backups.len() - keep].to_vec();

        let mut evicted = Vec::new();
        let mut kept = Vec::new();
        for (i, record) in std::mem::take(&mut self.backups).into_iter().enumerate() {
            if doomed.contains(&i) {
                evicted.push(record);
            } else {
                kept.push(record);
            }
        }
        self.backups = kept;
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn record(id: &str, timestamp: DateTime<Utc>) -> BackupRecord {
        BackupRecord {
            id: id.into(),
            timestamp,
            platform: Platform::VsCode,
            source_path: "/w".into(),
            backup_path: format!("/b/vscode/{id}").into(),
            checksum: "sha256:00".into(),
            files: vec![".vscode/settings.json".into()],
            created_paths: vec![".vscode/tasks.json".into()],
            compressed: false,
            encrypted: false,
            size: 2,
            version: BACKUP_FORMAT_VERSION.into(),
        }
    }

    #[test]
    fn eviction_removes_oldest_first() {
        let now = Utc::now();
        let mut manifest = BackupManifest {
            backups: vec![
                record("b", now - Duration::seconds(1)),
                record("a", now - Duration::seconds(5)),
                record("c", now),
            ],
        };
        let evicted = manifest.evict_beyond(2);
        assert_eq!(evicted.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(
            manifest.backups.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["b", "c"]
        );
    }

    #[test]
    fn ties_evict_in_creation_order() {
        let now = Utc::now();
        let mut manifest = BackupManifest {
            backups: vec![record("first", now), record("second", now), record("third", now)],
        };
        manifest.evict_beyond(1);
        assert_eq!(manifest.backups[0].id, "third");
        assert_eq!(manifest.latest().unwrap().id, "third");
    }

    #[test]
    fn manifest_round_trips_in_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vscode").join("manifest.json");
        let manifest = BackupManifest {
            backups: vec![record("x", Utc::now())],
        };
        manifest.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"backupPath\""));
        assert!(raw.contains("\"createdPaths\""));
        assert_eq!(BackupManifest::load(&path).unwrap(), manifest);
        assert!(manifest.find("x").unwrap().covers(".vscode/tasks.json"));
    }

    #[test]
    fn missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = BackupManifest::load(&dir.path().join("manifest.json")).unwrap();
        assert!(manifest.backups.is_empty());
    }
}
