//! The backup store: create, verify, restore and retention

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use deploy_fs::checksum::{
    compute_bytes_checksum, compute_file_checksum, compute_file_checksum_streaming,
    compute_manifest_checksum,
};
use deploy_fs::{DeployPath, FileLock, LocalFs, NormalizedPath, validate_path_identifier};
use deploy_meta::{ConflictStrategy, DeploymentOptions, Platform};
use serde::{Deserialize, Serialize};

use super::archive::{extract_archive, write_archive};
use super::crypto;
use super::record::{BACKUP_FORMAT_VERSION, BackupManifest, BackupRecord};
use crate::conflict::{ConflictResolver, ResolvedAction};
use crate::error::{Error, Result};
use crate::failure::{DeployError, ErrorContext, Operation};
use crate::retry::{FilesystemPolicy, RetryExecutor};

/// Files above this size are hashed with streaming reads when streaming is
/// enabled.
pub const STREAMING_THRESHOLD_BYTES: u64 = 8 * 1024 * 1024;

/// How a backup is taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupOptions {
    pub compress: bool,
    /// Encrypts the artifact when set
    pub encryption_key: Option<String>,
    /// Records kept per platform after this backup; 0 keeps everything
    pub max_backups: usize,
    pub large_file_streaming: bool,
}

impl BackupOptions {
    pub fn from_deployment(options: &DeploymentOptions) -> Self {
        Self {
            compress: options.compress_backups,
            encryption_key: options.encryption_key.clone(),
            max_backups: options.max_backups,
            large_file_streaming: options.enable_large_file_streaming,
        }
    }
}

/// How a backup is restored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    pub conflict_strategy: ConflictStrategy,
    /// Report what would happen without writing
    pub dry_run: bool,
    /// Passphrase for encrypted backups
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub success: bool,
    pub restored_files: Vec<String>,
    pub skipped_files: Vec<String>,
    /// Paths created after the backup and removed by a rollback
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_files: Vec<String>,
    pub errors: Vec<DeployError>,
}

/// Manages backups under `<backup_dir>/<platform>/`.
///
/// Each platform directory holds a `manifest.json` listing its records in
/// creation order, plus one artifact per record: a directory of file copies,
/// or a `.tar`, `.tar.gz` or `.enc` archive.
#[derive(Clone)]
pub struct BackupStore {
    backup_dir: PathBuf,
    fs: FilesystemPolicy,
}

impl std::fmt::Debug for BackupStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupStore")
            .field("backup_dir", &self.backup_dir)
            .finish()
    }
}

impl BackupStore {
    pub fn new(backup_dir: impl Into<PathBuf>, fs: FilesystemPolicy) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            fs,
        }
    }

    /// A store on the local filesystem with the default retry policy.
    pub fn local(backup_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            backup_dir,
            FilesystemPolicy::new(Arc::new(LocalFs::new()), RetryExecutor::default()),
        )
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn platform_dir(&self, platform: Platform) -> PathBuf {
        self.backup_dir.join(platform.id())
    }

    fn manifest_path(&self, platform: Platform) -> PathBuf {
        self.platform_dir(platform).join(DeployPath::Manifest.as_str())
    }

    /// Held across every load-modify-save of a platform's manifest.
    fn lock_manifest(&self, platform: Platform) -> Result<FileLock> {
        let path = self
            .platform_dir(platform)
            .join(DeployPath::ManifestLock.as_str());
        Ok(FileLock::acquire(&path)?)
    }

    /// Back up `files` (relative to `root`) for `platform`.
    ///
    /// Paths that do not exist yet are recorded in `created_paths`. The
    /// record is persisted before retention runs, so the new backup is
    /// durable before any older one is evicted.
    pub fn create(
        &self,
        root: &Path,
        files: &[String],
        platform: Platform,
        options: &BackupOptions,
    ) -> Result<BackupRecord> {
        let root_path = NormalizedPath::new(root);
        let mut existing = Vec::new();
        let mut created_paths = Vec::new();
        for relative in files {
            let source = root_path.join_contained(relative)?;
            if self.fs.ops().exists(&source.to_native()) {
                existing.push(relative.clone());
            } else {
                created_paths.push(relative.clone());
            }
        }
        existing.sort();
        existing.dedup();
        created_paths.sort();
        created_paths.dedup();

        let timestamp = Utc::now();
        let id = format!(
            "{}-{}",
            timestamp.format("%Y%m%d-%H%M%S%3f"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let platform_dir = self.platform_dir(platform);
        self.fs
            .ops()
            .create_dir_all(&platform_dir)
            .map_err(Error::from)?;

        let archived = options.compress || options.encryption_key.is_some();
        let written = if archived {
            self.write_archive_artifact(root, &existing, &platform_dir, &id, options)
        } else {
            self.write_copy_artifact(root, &existing, &platform_dir.join(&id), options)
        };
        let (backup_path, checksum, size) = match written {
            Ok(artifact) => artifact,
            Err(e) => {
                discard_partial_artifact(&platform_dir, &id);
                return Err(e);
            }
        };

        let record = BackupRecord {
            id,
            timestamp,
            platform,
            source_path: root.to_path_buf(),
            backup_path,
            checksum,
            files: existing,
            created_paths,
            compressed: options.compress,
            encrypted: options.encryption_key.is_some(),
            size,
            version: BACKUP_FORMAT_VERSION.to_string(),
        };

        let _lock = self.lock_manifest(platform)?;
        let manifest_path = self.manifest_path(platform);
        let mut manifest = BackupManifest::load(&manifest_path)?;
        manifest.backups.push(record.clone());
        manifest.save(&manifest_path)?;
        tracing::info!(
            id = %record.id,
            platform = %platform,
            files = record.files.len(),
            created = record.created_paths.len(),
            compressed = record.compressed,
            encrypted = record.encrypted,
            "Backup created"
        );

        if options.max_backups > 0 {
            self.apply_retention(&mut manifest, &manifest_path, options.max_backups)?;
        }
        Ok(record)
    }

    fn write_copy_artifact(
        &self,
        root: &Path,
        files: &[String],
        dir: &Path,
        options: &BackupOptions,
    ) -> Result<(PathBuf, String, u64)> {
        self.fs.ops().create_dir_all(dir)?;
        let mut size = 0;
        let mut sums = Vec::with_capacity(files.len());
        for relative in files {
            let target = dir.join(relative);
            size += self
                .fs
                .copy(&root.join(relative), &target, Operation::Backup)?;
            sums.push((relative.as_str(), file_checksum(&target, options.large_file_streaming)?));
        }
        let checksum = compute_manifest_checksum(sums.iter().map(|(p, c)| (*p, c.as_str())));
        Ok((dir.to_path_buf(), checksum, size))
    }

    fn write_archive_artifact(
        &self,
        root: &Path,
        files: &[String],
        platform_dir: &Path,
        id: &str,
        options: &BackupOptions,
    ) -> Result<(PathBuf, String, u64)> {
        let mut bytes = Vec::new();
        write_archive(&mut bytes, root, files, options.compress)?;

        let mut name = format!("{id}.tar");
        if options.compress {
            name.push_str(".gz");
        }
        if let Some(key) = &options.encryption_key {
            bytes = crypto::encrypt(key, &bytes)?;
            name.push_str(".enc");
        }

        let path = platform_dir.join(name);
        self.fs.write(&path, &bytes, Operation::Backup)?;
        Ok((path, compute_bytes_checksum(&bytes), bytes.len() as u64))
    }

    /// Records for `platform`, oldest first.
    pub fn list(&self, platform: Platform) -> Result<Vec<BackupRecord>> {
        let mut records = BackupManifest::load(&self.manifest_path(platform))?.backups;
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    pub fn latest(&self, platform: Platform) -> Result<Option<BackupRecord>> {
        Ok(BackupManifest::load(&self.manifest_path(platform))?
            .latest()
            .cloned())
    }

    /// Look a record up by id across all platforms.
    pub fn get(&self, id: &str) -> Result<BackupRecord> {
        if validate_path_identifier(id, "Backup id").is_err() {
            return Err(Error::BackupNotFound { id: id.to_string() });
        }
        for platform in Platform::ALL {
            if let Some(record) = BackupManifest::load(&self.manifest_path(platform))?.find(id) {
                return Ok(record.clone());
            }
        }
        Err(Error::BackupNotFound { id: id.to_string() })
    }

    /// Remove a record and its artifact.
    pub fn delete(&self, id: &str) -> Result<()> {
        let record = self.get(id)?;
        let _lock = self.lock_manifest(record.platform)?;
        let manifest_path = self.manifest_path(record.platform);
        let mut manifest = BackupManifest::load(&manifest_path)?;
        let before = manifest.backups.len();
        manifest.backups.retain(|r| r.id != id);
        if manifest.backups.len() == before {
            return Err(Error::BackupNotFound { id: id.to_string() });
        }
        manifest.save(&manifest_path)?;
        self.remove_artifact(&record)?;
        tracing::info!(id, platform = %record.platform, "Backup deleted");
        Ok(())
    }

    /// Evict records beyond `keep`. The caller holds the manifest lock.
    fn apply_retention(
        &self,
        manifest: &mut BackupManifest,
        manifest_path: &Path,
        keep: usize,
    ) -> Result<Vec<BackupRecord>> {
        let evicted = manifest.evict_beyond(keep);
        if evicted.is_empty() {
            return Ok(evicted);
        }
        manifest.save(manifest_path)?;
        for record in &evicted {
            self.remove_artifact(record)?;
            tracing::debug!(id = %record.id, platform = %record.platform, "Evicted backup");
        }
        Ok(evicted)
    }

    fn remove_artifact(&self, record: &BackupRecord) -> Result<()> {
        let path = &record.backup_path;
        if path.is_dir() {
            fs::remove_dir_all(path).map_err(|e| deploy_fs::Error::io(path, e))?;
        } else if self.fs.ops().exists(path) {
            self.fs.remove(path, Operation::Backup)?;
        }
        Ok(())
    }

    /// Check that a record's artifact exists and matches its checksum.
    pub fn verify(&self, record: &BackupRecord) -> Result<()> {
        let path = &record.backup_path;
        if !self.fs.ops().exists(path) {
            return Err(Error::MissingArtifact {
                id: record.id.clone(),
                path: path.clone(),
            });
        }

        let actual = if record.is_archive() {
            compute_file_checksum_streaming(path).map_err(|e| deploy_fs::Error::io(path, e))?
        } else {
            let mut sums = Vec::with_capacity(record.files.len());
            for relative in &record.files {
                let copy = path.join(relative);
                if !self.fs.ops().exists(&copy) {
                    return Err(Error::MissingArtifact {
                        id: record.id.clone(),
                        path: copy,
                    });
                }
                sums.push((relative.as_str(), file_checksum(&copy, true)?));
            }
            compute_manifest_checksum(sums.iter().map(|(p, c)| (*p, c.as_str())))
        };

        if actual != record.checksum {
            return Err(Error::ChecksumMismatch {
                id: record.id.clone(),
                expected: record.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Restore backup `id` into `root`.
    ///
    /// The record is verified first. Each file is then placed according to
    /// `options.conflict_strategy`; `skip` leaves existing files untouched
    /// without reading or copying them. Per-file failures are collected in
    /// the report.
    pub fn restore(&self, id: &str, root: &Path, options: &RestoreOptions) -> Result<RestoreReport> {
        let record = self.get(id)?;
        self.verify(&record)?;
        let report = self.restore_record(&record, root, options)?;
        tracing::info!(
            id,
            restored = report.restored_files.len(),
            skipped = report.skipped_files.len(),
            dry_run = options.dry_run,
            "Backup restored"
        );
        Ok(report)
    }

    /// Put `root` back to the state `record` captured.
    ///
    /// Backed-up files are restored over whatever is there now, and paths
    /// the record marks as created are removed.
    pub fn rollback(
        &self,
        record: &BackupRecord,
        root: &Path,
        key: Option<&str>,
    ) -> Result<RestoreReport> {
        self.verify(record)?;
        let options = RestoreOptions {
            conflict_strategy: ConflictStrategy::Overwrite,
            dry_run: false,
            key: key.map(str::to_string),
        };
        let mut report = self.restore_record(record, root, &options)?;

        let root_path = NormalizedPath::new(root);
        for relative in &record.created_paths {
            let target = root_path.join_contained(relative)?.to_native();
            if !self.fs.ops().exists(&target) {
                continue;
            }
            match self.fs.remove(&target, Operation::Rollback) {
                Ok(()) => report.removed_files.push(relative.clone()),
                Err(e) => report.errors.push(e),
            }
        }
        report.success = report.errors.is_empty();
        tracing::warn!(
            id = %record.id,
            restored = report.restored_files.len(),
            removed = report.removed_files.len(),
            "Rolled back deployment"
        );
        Ok(report)
    }

    fn restore_record(
        &self,
        record: &BackupRecord,
        root: &Path,
        options: &RestoreOptions,
    ) -> Result<RestoreReport> {
        let root_path = NormalizedPath::new(root);
        let mut report = RestoreReport::default();

        if options.dry_run {
            for relative in &record.files {
                let target = root_path.join_contained(relative)?.to_native();
                let exists = self.fs.ops().exists(&target);
                match options.conflict_strategy {
                    ConflictStrategy::Skip | ConflictStrategy::Prompt if exists => {
                        report.skipped_files.push(relative.clone())
                    }
                    _ => report.restored_files.push(relative.clone()),
                }
            }
            report.success = true;
            return Ok(report);
        }

        let staging;
        let source_dir = if record.is_archive() {
            staging = Staging::create(&self.platform_dir(record.platform))?;
            self.unpack_into(record, options.key.as_deref(), staging.path())?;
            staging.path().to_path_buf()
        } else {
            record.backup_path.clone()
        };

        let resolver = ConflictResolver::new(self.fs.clone());
        for relative in &record.files {
            let target = root_path.join_contained(relative)?.to_native();
            let source = source_dir.join(relative);
            match self.restore_file(&resolver, &source, &target, relative, options.conflict_strategy)
            {
                Ok(true) => report.restored_files.push(relative.clone()),
                Ok(false) => report.skipped_files.push(relative.clone()),
                Err(e) => report.errors.push(e),
            }
        }
        report.success = report.errors.is_empty();
        Ok(report)
    }

    /// Returns whether the file was written.
    fn restore_file(
        &self,
        resolver: &ConflictResolver,
        source: &Path,
        target: &Path,
        relative: &str,
        strategy: ConflictStrategy,
    ) -> std::result::Result<bool, DeployError> {
        let exists = self.fs.ops().exists(target);
        match strategy {
            ConflictStrategy::Skip | ConflictStrategy::Prompt if exists => Ok(false),
            ConflictStrategy::Overwrite => {
                self.fs.copy(source, target, Operation::Restore)?;
                Ok(true)
            }
            _ if !exists => {
                self.fs.copy(source, target, Operation::Restore)?;
                Ok(true)
            }
            _ => {
                let content = self.fs.ops().read(source).map_err(|e| {
                    DeployError::from_fs(&e, &ErrorContext::new(Operation::Restore).with_path(source))
                })?;
                let resolution = resolver.resolve(target, relative, strategy, content)?;
                resolver.apply(&resolution, target)?;
                Ok(resolution.decision.resolved_action != ResolvedAction::Skip)
            }
        }
    }

    fn unpack_into(&self, record: &BackupRecord, key: Option<&str>, dest: &Path) -> Result<()> {
        let mut bytes = self.fs.ops().read(&record.backup_path)?;
        if record.encrypted {
            let key = key.ok_or_else(|| Error::MissingKey {
                id: record.id.clone(),
            })?;
            bytes = crypto::decrypt(key, &bytes)?;
        }
        extract_archive(bytes.as_slice(), record.compressed, dest)?;
        Ok(())
    }
}

/// Remove whatever a failed artifact write left under `platform_dir`.
fn discard_partial_artifact(platform_dir: &Path, id: &str) {
    let Ok(entries) = fs::read_dir(platform_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name != id && !name.starts_with(&format!("{id}.")) {
            continue;
        }
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match removed {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed partial backup artifact"),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove partial backup artifact"
            ),
        }
    }
}

fn file_checksum(path: &Path, streaming: bool) -> Result<String> {
    let large = streaming
        && fs::metadata(path)
            .map(|m| m.len() > STREAMING_THRESHOLD_BYTES)
            .unwrap_or(false);
    let checksum = if large {
        compute_file_checksum_streaming(path)
    } else {
        compute_file_checksum(path)
    };
    Ok(checksum.map_err(|e| deploy_fs::Error::io(path, e))?)
}

/// Scratch directory for unpacked archives, removed on drop.
struct Staging {
    path: PathBuf,
}

impl Staging {
    fn create(parent: &Path) -> Result<Self> {
        let path = parent.join(format!(".staging-{}", uuid::Uuid::new_v4().simple()));
        fs::create_dir_all(&path).map_err(|e| deploy_fs::Error::io(&path, e))?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staging directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn seed(root: &Path) -> Vec<String> {
        fs::create_dir_all(root.join(".vscode")).unwrap();
        fs::write(root.join(".vscode/settings.json"), b"{\"a\": 1}\n").unwrap();
        fs::write(root.join(".vscode/tasks.json"), b"{\"version\": \"2.0.0\"}\n").unwrap();
        vec![".vscode/settings.json".into(), ".vscode/tasks.json".into()]
    }

    #[test]
    fn copy_backup_records_missing_paths_as_created() {
        let work = tempdir().unwrap();
        let backups = tempdir().unwrap();
        let mut files = seed(work.path());
        files.push(".vscode/launch.json".into());

        let store = BackupStore::local(backups.path());
        let record = store
            .create(work.path(), &files, Platform::VsCode, &BackupOptions::default())
            .unwrap();

        assert_eq!(record.files.len(), 2);
        assert_eq!(record.created_paths, vec![".vscode/launch.json"]);
        assert!(record.backup_path.join(".vscode/settings.json").is_file());
        assert!(record.checksum.starts_with("sha256:"));
        store.verify(&record).unwrap();
        assert_eq!(store.get(&record.id).unwrap(), record);
    }

    #[test]
    fn tampered_copy_fails_verification() {
        let work = tempdir().unwrap();
        let backups = tempdir().unwrap();
        let files = seed(work.path());
        let store = BackupStore::local(backups.path());
        let record = store
            .create(work.path(), &files, Platform::VsCode, &BackupOptions::default())
            .unwrap();

        fs::write(record.backup_path.join(".vscode/settings.json"), b"tampered").unwrap();
        assert!(matches!(
            store.verify(&record),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn rollback_restores_and_removes_created_files() {
        let work = tempdir().unwrap();
        let backups = tempdir().unwrap();
        let mut files = seed(work.path());
        files.push(".vscode/launch.json".into());
        let store = BackupStore::local(backups.path());
        let record = store
            .create(work.path(), &files, Platform::VsCode, &BackupOptions::default())
            .unwrap();

        fs::write(work.path().join(".vscode/settings.json"), b"changed").unwrap();
        fs::write(work.path().join(".vscode/launch.json"), b"{}").unwrap();

        let report = store.rollback(&record, work.path(), None).unwrap();
        assert!(report.success);
        assert_eq!(report.removed_files, vec![".vscode/launch.json"]);
        assert_eq!(
            fs::read(work.path().join(".vscode/settings.json")).unwrap(),
            b"{\"a\": 1}\n"
        );
        assert!(!work.path().join(".vscode/launch.json").exists());
    }

    #[test]
    fn dry_run_restore_writes_nothing() {
        let work = tempdir().unwrap();
        let backups = tempdir().unwrap();
        let files = seed(work.path());
        let store = BackupStore::local(backups.path());
        let record = store
            .create(work.path(), &files, Platform::VsCode, &BackupOptions::default())
            .unwrap();
        fs::remove_file(work.path().join(".vscode/tasks.json")).unwrap();

        let report = store
            .restore(
                &record.id,
                work.path(),
                &RestoreOptions {
                    conflict_strategy: ConflictStrategy::Skip,
                    dry_run: true,
                    key: None,
                },
            )
            .unwrap();
        assert_eq!(report.restored_files, vec![".vscode/tasks.json"]);
        assert_eq!(report.skipped_files, vec![".vscode/settings.json"]);
        assert!(!work.path().join(".vscode/tasks.json").exists());
    }

    #[test]
    fn unknown_and_unsafe_ids_are_not_found() {
        let backups = tempdir().unwrap();
        let store = BackupStore::local(backups.path());
        assert!(matches!(store.get("nope"), Err(Error::BackupNotFound { .. })));
        assert!(matches!(store.get("../x"), Err(Error::BackupNotFound { .. })));
    }

    #[test]
    fn encrypted_restore_requires_key() {
        let work = tempdir().unwrap();
        let backups = tempdir().unwrap();
        let files = seed(work.path());
        let store = BackupStore::local(backups.path());
        let record = store
            .create(
                work.path(),
                &files,
                Platform::VsCode,
                &BackupOptions {
                    encryption_key: Some("secret".into()),
                    ..BackupOptions::default()
                },
            )
            .unwrap();
        assert!(record.encrypted);
        assert!(!record.compressed);
        assert!(record.backup_path.to_string_lossy().ends_with(".tar.enc"));

        let err = store
            .restore(&record.id, work.path(), &RestoreOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::MissingKey { .. }));
    }
}
