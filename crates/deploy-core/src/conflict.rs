//! Conflict resolution for target files that already exist

use std::path::{Path, PathBuf};

use chrono::Utc;
use deploy_meta::ConflictStrategy;
use deploy_platforms::merged;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::failure::{DeployError, ErrorContext, Operation};
use crate::retry::FilesystemPolicy;

/// What happens to one target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedAction {
    /// Nothing exists yet; the file is created
    Create,
    Skip,
    Overwrite,
    /// The existing file is copied next to itself, then replaced
    BackupThenOverwrite,
    Merge,
    /// Merge was requested but the content is not two JSON objects
    MergeFallbackOverwrite,
    /// Deferred to the caller; the file is left untouched
    Pending,
}

impl ResolvedAction {
    pub fn writes(&self) -> bool {
        !matches!(self, Self::Skip | Self::Pending)
    }

    /// Whether an existing file was involved.
    pub fn is_conflict(&self) -> bool {
        !matches!(self, Self::Create)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDecision {
    /// Target path relative to the deployment root
    pub path: String,
    pub strategy: ConflictStrategy,
    pub resolved_action: ResolvedAction,
}

/// A decision plus the bytes it will write.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub decision: ConflictDecision,
    pub content: Option<Vec<u8>>,
}

/// Applies a [`ConflictStrategy`] to target files.
#[derive(Clone)]
pub struct ConflictResolver {
    fs: FilesystemPolicy,
}

impl ConflictResolver {
    pub fn new(fs: FilesystemPolicy) -> Self {
        Self { fs }
    }

    /// Decide how `incoming` lands on `target` without modifying anything.
    ///
    /// `merge` reads the existing file to compute the merged content.
    pub fn resolve(
        &self,
        target: &Path,
        relative: &str,
        strategy: ConflictStrategy,
        incoming: Vec<u8>,
    ) -> Result<Resolution, DeployError> {
        let decision = |resolved_action| ConflictDecision {
            path: relative.to_string(),
            strategy,
            resolved_action,
        };

        if !self.fs.ops().exists(target) {
            return Ok(Resolution {
                decision: decision(ResolvedAction::Create),
                content: Some(incoming),
            });
        }

        let (action, content) = match strategy {
            ConflictStrategy::Skip => (ResolvedAction::Skip, None),
            ConflictStrategy::Prompt => (ResolvedAction::Pending, None),
            ConflictStrategy::Overwrite => (ResolvedAction::Overwrite, Some(incoming)),
            ConflictStrategy::Backup => (ResolvedAction::BackupThenOverwrite, Some(incoming)),
            ConflictStrategy::Merge => {
                let existing = self.fs.ops().read(target).map_err(|e| {
                    DeployError::from_fs(&e, &ErrorContext::new(Operation::Write).with_path(target))
                })?;
                match merge_json(&existing, &incoming) {
                    Some(content) => (ResolvedAction::Merge, Some(content)),
                    None => {
                        tracing::warn!(
                            path = relative,
                            "Content is not mergeable, overwriting instead"
                        );
                        (ResolvedAction::MergeFallbackOverwrite, Some(incoming))
                    }
                }
            }
        };
        Ok(Resolution {
            decision: decision(action),
            content,
        })
    }

    /// Carry out a resolution against `target`.
    ///
    /// Returns the snapshot path when the existing file was backed up.
    pub fn apply(
        &self,
        resolution: &Resolution,
        target: &Path,
    ) -> Result<Option<PathBuf>, DeployError> {
        let action = resolution.decision.resolved_action;
        let Some(content) = resolution.content.as_deref().filter(|_| action.writes()) else {
            return Ok(None);
        };

        let snapshot = if action == ResolvedAction::BackupThenOverwrite {
            let snapshot = snapshot_path(target);
            self.fs.copy(target, &snapshot, Operation::Backup)?;
            Some(snapshot)
        } else {
            None
        };
        if let Err(error) = self.fs.write(target, content, Operation::Write) {
            if let Some(snapshot) = &snapshot
                && let Err(e) = self.fs.remove(snapshot, Operation::Backup)
            {
                tracing::warn!(path = %snapshot.display(), code = %e.code, "Failed to remove conflict snapshot");
            }
            return Err(error);
        }
        tracing::debug!(path = %resolution.decision.path, action = ?action, "Resolved conflict");
        Ok(snapshot)
    }
}

/// Sibling path an existing file is copied to before being replaced.
pub fn snapshot_path(target: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!("{name}.backup-{stamp}"))
}

/// Deep-merge two JSON object documents, or `None` if either is not one.
fn merge_json(existing: &[u8], incoming: &[u8]) -> Option<Vec<u8>> {
    let base: Value = serde_json::from_slice(existing).ok()?;
    let update: Value = serde_json::from_slice(incoming).ok()?;
    if !(base.is_object() && update.is_object()) {
        return None;
    }
    let mut bytes = serde_json::to_vec_pretty(&merged(&base, &update)).ok()?;
    bytes.push(b'\n');
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{RecordingSleeper, RetryExecutor};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn resolver() -> ConflictResolver {
        ConflictResolver::new(FilesystemPolicy::new(
            Arc::new(deploy_fs::LocalFs::new()),
            RetryExecutor::new(Arc::new(RecordingSleeper::new())),
        ))
    }

    #[rstest]
    #[case(ConflictStrategy::Skip, ResolvedAction::Skip, "old")]
    #[case(ConflictStrategy::Prompt, ResolvedAction::Pending, "old")]
    #[case(ConflictStrategy::Overwrite, ResolvedAction::Overwrite, "new")]
    #[case(ConflictStrategy::Backup, ResolvedAction::BackupThenOverwrite, "new")]
    #[case(ConflictStrategy::Merge, ResolvedAction::MergeFallbackOverwrite, "new")]
    fn strategies_on_text_files(
        #[case] strategy: ConflictStrategy,
        #[case] action: ResolvedAction,
        #[case] expected: &str,
    ) {
        let dir = tempdir().unwrap();
        let target = dir.path().join("rules.md");
        fs::write(&target, "old").unwrap();

        let resolver = resolver();
        let resolution = resolver
            .resolve(&target, "rules.md", strategy, b"new".to_vec())
            .unwrap();
        assert_eq!(resolution.decision.resolved_action, action);
        resolver.apply(&resolution, &target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), expected);
    }

    #[test]
    fn missing_target_is_created() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("new.json");
        let resolution = resolver()
            .resolve(&target, "new.json", ConflictStrategy::Skip, b"{}".to_vec())
            .unwrap();
        assert_eq!(resolution.decision.resolved_action, ResolvedAction::Create);
        assert!(!resolution.decision.resolved_action.is_conflict());
    }

    #[test]
    fn backup_strategy_keeps_a_sibling_copy() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("settings.json");
        fs::write(&target, "{\"a\": 1}").unwrap();

        let resolver = resolver();
        let resolution = resolver
            .resolve(&target, "settings.json", ConflictStrategy::Backup, b"{}".to_vec())
            .unwrap();
        let snapshot = resolver.apply(&resolution, &target).unwrap().unwrap();
        assert_eq!(fs::read_to_string(&snapshot).unwrap(), "{\"a\": 1}");
        assert!(
            snapshot
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("settings.json.backup-")
        );
    }

    #[test]
    fn merge_combines_objects_with_incoming_winning() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("settings.json");
        fs::write(
            &target,
            serde_json::to_vec(&json!({"editor": {"tabSize": 4, "rulers": [80]}, "keep": 1}))
                .unwrap(),
        )
        .unwrap();

        let resolver = resolver();
        let incoming = serde_json::to_vec(&json!({"editor": {"tabSize": 2}})).unwrap();
        let resolution = resolver
            .resolve(&target, "settings.json", ConflictStrategy::Merge, incoming)
            .unwrap();
        assert_eq!(resolution.decision.resolved_action, ResolvedAction::Merge);
        resolver.apply(&resolution, &target).unwrap();

        let written: Value = serde_json::from_slice(&fs::read(&target).unwrap()).unwrap();
        assert_eq!(
            written,
            json!({"editor": {"tabSize": 2, "rulers": [80]}, "keep": 1})
        );
    }

    #[test]
    fn failed_write_discards_its_snapshot() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("settings.json");
        fs::write(&target, "{\"a\": 1}").unwrap();

        let resolver = ConflictResolver::new(FilesystemPolicy::new(
            Arc::new(deploy_test_utils::FailingFs::always(
                "settings.json",
                std::io::ErrorKind::PermissionDenied,
            )),
            RetryExecutor::new(Arc::new(RecordingSleeper::new())),
        ));
        let resolution = resolver
            .resolve(&target, "settings.json", ConflictStrategy::Backup, b"{}".to_vec())
            .unwrap();

        assert!(resolver.apply(&resolution, &target).is_err());
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["settings.json"]);
        assert_eq!(fs::read_to_string(&target).unwrap(), "{\"a\": 1}");
    }
}
