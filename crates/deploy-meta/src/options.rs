//! Options a single deployment run is executed with.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::component::{ComponentKey, ComponentKind};
use crate::config::{DeployConfig, LimitOverrides};
use crate::platform::Platform;
use crate::{Error, Result};

/// How an existing file at a target path is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Leave the existing file untouched
    Skip,
    /// Replace the existing file
    Overwrite,
    /// Snapshot the existing file next to it, then replace
    #[default]
    Backup,
    /// Deep-merge structured content, incoming values win per leaf
    Merge,
    /// Defer the decision; the file is left untouched and reported pending
    Prompt,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
            Self::Backup => "backup",
            Self::Merge => "merge",
            Self::Prompt => "prompt",
        }
    }
}

impl FromStr for ConflictStrategy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "overwrite" => Ok(Self::Overwrite),
            "backup" => Ok(Self::Backup),
            "merge" => Ok(Self::Merge),
            "prompt" => Ok(Self::Prompt),
            _ => Err(Error::UnknownConflictStrategy {
                strategy: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects components by kind (`tasks`) or by key (`tasks/build`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentSelector {
    pub kind: ComponentKind,
    pub id: Option<String>,
}

impl ComponentSelector {
    pub fn kind(kind: ComponentKind) -> Self {
        Self { kind, id: None }
    }

    pub fn component(kind: ComponentKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: Some(id.into()),
        }
    }

    pub fn matches(&self, key: &ComponentKey) -> bool {
        self.kind == key.kind && self.id.as_deref().is_none_or(|id| id == key.id)
    }
}

impl FromStr for ComponentSelector {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((kind, id)) if !id.is_empty() => Ok(Self::component(kind.parse()?, id)),
            Some((kind, _)) => Ok(Self::kind(kind.parse()?)),
            None => Ok(Self::kind(s.parse()?)),
        }
    }
}

impl fmt::Display for ComponentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}/{}", self.kind, id),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Everything that parameterizes one deployment session.
#[derive(Debug, Clone)]
pub struct DeploymentOptions {
    pub platform: Platform,
    pub conflict_strategy: ConflictStrategy,
    /// Run validation and scanning, simulate everything else
    pub dry_run: bool,
    /// Stop after validation and scanning
    pub validate_only: bool,
    /// Deploy only matching components; `None` means all
    pub components: Option<Vec<ComponentSelector>>,
    /// Never deploy matching components
    pub skip_components: Vec<ComponentSelector>,
    /// Proceed past a failed security scan. Quarantined components are still
    /// excluded.
    pub force: bool,
    pub backup_dir: PathBuf,
    pub max_backups: usize,
    pub compress_backups: bool,
    /// Key used to encrypt backups; `None` disables encryption
    pub encryption_key: Option<String>,
    pub enable_large_file_streaming: bool,
    /// Overrides the per-kind best-effort default when set
    pub continue_on_error: Option<bool>,
    pub workers: usize,
    pub lease_stale_after: Duration,
    pub trusted_paths: Vec<PathBuf>,
    pub limits: LimitOverrides,
}

impl DeploymentOptions {
    pub fn new(platform: Platform, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            conflict_strategy: ConflictStrategy::default(),
            dry_run: false,
            validate_only: false,
            components: None,
            skip_components: Vec::new(),
            force: false,
            backup_dir: backup_dir.into(),
            max_backups: crate::config::DEFAULT_MAX_BACKUPS,
            compress_backups: false,
            encryption_key: None,
            enable_large_file_streaming: false,
            continue_on_error: None,
            workers: crate::config::DEFAULT_WORKERS,
            lease_stale_after: Duration::from_secs(crate::config::DEFAULT_LEASE_STALE_SECS),
            trusted_paths: Vec::new(),
            limits: LimitOverrides::default(),
        }
    }

    /// Options seeded from a loaded [`DeployConfig`] for `root`.
    pub fn from_config(platform: Platform, config: &DeployConfig, root: &Path) -> Result<Self> {
        let mut options = Self::new(platform, config.backup_dir(root));
        options.conflict_strategy = config.deploy.conflict_strategy.parse()?;
        options.max_backups = config.backup.max_backups;
        options.compress_backups = config.backup.compress;
        options.encryption_key = config.encryption_key();
        options.continue_on_error = config.deploy.continue_on_error;
        options.workers = config.deploy.workers.max(1);
        options.lease_stale_after = Duration::from_secs(config.deploy.lease_stale_after_secs);
        options.trusted_paths = config.security.trusted_paths.clone();
        options.limits = config.limits.clone();
        Ok(options)
    }

    pub fn with_conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn validate_only(mut self, validate_only: bool) -> Self {
        self.validate_only = validate_only;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_components(mut self, selectors: Vec<ComponentSelector>) -> Self {
        self.components = Some(selectors);
        self
    }

    pub fn with_skip_components(mut self, selectors: Vec<ComponentSelector>) -> Self {
        self.skip_components = selectors;
        self
    }

    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress_backups = compress;
        self
    }

    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    pub fn with_large_file_streaming(mut self, enabled: bool) -> Self {
        self.enable_large_file_streaming = enabled;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = Some(continue_on_error);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_lease_stale_after(mut self, stale_after: Duration) -> Self {
        self.lease_stale_after = stale_after;
        self
    }

    pub fn with_trusted_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trusted_paths.push(path.into());
        self
    }

    pub fn with_limits(mut self, limits: LimitOverrides) -> Self {
        self.limits = limits;
        self
    }

    /// Whether the component selection admits `key`.
    pub fn selects(&self, key: &ComponentKey) -> bool {
        let included = self
            .components
            .as_ref()
            .is_none_or(|selectors| selectors.iter().any(|s| s.matches(key)));
        included && !self.skip_components.iter().any(|s| s.matches(key))
    }

    /// Whether a failed write of `kind` lets the session continue.
    pub fn continues_after_failure(&self, kind: ComponentKind) -> bool {
        self.continue_on_error.unwrap_or(!kind.is_destructive())
    }

    /// Whether this run mutates the target at all.
    pub fn is_mutating(&self) -> bool {
        !self.dry_run && !self.validate_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("skip", ConflictStrategy::Skip)]
    #[case("Overwrite", ConflictStrategy::Overwrite)]
    #[case("backup", ConflictStrategy::Backup)]
    #[case("merge", ConflictStrategy::Merge)]
    #[case("prompt", ConflictStrategy::Prompt)]
    fn conflict_strategy_parses(#[case] input: &str, #[case] expected: ConflictStrategy) {
        assert_eq!(input.parse::<ConflictStrategy>().unwrap(), expected);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(matches!(
            "ask".parse::<ConflictStrategy>(),
            Err(Error::UnknownConflictStrategy { .. })
        ));
    }

    #[test]
    fn selectors_match_kind_or_key() {
        let by_kind: ComponentSelector = "tasks".parse().unwrap();
        let by_key: ComponentSelector = "tasks/build".parse().unwrap();
        let build = ComponentKey::new(ComponentKind::Tasks, "build");
        let test = ComponentKey::new(ComponentKind::Tasks, "test");

        assert!(by_kind.matches(&build));
        assert!(by_kind.matches(&test));
        assert!(by_key.matches(&build));
        assert!(!by_key.matches(&test));
        assert_eq!(by_key.to_string(), "tasks/build");
    }

    #[test]
    fn skip_wins_over_include() {
        let options = DeploymentOptions::new(Platform::VsCode, "/tmp/backups")
            .with_components(vec![ComponentSelector::kind(ComponentKind::Tasks)])
            .with_skip_components(vec![ComponentSelector::component(
                ComponentKind::Tasks,
                "deploy",
            )]);

        assert!(options.selects(&ComponentKey::new(ComponentKind::Tasks, "build")));
        assert!(!options.selects(&ComponentKey::new(ComponentKind::Tasks, "deploy")));
        assert!(!options.selects(&ComponentKey::new(ComponentKind::Launch, "run")));
    }

    #[test]
    fn best_effort_defaults_follow_kind() {
        let options = DeploymentOptions::new(Platform::VsCode, "/tmp/backups");
        assert!(options.continues_after_failure(ComponentKind::AiPrompts));
        assert!(!options.continues_after_failure(ComponentKind::Settings));

        let forced = options.with_continue_on_error(true);
        assert!(forced.continues_after_failure(ComponentKind::Settings));
    }
}
