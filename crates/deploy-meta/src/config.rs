//! On-disk deployer configuration (`.ai-deploy/config.toml`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use deploy_fs::{ConfigStore, DeployPath, NormalizedPath};
use serde::{Deserialize, Serialize};

use crate::component::ComponentKind;
use crate::options::ConflictStrategy;
use crate::{Error, Result};

pub const DEFAULT_MAX_BACKUPS: usize = 10;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_LEASE_STALE_SECS: u64 = 300;
/// Environment variable consulted for the backup encryption key.
pub const DEFAULT_KEY_ENV: &str = "AI_DEPLOY_BACKUP_KEY";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub backup: BackupSection,
    pub deploy: DeploySection,
    pub security: SecuritySection,
    pub limits: LimitOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSection {
    /// Backup root; relative paths resolve against the target root
    pub dir: Option<PathBuf>,
    pub max_backups: usize,
    pub compress: bool,
    pub encrypt: bool,
    /// Name of the environment variable holding the encryption key
    pub key_env: String,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            dir: None,
            max_backups: DEFAULT_MAX_BACKUPS,
            compress: false,
            encrypt: false,
            key_env: DEFAULT_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySection {
    pub conflict_strategy: String,
    pub workers: usize,
    pub lease_stale_after_secs: u64,
    pub continue_on_error: Option<bool>,
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            conflict_strategy: ConflictStrategy::default().to_string(),
            workers: DEFAULT_WORKERS,
            lease_stale_after_secs: DEFAULT_LEASE_STALE_SECS,
            continue_on_error: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Roots always scored as trusted
    pub trusted_paths: Vec<PathBuf>,
    pub custom_rules: Vec<CustomRuleConfig>,
}

/// A user-declared scan rule appended to the built-in rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRuleConfig {
    pub id: String,
    /// Violation type name, e.g. `sensitive_data`
    pub category: String,
    /// Regular expression matched against component text
    pub pattern: String,
    /// Component kinds the rule applies to; empty means all
    #[serde(default)]
    pub kinds: Vec<ComponentKind>,
    /// Field names the rule is restricted to; empty means all fields
    #[serde(default)]
    pub fields: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// Overrides for validation size and count limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitOverrides {
    pub soft_size_bytes: Option<usize>,
    pub hard_size_bytes: Option<usize>,
    /// Per-kind hard caps keyed by kind name (`ai-prompts = 20`)
    pub max_counts: BTreeMap<String, usize>,
}

impl LimitOverrides {
    pub fn count_limit(&self, kind: ComponentKind) -> Option<usize> {
        self.max_counts.get(kind.as_str()).copied()
    }
}

impl DeployConfig {
    /// Load `.ai-deploy/config.toml` under `root`, or defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = NormalizedPath::new(root).join(DeployPath::ConfigFile.as_str());
        if !path.is_file() {
            tracing::debug!(root = %root.display(), "No deployer config, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load a config file of any supported format.
    pub fn load_from(path: &NormalizedPath) -> Result<Self> {
        let config: Self = ConfigStore::new().load(path)?;
        config.check(path.to_native())?;
        tracing::debug!(path = %path, "Loaded deployer config");
        Ok(config)
    }

    fn check(&self, path: PathBuf) -> Result<()> {
        let invalid = |message: String| Error::InvalidConfig {
            path: path.clone(),
            message,
        };
        if self.backup.max_backups == 0 {
            return Err(invalid("backup.max_backups must be at least 1".into()));
        }
        if self.deploy.conflict_strategy.parse::<ConflictStrategy>().is_err() {
            return Err(invalid(format!(
                "unknown deploy.conflict_strategy '{}'",
                self.deploy.conflict_strategy
            )));
        }
        if let (Some(soft), Some(hard)) = (self.limits.soft_size_bytes, self.limits.hard_size_bytes) {
            if soft > hard {
                return Err(invalid(
                    "limits.soft_size_bytes exceeds limits.hard_size_bytes".into(),
                ));
            }
        }
        for key in self.limits.max_counts.keys() {
            key.parse::<ComponentKind>()
                .map_err(|_| invalid(format!("unknown component kind '{key}' in limits")))?;
        }
        Ok(())
    }

    /// Resolve the backup root for a deployment into `root`.
    ///
    /// Falls back to the per-user data directory, then to
    /// `<root>/.ai-deploy/backups`.
    pub fn backup_dir(&self, root: &Path) -> PathBuf {
        match &self.backup.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => default_backup_dir(root),
        }
    }

    /// The encryption key, when encryption is enabled and the key variable
    /// is set.
    pub fn encryption_key(&self) -> Option<String> {
        if !self.backup.encrypt {
            return None;
        }
        let key = std::env::var(&self.backup.key_env).ok();
        if key.is_none() {
            tracing::warn!(
                variable = %self.backup.key_env,
                "Backup encryption enabled but key variable is not set"
            );
        }
        key
    }
}

/// Default backup root for a target.
pub fn default_backup_dir(root: &Path) -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("ai-deploy").join("backups"))
        .unwrap_or_else(|| root.join(DeployPath::BackupDir.as_str()))
}
