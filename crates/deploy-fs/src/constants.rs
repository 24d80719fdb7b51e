//! Well-known paths used by the deployer.

use std::path::Path;

/// Standard deployer filesystem markers and paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPath {
    /// The `.ai-deploy` directory under a target root
    StateDir,
    /// The lease file guarding a target root (`.ai-deploy/deploy.lock`)
    LeaseFile,
    /// The optional config file (`.ai-deploy/config.toml`)
    ConfigFile,
    /// Fallback backup root under a target (`.ai-deploy/backups`)
    BackupDir,
    /// The per-platform backup manifest file name
    Manifest,
    /// Lock file serializing updates to a platform's manifest
    ManifestLock,
}

impl DeployPath {
    /// Get the string representation of the path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateDir => ".ai-deploy",
            Self::LeaseFile => ".ai-deploy/deploy.lock",
            Self::ConfigFile => ".ai-deploy/config.toml",
            Self::BackupDir => ".ai-deploy/backups",
            Self::Manifest => "manifest.json",
            Self::ManifestLock => "manifest.lock",
        }
    }
}

impl AsRef<Path> for DeployPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for DeployPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for DeployPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
