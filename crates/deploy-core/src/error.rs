//! Error types for deploy-core

use std::path::PathBuf;

use crate::failure::{DeployError, DeployErrorCode, ErrorContext, Operation};
use crate::session::SessionState;

/// Result type for deploy-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure failures raised by deploy-core.
///
/// Data problems in a bundle are never raised; they are reported through
/// `ValidationResult` and `ScanResult`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Backup not found: {id}")]
    BackupNotFound { id: String },

    #[error("Backup {id} failed verification: expected {expected}, found {actual}")]
    ChecksumMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("Backup {id} is missing artifact {path}")]
    MissingArtifact { id: String, path: PathBuf },

    #[error("Backup {id} is encrypted and no key was supplied")]
    MissingKey { id: String },

    #[error("Encryption error: {message}")]
    Crypto { message: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    /// The caller broke an API contract
    #[error("Invalid request: {message}")]
    ContractViolation { message: String },

    #[error(transparent)]
    Deploy(#[from] DeployError),

    // Transparent wrappers for underlying crate errors
    #[error(transparent)]
    Fs(#[from] deploy_fs::Error),

    #[error(transparent)]
    Meta(#[from] deploy_meta::Error),

    #[error(transparent)]
    Platforms(#[from] deploy_platforms::Error),

    #[error(transparent)]
    Security(#[from] deploy_security::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn archive(error: impl std::fmt::Display) -> Self {
        Self::Archive {
            message: error.to_string(),
        }
    }

    /// Convert into the classified value reported to callers.
    pub fn into_deploy_error(self, context: &ErrorContext) -> DeployError {
        let code = match &self {
            Self::Deploy(error) => return error.clone(),
            Self::Fs(error) => return DeployError::from_fs(error, context),
            Self::Archive { .. } | Self::Crypto { .. }
                if context.operation == Some(Operation::Backup) =>
            {
                DeployErrorCode::BackupFailed
            }
            Self::BackupNotFound { .. } => DeployErrorCode::BackupNotFound,
            Self::ChecksumMismatch { .. } | Self::MissingArtifact { .. } => {
                DeployErrorCode::ChecksumMismatch
            }
            Self::MissingKey { .. } | Self::Crypto { .. } => DeployErrorCode::DecryptionFailed,
            Self::Archive { .. } => DeployErrorCode::RestoreFailed,
            Self::InvalidTransition { .. } => DeployErrorCode::Internal,
            Self::ContractViolation { .. } => DeployErrorCode::Internal,
            Self::Meta(_) => DeployErrorCode::InvalidBundleFormat,
            Self::Platforms(_) => DeployErrorCode::PlatformError,
            Self::Security(_) => DeployErrorCode::InvalidRule,
            Self::Json(_) => DeployErrorCode::Internal,
        };
        DeployError::classified(code.into(), self.to_string(), context)
    }
}
