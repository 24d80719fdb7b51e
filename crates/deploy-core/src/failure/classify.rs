//! Heuristic classification of raw failures into codes

use std::io::ErrorKind;
use std::path::PathBuf;

use deploy_security::Severity;
use serde::{Deserialize, Serialize};

use super::code::DeployErrorCode;

/// Pipeline step a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Import,
    Validate,
    Scan,
    Lease,
    Backup,
    Restore,
    Write,
    Rollback,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Validate => "validate",
            Self::Scan => "scan",
            Self::Lease => "lease",
            Self::Backup => "backup",
            Self::Restore => "restore",
            Self::Write => "write",
            Self::Rollback => "rollback",
        }
    }

    /// Code used when nothing more specific is recognised.
    fn fallback_code(&self) -> DeployErrorCode {
        match self {
            Self::Import => DeployErrorCode::ImportFailed,
            Self::Validate => DeployErrorCode::ValidationFailed,
            Self::Scan => DeployErrorCode::SecurityViolation,
            Self::Lease => DeployErrorCode::LockAcquisitionFailed,
            Self::Backup => DeployErrorCode::BackupFailed,
            Self::Restore => DeployErrorCode::RestoreFailed,
            Self::Write => DeployErrorCode::WriteFailed,
            Self::Rollback => DeployErrorCode::RollbackFailed,
        }
    }
}

/// Where a failure happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub operation: Option<Operation>,
    pub path: Option<PathBuf>,
    pub component: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation: Some(operation),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub code: DeployErrorCode,
    pub severity: Severity,
}

impl From<DeployErrorCode> for Classification {
    fn from(code: DeployErrorCode) -> Self {
        Self {
            code,
            severity: code.default_severity(),
        }
    }
}

const MESSAGE_HINTS: &[(&[&str], DeployErrorCode)] = &[
    (
        &["permission denied", "eacces", "eperm", "access is denied", "operation not permitted"],
        DeployErrorCode::PermissionDenied,
    ),
    (
        &["no such file", "not found", "enoent", "cannot find"],
        DeployErrorCode::FileNotFound,
    ),
    (
        &["no space left", "enospc", "disk full", "quota exceeded"],
        DeployErrorCode::DiskFull,
    ),
    (&["read-only file system", "erofs"], DeployErrorCode::ReadOnlyFilesystem),
    (&["name too long", "enametoolong"], DeployErrorCode::PathTooLong),
    (
        &["resource busy", "ebusy", "being used by another process", "locked"],
        DeployErrorCode::FileLocked,
    ),
    (&["timed out", "timeout", "etimedout"], DeployErrorCode::Timeout),
    (&["checksum"], DeployErrorCode::ChecksumMismatch),
    (&["decrypt", "authentication tag"], DeployErrorCode::DecryptionFailed),
    (&["escapes root", "path traversal"], DeployErrorCode::PathEscapesRoot),
];

/// Classify a failure message, falling back on the operation it occurred in.
pub fn classify(message: &str, context: &ErrorContext) -> Classification {
    let lowered = message.to_lowercase();
    let matched = MESSAGE_HINTS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lowered.contains(n)))
        .map(|(_, code)| *code);

    let code = match (matched, context.operation) {
        // A busy lease is a lease failure, not a busy file
        (Some(DeployErrorCode::FileLocked), Some(Operation::Lease)) => {
            DeployErrorCode::LockAcquisitionFailed
        }
        (Some(code), _) => code,
        (None, Some(op)) => op.fallback_code(),
        (None, None) => DeployErrorCode::Unknown,
    };
    code.into()
}

/// Classify an I/O error by kind first, then by message.
pub fn classify_io(error: &std::io::Error, context: &ErrorContext) -> Classification {
    let code = match error.kind() {
        ErrorKind::NotFound => Some(DeployErrorCode::FileNotFound),
        ErrorKind::PermissionDenied => Some(DeployErrorCode::PermissionDenied),
        ErrorKind::TimedOut => Some(DeployErrorCode::Timeout),
        ErrorKind::WouldBlock => Some(DeployErrorCode::FileLocked),
        ErrorKind::StorageFull => Some(DeployErrorCode::DiskFull),
        ErrorKind::ReadOnlyFilesystem => Some(DeployErrorCode::ReadOnlyFilesystem),
        _ => None,
    };
    match code {
        Some(code) => code.into(),
        None => classify(&error.to_string(), context),
    }
}

/// Classify an error from the filesystem layer.
pub fn classify_fs(error: &deploy_fs::Error, context: &ErrorContext) -> Classification {
    use deploy_fs::Error as FsError;

    match error {
        FsError::Io { source, .. } => classify_io(source, context),
        FsError::PathEscapesRoot { .. } => DeployErrorCode::PathEscapesRoot.into(),
        FsError::LockFailed { .. } | FsError::LeaseHeld { .. } | FsError::LeaseCorrupt { .. } => {
            DeployErrorCode::LockAcquisitionFailed.into()
        }
        FsError::ConfigParse { .. } | FsError::UnsupportedFormat { .. } => {
            if context.operation == Some(Operation::Import) {
                DeployErrorCode::InvalidBundleFormat.into()
            } else {
                DeployErrorCode::PlatformConfigInvalid.into()
            }
        }
        FsError::InvalidIdentifier { .. } => DeployErrorCode::InvalidValue.into(),
    }
}
