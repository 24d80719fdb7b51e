//! Numeric failure codes and their fixed properties

use std::fmt;

use deploy_security::Severity;
use serde::{Deserialize, Serialize};

/// Code family, from the hundreds digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Import,
    Validation,
    Security,
    Filesystem,
    Deployment,
    Recovery,
    Platform,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeployErrorCode {
    // Import
    ImportFailed,
    InvalidBundleFormat,
    UnsupportedVersion,
    BundleNotFound,
    // Validation
    ValidationFailed,
    MissingRequiredField,
    InvalidType,
    InvalidValue,
    SizeLimitExceeded,
    CountLimitExceeded,
    PlatformIncompatible,
    DuplicateComponent,
    // Security
    SecurityViolation,
    QuarantinedComponent,
    UntrustedWorkspace,
    InvalidRule,
    // Filesystem
    FileSystemError,
    FileNotFound,
    PermissionDenied,
    DiskFull,
    PathTooLong,
    FileLocked,
    ReadOnlyFilesystem,
    PathEscapesRoot,
    // Deployment
    DeploymentFailed,
    LockAcquisitionFailed,
    ConflictUnresolved,
    WriteFailed,
    Timeout,
    Cancelled,
    // Recovery
    BackupFailed,
    RestoreFailed,
    RollbackFailed,
    ChecksumMismatch,
    BackupNotFound,
    DecryptionFailed,
    // Platform
    PlatformError,
    UnsupportedComponent,
    PlatformConfigInvalid,
    PlatformNotFound,
    // Unknown
    Unknown,
    Internal,
}

impl DeployErrorCode {
    pub fn number(&self) -> u16 {
        match self {
            Self::ImportFailed => 100,
            Self::InvalidBundleFormat => 101,
            Self::UnsupportedVersion => 102,
            Self::BundleNotFound => 103,
            Self::ValidationFailed => 200,
            Self::MissingRequiredField => 201,
            Self::InvalidType => 202,
            Self::InvalidValue => 203,
            Self::SizeLimitExceeded => 204,
            Self::CountLimitExceeded => 205,
            Self::PlatformIncompatible => 206,
            Self::DuplicateComponent => 207,
            Self::SecurityViolation => 300,
            Self::QuarantinedComponent => 301,
            Self::UntrustedWorkspace => 302,
            Self::InvalidRule => 303,
            Self::FileSystemError => 400,
            Self::FileNotFound => 401,
            Self::PermissionDenied => 402,
            Self::DiskFull => 403,
            Self::PathTooLong => 404,
            Self::FileLocked => 405,
            Self::ReadOnlyFilesystem => 406,
            Self::PathEscapesRoot => 407,
            Self::DeploymentFailed => 500,
            Self::LockAcquisitionFailed => 501,
            Self::ConflictUnresolved => 502,
            Self::WriteFailed => 503,
            Self::Timeout => 504,
            Self::Cancelled => 505,
            Self::BackupFailed => 600,
            Self::RestoreFailed => 601,
            Self::RollbackFailed => 602,
            Self::ChecksumMismatch => 603,
            Self::BackupNotFound => 604,
            Self::DecryptionFailed => 605,
            Self::PlatformError => 700,
            Self::UnsupportedComponent => 701,
            Self::PlatformConfigInvalid => 702,
            Self::PlatformNotFound => 703,
            Self::Unknown => 900,
            Self::Internal => 905,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.number() / 100 {
            1 => ErrorCategory::Import,
            2 => ErrorCategory::Validation,
            3 => ErrorCategory::Security,
            4 => ErrorCategory::Filesystem,
            5 => ErrorCategory::Deployment,
            6 => ErrorCategory::Recovery,
            7 => ErrorCategory::Platform,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Process exit code for a run that failed with this code.
    pub fn exit_code(&self) -> i32 {
        (i32::from(self.number()) / 100 + 1).min(255)
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            Self::SecurityViolation
            | Self::PermissionDenied
            | Self::DiskFull
            | Self::ReadOnlyFilesystem
            | Self::RollbackFailed
            | Self::Internal => Severity::Critical,

            Self::QuarantinedComponent
            | Self::PathEscapesRoot
            | Self::DeploymentFailed
            | Self::WriteFailed
            | Self::BackupFailed
            | Self::RestoreFailed
            | Self::ChecksumMismatch
            | Self::DecryptionFailed
            | Self::InvalidBundleFormat
            | Self::UnsupportedVersion
            | Self::PlatformIncompatible
            | Self::PlatformNotFound
            | Self::InvalidRule => Severity::High,

            Self::ImportFailed
            | Self::BundleNotFound
            | Self::ValidationFailed
            | Self::MissingRequiredField
            | Self::InvalidType
            | Self::InvalidValue
            | Self::SizeLimitExceeded
            | Self::CountLimitExceeded
            | Self::DuplicateComponent
            | Self::UntrustedWorkspace
            | Self::FileSystemError
            | Self::FileNotFound
            | Self::PathTooLong
            | Self::FileLocked
            | Self::LockAcquisitionFailed
            | Self::ConflictUnresolved
            | Self::Timeout
            | Self::BackupNotFound
            | Self::PlatformError
            | Self::PlatformConfigInvalid
            | Self::Unknown => Severity::Medium,

            Self::Cancelled | Self::UnsupportedComponent => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImportFailed => "IMPORT_FAILED",
            Self::InvalidBundleFormat => "INVALID_BUNDLE_FORMAT",
            Self::UnsupportedVersion => "UNSUPPORTED_VERSION",
            Self::BundleNotFound => "BUNDLE_NOT_FOUND",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::InvalidType => "INVALID_TYPE",
            Self::InvalidValue => "INVALID_VALUE",
            Self::SizeLimitExceeded => "SIZE_LIMIT_EXCEEDED",
            Self::CountLimitExceeded => "COUNT_LIMIT_EXCEEDED",
            Self::PlatformIncompatible => "PLATFORM_INCOMPATIBLE",
            Self::DuplicateComponent => "DUPLICATE_COMPONENT",
            Self::SecurityViolation => "SECURITY_VIOLATION",
            Self::QuarantinedComponent => "QUARANTINED_COMPONENT",
            Self::UntrustedWorkspace => "UNTRUSTED_WORKSPACE",
            Self::InvalidRule => "INVALID_RULE",
            Self::FileSystemError => "FILE_SYSTEM_ERROR",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::DiskFull => "DISK_FULL",
            Self::PathTooLong => "PATH_TOO_LONG",
            Self::FileLocked => "FILE_LOCKED",
            Self::ReadOnlyFilesystem => "READ_ONLY_FILESYSTEM",
            Self::PathEscapesRoot => "PATH_ESCAPES_ROOT",
            Self::DeploymentFailed => "DEPLOYMENT_FAILED",
            Self::LockAcquisitionFailed => "LOCK_ACQUISITION_FAILED",
            Self::ConflictUnresolved => "CONFLICT_UNRESOLVED",
            Self::WriteFailed => "WRITE_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::BackupFailed => "BACKUP_FAILED",
            Self::RestoreFailed => "RESTORE_FAILED",
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::ChecksumMismatch => "CHECKSUM_MISMATCH",
            Self::BackupNotFound => "BACKUP_NOT_FOUND",
            Self::DecryptionFailed => "DECRYPTION_FAILED",
            Self::PlatformError => "PLATFORM_ERROR",
            Self::UnsupportedComponent => "UNSUPPORTED_COMPONENT",
            Self::PlatformConfigInvalid => "PLATFORM_CONFIG_INVALID",
            Self::PlatformNotFound => "PLATFORM_NOT_FOUND",
            Self::Unknown => "UNKNOWN",
            Self::Internal => "INTERNAL",
        }
    }

    /// Concrete steps a user can take to resolve the failure.
    pub fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ImportFailed | Self::InvalidBundleFormat => &[
                "Check that the bundle is valid JSON in the exchange format",
                "Re-export the bundle from the source platform",
            ],
            Self::UnsupportedVersion => &["Migrate the bundle to a 1.x schema version"],
            Self::BundleNotFound => &["Check the bundle path"],
            Self::ValidationFailed
            | Self::MissingRequiredField
            | Self::InvalidType
            | Self::InvalidValue => &[
                "Fix the fields listed in the validation report",
                "Run with validate-only to re-check the bundle",
            ],
            Self::SizeLimitExceeded => &["Split large components or raise [limits] hard_size_bytes"],
            Self::CountLimitExceeded => &["Reduce the number of components or raise [limits] max_counts"],
            Self::PlatformIncompatible => &[
                "Add the target platform to metadata.targetPlatforms",
                "Deploy to one of the declared platforms",
            ],
            Self::DuplicateComponent => &["Give each component of a kind a unique id"],
            Self::SecurityViolation | Self::QuarantinedComponent => &[
                "Review the blocking violations in the scan report",
                "Remove or rewrite the flagged content",
                "Exclude the component with skip-components",
            ],
            Self::UntrustedWorkspace => &["Add the workspace to [security] trusted_paths if it is expected"],
            Self::InvalidRule => &["Fix the custom rule pattern in [security] custom_rules"],
            Self::FileSystemError | Self::WriteFailed => &[
                "Check that the target directory exists and is writable",
                "Retry the deployment",
            ],
            Self::FileNotFound => &["Check that the path exists"],
            Self::PermissionDenied => &[
                "Check file and directory permissions on the target",
                "Close editors that may hold the file open",
            ],
            Self::DiskFull => &["Free disk space and retry"],
            Self::PathTooLong => &["Deploy to a shorter root path"],
            Self::FileLocked => &["Close programs holding the file and retry"],
            Self::ReadOnlyFilesystem => &["Deploy to a writable location"],
            Self::PathEscapesRoot => &["Use component ids without path separators"],
            Self::DeploymentFailed => &["Inspect the errors in the deployment result"],
            Self::LockAcquisitionFailed => &[
                "Wait for the other deployment to finish",
                "Remove a stale .ai-deploy/deploy.lock if no deployment is running",
            ],
            Self::ConflictUnresolved => &["Choose a non-interactive conflict strategy or resolve the pending files"],
            Self::Timeout => &["Retry when the filesystem is less busy"],
            Self::Cancelled => &["Re-run the deployment"],
            Self::BackupFailed => &[
                "Check that the backup directory is writable",
                "Free disk space in the backup directory",
            ],
            Self::RestoreFailed | Self::RollbackFailed => &[
                "Restore manually from the backup directory",
                "Verify the backup with its manifest checksum",
            ],
            Self::ChecksumMismatch => &["The backup is corrupt; restore from an older backup"],
            Self::BackupNotFound => &["List backups for the platform and pick an existing id"],
            Self::DecryptionFailed => &["Supply the key the backup was created with"],
            Self::PlatformError | Self::PlatformConfigInvalid => &[
                "Check the platform configuration directory",
            ],
            Self::UnsupportedComponent => &["Deploy the component to a platform that supports its kind"],
            Self::PlatformNotFound => &["Use one of: vscode, cursor, windsurf, claude-code, kiro"],
            Self::Unknown | Self::Internal => &["Re-run with RUST_LOG=debug and report the log"],
        }
    }
}

impl fmt::Display for DeployErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
