//! Deployment engine for the AI configuration deployer
//!
//! This crate coordinates the lower layers into one deployment session:
//!
//! - **Validation**: structural, count, size and platform checks on a bundle
//! - **Backup**: copy or archive targets before they are written, with
//!   retention, verification, restore and rollback
//! - **Conflicts**: skip, overwrite, backup, merge or defer existing files
//! - **Failures**: a numeric error taxonomy, a recovery table and a retry
//!   executor with exponential backoff
//! - **Orchestration**: the session state machine tying it all together
//!
//! # Architecture
//!
//! ```text
//!                  Deployer
//!                      |
//!                 deploy-core
//!                      |
//!     +----------+-----+------+-------------+
//!     |          |            |             |
//! deploy-fs  deploy-meta  deploy-platforms  deploy-security
//! ```
//!
//! # Example
//!
//! ```ignore
//! use deploy_core::{Deployer, Result};
//! use deploy_fs::NormalizedPath;
//! use deploy_meta::{ConfigurationBundle, DeploymentOptions, Platform};
//!
//! fn example(root: &std::path::Path) -> Result<()> {
//!     let bundle = ConfigurationBundle::load(&NormalizedPath::new("bundle.json"))?;
//!     let options = DeploymentOptions::new(Platform::Cursor, root.join(".ai-deploy/backups"));
//!     let result = Deployer::new().deploy(&bundle, root, &options)?;
//!     std::process::exit(result.exit_code());
//! }
//! ```

pub mod audit;
pub mod backup;
pub mod conflict;
pub mod error;
pub mod failure;
pub mod logging;
pub mod orchestrator;
pub mod pool;
pub mod result;
pub mod retry;
pub mod session;
pub mod validation;

pub use audit::{AuditEvent, AuditEventKind, AuditSink, RecordingAuditSink, TracingAuditSink};
pub use backup::{
    BackupManifest, BackupOptions, BackupRecord, BackupStore, RestoreOptions, RestoreReport,
};
pub use conflict::{ConflictDecision, ConflictResolver, Resolution, ResolvedAction};
pub use error::{Error, Result};
pub use failure::{
    DeployError, DeployErrorCode, ErrorCategory, ErrorContext, Operation, RecoveryStrategy,
    RetryConfig, classify, enrich_for_platform, recovery_for,
};
pub use orchestrator::Deployer;
pub use pool::WorkerPool;
pub use result::{DeploymentResult, DeploymentSummary, ErrorEntry};
pub use retry::{FilesystemPolicy, RecordingSleeper, RetryExecutor, Sleeper, ThreadSleeper};
pub use session::{
    CancellationToken, ComponentResult, ComponentStatus, DeploymentSession, SessionState,
};
pub use validation::{Limits, ValidationEngine, ValidationIssue, ValidationResult};
