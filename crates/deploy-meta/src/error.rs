//! Error types for deploy-meta

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Filesystem error: {0}")]
    Fs(#[from] deploy_fs::Error),

    #[error("Invalid bundle: {message}")]
    InvalidBundle { message: String },

    #[error("Invalid configuration at {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("Unknown platform: {id}")]
    UnknownPlatform { id: String },

    #[error("Unknown component kind: {kind}")]
    UnknownComponentKind { kind: String },

    #[error("Unknown conflict strategy: {strategy}")]
    UnknownConflictStrategy { strategy: String },
}
