//! Filesystem layer for the AI configuration deployer
//!
//! Provides normalized path handling, atomic I/O behind the [`FileOps`] seam,
//! SHA-256 checksums, the advisory deployment lease and format-agnostic
//! configuration loading.

pub mod checksum;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod lease;
pub mod path;

pub use config::ConfigStore;
pub use constants::DeployPath;
pub use error::{Error, Result};
pub use io::{FileOps, LocalFs};
pub use lease::{FileLock, Lease, LeaseGuard, LeaseRecord};
pub use path::{NormalizedPath, validate_path_identifier};
