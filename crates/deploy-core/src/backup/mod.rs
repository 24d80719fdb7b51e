//! Backups of target files taken before a deployment writes
//!
//! A backup is either a directory of plain copies or a single tar archive,
//! optionally gzipped and optionally sealed with AES-256-GCM. Records are
//! kept per platform in a JSON manifest and pruned oldest-first.

mod archive;
mod crypto;
mod record;
mod store;

pub use archive::{extract_archive, write_archive};
pub use crypto::{decrypt, encrypt};
pub use record::{BACKUP_FORMAT_VERSION, BackupManifest, BackupRecord};
pub use store::{
    BackupOptions, BackupStore, RestoreOptions, RestoreReport, STREAMING_THRESHOLD_BYTES,
};
