//! Shared test utilities for the ai-deploy workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`bundles`]: ready-made configuration bundles, clean and hostile
//! - [`fs`]: instrumented [`deploy_fs::FileOps`] implementations
//! - [`git`]: VCS markers for trust scoring
//! - [`workspace`]: [`TestWorkspace`], a target root plus backup directory

pub mod bundles;
pub mod fs;
pub mod git;
pub mod workspace;

pub use fs::{CountingFs, FailingFs, OpCounts};
pub use workspace::TestWorkspace;
