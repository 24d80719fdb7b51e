//! Target IDE layouts for the AI configuration deployer.
//!
//! Each supported platform implements [`PlatformIntegration`], which turns
//! the components of one kind into the files that platform reads. The
//! [`render_bundle`] planner groups the output by path so a deployment
//! writes every file exactly once.

pub mod claude;
pub mod cursor;
pub mod error;
pub mod integration;
pub mod kiro;
pub mod markdown;
pub mod merge;
pub mod registry;
pub mod vscode;
pub mod windsurf;

pub use claude::ClaudeIntegration;
pub use cursor::CursorIntegration;
pub use error::{Error, Result};
pub use integration::{ConfigFormat, ConfigLocation, FileContent, PlatformIntegration, RenderedFile};
pub use kiro::KiroIntegration;
pub use merge::{deep_merge, merged};
pub use registry::{RenderPlan, integration_for, render_bundle};
pub use vscode::VsCodeIntegration;
pub use windsurf::WindsurfIntegration;
