//! Schema and configuration types for the AI configuration deployer.
//!
//! This crate defines the neutral exchange format ([`ConfigurationBundle`]),
//! the closed set of component kinds and target platforms, the options a
//! deployment is run with, and the on-disk [`DeployConfig`].

pub mod bundle;
pub mod component;
pub mod config;
pub mod error;
pub mod options;
pub mod platform;

pub use bundle::{BundleComponents, BundleMetadata, ComponentEntry, ConfigurationBundle};
pub use component::{
    AgentComponent, Component, ComponentKey, ComponentKind, ExtensionComponent, Extra,
    HookComponent, LaunchComponent, PromptComponent, SettingsComponent, SnippetComponent,
    TaskComponent, TemplateComponent, TextField,
};
pub use config::{
    BackupSection, CustomRuleConfig, DeployConfig, DeploySection, LimitOverrides, SecuritySection,
};
pub use error::{Error, Result};
pub use options::{ComponentSelector, ConflictStrategy, DeploymentOptions};
pub use platform::Platform;
