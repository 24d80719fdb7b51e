//! Security gating for configuration bundles.
//!
//! [`SecurityScanner`] runs the declarative [`RuleSet`] over every component
//! and aggregates the findings into a [`ScanResult`]. High and critical
//! findings quarantine their component. [`TrustScorer`] rates the target
//! workspace itself.

pub mod error;
pub mod rules;
pub mod scanner;
pub mod trust;
pub mod violation;

pub use error::{Error, Result};
pub use rules::{Rule, RuleSet};
pub use scanner::SecurityScanner;
pub use trust::{TrustAssessment, TrustLevel, TrustPolicy, TrustScorer};
pub use violation::{
    BlockingEntry, ScanResult, ScanSummary, SecurityViolation, Severity, ViolationType,
};
