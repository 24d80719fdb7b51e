//! The classified failure value carried to the result boundary.
//!
//! Every failure the pipeline reports is a [`DeployError`]: a numeric
//! [`DeployErrorCode`] with a fixed default severity, a message, a context
//! map, optional platform detail and the number of attempts made.

mod classify;
mod code;
mod platform;
mod recovery;

use std::collections::BTreeMap;

use deploy_security::Severity;
use serde::{Deserialize, Serialize};

pub use classify::{Classification, ErrorContext, Operation, classify, classify_fs, classify_io};
pub use code::{DeployErrorCode, ErrorCategory};
pub use platform::{PlatformContext, enrich_for_platform};
pub use recovery::{LEASE_CONTENTION, RecoveryStrategy, RetryConfig, recovery_for};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{code}: {message}")]
pub struct DeployError {
    pub code: DeployErrorCode,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_context: Option<PlatformContext>,
    /// Attempts made before giving up; 0 when never retried
    #[serde(default)]
    pub attempts: u32,
}

impl DeployError {
    pub fn new(code: DeployErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
            context: BTreeMap::new(),
            platform_context: None,
            attempts: 0,
        }
    }

    /// Build from a classification, recording the context it came from.
    pub fn classified(
        classification: Classification,
        message: impl Into<String>,
        context: &ErrorContext,
    ) -> Self {
        let mut error = Self::new(classification.code, message);
        error.severity = classification.severity;
        if let Some(op) = context.operation {
            error = error.with_context("operation", op.as_str());
        }
        if let Some(path) = &context.path {
            error = error.with_context("path", path.display().to_string());
        }
        if let Some(component) = &context.component {
            error = error.with_context("component", component.clone());
        }
        error
    }

    pub fn from_fs(error: &deploy_fs::Error, context: &ErrorContext) -> Self {
        Self::classified(classify_fs(error, context), error.to_string(), context)
    }

    pub fn from_io(error: &std::io::Error, context: &ErrorContext) -> Self {
        Self::classified(classify_io(error, context), error.to_string(), context)
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Critical failures need a human right away.
    pub fn immediate_attention(&self) -> bool {
        self.severity == Severity::Critical
    }

    pub fn remediation(&self) -> &'static [&'static str] {
        self.code.remediation()
    }

    pub fn recovery(&self) -> RecoveryStrategy {
        recovery_for(self.code)
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn classified_io_error_carries_context() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let ctx = ErrorContext::new(Operation::Write)
            .with_path("/w/.vscode/settings.json")
            .with_component("settings/editor");
        let error = DeployError::from_io(&err, &ctx);
        assert_eq!(error.code, DeployErrorCode::PermissionDenied);
        assert!(error.immediate_attention());
        assert_eq!(error.context["operation"], "write");
        assert_eq!(error.context["component"], "settings/editor");
        assert_eq!(error.exit_code(), 5);
    }

    #[test]
    fn display_includes_code() {
        let error = DeployError::new(DeployErrorCode::SecurityViolation, "blocked");
        assert_eq!(error.to_string(), "SECURITY_VIOLATION: blocked");
        assert!(!error.recovery().retry);
    }
}
