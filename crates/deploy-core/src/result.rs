//! The typed outcome of a deployment

use deploy_meta::{ComponentKey, Platform};
use deploy_security::{ScanResult, Severity};
use serde::{Deserialize, Serialize};

use crate::conflict::ConflictDecision;
use crate::failure::{DeployError, DeployErrorCode, ErrorCategory};
use crate::session::SessionState;
use crate::validation::ValidationResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    pub files_deployed: usize,
    pub files_skipped: usize,
    /// Writes that landed on an existing file
    pub conflicts_resolved: usize,
    pub backup_created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
}

/// A failure as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(rename = "type")]
    pub category: ErrorCategory,
    pub code: DeployErrorCode,
    pub severity: Severity,
    pub message: String,
    pub suggestion: String,
    pub immediate_attention: bool,
}

impl ErrorEntry {
    pub fn new(error: &DeployError, component: Option<&ComponentKey>) -> Self {
        Self {
            component: component.map(ToString::to_string),
            category: error.code.category(),
            code: error.code,
            severity: error.severity,
            message: error.message.clone(),
            suggestion: error.remediation().join("; "),
            immediate_attention: error.immediate_attention(),
        }
    }

    /// Attribute the entry to a bundle location such as `settings/editor`.
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub success: bool,
    /// Set for dry runs; nothing was backed up or written
    pub simulated: bool,
    pub session_id: String,
    pub platform: Platform,
    pub state: SessionState,
    /// Every state the session passed through, in order
    #[serde(default)]
    pub states: Vec<SessionState>,
    pub deployed_components: Vec<ComponentKey>,
    pub skipped_components: Vec<ComponentKey>,
    pub failed_components: Vec<ComponentKey>,
    pub summary: DeploymentSummary,
    pub errors: Vec<ErrorEntry>,
    pub warnings: Vec<String>,
    /// Files left untouched awaiting a decision under the `prompt` strategy
    pub pending_decisions: Vec<ConflictDecision>,
    /// Target files written (or, for dry runs, that would be written)
    pub written_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan: Option<ScanResult>,
}

impl DeploymentResult {
    pub fn new(session_id: impl Into<String>, platform: Platform) -> Self {
        Self {
            success: false,
            simulated: false,
            session_id: session_id.into(),
            platform,
            state: SessionState::Pending,
            states: Vec::new(),
            deployed_components: Vec::new(),
            skipped_components: Vec::new(),
            failed_components: Vec::new(),
            summary: DeploymentSummary::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            pending_decisions: Vec::new(),
            written_files: Vec::new(),
            validation: None,
            scan: None,
        }
    }

    /// Failed, but some components were written.
    pub fn is_partial(&self) -> bool {
        !self.success && !self.deployed_components.is_empty()
    }

    pub fn has_error(&self, code: DeployErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// Process exit code: 0 on success, otherwise derived from the first
    /// reported error.
    pub fn exit_code(&self) -> i32 {
        if self.success {
            return 0;
        }
        self.errors
            .first()
            .map_or(DeployErrorCode::DeploymentFailed, |e| e.code)
            .exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exit_code_follows_first_error() {
        let mut result = DeploymentResult::new("s", Platform::VsCode);
        result.success = true;
        assert_eq!(result.exit_code(), 0);

        result.success = false;
        assert_eq!(result.exit_code(), DeployErrorCode::DeploymentFailed.exit_code());

        let error = DeployError::new(DeployErrorCode::SecurityViolation, "blocked");
        result.errors.push(ErrorEntry::new(&error, None));
        assert_eq!(result.exit_code(), 4);
    }

    #[test]
    fn entries_serialize_category_as_type() {
        let error = DeployError::new(DeployErrorCode::PermissionDenied, "denied");
        let key = ComponentKey::new(deploy_meta::ComponentKind::Settings, "editor");
        let value = serde_json::to_value(ErrorEntry::new(&error, Some(&key))).unwrap();
        assert_eq!(value["type"], "filesystem");
        assert_eq!(value["component"], "settings/editor");
        assert_eq!(value["immediateAttention"], true);
        assert!(!value["suggestion"].as_str().unwrap().is_empty());
    }
}
