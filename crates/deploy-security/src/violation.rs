//! Violations, severities and scan results

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use deploy_meta::{ComponentKey, ComponentKind};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::trust::TrustAssessment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// High and critical violations quarantine their component.
    pub fn quarantines(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a policy concern. Each category carries a fixed severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    AiInjection,
    MaliciousCode,
    SensitiveData,
    DangerousCapability,
    UnsafeExtension,
    InsecureLaunchConfig,
    PathTraversal,
    AutoRunCapability,
    UntrustedWorkspace,
    SuspiciousPattern,
}

impl ViolationType {
    pub const ALL: [ViolationType; 10] = [
        Self::AiInjection,
        Self::MaliciousCode,
        Self::SensitiveData,
        Self::DangerousCapability,
        Self::UnsafeExtension,
        Self::InsecureLaunchConfig,
        Self::PathTraversal,
        Self::AutoRunCapability,
        Self::UntrustedWorkspace,
        Self::SuspiciousPattern,
    ];

    pub fn severity(&self) -> Severity {
        match self {
            Self::AiInjection | Self::MaliciousCode => Severity::Critical,
            Self::SensitiveData
            | Self::DangerousCapability
            | Self::UnsafeExtension
            | Self::InsecureLaunchConfig
            | Self::PathTraversal => Severity::High,
            Self::AutoRunCapability | Self::UntrustedWorkspace => Severity::Medium,
            Self::SuspiciousPattern => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiInjection => "ai_injection",
            Self::MaliciousCode => "malicious_code",
            Self::SensitiveData => "sensitive_data",
            Self::DangerousCapability => "dangerous_capability",
            Self::UnsafeExtension => "unsafe_extension",
            Self::InsecureLaunchConfig => "insecure_launch_config",
            Self::PathTraversal => "path_traversal",
            Self::AutoRunCapability => "auto_run_capability",
            Self::UntrustedWorkspace => "untrusted_workspace",
            Self::SuspiciousPattern => "suspicious_pattern",
        }
    }
}

impl FromStr for ViolationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| Error::UnknownCategory {
                category: s.to_string(),
            })
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected policy concern tied to one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityViolation {
    pub component_kind: ComponentKind,
    pub component_id: String,
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
    pub quarantined: bool,
    /// Rule that produced the violation
    pub rule_id: String,
    /// Field the match was found in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl SecurityViolation {
    pub fn new(
        key: &ComponentKey,
        violation_type: ViolationType,
        rule_id: impl Into<String>,
        description: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        let severity = violation_type.severity();
        Self {
            component_kind: key.kind,
            component_id: key.id.clone(),
            violation_type,
            severity,
            description: description.into(),
            recommendation: recommendation.into(),
            quarantined: severity.quarantines(),
            rule_id: rule_id.into(),
            field: None,
        }
    }

    pub fn in_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn component_key(&self) -> ComponentKey {
        ComponentKey::new(self.component_kind, &self.component_id)
    }
}

/// A quarantined violation, located by `kind/id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingEntry {
    pub location: String,
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub description: String,
}

/// Violation counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
    pub total: usize,
}

impl ScanSummary {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
            Severity::Critical => self.critical += 1,
        }
        self.total += 1;
    }
}

/// Outcome of scanning a bundle. `passed` holds exactly when no violation is
/// high or critical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub passed: bool,
    pub violations: Vec<SecurityViolation>,
    pub quarantined_components: BTreeSet<String>,
    pub blocking: Vec<BlockingEntry>,
    pub summary: ScanSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust: Option<TrustAssessment>,
}

impl ScanResult {
    /// Aggregate violations, already in stable component order.
    pub fn from_violations(violations: Vec<SecurityViolation>) -> Self {
        let mut summary = ScanSummary::default();
        let mut quarantined_components = BTreeSet::new();
        let mut blocking = Vec::new();

        for violation in &violations {
            summary.record(violation.severity);
            if violation.quarantined {
                let location = violation.component_key().to_string();
                blocking.push(BlockingEntry {
                    location: location.clone(),
                    violation_type: violation.violation_type,
                    severity: violation.severity,
                    description: violation.description.clone(),
                });
                quarantined_components.insert(location);
            }
        }

        Self {
            passed: blocking.is_empty(),
            violations,
            quarantined_components,
            blocking,
            summary,
            trust: None,
        }
    }

    /// Attach a workspace trust assessment. An untrusted workspace adds a
    /// medium violation, which never blocks on its own.
    pub fn with_trust(mut self, trust: TrustAssessment) -> Self {
        if let Some(violation) = trust.violation() {
            self.summary.record(violation.severity);
            self.violations.push(violation);
        }
        self.trust = Some(trust);
        self
    }

    pub fn is_quarantined(&self, key: &ComponentKey) -> bool {
        self.quarantined_components.contains(&key.to_string())
    }

    pub fn violations_for(&self, key: &ComponentKey) -> Vec<&SecurityViolation> {
        self.violations
            .iter()
            .filter(|v| v.component_kind == key.kind && v.component_id == key.id)
            .collect()
    }
}
