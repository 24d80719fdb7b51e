//! Workspace trust scoring.
//!
//! A target root is scored from weighted path indicators plus small bonuses
//! for project markers found inside it. Allowlisted roots are always trusted.

use std::fmt;
use std::sync::LazyLock;

use deploy_fs::NormalizedPath;
use deploy_meta::{ComponentKey, ComponentKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::violation::{SecurityViolation, ViolationType};

/// Settings key holding extra trusted roots.
pub const TRUSTED_PATHS_SETTING: &str = "security.trustedPaths";

/// Component id used for workspace-level violations.
pub const WORKSPACE_COMPONENT_ID: &str = "workspace";

const TRUSTED_THRESHOLD: f64 = 0.8;
const RESTRICTED_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Trusted,
    Restricted,
    Untrusted,
}

impl TrustLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= TRUSTED_THRESHOLD {
            Self::Trusted
        } else if score >= RESTRICTED_THRESHOLD {
            Self::Restricted
        } else {
            Self::Untrusted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trusted => "trusted",
            Self::Restricted => "restricted",
            Self::Untrusted => "untrusted",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A weighted path pattern.
#[derive(Debug, Clone)]
pub struct Indicator {
    pub name: &'static str,
    pub pattern: Regex,
    pub weight: f64,
}

/// Files whose presence bumps the score.
#[derive(Debug, Clone)]
pub struct Marker {
    pub name: &'static str,
    pub files: &'static [&'static str],
    pub bonus: f64,
}

#[allow(clippy::expect_used)]
fn indicator(name: &'static str, pattern: &str, weight: f64) -> Indicator {
    Indicator {
        name,
        pattern: Regex::new(pattern).expect("trust indicator patterns are valid"),
        weight,
    }
}

static POSITIVE: LazyLock<Vec<Indicator>> = LazyLock::new(|| {
    vec![
        indicator(
            "project-directory",
            r"(?i)/(projects?|src|repos?|repositories|workspaces?|code|dev|git)(/|$)",
            0.4,
        ),
        indicator(
            "home-directory",
            r"^(/home/[^/]+|/Users/[^/]+|[A-Za-z]:/Users/[^/]+)/",
            0.3,
        ),
    ]
});

static RISK: LazyLock<Vec<Indicator>> = LazyLock::new(|| {
    vec![
        indicator("temporary-directory", r"(?i)/(tmp|temp)(/|$)", 0.5),
        indicator("downloads", r"(?i)/downloads(/|$)", 0.5),
        indicator("dependency-cache", r"/(node_modules|\.cache)(/|$)", 0.3),
        indicator(
            "system-directory",
            r"(?i)^(/etc|/usr|/bin|/sbin|/var|/System|[A-Za-z]:/Windows)(/|$)",
            0.6,
        ),
    ]
});

const MARKERS: &[Marker] = &[
    Marker {
        name: "dependency-manifest",
        files: &[
            "Cargo.toml",
            "package.json",
            "pyproject.toml",
            "requirements.txt",
            "go.mod",
            "pom.xml",
            "build.gradle",
            "Gemfile",
        ],
        bonus: 0.1,
    },
    Marker {
        name: "version-control",
        files: &[".git"],
        bonus: 0.1,
    },
];

/// Indicator tables plus an allowlist.
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    pub positive: Vec<Indicator>,
    pub risk: Vec<Indicator>,
    pub markers: Vec<Marker>,
    pub allowlist: Vec<NormalizedPath>,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            positive: POSITIVE.clone(),
            risk: RISK.clone(),
            markers: MARKERS.to_vec(),
            allowlist: Vec::new(),
        }
    }
}

impl TrustPolicy {
    pub fn with_allowlist<P: AsRef<std::path::Path>>(
        mut self,
        paths: impl IntoIterator<Item = P>,
    ) -> Self {
        self.allowlist
            .extend(paths.into_iter().map(NormalizedPath::new));
        self
    }
}

/// The scored trust of one root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustAssessment {
    pub path: String,
    pub score: f64,
    pub level: TrustLevel,
    /// Names of indicators and markers that contributed
    pub matched: Vec<String>,
    pub allowlisted: bool,
}

impl TrustAssessment {
    /// A medium violation when the root is untrusted.
    pub fn violation(&self) -> Option<SecurityViolation> {
        if self.level != TrustLevel::Untrusted {
            return None;
        }
        let key = ComponentKey::new(ComponentKind::Settings, WORKSPACE_COMPONENT_ID);
        let violation = SecurityViolation::new(
            &key,
            ViolationType::UntrustedWorkspace,
            "workspace-trust",
            format!(
                "Target {} is untrusted (score {:.2})",
                self.path, self.score
            ),
            format!("Add the path to {TRUSTED_PATHS_SETTING} if it is expected"),
        );
        Some(violation.in_field("path"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrustScorer {
    policy: TrustPolicy,
}

impl TrustScorer {
    pub fn new(policy: TrustPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    /// Score `path`. `settings` may carry extra allowlisted roots under
    /// [`TRUSTED_PATHS_SETTING`].
    pub fn score(&self, path: &NormalizedPath, settings: &Map<String, Value>) -> TrustAssessment {
        if self.is_allowlisted(path, settings) {
            tracing::debug!(path = %path.as_str(), "Path is allowlisted");
            return TrustAssessment {
                path: path.as_str().to_string(),
                score: 1.0,
                level: TrustLevel::Trusted,
                matched: vec!["allowlist".to_string()],
                allowlisted: true,
            };
        }

        let text = path.as_str();
        let mut score = 0.0;
        let mut matched = Vec::new();

        for ind in &self.policy.positive {
            if ind.pattern.is_match(text) {
                score += ind.weight;
                matched.push(ind.name.to_string());
            }
        }
        for ind in &self.policy.risk {
            if ind.pattern.is_match(text) {
                score -= ind.weight;
                matched.push(ind.name.to_string());
            }
        }
        for marker in &self.policy.markers {
            if marker.files.iter().any(|f| path.join(f).exists()) {
                score += marker.bonus;
                matched.push(marker.name.to_string());
            }
        }

        let score = (score.clamp(0.0, 1.0) * 100.0).round() / 100.0;
        let level = TrustLevel::from_score(score);
        tracing::debug!(path = %text, score, level = %level, "Scored workspace trust");

        TrustAssessment {
            path: text.to_string(),
            score,
            level,
            matched,
            allowlisted: false,
        }
    }

    fn is_allowlisted(&self, path: &NormalizedPath, settings: &Map<String, Value>) -> bool {
        let from_settings = settings
            .get(TRUSTED_PATHS_SETTING)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(NormalizedPath::new);

        self.policy
            .allowlist
            .iter()
            .cloned()
            .chain(from_settings)
            .any(|root| path.is_within(&root))
    }
}
