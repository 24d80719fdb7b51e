//! Deployment sessions and their state machine

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use deploy_meta::{ComponentKey, ConflictStrategy, DeploymentOptions, Platform};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::failure::DeployError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Pending,
    Validating,
    Scanning,
    Blocked,
    BackingUp,
    Writing,
    RollingBack,
    Completed,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Scanning => "scanning",
            Self::Blocked => "blocked",
            Self::BackingUp => "backing_up",
            Self::Writing => "writing",
            Self::RollingBack => "rolling_back",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is an edge of the state machine.
    ///
    /// Every edge moves forward except `Writing -> RollingBack`. Any
    /// non-terminal state may fail.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;

        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Pending, Validating)
                | (Validating, Scanning)
                | (Scanning, Blocked)
                | (Scanning, BackingUp)
                | (Scanning, Completed)
                | (BackingUp, Writing)
                | (Writing, Completed)
                | (Writing, RollingBack)
                | (RollingBack, Completed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooperative cancellation shared between a caller and a running session.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Deployed,
    Skipped,
    Quarantined,
    Unsupported,
    Pending,
    Failed,
}

/// Outcome for one component within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentResult {
    pub component: ComponentKey,
    pub status: ComponentStatus,
    /// Target files, relative to the root
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DeployError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    pub state: SessionState,
    pub at: DateTime<Utc>,
}

/// One run of the orchestrator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSession {
    pub id: String,
    pub platform: Platform,
    pub requested_components: Vec<ComponentKey>,
    pub conflict_strategy: ConflictStrategy,
    pub dry_run: bool,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub component_results: Vec<ComponentResult>,
    pub history: Vec<StateChange>,
}

impl DeploymentSession {
    pub fn new(options: &DeploymentOptions, requested_components: Vec<ComponentKey>) -> Self {
        let started_at = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            platform: options.platform,
            requested_components,
            conflict_strategy: options.conflict_strategy,
            dry_run: options.dry_run,
            state: SessionState::Pending,
            started_at,
            ended_at: None,
            component_results: Vec::new(),
            history: vec![StateChange {
                state: SessionState::Pending,
                at: started_at,
            }],
        }
    }

    pub fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::info!(session = %self.id, from = %self.state, to = %next, "Session state changed");
        let at = Utc::now();
        self.state = next;
        self.history.push(StateChange { state: next, at });
        if next.is_terminal() {
            self.ended_at = Some(at);
        }
        Ok(())
    }

    pub fn record(&mut self, result: ComponentResult) {
        self.component_results.push(result);
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.history.iter().map(|change| change.state).collect()
    }

    pub fn components_with(&self, status: ComponentStatus) -> Vec<&ComponentKey> {
        self.component_results
            .iter()
            .filter(|r| r.status == status)
            .map(|r| &r.component)
            .collect()
    }
}
