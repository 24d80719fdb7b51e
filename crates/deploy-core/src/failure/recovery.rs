//! Recovery strategies keyed by failure code

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::code::DeployErrorCode;

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    #[serde(with = "millis")]
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100), Duration::from_secs(2), 2.0)
    }
}

impl RetryConfig {
    pub const fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    /// Sleep after failed attempt `attempt` (1-based):
    /// `min(initial_delay * multiplier^(attempt-1), max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let nanos = self.initial_delay.as_nanos() as f64 * self.multiplier.powi(exponent);
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos.max(0.0).round() as u64)
    }

    /// Every sleep a run that never succeeds would take.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|k| self.delay_for(k)).collect()
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// What to do when a failure with a given code reaches the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryStrategy {
    pub retry: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_config: Option<RetryConfig>,
    /// Restore the session backup once retries are exhausted
    pub rollback: bool,
    /// Remove partial artifacts such as temp files
    pub cleanup: bool,
}

impl RecoveryStrategy {
    const fn none() -> Self {
        Self {
            retry: false,
            retry_config: None,
            rollback: false,
            cleanup: false,
        }
    }

    const fn retry(config: RetryConfig) -> Self {
        Self {
            retry: true,
            retry_config: Some(config),
            rollback: false,
            cleanup: false,
        }
    }

    const fn with_rollback(mut self) -> Self {
        self.rollback = true;
        self
    }

    const fn with_cleanup(mut self) -> Self {
        self.cleanup = true;
        self
    }
}

const TRANSIENT_WRITE: RetryConfig =
    RetryConfig::new(3, Duration::from_millis(100), Duration::from_secs(2), 2.0);
const BUSY_FILE: RetryConfig =
    RetryConfig::new(5, Duration::from_millis(200), Duration::from_secs(5), 2.0);
const SLOW_FILESYSTEM: RetryConfig =
    RetryConfig::new(3, Duration::from_millis(500), Duration::from_secs(10), 2.0);

/// Policy for a session that lost the deployment lease: many attempts with
/// long backoff, used by callers that want to wait for the holder.
pub const LEASE_CONTENTION: RetryConfig =
    RetryConfig::new(10, Duration::from_secs(1), Duration::from_secs(30), 1.5);

/// The recovery table.
pub fn recovery_for(code: DeployErrorCode) -> RecoveryStrategy {
    use DeployErrorCode::*;

    match code {
        FileSystemError | WriteFailed => RecoveryStrategy::retry(TRANSIENT_WRITE).with_rollback(),
        FileLocked => RecoveryStrategy::retry(BUSY_FILE),
        Timeout => RecoveryStrategy::retry(SLOW_FILESYSTEM),
        LockAcquisitionFailed => RecoveryStrategy::retry(LEASE_CONTENTION),
        PermissionDenied | ReadOnlyFilesystem => RecoveryStrategy::none().with_rollback(),
        DiskFull => RecoveryStrategy::none().with_rollback().with_cleanup(),
        Unknown | Internal => RecoveryStrategy::retry(RetryConfig::new(
            2,
            Duration::from_millis(100),
            Duration::from_secs(1),
            2.0,
        ))
        .with_rollback(),
        BackupFailed => RecoveryStrategy::none().with_cleanup(),
        _ => RecoveryStrategy::none(),
    }
}
