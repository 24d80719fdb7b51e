//! Retry with exponential backoff, and the filesystem write policy built on it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deploy_fs::FileOps;

use crate::failure::{
    DeployError, DeployErrorCode, ErrorContext, Operation, RetryConfig, recovery_for,
};
use crate::session::CancellationToken;

/// Suspends the current operation between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] that blocks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// [`Sleeper`] that records requested sleeps without waiting.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}

/// Runs fallible operations under a [`RetryConfig`].
#[derive(Clone)]
pub struct RetryExecutor {
    sleeper: Arc<dyn Sleeper>,
    cancel: Option<CancellationToken>,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(Arc::new(ThreadSleeper))
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl RetryExecutor {
    pub fn new(sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            sleeper,
            cancel: None,
        }
    }

    /// Stop retrying once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Run `op` up to `config.max_attempts` times.
    ///
    /// `op` receives the 1-based attempt number. After failed attempt `k` the
    /// executor sleeps `config.delay_for(k)`. The last error is returned with
    /// its attempt count once attempts run out.
    pub fn run<T>(
        &self,
        config: &RetryConfig,
        op: impl FnMut(u32) -> Result<T, DeployError>,
    ) -> Result<T, DeployError> {
        self.drive(op, |_| Some(*config))
    }

    /// Like [`RetryExecutor::run`], but the retry policy comes from the
    /// recovery table entry of the first failure's code. Codes without a
    /// retry entry fail after one attempt.
    pub fn run_classified<T>(
        &self,
        op: impl FnMut(u32) -> Result<T, DeployError>,
    ) -> Result<T, DeployError> {
        self.drive(op, |error| {
            let strategy = recovery_for(error.code);
            if strategy.retry {
                strategy.retry_config
            } else {
                None
            }
        })
    }

    fn drive<T>(
        &self,
        mut op: impl FnMut(u32) -> Result<T, DeployError>,
        mut policy: impl FnMut(&DeployError) -> Option<RetryConfig>,
    ) -> Result<T, DeployError> {
        let mut config: Option<RetryConfig> = None;
        let mut attempt = 1;
        loop {
            let error = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if config.is_none() {
                config = policy(&error);
            }
            let Some(active) = config else {
                return Err(error.with_attempts(attempt));
            };
            if attempt >= active.max_attempts {
                tracing::warn!(code = %error.code, attempts = attempt, "Retries exhausted");
                return Err(error.with_attempts(attempt));
            }
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                tracing::debug!(attempts = attempt, "Retry abandoned after cancellation");
                return Err(error.with_attempts(attempt));
            }

            let delay = active.delay_for(attempt);
            tracing::debug!(
                code = %error.code,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying after failure"
            );
            self.sleeper.sleep(delay);
            attempt += 1;
        }
    }
}

/// Filesystem mutations under the write failure policy.
///
/// Every call is retried according to the recovery table. A permission
/// failure on a path reached through a symbolic link is retried once against
/// the resolved path before it is propagated.
#[derive(Clone)]
pub struct FilesystemPolicy {
    ops: Arc<dyn FileOps>,
    retry: RetryExecutor,
}

impl FilesystemPolicy {
    pub fn new(ops: Arc<dyn FileOps>, retry: RetryExecutor) -> Self {
        Self { ops, retry }
    }

    pub fn ops(&self) -> &Arc<dyn FileOps> {
        &self.ops
    }

    pub fn write(
        &self,
        path: &Path,
        content: &[u8],
        operation: Operation,
    ) -> Result<(), DeployError> {
        self.guarded(path, operation, |target| self.ops.write(target, content))
    }

    pub fn copy(&self, from: &Path, to: &Path, operation: Operation) -> Result<u64, DeployError> {
        self.guarded(to, operation, |target| self.ops.copy(from, target))
    }

    pub fn remove(&self, path: &Path, operation: Operation) -> Result<(), DeployError> {
        self.guarded(path, operation, |target| self.ops.remove_file(target))
    }

    fn guarded<T>(
        &self,
        path: &Path,
        operation: Operation,
        act: impl Fn(&Path) -> deploy_fs::Result<T>,
    ) -> Result<T, DeployError> {
        let context = ErrorContext::new(operation).with_path(path);
        let attempt = |target: &Path| {
            act(target).map_err(|e| DeployError::from_fs(&e, &context))
        };

        self.retry.run_classified(|_| match attempt(path) {
            Err(error) if error.code == DeployErrorCode::PermissionDenied => {
                match alternate_path(path) {
                    Some(resolved) => {
                        tracing::debug!(
                            path = %path.display(),
                            resolved = %resolved.display(),
                            "Retrying through resolved path"
                        );
                        attempt(&resolved).map_err(|e| {
                            e.with_context("alternatePath", resolved.display().to_string())
                        })
                    }
                    None => Err(error),
                }
            }
            other => other,
        })
    }
}

/// The same location with symbolic links in its parent resolved, when that
/// differs from `path`.
fn alternate_path(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?;
    let name = path.file_name()?;
    let resolved = dunce::canonicalize(parent).ok()?.join(name);
    (resolved != path).then_some(resolved)
}
