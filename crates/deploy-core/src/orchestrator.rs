//! The deployment orchestrator
//!
//! A deployment walks the session state machine:
//!
//! ```text
//! Pending -> Validating -> Scanning -> Blocked -> Failed
//!                                   -> BackingUp -> Writing -> Completed
//!                                                           -> RollingBack -> Failed
//! ```
//!
//! Validation errors and a blocked scan end the session before anything is
//! backed up or written. Every target path is backed up in one record before
//! the first write, and writes run on the worker pool under the filesystem
//! retry policy.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use deploy_fs::{DeployPath, FileOps, Lease, LocalFs, NormalizedPath};
use deploy_meta::{BundleComponents, ComponentEntry, ComponentKey, ConfigurationBundle, DeploymentOptions};
use deploy_platforms::{RenderedFile, integration_for, render_bundle};
use deploy_security::{ScanResult, SecurityScanner, TrustAssessment, TrustPolicy, TrustScorer};

use crate::audit::{AuditEvent, AuditEventKind, AuditSink, TracingAuditSink};
use crate::backup::{BackupOptions, BackupRecord, BackupStore};
use crate::conflict::{ConflictDecision, ConflictResolver, ResolvedAction};
use crate::error::{Error, Result};
use crate::failure::{DeployError, DeployErrorCode, ErrorContext, Operation, enrich_for_platform};
use crate::pool::WorkerPool;
use crate::result::{DeploymentResult, ErrorEntry};
use crate::retry::{FilesystemPolicy, RetryExecutor, Sleeper, ThreadSleeper};
use crate::session::{
    CancellationToken, ComponentResult, ComponentStatus, DeploymentSession, SessionState,
};
use crate::validation::ValidationEngine;

/// Runs deployments. Holds only collaborators; all per-run state lives in
/// the session, so one deployer can serve several roots.
pub struct Deployer {
    ops: Arc<dyn FileOps>,
    sleeper: Arc<dyn Sleeper>,
    audit: Arc<dyn AuditSink>,
    scanner: SecurityScanner,
    validator: ValidationEngine,
    trust_policy: TrustPolicy,
    cancel: CancellationToken,
}

impl Default for Deployer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Deployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployer")
            .field("rules", &self.scanner.rules().len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Deployer {
    pub fn new() -> Self {
        Self {
            ops: Arc::new(LocalFs::new()),
            sleeper: Arc::new(ThreadSleeper),
            audit: Arc::new(TracingAuditSink),
            scanner: SecurityScanner::default(),
            validator: ValidationEngine::default(),
            trust_policy: TrustPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_file_ops(mut self, ops: Arc<dyn FileOps>) -> Self {
        self.ops = ops;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn with_scanner(mut self, scanner: SecurityScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_validation_engine(mut self, validator: ValidationEngine) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_trust_policy(mut self, policy: TrustPolicy) -> Self {
        self.trust_policy = policy;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels running deployments cooperatively.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The backup store this deployer writes session backups to.
    pub fn backup_store(&self, options: &DeploymentOptions) -> BackupStore {
        BackupStore::new(options.backup_dir.clone(), self.policy())
    }

    fn policy(&self) -> FilesystemPolicy {
        FilesystemPolicy::new(
            self.ops.clone(),
            RetryExecutor::new(self.sleeper.clone()).with_cancellation(self.cancel.clone()),
        )
    }

    /// Deploy `bundle` into `root`.
    ///
    /// Bundle, security and filesystem problems are reported in the returned
    /// result. `Err` is reserved for broken internal invariants.
    pub fn deploy(
        &self,
        bundle: &ConfigurationBundle,
        root: &Path,
        options: &DeploymentOptions,
    ) -> Result<DeploymentResult> {
        let requested: Vec<ComponentKey> = bundle
            .components
            .entries()
            .iter()
            .map(ComponentEntry::key)
            .filter(|key| options.selects(key))
            .collect();
        let session = DeploymentSession::new(options, requested);
        let span = tracing::info_span!(
            "deployment",
            session = %session.id,
            platform = %options.platform
        );
        let _entered = span.enter();

        let mut run = Run::new(self, options, session);
        run.emit(
            run.event(AuditEventKind::SessionStarted)
                .with("root", root.display())
                .with("dryRun", options.dry_run)
                .with("validateOnly", options.validate_only),
        );

        let _lease = if options.is_mutating() {
            let path = NormalizedPath::new(root)
                .join(DeployPath::LeaseFile.as_str())
                .to_native();
            match Lease::acquire(&path, &run.session.id, options.lease_stale_after) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    let context = ErrorContext::new(Operation::Lease).with_path(&path);
                    run.fail(DeployError::from_fs(&e, &context))?;
                    return Ok(run.finish());
                }
            }
        } else {
            None
        };

        run.transition(SessionState::Validating)?;
        let validation = self.validator.validate(bundle, options.platform, options)?;
        let valid = validation.is_valid;
        if !valid {
            for issue in &validation.errors {
                let mut error =
                    DeployError::new(issue.code, format!("{}: {}", issue.field, issue.message));
                error.severity = issue.severity;
                run.result.errors.push(ErrorEntry::new(&error, None));
            }
            run.emit(
                run.event(AuditEventKind::ValidationFailed)
                    .with("errors", validation.errors.len()),
            );
        }
        run.result.validation = Some(validation);
        if !valid {
            run.transition(SessionState::Failed)?;
            return Ok(run.finish());
        }

        run.transition(SessionState::Scanning)?;
        let mut selected = bundle.components.clone();
        selected.retain(|key| options.selects(key));
        let scan = self.scan(&selected, root, options);

        let quarantined: Vec<ComponentKey> = run
            .session
            .requested_components
            .iter()
            .filter(|key| scan.is_quarantined(key))
            .cloned()
            .collect();
        for key in &quarantined {
            run.session.record(ComponentResult {
                component: key.clone(),
                status: ComponentStatus::Quarantined,
                files: Vec::new(),
                error: None,
            });
            run.emit(
                run.event(AuditEventKind::ComponentQuarantined)
                    .with("component", key),
            );
        }
        if let Some(violation) = scan.trust.as_ref().and_then(TrustAssessment::violation) {
            run.result.warnings.push(violation.description);
        }

        if !scan.passed && !options.force {
            run.transition(SessionState::Blocked)?;
            for entry in &scan.blocking {
                let error = DeployError::new(
                    DeployErrorCode::SecurityViolation,
                    format!("{}: {}", entry.violation_type.as_str(), entry.description),
                )
                .with_context("component", entry.location.clone());
                run.result
                    .errors
                    .push(ErrorEntry::new(&error, None).with_component(entry.location.clone()));
            }
            let untouched: Vec<ComponentKey> = run
                .session
                .requested_components
                .iter()
                .filter(|key| !quarantined.contains(key))
                .cloned()
                .collect();
            for key in untouched {
                run.record(key, ComponentStatus::Skipped, Vec::new(), None);
            }
            run.emit(
                run.event(AuditEventKind::SecurityBlocked)
                    .with("blocking", scan.blocking.len()),
            );
            run.result.scan = Some(scan);
            run.transition(SessionState::Failed)?;
            return Ok(run.finish());
        }
        if !scan.passed {
            tracing::warn!(
                quarantined = quarantined.len(),
                "Security scan failed, continuing under force"
            );
            run.result.warnings.push(format!(
                "Security scan failed; continuing under force without {} quarantined component(s)",
                quarantined.len()
            ));
        }
        run.result.scan = Some(scan);

        if options.validate_only {
            run.result.success = true;
            run.transition(SessionState::Completed)?;
            return Ok(run.finish());
        }

        let integration = integration_for(options.platform);
        let plan = match render_bundle(integration.as_ref(), &selected, |key| {
            !quarantined.contains(key)
        }) {
            Ok(plan) => plan,
            Err(e) => {
                let error = Error::from(e).into_deploy_error(&ErrorContext::new(Operation::Write));
                run.fail(enrich_for_platform(error, options.platform))?;
                return Ok(run.finish());
            }
        };
        for key in &plan.unsupported {
            run.record(key.clone(), ComponentStatus::Unsupported, Vec::new(), None);
        }
        run.result.warnings.extend(plan.warnings.iter().cloned());

        run.transition(SessionState::BackingUp)?;
        let store = self.backup_store(options);
        let paths: Vec<String> = plan.files.iter().map(|f| f.path.clone()).collect();
        let backup = if options.dry_run || paths.is_empty() {
            None
        } else {
            let backup_options = BackupOptions::from_deployment(options);
            match store.create(root, &paths, options.platform, &backup_options) {
                Ok(record) => {
                    run.result.summary.backup_created = true;
                    run.result.summary.backup_id = Some(record.id.clone());
                    run.emit(
                        run.event(AuditEventKind::BackupCreated)
                            .with("backupId", &record.id)
                            .with("files", record.files.len()),
                    );
                    Some(record)
                }
                Err(e) => {
                    let context =
                        ErrorContext::new(Operation::Backup).with_path(&options.backup_dir);
                    let error = e.into_deploy_error(&context);
                    run.fail(enrich_for_platform(error, options.platform))?;
                    return Ok(run.finish());
                }
            }
        };

        run.transition(SessionState::Writing)?;
        let resolver = ConflictResolver::new(self.policy());
        let halted = AtomicBool::new(false);
        let outcomes = WorkerPool::new(options.workers).map_ordered(&plan.files, |file| {
            self.write_file(file, root, options, &resolver, &halted)
        });

        let mut rollback_needed = false;
        let mut snapshots = Vec::new();
        for (file, outcome) in plan.files.iter().zip(&outcomes) {
            match outcome {
                WriteOutcome::Applied(decision, snapshot) => {
                    snapshots.extend(snapshot.iter().cloned());
                    run.result.summary.files_deployed += 1;
                    if decision.resolved_action.is_conflict() {
                        run.result.summary.conflicts_resolved += 1;
                    }
                    run.result.written_files.push(file.path.clone());
                    if !options.dry_run {
                        run.emit(
                            run.event(AuditEventKind::FileWritten)
                                .with("path", &file.path)
                                .with("action", format!("{:?}", decision.resolved_action)),
                        );
                    }
                }
                WriteOutcome::Untouched(decision) => {
                    run.result.summary.files_skipped += 1;
                    let kind = if decision.resolved_action == ResolvedAction::Pending {
                        run.result.pending_decisions.push(decision.clone());
                        AuditEventKind::DecisionDeferred
                    } else {
                        AuditEventKind::FileSkipped
                    };
                    run.emit(run.event(kind).with("path", &file.path));
                }
                WriteOutcome::NotAttempted => run.result.summary.files_skipped += 1,
                WriteOutcome::Failed(error) => {
                    if halts_on_failure(file, options) && error.recovery().rollback {
                        rollback_needed = true;
                    }
                    let mut entry = ErrorEntry::new(error, file.components.first());
                    entry.message = format!("{}: {}", file.path, entry.message);
                    run.result.errors.push(entry);
                    run.emit(
                        run.event(AuditEventKind::WriteFailed)
                            .with("path", &file.path)
                            .with("code", error.code),
                    );
                }
            }
        }

        for key in plan.rendered_components() {
            let mut status = ComponentStatus::Skipped;
            let mut files = Vec::new();
            let mut failure = None;
            for (file, outcome) in plan.files.iter().zip(&outcomes) {
                if !file.components.contains(&key) {
                    continue;
                }
                files.push(file.path.clone());
                status = match (status, outcome) {
                    (ComponentStatus::Failed, _) => ComponentStatus::Failed,
                    (_, WriteOutcome::Failed(error)) => {
                        failure.get_or_insert_with(|| error.clone());
                        ComponentStatus::Failed
                    }
                    (ComponentStatus::Pending, _) => ComponentStatus::Pending,
                    (_, WriteOutcome::Untouched(d))
                        if d.resolved_action == ResolvedAction::Pending =>
                    {
                        ComponentStatus::Pending
                    }
                    (_, WriteOutcome::Applied(..)) => ComponentStatus::Deployed,
                    (current, _) => current,
                };
            }
            run.record(key, status, files, failure);
        }

        let halted = halted.load(Ordering::SeqCst);
        let cancelled = self.cancel.is_cancelled();
        match backup.as_ref().filter(|_| rollback_needed) {
            Some(record) => {
                run.transition(SessionState::RollingBack)?;
                self.roll_back(&mut run, &store, record, root, &snapshots);
                run.transition(SessionState::Failed)?;
            }
            None if halted || cancelled => {
                if cancelled && !run.result.has_error(DeployErrorCode::Cancelled) {
                    let error = DeployError::new(DeployErrorCode::Cancelled, "Deployment cancelled");
                    run.result.errors.push(ErrorEntry::new(&error, None));
                }
                run.transition(SessionState::Failed)?;
            }
            None => {
                run.result.success = run.result.errors.is_empty();
                run.transition(SessionState::Completed)?;
            }
        }
        Ok(run.finish())
    }

    fn scan(
        &self,
        components: &BundleComponents,
        root: &Path,
        options: &DeploymentOptions,
    ) -> ScanResult {
        let entries = components.entries();
        let violations = WorkerPool::new(options.workers)
            .map_ordered(&entries, |entry| self.scanner.scan_component(entry))
            .into_iter()
            .flatten()
            .collect();

        let scorer =
            TrustScorer::new(self.trust_policy.clone().with_allowlist(&options.trusted_paths));
        let trust = scorer.score(&NormalizedPath::new(root), &serde_json::Map::new());
        let result = ScanResult::from_violations(violations).with_trust(trust);
        tracing::debug!(
            components = entries.len(),
            violations = result.summary.total,
            quarantined = result.quarantined_components.len(),
            passed = result.passed,
            "Scanned components"
        );
        result
    }

    fn write_file(
        &self,
        file: &RenderedFile,
        root: &Path,
        options: &DeploymentOptions,
        resolver: &ConflictResolver,
        halted: &AtomicBool,
    ) -> WriteOutcome {
        if halted.load(Ordering::SeqCst) {
            return WriteOutcome::NotAttempted;
        }
        if self.cancel.is_cancelled() {
            return WriteOutcome::Failed(
                DeployError::new(DeployErrorCode::Cancelled, "Deployment cancelled before write")
                    .with_context("path", file.path.clone()),
            );
        }

        match self.place(file, root, options, resolver) {
            Ok((decision, snapshot)) if decision.resolved_action.writes() => {
                WriteOutcome::Applied(decision, snapshot)
            }
            Ok((decision, _)) => WriteOutcome::Untouched(decision),
            Err(error) => {
                if halts_on_failure(file, options) {
                    halted.store(true, Ordering::SeqCst);
                }
                tracing::warn!(path = %file.path, code = %error.code, "Write failed");
                WriteOutcome::Failed(enrich_for_platform(error, options.platform))
            }
        }
    }

    fn place(
        &self,
        file: &RenderedFile,
        root: &Path,
        options: &DeploymentOptions,
        resolver: &ConflictResolver,
    ) -> std::result::Result<(ConflictDecision, Option<PathBuf>), DeployError> {
        let context = ErrorContext::new(Operation::Write)
            .with_path(root.join(&file.path))
            .with_component(
                file.components
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            );
        let target = NormalizedPath::new(root)
            .join_contained(&file.path)
            .map_err(|e| DeployError::from_fs(&e, &context))?
            .to_native();
        let content = file
            .content
            .to_bytes()
            .map_err(|e| Error::from(e).into_deploy_error(&context))?;

        let resolution = resolver.resolve(&target, &file.path, options.conflict_strategy, content)?;
        let snapshot = if options.dry_run {
            None
        } else {
            resolver.apply(&resolution, &target)?
        };
        Ok((resolution.decision, snapshot))
    }

    /// Restore `record` and remove the sibling snapshots this run created.
    fn roll_back(
        &self,
        run: &mut Run<'_>,
        store: &BackupStore,
        record: &BackupRecord,
        root: &Path,
        snapshots: &[PathBuf],
    ) {
        let policy = self.policy();
        let mut discarded = 0;
        for snapshot in snapshots {
            match policy.remove(snapshot, Operation::Rollback) {
                Ok(()) => discarded += 1,
                Err(error) => {
                    tracing::warn!(path = %snapshot.display(), code = %error.code, "Failed to remove conflict snapshot");
                    let error = DeployError::new(DeployErrorCode::RollbackFailed, error.message)
                        .with_context("path", snapshot.display().to_string());
                    run.result.errors.push(ErrorEntry::new(&error, None));
                }
            }
        }

        let context = ErrorContext::new(Operation::Rollback).with_path(root);
        match store.rollback(record, root, run.options.encryption_key.as_deref()) {
            Ok(report) => {
                for error in &report.errors {
                    let error = DeployError::new(DeployErrorCode::RollbackFailed, &error.message)
                        .with_context("cause", error.code.as_str());
                    run.result.errors.push(ErrorEntry::new(&error, None));
                }
                run.emit(
                    run.event(AuditEventKind::RollbackCompleted)
                        .with("backupId", &record.id)
                        .with("restored", report.restored_files.len())
                        .with("removed", report.removed_files.len())
                        .with("snapshots", discarded),
                );
            }
            Err(e) => {
                let cause = e.into_deploy_error(&context);
                let error = DeployError::new(DeployErrorCode::RollbackFailed, cause.message)
                    .with_context("cause", cause.code.as_str());
                run.result.errors.push(ErrorEntry::new(&error, None));
            }
        }
    }
}

/// A failed write of `file` stops the session unless every component it
/// carries allows best-effort continuation.
fn halts_on_failure(file: &RenderedFile, options: &DeploymentOptions) -> bool {
    file.components
        .iter()
        .any(|key| !options.continues_after_failure(key.kind))
}

#[derive(Debug)]
enum WriteOutcome {
    /// Written, or would be written in a dry run, with any sibling snapshot
    Applied(ConflictDecision, Option<PathBuf>),
    /// Left alone by `skip` or deferred by `prompt`
    Untouched(ConflictDecision),
    /// Not reached because an earlier failure halted the session
    NotAttempted,
    Failed(DeployError),
}

/// Per-deployment state threaded through the stages.
struct Run<'a> {
    deployer: &'a Deployer,
    options: &'a DeploymentOptions,
    session: DeploymentSession,
    result: DeploymentResult,
}

impl<'a> Run<'a> {
    fn new(deployer: &'a Deployer, options: &'a DeploymentOptions, session: DeploymentSession) -> Self {
        let mut result = DeploymentResult::new(session.id.clone(), options.platform);
        result.simulated = options.dry_run;
        Self {
            deployer,
            options,
            session,
            result,
        }
    }

    fn event(&self, kind: AuditEventKind) -> AuditEvent {
        AuditEvent::new(kind, self.session.id.clone(), self.options.platform)
    }

    fn emit(&self, event: AuditEvent) {
        self.deployer.audit.emit(event);
    }

    fn transition(&mut self, next: SessionState) -> Result<()> {
        let from = self.session.state;
        self.session.transition(next)?;
        self.emit(
            self.event(AuditEventKind::StateChanged)
                .with("from", from)
                .with("to", next),
        );
        Ok(())
    }

    fn record(
        &mut self,
        component: ComponentKey,
        status: ComponentStatus,
        files: Vec<String>,
        error: Option<DeployError>,
    ) {
        self.session.record(ComponentResult {
            component,
            status,
            files,
            error,
        });
    }

    fn fail(&mut self, error: DeployError) -> Result<()> {
        tracing::error!(code = %error.code, message = %error.message, "Deployment failed");
        self.result.errors.push(ErrorEntry::new(&error, None));
        self.transition(SessionState::Failed)
    }

    fn finish(mut self) -> DeploymentResult {
        let rolled_back = self.session.states().contains(&SessionState::RollingBack);
        for outcome in &self.session.component_results {
            let key = outcome.component.clone();
            match outcome.status {
                ComponentStatus::Deployed if !rolled_back => {
                    self.result.deployed_components.push(key)
                }
                ComponentStatus::Deployed => {}
                ComponentStatus::Failed => self.result.failed_components.push(key),
                ComponentStatus::Skipped
                | ComponentStatus::Quarantined
                | ComponentStatus::Unsupported
                | ComponentStatus::Pending => self.result.skipped_components.push(key),
            }
        }
        self.result.state = self.session.state;
        self.result.states = self.session.states();

        let kind = if self.result.success {
            AuditEventKind::SessionCompleted
        } else {
            AuditEventKind::SessionFailed
        };
        self.emit(
            self.event(kind)
                .with("state", self.session.state)
                .with("errors", self.result.errors.len()),
        );
        tracing::info!(
            success = self.result.success,
            state = %self.session.state,
            deployed = self.result.deployed_components.len(),
            skipped = self.result.skipped_components.len(),
            failed = self.result.failed_components.len(),
            files = self.result.summary.files_deployed,
            "Deployment finished"
        );
        self.result
    }
}
