//! Configuration-driven deployments and the backup lifecycle around them

use std::io::ErrorKind;
use std::sync::Arc;

use deploy_core::{
    DeployErrorCode, Deployer, ResolvedAction, RestoreOptions, SessionState, ValidationEngine,
};
use deploy_meta::{
    ComponentKey, ComponentKind, ConflictStrategy, DeployConfig, DeploymentOptions, Platform,
};
use deploy_security::{SecurityScanner, TrustLevel};
use deploy_test_utils::bundles::{bundle_for, clean_editor_bundle};
use deploy_test_utils::{FailingFs, TestWorkspace};
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn config_options(ws: &TestWorkspace, config: &str) -> (DeployConfig, DeploymentOptions) {
    ws.write(".ai-deploy/config.toml", config);
    let config = DeployConfig::load(ws.root()).unwrap();
    let options = DeploymentOptions::from_config(Platform::VsCode, &config, ws.root())
        .unwrap()
        .with_trusted_path(ws.root());
    (config, options)
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn config_file_drives_strategy_and_retention() {
    let ws = TestWorkspace::new();
    ws.write(".vscode/settings.json", "{\"files.eol\": \"\\n\"}");
    let (_, options) = config_options(
        &ws,
        r#"
[backup]
dir = ".ai-deploy/backups"
max_backups = 2
compress = true

[deploy]
conflict_strategy = "merge"
workers = 2
"#,
    );
    assert_eq!(options.conflict_strategy, ConflictStrategy::Merge);

    let deployer = Deployer::new();
    for _ in 0..3 {
        let result = deployer
            .deploy(&clean_editor_bundle(), ws.root(), &options)
            .unwrap();
        assert!(result.success, "{:?}", result.errors);
    }

    let settings = ws.read_json(".vscode/settings.json");
    assert_eq!(settings["files.eol"], "\n");
    assert_eq!(settings["editor.tabSize"], 2);

    let records = deployer
        .backup_store(&options)
        .list(Platform::VsCode)
        .unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.compressed));
    assert!(ws.path(".ai-deploy/backups/vscode").is_dir());
}

#[test]
fn config_count_limits_fail_validation() {
    let ws = TestWorkspace::new();
    let (_, options) = config_options(
        &ws,
        r#"
[limits.max_counts]
ai-prompts = 0
"#,
    );

    let result = Deployer::new()
        .deploy(&clean_editor_bundle(), ws.root(), &options)
        .unwrap();

    assert!(!result.success);
    assert!(result.has_error(DeployErrorCode::CountLimitExceeded));
    assert_eq!(
        result.states,
        vec![SessionState::Pending, SessionState::Validating, SessionState::Failed]
    );
    assert!(
        result
            .validation
            .as_ref()
            .unwrap()
            .has_error(DeployErrorCode::CountLimitExceeded)
    );
    assert!(ws.files().is_empty());
}

#[test]
fn custom_rules_from_config_block_matching_components() {
    let ws = TestWorkspace::new();
    let (config, options) = config_options(
        &ws,
        r#"
[[security.custom_rules]]
id = "internal-host"
category = "sensitive_data"
pattern = 'corp\.internal'
kinds = ["ai-prompts"]
description = "Mentions an internal hostname"
"#,
    );
    let scanner = SecurityScanner::with_custom_rules(&config.security.custom_rules).unwrap();
    let bundle = bundle_for(
        &["vscode"],
        json!({
            "ai-prompts": [{
                "id": "deploy-notes",
                "content": "Artifacts are published to build.corp.internal nightly."
            }]
        }),
    );

    let result = Deployer::new()
        .with_scanner(scanner)
        .deploy(&bundle, ws.root(), &options)
        .unwrap();

    assert!(!result.success);
    assert!(result.has_error(DeployErrorCode::SecurityViolation));
    let scan = result.scan.as_ref().unwrap();
    assert!(scan.violations.iter().any(|v| v.rule_id == "internal-host"));
    assert!(scan.quarantined_components.contains("ai-prompts/deploy-notes"));
    assert!(ws.files().is_empty());
}

#[test]
fn untrusted_root_warns_but_deploys() {
    let ws = TestWorkspace::new();
    let options = DeploymentOptions::new(Platform::VsCode, ws.backup_dir());

    let result = Deployer::new()
        .deploy(&clean_editor_bundle(), ws.root(), &options)
        .unwrap();

    assert!(result.success, "{:?}", result.errors);
    let trust = result.scan.as_ref().unwrap().trust.as_ref().unwrap();
    assert_eq!(trust.level, TrustLevel::Untrusted);
    assert!(result.warnings.iter().any(|w| w.contains("untrusted")));
}

// =============================================================================
// Backup lifecycle
// =============================================================================

#[test]
fn encrypted_backup_rolls_back_a_failed_session() {
    let ws = TestWorkspace::new();
    let original = "{\"editor.tabSize\": 8}";
    ws.write(".vscode/settings.json", original);
    let options = ws
        .options(Platform::VsCode)
        .with_conflict_strategy(ConflictStrategy::Overwrite)
        .with_compression(true)
        .with_encryption_key("integration-secret")
        .with_workers(1);
    let deployer = Deployer::new().with_file_ops(Arc::new(FailingFs::always(
        ".vscode/tasks.json",
        ErrorKind::PermissionDenied,
    )));

    let result = deployer
        .deploy(&clean_editor_bundle(), ws.root(), &options)
        .unwrap();

    assert_eq!(result.state, SessionState::Failed);
    assert!(result.states.contains(&SessionState::RollingBack));
    assert_eq!(ws.read(".vscode/settings.json"), original);
    assert_eq!(ws.files(), vec![".vscode/settings.json"]);

    let store = deployer.backup_store(&options);
    let record = store
        .get(result.summary.backup_id.as_deref().unwrap())
        .unwrap();
    assert!(record.encrypted);
    assert!(
        predicate::str::ends_with(".enc").eval(&record.backup_path.to_string_lossy())
    );
    let without_key = store.restore(&record.id, ws.root(), &RestoreOptions::default());
    assert!(without_key.is_err());
}

#[test]
fn prompt_strategy_defers_then_overwrite_resolves() {
    let ws = TestWorkspace::new();
    ws.write(".vscode/settings.json", "{\"editor.tabSize\": 8}");
    let deployer = Deployer::new();

    let deferred = deployer
        .deploy(
            &clean_editor_bundle(),
            ws.root(),
            &ws.options(Platform::VsCode)
                .with_conflict_strategy(ConflictStrategy::Prompt),
        )
        .unwrap();

    assert!(deferred.success);
    assert_eq!(deferred.pending_decisions.len(), 1);
    assert_eq!(deferred.pending_decisions[0].path, ".vscode/settings.json");
    assert_eq!(
        deferred.pending_decisions[0].resolved_action,
        ResolvedAction::Pending
    );
    assert!(
        deferred
            .skipped_components
            .contains(&ComponentKey::new(ComponentKind::Settings, "editor"))
    );
    assert_eq!(ws.read_json(".vscode/settings.json")["editor.tabSize"], 8);

    let resolved = deployer
        .deploy(
            &clean_editor_bundle(),
            ws.root(),
            &ws.options(Platform::VsCode)
                .with_conflict_strategy(ConflictStrategy::Overwrite)
                .with_components(vec!["settings/editor".parse().unwrap()]),
        )
        .unwrap();

    assert!(resolved.success);
    assert!(resolved.pending_decisions.is_empty());
    assert_eq!(ws.read_json(".vscode/settings.json")["editor.tabSize"], 2);
}

#[test]
fn manual_restore_returns_to_the_pre_deployment_state() {
    let ws = TestWorkspace::new();
    ws.write(".vscode/settings.json", "{\"editor.tabSize\": 8}");
    let options = ws
        .options(Platform::VsCode)
        .with_conflict_strategy(ConflictStrategy::Overwrite);
    let deployer = Deployer::new();

    let result = deployer
        .deploy(&clean_editor_bundle(), ws.root(), &options)
        .unwrap();
    assert!(result.success);
    assert_eq!(ws.read_json(".vscode/settings.json")["editor.tabSize"], 2);

    let store = deployer.backup_store(&options);
    let record = store.latest(Platform::VsCode).unwrap().unwrap();
    assert_eq!(Some(record.id.clone()), result.summary.backup_id);

    let report = store
        .rollback(&record, ws.root(), None)
        .unwrap();
    assert!(report.success);
    assert_eq!(report.removed_files.len(), 3);
    assert_eq!(ws.files(), vec![".vscode/settings.json"]);
    assert_eq!(ws.read_json(".vscode/settings.json")["editor.tabSize"], 8);
}

// =============================================================================
// Raw documents
// =============================================================================

#[test]
fn malformed_documents_are_rejected_before_typing() {
    let ws = TestWorkspace::new();
    let document = json!({
        "metadata": {"version": 1, "targetPlatforms": "vscode"},
        "components": {}
    });

    let (result, bundle) = ValidationEngine::default()
        .validate_document(&document, Platform::VsCode, &ws.options(Platform::VsCode))
        .unwrap();

    assert!(bundle.is_none());
    assert!(!result.is_valid);
    assert!(result.has_error(DeployErrorCode::InvalidType));
}
