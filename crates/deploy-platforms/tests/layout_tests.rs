//! Cross-platform layout checks

use deploy_meta::{ComponentKind, ConfigurationBundle, Platform};
use deploy_platforms::{FileContent, integration_for, render_bundle};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

fn full_bundle() -> ConfigurationBundle {
    ConfigurationBundle::from_value(json!({
        "metadata": {"version": "1.0.0"},
        "components": {
            "settings": [
                {"id": "editor", "values": {"editor.tabSize": 2}},
                {"id": "format", "values": {"editor.formatOnSave": true}}
            ],
            "extensions": [{"id": "rust-lang.rust-analyzer"}],
            "ai-prompts": [{"id": "review", "content": "Review the diff."}],
            "tasks": [{"id": "build", "command": "cargo build"}],
            "launch": [{"id": "debug", "type": "lldb", "request": "launch", "program": "target/debug/app"}],
            "snippets": [{"id": "test", "language": "rust", "prefix": "tst", "body": ["#[test]", "fn $1() {}"]}],
            "hooks": [{"id": "fmt", "event": "PostToolUse", "command": "cargo fmt"}],
            "agents": [{"id": "reviewer", "instructions": "Review code."}],
            "templates": [{"id": "adr", "content": "# ADR"}]
        }
    }))
    .unwrap()
}

#[rstest]
#[case(Platform::VsCode)]
#[case(Platform::Cursor)]
#[case(Platform::Windsurf)]
#[case(Platform::ClaudeCode)]
#[case(Platform::Kiro)]
fn locations_cover_supported_kinds(#[case] platform: Platform) {
    let integration = integration_for(platform);
    let located: Vec<ComponentKind> = integration
        .config_locations()
        .iter()
        .map(|location| location.kind)
        .collect();
    for kind in platform.supported_kinds() {
        assert!(located.contains(kind), "{platform} has no location for {kind}");
    }
}

#[rstest]
#[case(Platform::VsCode, 3)]
#[case(Platform::Cursor, 3)]
#[case(Platform::Windsurf, 3)]
#[case(Platform::ClaudeCode, 5)]
#[case(Platform::Kiro, 4)]
fn unsupported_counts(#[case] platform: Platform, #[case] expected: usize) {
    let bundle = full_bundle();
    let plan = render_bundle(integration_for(platform).as_ref(), &bundle.components, |_| true)
        .unwrap();
    assert_eq!(plan.unsupported.len(), expected);
}

#[rstest]
#[case(Platform::VsCode, ".vscode/settings.json")]
#[case(Platform::Cursor, ".cursor/settings.json")]
#[case(Platform::Windsurf, ".windsurf/settings.json")]
#[case(Platform::ClaudeCode, ".claude/settings.json")]
#[case(Platform::Kiro, ".kiro/settings/settings.json")]
fn settings_components_merge(#[case] platform: Platform, #[case] path: &str) {
    let bundle = full_bundle();
    let plan = render_bundle(integration_for(platform).as_ref(), &bundle.components, |_| true)
        .unwrap();
    let file = plan
        .files
        .iter()
        .find(|f| f.path == path)
        .expect("settings file rendered");
    let FileContent::Json(value) = &file.content else {
        panic!("settings must be JSON");
    };
    assert_eq!(value["editor.tabSize"], 2);
    assert_eq!(value["editor.formatOnSave"], true);
}

#[test]
fn paths_are_unique_and_relative() {
    let bundle = full_bundle();
    for platform in Platform::ALL {
        let plan = render_bundle(integration_for(platform).as_ref(), &bundle.components, |_| true)
            .unwrap();
        let mut paths: Vec<&str> = plan.files.iter().map(|f| f.path.as_str()).collect();
        let total = paths.len();
        paths.dedup();
        assert_eq!(paths.len(), total);
        assert!(paths.iter().all(|p| !p.starts_with('/') && !p.contains("..")));
    }
}

#[test]
fn vscode_snippets_group_by_language() {
    let bundle = full_bundle();
    let plan = render_bundle(
        integration_for(Platform::VsCode).as_ref(),
        &bundle.components,
        |_| true,
    )
    .unwrap();
    let snippets = plan
        .files
        .iter()
        .find(|f| f.path == ".vscode/rust.code-snippets")
        .expect("snippet file");
    assert_eq!(
        snippets.content,
        FileContent::Json(json!({
            "test": {"prefix": "tst", "body": ["#[test]", "fn $1() {}"], "scope": "rust"}
        }))
    );
}
