//! Platform lookup and whole-bundle rendering

use std::collections::BTreeMap;

use deploy_meta::{BundleComponents, Component, ComponentKey, ComponentKind, Platform};

use crate::claude::ClaudeIntegration;
use crate::cursor::CursorIntegration;
use crate::error::Result;
use crate::integration::{FileContent, PlatformIntegration, RenderedFile};
use crate::kiro::KiroIntegration;
use crate::merge::deep_merge;
use crate::vscode::VsCodeIntegration;
use crate::windsurf::WindsurfIntegration;

/// The built-in layout for `platform`.
pub fn integration_for(platform: Platform) -> Box<dyn PlatformIntegration> {
    match platform {
        Platform::VsCode => Box::new(VsCodeIntegration::new()),
        Platform::Cursor => Box::new(CursorIntegration::new()),
        Platform::Windsurf => Box::new(WindsurfIntegration::new()),
        Platform::ClaudeCode => Box::new(ClaudeIntegration::new()),
        Platform::Kiro => Box::new(KiroIntegration::new()),
    }
}

/// Every file a bundle renders to on one platform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPlan {
    /// One entry per target path, sorted by path
    pub files: Vec<RenderedFile>,
    /// Components the platform cannot receive
    pub unsupported: Vec<ComponentKey>,
    pub warnings: Vec<String>,
}

impl RenderPlan {
    /// Files carrying `key`.
    pub fn files_for(&self, key: &ComponentKey) -> Vec<&RenderedFile> {
        self.files
            .iter()
            .filter(|f| f.components.contains(key))
            .collect()
    }

    /// Keys of every component that renders to at least one file.
    pub fn rendered_components(&self) -> Vec<ComponentKey> {
        let mut keys: Vec<ComponentKey> = self
            .files
            .iter()
            .flat_map(|f| f.components.iter().cloned())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Render the admitted components of a bundle.
///
/// Kinds the platform does not support are skipped with a warning. Files
/// that several kinds render to the same path are deep-merged into a single
/// write.
pub fn render_bundle(
    integration: &dyn PlatformIntegration,
    components: &BundleComponents,
    admit: impl Fn(&ComponentKey) -> bool,
) -> Result<RenderPlan> {
    let platform = integration.platform();
    let mut plan = RenderPlan::default();
    let mut by_path: BTreeMap<String, RenderedFile> = BTreeMap::new();

    for kind in ComponentKind::ALL {
        let selected: Vec<Component<'_>> = components
            .of_kind(kind)
            .into_iter()
            .map(|entry| entry.component)
            .filter(|component| admit(&component.key()))
            .collect();
        if selected.is_empty() {
            continue;
        }

        if !integration.supports(kind) {
            plan.warnings.push(format!(
                "{} does not support {} components; skipped {}",
                platform.display_name(),
                kind,
                selected.len()
            ));
            plan.unsupported.extend(selected.iter().map(Component::key));
            continue;
        }

        for file in integration.render(kind, &selected)? {
            match by_path.get_mut(&file.path) {
                Some(existing) => combine(existing, file, &mut plan.warnings),
                None => {
                    by_path.insert(file.path.clone(), file);
                }
            }
        }
    }

    plan.files = by_path.into_values().collect();
    tracing::debug!(
        platform = %platform,
        files = plan.files.len(),
        unsupported = plan.unsupported.len(),
        "Rendered bundle"
    );
    Ok(plan)
}

fn combine(existing: &mut RenderedFile, incoming: RenderedFile, warnings: &mut Vec<String>) {
    match (&mut existing.content, incoming.content) {
        (FileContent::Json(base), FileContent::Json(value)) => deep_merge(base, &value),
        (slot, content) => {
            warnings.push(format!(
                "{} is rendered more than once; the last rendering wins",
                incoming.path
            ));
            *slot = content;
        }
    }
    for key in incoming.components {
        if !existing.components.contains(&key) {
            existing.components.push(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_meta::ConfigurationBundle;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn bundle() -> ConfigurationBundle {
        ConfigurationBundle::from_value(json!({
            "metadata": {"version": "1.0.0", "targetPlatforms": ["claude-code", "vscode"]},
            "components": {
                "settings": [{"id": "perm", "values": {"permissions": {"allow": ["Bash(ls)"]}}}],
                "hooks": [{"id": "fmt", "event": "PostToolUse", "command": "cargo fmt"}],
                "tasks": [{"id": "build", "command": "cargo build"}]
            }
        }))
        .unwrap()
    }

    #[test]
    fn settings_and_hooks_merge_into_one_file() {
        let bundle = bundle();
        let plan = render_bundle(
            integration_for(Platform::ClaudeCode).as_ref(),
            &bundle.components,
            |_| true,
        )
        .unwrap();

        assert_eq!(plan.files.len(), 1);
        let file = &plan.files[0];
        assert_eq!(file.path, ".claude/settings.json");
        let FileContent::Json(value) = &file.content else {
            panic!("expected JSON");
        };
        assert_eq!(value["permissions"]["allow"], json!(["Bash(ls)"]));
        assert_eq!(value["hooks"]["PostToolUse"][0]["hooks"][0]["command"], "cargo fmt");
        assert_eq!(file.components.len(), 2);
    }

    #[test]
    fn unsupported_kinds_are_reported() {
        let bundle = bundle();
        let plan = render_bundle(
            integration_for(Platform::ClaudeCode).as_ref(),
            &bundle.components,
            |_| true,
        )
        .unwrap();
        assert_eq!(
            plan.unsupported,
            vec![ComponentKey::new(ComponentKind::Tasks, "build")]
        );
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn admit_filters_components() {
        let bundle = bundle();
        let plan = render_bundle(
            integration_for(Platform::VsCode).as_ref(),
            &bundle.components,
            |key| key.kind != ComponentKind::Settings,
        )
        .unwrap();
        let paths: Vec<&str> = plan.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec![".vscode/tasks.json"]);
        assert_eq!(plan.unsupported.len(), 1);
    }

    #[test]
    fn every_platform_renders_its_own_id() {
        for platform in Platform::ALL {
            assert_eq!(integration_for(platform).platform(), platform);
        }
    }
}
