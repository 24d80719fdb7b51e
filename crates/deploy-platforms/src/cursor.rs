//! Cursor layout.
//!
//! Settings go to `.cursor/settings.json` and prompts become project rules
//! under `.cursor/rules/`. Everything else uses the `.vscode/` files Cursor
//! reads unchanged.

use deploy_meta::{Component, ComponentKey, ComponentKind, Platform, PromptComponent};
use serde_json::Value;

use crate::error::Result;
use crate::integration::{
    ConfigFormat, ConfigLocation, PlatformIntegration, RenderedFile, prompts, unsupported,
};
use crate::markdown::FrontMatter;
use crate::vscode::{render_settings, render_shared, shared_locations};

#[derive(Debug, Default)]
pub struct CursorIntegration;

impl CursorIntegration {
    pub fn new() -> Self {
        Self
    }

    /// A rule applies everywhere unless it is scoped by globs or marked
    /// otherwise in the bundle.
    fn rule(prompt: &PromptComponent) -> Result<String> {
        let globs = prompt.extra.get("globs");
        let always_apply = prompt
            .extra
            .get("alwaysApply")
            .and_then(Value::as_bool)
            .unwrap_or(globs.is_none());
        FrontMatter::new()
            .optional("description", prompt.description.as_deref())
            .passthrough("globs", globs)?
            .field("alwaysApply", always_apply)
            .render(&prompt.content)
    }
}

impl PlatformIntegration for CursorIntegration {
    fn platform(&self) -> Platform {
        Platform::Cursor
    }

    fn config_locations(&self) -> Vec<ConfigLocation> {
        let mut locations = vec![
            ConfigLocation::file(ComponentKind::Settings, ".cursor/settings.json"),
            ConfigLocation::directory(
                ComponentKind::AiPrompts,
                ".cursor/rules",
                ConfigFormat::Markdown,
            ),
        ];
        locations.extend(shared_locations());
        locations
    }

    fn render(&self, kind: ComponentKind, components: &[Component<'_>]) -> Result<Vec<RenderedFile>> {
        match kind {
            ComponentKind::Settings => Ok(vec![render_settings(".cursor/settings.json", components)]),
            ComponentKind::AiPrompts => prompts(components)
                .map(|prompt| -> Result<RenderedFile> {
                    Ok(RenderedFile::text(
                        format!(".cursor/rules/{}.mdc", prompt.id),
                        Self::rule(prompt)?,
                        ComponentKey::new(kind, &prompt.id),
                    ))
                })
                .collect(),
            ComponentKind::Extensions
            | ComponentKind::Tasks
            | ComponentKind::Launch
            | ComponentKind::Snippets => render_shared(kind, components),
            _ => Err(unsupported(Platform::Cursor, kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileContent;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn prompt(raw: Value) -> PromptComponent {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn unscoped_rule_always_applies() {
        let p = prompt(json!({"id": "style", "description": "House style", "content": "Use tabs."}));
        let files = CursorIntegration::new()
            .render(ComponentKind::AiPrompts, &[Component::Prompt(&p)])
            .unwrap();
        assert_eq!(files[0].path, ".cursor/rules/style.mdc");
        assert_eq!(
            files[0].content,
            FileContent::Text(
                "---\ndescription: House style\nalwaysApply: true\n---\n\nUse tabs.\n".into()
            )
        );
    }

    #[test]
    fn globbed_rule_is_scoped() {
        let p = prompt(json!({"id": "rust", "content": "Prefer ?", "globs": "**/*.rs"}));
        let files = CursorIntegration::new()
            .render(ComponentKind::AiPrompts, &[Component::Prompt(&p)])
            .unwrap();
        let FileContent::Text(text) = &files[0].content else {
            panic!("expected text");
        };
        assert!(text.contains("globs:"));
        assert!(text.contains("**/*.rs"));
        assert!(text.contains("alwaysApply: false"));
    }

    #[test]
    fn tasks_land_in_vscode_dir() {
        let task: deploy_meta::TaskComponent =
            serde_json::from_value(json!({"id": "lint", "command": "npm run lint"})).unwrap();
        let files = CursorIntegration::new()
            .render(ComponentKind::Tasks, &[Component::Task(&task)])
            .unwrap();
        assert_eq!(files[0].path, ".vscode/tasks.json");
    }
}
