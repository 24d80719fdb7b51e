//! Kiro layout.
//!
//! Everything lives under `.kiro/`: steering documents for prompts, one
//! `.kiro.hook` JSON file per hook, agent and template documents.

use deploy_meta::{Component, ComponentKey, ComponentKind, HookComponent, Platform};
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::integration::{
    ConfigFormat, ConfigLocation, PlatformIntegration, RenderedFile, agents, hooks, prompts,
    templates, unsupported,
};
use crate::markdown::FrontMatter;
use crate::vscode::render_settings;

pub const SETTINGS_PATH: &str = ".kiro/settings/settings.json";

#[derive(Debug, Default)]
pub struct KiroIntegration;

impl KiroIntegration {
    pub fn new() -> Self {
        Self
    }

    fn hook(hook: &HookComponent) -> Value {
        let mut when = Map::new();
        when.insert("type".into(), json!(hook.event));
        if let Some(matcher) = &hook.matcher {
            when.insert("patterns".into(), json!([matcher]));
        }
        let mut doc = Map::new();
        doc.insert("enabled".into(), json!(true));
        doc.insert("name".into(), json!(hook.id));
        if let Some(description) = hook.extra.get("description") {
            doc.insert("description".into(), description.clone());
        }
        doc.insert("version".into(), json!("1"));
        doc.insert("when".into(), Value::Object(when));
        doc.insert(
            "then".into(),
            json!({ "type": "runCommand", "command": hook.command }),
        );
        Value::Object(doc)
    }
}

impl PlatformIntegration for KiroIntegration {
    fn platform(&self) -> Platform {
        Platform::Kiro
    }

    fn config_locations(&self) -> Vec<ConfigLocation> {
        vec![
            ConfigLocation::file(ComponentKind::Settings, SETTINGS_PATH),
            ConfigLocation::directory(ComponentKind::AiPrompts, ".kiro/steering", ConfigFormat::Markdown),
            ConfigLocation::directory(ComponentKind::Hooks, ".kiro/hooks", ConfigFormat::Json),
            ConfigLocation::directory(ComponentKind::Agents, ".kiro/agents", ConfigFormat::Markdown),
            ConfigLocation::directory(ComponentKind::Templates, ".kiro/templates", ConfigFormat::Markdown),
        ]
    }

    fn render(&self, kind: ComponentKind, components: &[Component<'_>]) -> Result<Vec<RenderedFile>> {
        match kind {
            ComponentKind::Settings => Ok(vec![render_settings(SETTINGS_PATH, components)]),
            ComponentKind::AiPrompts => prompts(components)
                .map(|prompt| -> Result<RenderedFile> {
                    let front = match prompt.extra.get("globs").and_then(Value::as_str) {
                        Some(pattern) => FrontMatter::new()
                            .field("inclusion", "fileMatch")
                            .field("fileMatchPattern", pattern),
                        None => FrontMatter::new().field("inclusion", "always"),
                    };
                    Ok(RenderedFile::text(
                        format!(".kiro/steering/{}.md", prompt.id),
                        front.render(&prompt.content)?,
                        ComponentKey::new(kind, &prompt.id),
                    ))
                })
                .collect(),
            ComponentKind::Hooks => Ok(hooks(components)
                .map(|hook| {
                    RenderedFile::json(
                        format!(".kiro/hooks/{}.kiro.hook", hook.id),
                        Self::hook(hook),
                        vec![ComponentKey::new(kind, &hook.id)],
                    )
                })
                .collect()),
            ComponentKind::Agents => agents(components)
                .map(|agent| -> Result<RenderedFile> {
                    let text = FrontMatter::new()
                        .field("name", agent.name.as_deref().unwrap_or(&agent.id))
                        .optional("description", agent.description.as_deref())
                        .optional("model", agent.model.as_deref())
                        .render(&agent.instructions)?;
                    Ok(RenderedFile::text(
                        format!(".kiro/agents/{}.md", agent.id),
                        text,
                        ComponentKey::new(kind, &agent.id),
                    ))
                })
                .collect(),
            ComponentKind::Templates => Ok(templates(components)
                .map(|template| {
                    RenderedFile::text(
                        format!(".kiro/templates/{}.md", template.id),
                        format!("{}\n", template.content.trim_end()),
                        ComponentKey::new(kind, &template.id),
                    )
                })
                .collect()),
            _ => Err(unsupported(Platform::Kiro, kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileContent;
    use pretty_assertions::assert_eq;

    #[test]
    fn hook_file_shape() {
        let hook: HookComponent = serde_json::from_value(json!({
            "id": "test-on-save", "event": "fileEdited", "matcher": "src/**/*.ts",
            "command": "npm test"
        }))
        .unwrap();
        let files = KiroIntegration::new()
            .render(ComponentKind::Hooks, &[Component::Hook(&hook)])
            .unwrap();
        assert_eq!(files[0].path, ".kiro/hooks/test-on-save.kiro.hook");
        assert_eq!(
            files[0].content,
            FileContent::Json(json!({
                "enabled": true,
                "name": "test-on-save",
                "version": "1",
                "when": {"type": "fileEdited", "patterns": ["src/**/*.ts"]},
                "then": {"type": "runCommand", "command": "npm test"}
            }))
        );
    }

    #[test]
    fn steering_defaults_to_always_included() {
        let prompt: deploy_meta::PromptComponent =
            serde_json::from_value(json!({"id": "tech", "content": "We use Rust."})).unwrap();
        let files = KiroIntegration::new()
            .render(ComponentKind::AiPrompts, &[Component::Prompt(&prompt)])
            .unwrap();
        assert_eq!(
            files[0].content,
            FileContent::Text("---\ninclusion: always\n---\n\nWe use Rust.\n".into())
        );
    }

    #[test]
    fn templates_are_written_verbatim() {
        let template: deploy_meta::TemplateComponent =
            serde_json::from_value(json!({"id": "adr", "content": "# ADR\n\n## Context\n"}))
                .unwrap();
        let files = KiroIntegration::new()
            .render(ComponentKind::Templates, &[Component::Template(&template)])
            .unwrap();
        assert_eq!(files[0].path, ".kiro/templates/adr.md");
        assert_eq!(files[0].content, FileContent::Text("# ADR\n\n## Context\n".into()));
    }
}
