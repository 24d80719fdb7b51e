//! Claude Code layout.
//!
//! Settings and hooks share `.claude/settings.json`; hooks are grouped under
//! the `hooks` key by event and matcher. Prompts become slash commands and
//! agents become sub-agent definitions.

use std::collections::BTreeMap;

use deploy_meta::{AgentComponent, Component, ComponentKey, ComponentKind, Platform};
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::integration::{
    ConfigFormat, ConfigLocation, PlatformIntegration, RenderedFile, agents, hooks, prompts,
    unsupported,
};
use crate::markdown::FrontMatter;
use crate::vscode::render_settings;

pub const SETTINGS_PATH: &str = ".claude/settings.json";

#[derive(Debug, Default)]
pub struct ClaudeIntegration;

impl ClaudeIntegration {
    pub fn new() -> Self {
        Self
    }

    fn render_hooks(components: &[Component<'_>]) -> RenderedFile {
        // event -> matcher -> hook commands
        let mut grouped: BTreeMap<&str, BTreeMap<&str, Vec<Value>>> = BTreeMap::new();
        let mut keys = Vec::new();
        for hook in hooks(components) {
            let mut command = Map::new();
            command.insert("type".into(), json!("command"));
            command.insert("command".into(), json!(hook.command));
            if let Some(timeout) = hook.timeout {
                command.insert("timeout".into(), json!(timeout));
            }
            grouped
                .entry(hook.event.as_str())
                .or_default()
                .entry(hook.matcher.as_deref().unwrap_or(""))
                .or_default()
                .push(Value::Object(command));
            keys.push(ComponentKey::new(ComponentKind::Hooks, &hook.id));
        }

        let mut events = Map::new();
        for (event, matchers) in grouped {
            let entries = matchers
                .into_iter()
                .map(|(matcher, commands)| {
                    if matcher.is_empty() {
                        json!({ "hooks": commands })
                    } else {
                        json!({ "matcher": matcher, "hooks": commands })
                    }
                })
                .collect();
            events.insert(event.to_string(), Value::Array(entries));
        }
        RenderedFile::json(SETTINGS_PATH, json!({ "hooks": events }), keys)
    }

    fn agent(agent: &AgentComponent) -> Result<String> {
        let tools = (!agent.tools.is_empty()).then(|| agent.tools.join(", "));
        FrontMatter::new()
            .field("name", agent.name.as_deref().unwrap_or(&agent.id))
            .optional("description", agent.description.as_deref())
            .optional("tools", tools.as_deref())
            .optional("model", agent.model.as_deref())
            .render(&agent.instructions)
    }
}

impl PlatformIntegration for ClaudeIntegration {
    fn platform(&self) -> Platform {
        Platform::ClaudeCode
    }

    fn config_locations(&self) -> Vec<ConfigLocation> {
        vec![
            ConfigLocation::file(ComponentKind::Settings, SETTINGS_PATH),
            ConfigLocation::file(ComponentKind::Hooks, SETTINGS_PATH),
            ConfigLocation::directory(
                ComponentKind::AiPrompts,
                ".claude/commands",
                ConfigFormat::Markdown,
            ),
            ConfigLocation::directory(
                ComponentKind::Agents,
                ".claude/agents",
                ConfigFormat::Markdown,
            ),
        ]
    }

    fn render(&self, kind: ComponentKind, components: &[Component<'_>]) -> Result<Vec<RenderedFile>> {
        match kind {
            ComponentKind::Settings => Ok(vec![render_settings(SETTINGS_PATH, components)]),
            ComponentKind::Hooks => Ok(vec![Self::render_hooks(components)]),
            ComponentKind::AiPrompts => prompts(components)
                .map(|prompt| -> Result<RenderedFile> {
                    let text = FrontMatter::new()
                        .optional("description", prompt.description.as_deref())
                        .passthrough("argument-hint", prompt.extra.get("argumentHint"))?
                        .passthrough("allowed-tools", prompt.extra.get("allowedTools"))?
                        .render(&prompt.content)?;
                    Ok(RenderedFile::text(
                        format!(".claude/commands/{}.md", prompt.id),
                        text,
                        ComponentKey::new(kind, &prompt.id),
                    ))
                })
                .collect(),
            ComponentKind::Agents => agents(components)
                .map(|agent| -> Result<RenderedFile> {
                    Ok(RenderedFile::text(
                        format!(".claude/agents/{}.md", agent.id),
                        Self::agent(agent)?,
                        ComponentKey::new(kind, &agent.id),
                    ))
                })
                .collect(),
            _ => Err(unsupported(Platform::ClaudeCode, kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileContent;
    use deploy_meta::HookComponent;
    use pretty_assertions::assert_eq;

    fn hook(raw: Value) -> HookComponent {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn hooks_group_by_event_and_matcher() {
        let fmt = hook(json!({"id": "fmt", "event": "PostToolUse", "matcher": "Edit", "command": "cargo fmt"}));
        let lint = hook(json!({"id": "lint", "event": "PostToolUse", "matcher": "Edit", "command": "cargo clippy", "timeout": 60}));
        let stop = hook(json!({"id": "notify", "event": "Stop", "command": "notify-send done"}));
        let files = ClaudeIntegration::new()
            .render(
                ComponentKind::Hooks,
                &[Component::Hook(&fmt), Component::Hook(&lint), Component::Hook(&stop)],
            )
            .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, SETTINGS_PATH);
        assert_eq!(
            files[0].content,
            FileContent::Json(json!({
                "hooks": {
                    "PostToolUse": [{
                        "matcher": "Edit",
                        "hooks": [
                            {"type": "command", "command": "cargo fmt"},
                            {"type": "command", "command": "cargo clippy", "timeout": 60}
                        ]
                    }],
                    "Stop": [{"hooks": [{"type": "command", "command": "notify-send done"}]}]
                }
            }))
        );
    }

    #[test]
    fn agents_render_with_front_matter() {
        let agent: AgentComponent = serde_json::from_value(json!({
            "id": "reviewer",
            "description": "Reviews diffs",
            "instructions": "You review code.",
            "tools": ["Read", "Grep"]
        }))
        .unwrap();
        let files = ClaudeIntegration::new()
            .render(ComponentKind::Agents, &[Component::Agent(&agent)])
            .unwrap();
        assert_eq!(files[0].path, ".claude/agents/reviewer.md");
        assert_eq!(
            files[0].content,
            FileContent::Text(
                "---\nname: reviewer\ndescription: Reviews diffs\ntools: Read, Grep\n---\n\nYou review code.\n"
                    .into()
            )
        );
    }

    #[test]
    fn launch_is_unsupported() {
        assert!(ClaudeIntegration::new().render(ComponentKind::Launch, &[]).is_err());
    }
}
