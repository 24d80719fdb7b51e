//! Windsurf layout.
//!
//! Settings go to `.windsurf/settings.json` and prompts become workspace
//! rules under `.windsurf/rules/`. The remaining kinds use `.vscode/`.

use deploy_meta::{Component, ComponentKey, ComponentKind, Platform, PromptComponent};
use serde_json::Value;

use crate::error::Result;
use crate::integration::{
    ConfigFormat, ConfigLocation, PlatformIntegration, RenderedFile, prompts, unsupported,
};
use crate::markdown::FrontMatter;
use crate::vscode::{render_settings, render_shared, shared_locations};

#[derive(Debug, Default)]
pub struct WindsurfIntegration;

impl WindsurfIntegration {
    pub fn new() -> Self {
        Self
    }

    fn rule(prompt: &PromptComponent) -> Result<String> {
        let trigger = match prompt.extra.get("trigger").and_then(Value::as_str) {
            Some(trigger) => trigger,
            None if prompt.extra.contains_key("globs") => "glob",
            None => "always_on",
        };
        FrontMatter::new()
            .field("trigger", trigger)
            .optional("description", prompt.description.as_deref())
            .passthrough("globs", prompt.extra.get("globs"))?
            .render(&prompt.content)
    }
}

impl PlatformIntegration for WindsurfIntegration {
    fn platform(&self) -> Platform {
        Platform::Windsurf
    }

    fn config_locations(&self) -> Vec<ConfigLocation> {
        let mut locations = vec![
            ConfigLocation::file(ComponentKind::Settings, ".windsurf/settings.json"),
            ConfigLocation::directory(
                ComponentKind::AiPrompts,
                ".windsurf/rules",
                ConfigFormat::Markdown,
            ),
        ];
        locations.extend(shared_locations());
        locations
    }

    fn render(&self, kind: ComponentKind, components: &[Component<'_>]) -> Result<Vec<RenderedFile>> {
        match kind {
            ComponentKind::Settings => {
                Ok(vec![render_settings(".windsurf/settings.json", components)])
            }
            ComponentKind::AiPrompts => prompts(components)
                .map(|prompt| -> Result<RenderedFile> {
                    Ok(RenderedFile::text(
                        format!(".windsurf/rules/{}.md", prompt.id),
                        Self::rule(prompt)?,
                        ComponentKey::new(kind, &prompt.id),
                    ))
                })
                .collect(),
            ComponentKind::Extensions
            | ComponentKind::Tasks
            | ComponentKind::Launch
            | ComponentKind::Snippets => render_shared(kind, components),
            _ => Err(unsupported(Platform::Windsurf, kind)),
        }
    }
}
