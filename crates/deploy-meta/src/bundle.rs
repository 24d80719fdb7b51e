//! The neutral configuration bundle exchange format.

use std::collections::BTreeSet;

use deploy_fs::{ConfigStore, NormalizedPath};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::component::{
    AgentComponent, Component, ComponentKey, ComponentKind, ExtensionComponent, Extra,
    HookComponent, LaunchComponent, PromptComponent, SettingsComponent, SnippetComponent,
    TaskComponent, TemplateComponent,
};
use crate::{Error, Result};

/// A set of AI-assistant configuration components plus metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationBundle {
    pub metadata: BundleMetadata,
    #[serde(default)]
    pub components: BundleComponents,
}

/// Bundle metadata.
///
/// Platforms are kept as raw strings so an unknown platform surfaces as a
/// validation error rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    /// Exchange-format version (semver); majors above 1 are not read
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_platform: Option<String>,
    #[serde(default)]
    pub target_platforms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Default for BundleMetadata {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            source_platform: None,
            target_platforms: Vec::new(),
            name: None,
            description: None,
            extra: Extra::new(),
        }
    }
}

/// Components grouped by kind.
///
/// Sections with keys that are not component kinds are kept in
/// `unrecognized` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleComponents {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub settings: Vec<SettingsComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<ExtensionComponent>,
    #[serde(rename = "ai-prompts", default, skip_serializing_if = "Vec::is_empty")]
    pub ai_prompts: Vec<PromptComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub launch: Vec<LaunchComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snippets: Vec<SnippetComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<HookComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TemplateComponent>,
    #[serde(flatten)]
    pub unrecognized: Extra,
}

/// A component together with its position inside its kind's section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentEntry<'a> {
    pub index: usize,
    pub component: Component<'a>,
}

impl ComponentEntry<'_> {
    pub fn key(&self) -> ComponentKey {
        self.component.key()
    }

    /// Location used in validation messages, e.g. `components.tasks[2]`.
    pub fn location(&self) -> String {
        format!("components.{}[{}]", self.component.kind(), self.index)
    }
}

impl BundleComponents {
    /// Components of a single kind, in bundle order.
    pub fn of_kind(&self, kind: ComponentKind) -> Vec<ComponentEntry<'_>> {
        fn wrap<'a, T>(
            items: &'a [T],
            f: impl Fn(&'a T) -> Component<'a>,
        ) -> Vec<ComponentEntry<'a>> {
            items
                .iter()
                .enumerate()
                .map(|(index, item)| ComponentEntry {
                    index,
                    component: f(item),
                })
                .collect()
        }

        match kind {
            ComponentKind::Settings => wrap(&self.settings, Component::Settings),
            ComponentKind::Extensions => wrap(&self.extensions, Component::Extension),
            ComponentKind::AiPrompts => wrap(&self.ai_prompts, Component::Prompt),
            ComponentKind::Tasks => wrap(&self.tasks, Component::Task),
            ComponentKind::Launch => wrap(&self.launch, Component::Launch),
            ComponentKind::Snippets => wrap(&self.snippets, Component::Snippet),
            ComponentKind::Hooks => wrap(&self.hooks, Component::Hook),
            ComponentKind::Agents => wrap(&self.agents, Component::Agent),
            ComponentKind::Templates => wrap(&self.templates, Component::Template),
        }
    }

    /// Every component in canonical kind order, then bundle order.
    pub fn entries(&self) -> Vec<ComponentEntry<'_>> {
        ComponentKind::ALL
            .into_iter()
            .flat_map(|kind| self.of_kind(kind))
            .collect()
    }

    pub fn count(&self, kind: ComponentKind) -> usize {
        match kind {
            ComponentKind::Settings => self.settings.len(),
            ComponentKind::Extensions => self.extensions.len(),
            ComponentKind::AiPrompts => self.ai_prompts.len(),
            ComponentKind::Tasks => self.tasks.len(),
            ComponentKind::Launch => self.launch.len(),
            ComponentKind::Snippets => self.snippets.len(),
            ComponentKind::Hooks => self.hooks.len(),
            ComponentKind::Agents => self.agents.len(),
            ComponentKind::Templates => self.templates.len(),
        }
    }

    /// Kinds with at least one component.
    pub fn present_kinds(&self) -> Vec<ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(|kind| self.count(*kind) > 0)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.present_kinds().is_empty()
    }

    pub fn total(&self) -> usize {
        ComponentKind::ALL.into_iter().map(|k| self.count(k)).sum()
    }

    /// Keep only components whose key satisfies `keep`.
    pub fn retain(&mut self, keep: impl Fn(&ComponentKey) -> bool) {
        fn filter<T>(
            items: &mut Vec<T>,
            kind: ComponentKind,
            id: impl Fn(&T) -> &str,
            keep: &dyn Fn(&ComponentKey) -> bool,
        ) {
            items.retain(|item| keep(&ComponentKey::new(kind, id(item))));
        }

        filter(&mut self.settings, ComponentKind::Settings, |c| c.id.as_str(), &keep);
        filter(&mut self.extensions, ComponentKind::Extensions, |c| c.id.as_str(), &keep);
        filter(&mut self.ai_prompts, ComponentKind::AiPrompts, |c| c.id.as_str(), &keep);
        filter(&mut self.tasks, ComponentKind::Tasks, |c| c.id.as_str(), &keep);
        filter(&mut self.launch, ComponentKind::Launch, |c| c.id.as_str(), &keep);
        filter(&mut self.snippets, ComponentKind::Snippets, |c| c.id.as_str(), &keep);
        filter(&mut self.hooks, ComponentKind::Hooks, |c| c.id.as_str(), &keep);
        filter(&mut self.agents, ComponentKind::Agents, |c| c.id.as_str(), &keep);
        filter(&mut self.templates, ComponentKind::Templates, |c| c.id.as_str(), &keep);
    }

    /// Component keys that occur more than once within their kind.
    pub fn duplicate_keys(&self) -> Vec<ComponentKey> {
        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for entry in self.entries() {
            let key = entry.key();
            if !seen.insert(key.clone()) {
                duplicates.insert(key);
            }
        }
        duplicates.into_iter().collect()
    }
}

impl ConfigurationBundle {
    /// Parse a bundle from exchange-format JSON.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::InvalidBundle {
            message: e.to_string(),
        })
    }

    /// Build a bundle from an already-parsed JSON document.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::InvalidBundle {
            message: e.to_string(),
        })
    }

    /// Load a bundle file. The format follows the file extension.
    pub fn load(path: &NormalizedPath) -> Result<Self> {
        let bundle = ConfigStore::new().load(path)?;
        tracing::debug!(path = %path, "Loaded configuration bundle");
        Ok(bundle)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidBundle {
            message: e.to_string(),
        })
    }
}
