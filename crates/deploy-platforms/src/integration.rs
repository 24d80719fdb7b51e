//! PlatformIntegration trait and rendered output types

use deploy_meta::{
    AgentComponent, Component, ComponentKey, ComponentKind, HookComponent, Platform,
    PromptComponent, TemplateComponent,
};
use serde_json::Value;

use crate::error::Result;

/// Format of a platform configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Markdown,
}

/// Describes where a platform keeps one kind of configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    /// Path relative to the workspace root (e.g. `.vscode/settings.json`)
    pub path: String,
    pub format: ConfigFormat,
    /// Whether this is a directory holding one file per component
    pub is_directory: bool,
    pub kind: ComponentKind,
}

impl ConfigLocation {
    pub fn file(kind: ComponentKind, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: ConfigFormat::Json,
            is_directory: false,
            kind,
        }
    }

    pub fn directory(kind: ComponentKind, path: impl Into<String>, format: ConfigFormat) -> Self {
        Self {
            path: path.into(),
            format,
            is_directory: true,
            kind,
        }
    }
}

/// Content of a rendered file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    /// Structured content; mergeable with an existing JSON file
    Json(Value),
    /// Opaque text (Markdown documents, rules)
    Text(String),
}

impl FileContent {
    /// Serialized bytes as written to disk.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Json(value) => {
                let mut bytes = serde_json::to_vec_pretty(value)?;
                bytes.push(b'\n');
                Ok(bytes)
            }
            Self::Text(text) => Ok(text.as_bytes().to_vec()),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

/// One file a deployment will write, and the components it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFile {
    /// Path relative to the workspace root, `/`-separated
    pub path: String,
    pub content: FileContent,
    pub components: Vec<ComponentKey>,
}

impl RenderedFile {
    pub fn json(path: impl Into<String>, value: Value, components: Vec<ComponentKey>) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Json(value),
            components,
        }
    }

    pub fn text(path: impl Into<String>, text: impl Into<String>, component: ComponentKey) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Text(text.into()),
            components: vec![component],
        }
    }

    /// The most destructive kind among the carried components.
    pub fn is_destructive(&self) -> bool {
        self.components.iter().any(|key| key.kind.is_destructive())
    }
}

/// A target IDE layout.
pub trait PlatformIntegration: Send + Sync {
    fn platform(&self) -> Platform;

    /// Where each supported kind lands.
    fn config_locations(&self) -> Vec<ConfigLocation>;

    /// Render all components of one kind into files.
    ///
    /// Returns [`crate::Error::UnsupportedKind`] for kinds outside
    /// [`Platform::supported_kinds`].
    fn render(&self, kind: ComponentKind, components: &[Component<'_>]) -> Result<Vec<RenderedFile>>;

    fn supports(&self, kind: ComponentKind) -> bool {
        self.platform().supports(kind)
    }
}

pub(crate) fn unsupported(platform: Platform, kind: ComponentKind) -> crate::Error {
    crate::Error::UnsupportedKind {
        platform: platform.id().to_string(),
        kind: kind.as_str().to_string(),
    }
}

pub(crate) fn prompts<'a>(
    components: &'a [Component<'a>],
) -> impl Iterator<Item = &'a PromptComponent> {
    components.iter().filter_map(|c| match c {
        Component::Prompt(p) => Some(*p),
        _ => None,
    })
}

pub(crate) fn agents<'a>(components: &'a [Component<'a>]) -> impl Iterator<Item = &'a AgentComponent> {
    components.iter().filter_map(|c| match c {
        Component::Agent(a) => Some(*a),
        _ => None,
    })
}

pub(crate) fn hooks<'a>(components: &'a [Component<'a>]) -> impl Iterator<Item = &'a HookComponent> {
    components.iter().filter_map(|c| match c {
        Component::Hook(h) => Some(*h),
        _ => None,
    })
}

pub(crate) fn templates<'a>(
    components: &'a [Component<'a>],
) -> impl Iterator<Item = &'a TemplateComponent> {
    components.iter().filter_map(|c| match c {
        Component::Template(t) => Some(*t),
        _ => None,
    })
}
