//! Component kinds and their typed shapes.
//!
//! Every component kind has a closed struct. Keys the struct does not know
//! about land in its `extra` bag and are written back verbatim, so
//! platform-specific fields survive a round trip.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Unrecognized fields preserved verbatim.
pub type Extra = BTreeMap<String, Value>;

/// The closed set of component kinds a bundle may carry.
///
/// Declaration order is the canonical processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    Settings,
    Extensions,
    AiPrompts,
    Tasks,
    Launch,
    Snippets,
    Hooks,
    Agents,
    Templates,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 9] = [
        ComponentKind::Settings,
        ComponentKind::Extensions,
        ComponentKind::AiPrompts,
        ComponentKind::Tasks,
        ComponentKind::Launch,
        ComponentKind::Snippets,
        ComponentKind::Hooks,
        ComponentKind::Agents,
        ComponentKind::Templates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::Extensions => "extensions",
            Self::AiPrompts => "ai-prompts",
            Self::Tasks => "tasks",
            Self::Launch => "launch",
            Self::Snippets => "snippets",
            Self::Hooks => "hooks",
            Self::Agents => "agents",
            Self::Templates => "templates",
        }
    }

    /// Whether deploying this kind rewrites shared configuration files.
    ///
    /// Destructive kinds do not continue past a failed write by default;
    /// additive kinds (new standalone files) do.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::Settings | Self::Extensions | Self::Tasks | Self::Launch | Self::Hooks
        )
    }
}

impl FromStr for ComponentKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownComponentKind {
                kind: s.to_string(),
            })
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable component location, rendered as `kind/id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentKey {
    pub kind: ComponentKind,
    pub id: String,
}

impl ComponentKey {
    pub fn new(kind: ComponentKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Editor/IDE settings applied to the platform's settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsComponent {
    pub id: String,
    #[serde(default)]
    pub values: serde_json::Map<String, Value>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// An editor extension recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionComponent {
    /// `publisher.name`
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Where the extension comes from (`marketplace`, an URL, a `.vsix` path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A reusable AI prompt or rule document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptComponent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A task runner entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskComponent {
    /// Task label
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Automatic trigger (`default` or `folderOpen`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_on: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A launch/debug configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchComponent {
    /// Configuration name
    pub id: String,
    #[serde(rename = "type")]
    pub debugger_type: String,
    pub request: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_launch_task: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A code snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetComponent {
    pub id: String,
    /// Language scope; `None` means global
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub prefix: String,
    /// A string or an array of lines
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl SnippetComponent {
    /// Body lines, if the body is a string or an array of strings.
    pub fn body_lines(&self) -> Option<Vec<&str>> {
        match &self.body {
            Value::String(s) => Some(vec![s.as_str()]),
            Value::Array(items) => items.iter().map(Value::as_str).collect(),
            _ => None,
        }
    }
}

/// A lifecycle hook running a command on an agent event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookComponent {
    pub id: String,
    pub event: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A sub-agent definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentComponent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A document template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateComponent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

fn default_true() -> bool {
    true
}

/// A named piece of text inside a component, as seen by scanners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextField {
    pub field: String,
    pub text: String,
}

impl TextField {
    fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            text: text.into(),
        }
    }
}

/// A borrowed view over any component instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Component<'a> {
    Settings(&'a SettingsComponent),
    Extension(&'a ExtensionComponent),
    Prompt(&'a PromptComponent),
    Task(&'a TaskComponent),
    Launch(&'a LaunchComponent),
    Snippet(&'a SnippetComponent),
    Hook(&'a HookComponent),
    Agent(&'a AgentComponent),
    Template(&'a TemplateComponent),
}

impl<'a> Component<'a> {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Settings(_) => ComponentKind::Settings,
            Self::Extension(_) => ComponentKind::Extensions,
            Self::Prompt(_) => ComponentKind::AiPrompts,
            Self::Task(_) => ComponentKind::Tasks,
            Self::Launch(_) => ComponentKind::Launch,
            Self::Snippet(_) => ComponentKind::Snippets,
            Self::Hook(_) => ComponentKind::Hooks,
            Self::Agent(_) => ComponentKind::Agents,
            Self::Template(_) => ComponentKind::Templates,
        }
    }

    pub fn id(&self) -> &'a str {
        match self {
            Self::Settings(c) => &c.id,
            Self::Extension(c) => &c.id,
            Self::Prompt(c) => &c.id,
            Self::Task(c) => &c.id,
            Self::Launch(c) => &c.id,
            Self::Snippet(c) => &c.id,
            Self::Hook(c) => &c.id,
            Self::Agent(c) => &c.id,
            Self::Template(c) => &c.id,
        }
    }

    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(self.kind(), self.id())
    }

    pub fn extra(&self) -> &'a Extra {
        match self {
            Self::Settings(c) => &c.extra,
            Self::Extension(c) => &c.extra,
            Self::Prompt(c) => &c.extra,
            Self::Task(c) => &c.extra,
            Self::Launch(c) => &c.extra,
            Self::Snippet(c) => &c.extra,
            Self::Hook(c) => &c.extra,
            Self::Agent(c) => &c.extra,
            Self::Template(c) => &c.extra,
        }
    }

    /// Serialize the component back into its exchange-format value.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        match self {
            Self::Settings(c) => serde_json::to_value(c),
            Self::Extension(c) => serde_json::to_value(c),
            Self::Prompt(c) => serde_json::to_value(c),
            Self::Task(c) => serde_json::to_value(c),
            Self::Launch(c) => serde_json::to_value(c),
            Self::Snippet(c) => serde_json::to_value(c),
            Self::Hook(c) => serde_json::to_value(c),
            Self::Agent(c) => serde_json::to_value(c),
            Self::Template(c) => serde_json::to_value(c),
        }
    }

    /// Size of the serialized component in bytes.
    pub fn serialized_size(&self) -> usize {
        self.to_value()
            .ok()
            .and_then(|v| serde_json::to_vec(&v).ok())
            .map_or(0, |bytes| bytes.len())
    }

    /// All textual content of the component, keyed by field path.
    ///
    /// Includes string leaves of the `extra` bag so unknown keys are scanned
    /// as well.
    pub fn text_fields(&self) -> Vec<TextField> {
        let mut fields = vec![TextField::new("id", self.id())];
        match self {
            Self::Settings(c) => {
                for (key, value) in &c.values {
                    fields.push(TextField::new(format!("values.{key}"), key.clone()));
                    collect_strings(&format!("values.{key}"), value, &mut fields);
                }
            }
            Self::Extension(c) => {
                push_opt(&mut fields, "version", &c.version);
                push_opt(&mut fields, "source", &c.source);
            }
            Self::Prompt(c) => {
                push_opt(&mut fields, "name", &c.name);
                push_opt(&mut fields, "description", &c.description);
                fields.push(TextField::new("content", c.content.clone()));
            }
            Self::Task(c) => {
                fields.push(TextField::new("command", command_line(&c.command, &c.args)));
                push_opt(&mut fields, "cwd", &c.cwd);
                push_opt(&mut fields, "runOn", &c.run_on);
            }
            Self::Launch(c) => {
                fields.push(TextField::new("type", c.debugger_type.clone()));
                fields.push(TextField::new("request", c.request.clone()));
                push_opt(&mut fields, "program", &c.program);
                if !c.args.is_empty() {
                    fields.push(TextField::new("args", c.args.join(" ")));
                }
                push_opt(&mut fields, "cwd", &c.cwd);
                for (key, value) in &c.env {
                    fields.push(TextField::new(format!("env.{key}"), format!("{key}={value}")));
                }
                push_opt(&mut fields, "preLaunchTask", &c.pre_launch_task);
            }
            Self::Snippet(c) => {
                fields.push(TextField::new("prefix", c.prefix.clone()));
                collect_strings("body", &c.body, &mut fields);
                push_opt(&mut fields, "description", &c.description);
            }
            Self::Hook(c) => {
                fields.push(TextField::new("event", c.event.clone()));
                fields.push(TextField::new("command", c.command.clone()));
                push_opt(&mut fields, "matcher", &c.matcher);
            }
            Self::Agent(c) => {
                push_opt(&mut fields, "name", &c.name);
                push_opt(&mut fields, "description", &c.description);
                fields.push(TextField::new("instructions", c.instructions.clone()));
                if !c.tools.is_empty() {
                    fields.push(TextField::new("tools", c.tools.join(",")));
                }
            }
            Self::Template(c) => {
                push_opt(&mut fields, "name", &c.name);
                fields.push(TextField::new("content", c.content.clone()));
            }
        }
        for (key, value) in self.extra() {
            collect_strings(key, value, &mut fields);
        }
        fields
    }
}

fn push_opt(fields: &mut Vec<TextField>, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        fields.push(TextField::new(name, value.clone()));
    }
}

fn command_line(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, args.join(" "))
    }
}

fn collect_strings(prefix: &str, value: &Value, out: &mut Vec<TextField>) {
    match value {
        Value::String(s) => out.push(TextField::new(prefix, s.clone())),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_strings(&format!("{prefix}[{i}]"), item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                collect_strings(&format!("{prefix}.{key}"), item, out);
            }
        }
        _ => {}
    }
}
