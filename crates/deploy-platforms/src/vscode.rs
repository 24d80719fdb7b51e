//! VS Code layout.
//!
//! Settings, tasks, launch configurations, extension recommendations and
//! snippets live under `.vscode/`; prompts are Copilot prompt files under
//! `.github/prompts/`. Cursor and Windsurf reuse the `.vscode/` renderers
//! for every kind except settings and prompts.

use std::collections::BTreeMap;

use deploy_meta::{Component, ComponentKey, ComponentKind, Extra, Platform};
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::integration::{
    ConfigFormat, ConfigLocation, PlatformIntegration, RenderedFile, prompts, unsupported,
};
use crate::markdown::FrontMatter;

pub const TASKS_VERSION: &str = "2.0.0";
pub const LAUNCH_VERSION: &str = "0.2.0";

#[derive(Debug, Default)]
pub struct VsCodeIntegration;

impl VsCodeIntegration {
    pub fn new() -> Self {
        Self
    }
}

impl PlatformIntegration for VsCodeIntegration {
    fn platform(&self) -> Platform {
        Platform::VsCode
    }

    fn config_locations(&self) -> Vec<ConfigLocation> {
        let mut locations = vec![
            ConfigLocation::file(ComponentKind::Settings, ".vscode/settings.json"),
            ConfigLocation::directory(
                ComponentKind::AiPrompts,
                ".github/prompts",
                ConfigFormat::Markdown,
            ),
        ];
        locations.extend(shared_locations());
        locations
    }

    fn render(&self, kind: ComponentKind, components: &[Component<'_>]) -> Result<Vec<RenderedFile>> {
        match kind {
            ComponentKind::Settings => Ok(vec![render_settings(".vscode/settings.json", components)]),
            ComponentKind::AiPrompts => prompts(components)
                .map(|prompt| -> Result<RenderedFile> {
                    let text = FrontMatter::new()
                        .optional("description", prompt.description.as_deref())
                        .passthrough("mode", prompt.extra.get("mode"))?
                        .render(&prompt.content)?;
                    Ok(RenderedFile::text(
                        format!(".github/prompts/{}.prompt.md", prompt.id),
                        text,
                        ComponentKey::new(kind, &prompt.id),
                    ))
                })
                .collect(),
            ComponentKind::Extensions
            | ComponentKind::Tasks
            | ComponentKind::Launch
            | ComponentKind::Snippets => render_shared(kind, components),
            _ => Err(unsupported(Platform::VsCode, kind)),
        }
    }
}

/// `.vscode/` locations shared by the VS Code family.
pub(crate) fn shared_locations() -> Vec<ConfigLocation> {
    vec![
        ConfigLocation::file(ComponentKind::Extensions, ".vscode/extensions.json"),
        ConfigLocation::file(ComponentKind::Tasks, ".vscode/tasks.json"),
        ConfigLocation::file(ComponentKind::Launch, ".vscode/launch.json"),
        ConfigLocation::directory(ComponentKind::Snippets, ".vscode", ConfigFormat::Json),
    ]
}

/// Render one of the `.vscode/` kinds shared by the VS Code family.
pub(crate) fn render_shared(
    kind: ComponentKind,
    components: &[Component<'_>],
) -> Result<Vec<RenderedFile>> {
    let files = match kind {
        ComponentKind::Extensions => vec![render_extensions(components)],
        ComponentKind::Tasks => vec![render_tasks(components)],
        ComponentKind::Launch => vec![render_launch(components)],
        ComponentKind::Snippets => render_snippets(components),
        other => return Err(unsupported(Platform::VsCode, other)),
    };
    Ok(files)
}

/// Merge every settings component's values into one settings document.
pub(crate) fn render_settings(path: &str, components: &[Component<'_>]) -> RenderedFile {
    let mut values = Value::Object(Map::new());
    let mut keys = Vec::new();
    for component in components {
        if let Component::Settings(settings) = component {
            crate::merge::deep_merge(&mut values, &Value::Object(settings.values.clone()));
            keys.push(component.key());
        }
    }
    RenderedFile::json(path, values, keys)
}

fn with_extra(mut object: Map<String, Value>, extra: &Extra) -> Value {
    for (key, value) in extra {
        object.entry(key.clone()).or_insert_with(|| value.clone());
    }
    Value::Object(object)
}

fn render_extensions(components: &[Component<'_>]) -> RenderedFile {
    let mut recommended = Vec::new();
    let mut unwanted = Vec::new();
    let mut keys = Vec::new();
    for component in components {
        if let Component::Extension(ext) = component {
            if ext.enabled {
                recommended.push(json!(ext.id));
            } else {
                unwanted.push(json!(ext.id));
            }
            keys.push(component.key());
        }
    }
    let mut doc = Map::new();
    doc.insert("recommendations".into(), Value::Array(recommended));
    if !unwanted.is_empty() {
        doc.insert("unwantedRecommendations".into(), Value::Array(unwanted));
    }
    RenderedFile::json(".vscode/extensions.json", Value::Object(doc), keys)
}

fn render_tasks(components: &[Component<'_>]) -> RenderedFile {
    let mut tasks = Vec::new();
    let mut keys = Vec::new();
    for component in components {
        if let Component::Task(task) = component {
            let mut object = Map::new();
            object.insert("label".into(), json!(task.id));
            object.insert(
                "type".into(),
                json!(task.task_type.as_deref().unwrap_or("shell")),
            );
            object.insert("command".into(), json!(task.command));
            if !task.args.is_empty() {
                object.insert("args".into(), json!(task.args));
            }
            if let Some(cwd) = &task.cwd {
                object.insert("options".into(), json!({ "cwd": cwd }));
            }
            if let Some(run_on) = &task.run_on {
                object.insert("runOptions".into(), json!({ "runOn": run_on }));
            }
            tasks.push(with_extra(object, &task.extra));
            keys.push(component.key());
        }
    }
    RenderedFile::json(
        ".vscode/tasks.json",
        json!({ "version": TASKS_VERSION, "tasks": tasks }),
        keys,
    )
}

fn render_launch(components: &[Component<'_>]) -> RenderedFile {
    let mut configurations = Vec::new();
    let mut keys = Vec::new();
    for component in components {
        if let Component::Launch(launch) = component {
            let mut object = Map::new();
            object.insert("name".into(), json!(launch.id));
            object.insert("type".into(), json!(launch.debugger_type));
            object.insert("request".into(), json!(launch.request));
            if let Some(program) = &launch.program {
                object.insert("program".into(), json!(program));
            }
            if !launch.args.is_empty() {
                object.insert("args".into(), json!(launch.args));
            }
            if let Some(cwd) = &launch.cwd {
                object.insert("cwd".into(), json!(cwd));
            }
            if !launch.env.is_empty() {
                object.insert("env".into(), json!(launch.env));
            }
            if let Some(task) = &launch.pre_launch_task {
                object.insert("preLaunchTask".into(), json!(task));
            }
            configurations.push(with_extra(object, &launch.extra));
            keys.push(component.key());
        }
    }
    RenderedFile::json(
        ".vscode/launch.json",
        json!({ "version": LAUNCH_VERSION, "configurations": configurations }),
        keys,
    )
}

/// One `.code-snippets` file per language; unscoped snippets go to
/// `project.code-snippets`.
fn render_snippets(components: &[Component<'_>]) -> Vec<RenderedFile> {
    let mut by_file: BTreeMap<String, (Map<String, Value>, Vec<ComponentKey>)> = BTreeMap::new();
    for component in components {
        if let Component::Snippet(snippet) = component {
            let scope = snippet.language.as_deref().unwrap_or("project");
            let mut object = Map::new();
            object.insert("prefix".into(), json!(snippet.prefix));
            object.insert("body".into(), snippet.body.clone());
            if let Some(description) = &snippet.description {
                object.insert("description".into(), json!(description));
            }
            if let Some(language) = &snippet.language {
                object.insert("scope".into(), json!(language));
            }
            let entry = by_file
                .entry(format!(".vscode/{scope}.code-snippets"))
                .or_default();
            entry.0.insert(snippet.id.clone(), with_extra(object, &snippet.extra));
            entry.1.push(component.key());
        }
    }
    by_file
        .into_iter()
        .map(|(path, (snippets, keys))| RenderedFile::json(path, Value::Object(snippets), keys))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_meta::{PromptComponent, TaskComponent};
    use pretty_assertions::assert_eq;

    fn task(raw: Value) -> TaskComponent {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn tasks_render_with_version_and_labels() {
        let build = task(json!({"id": "build", "command": "cargo", "args": ["build"], "group": "build"}));
        let test = task(json!({"id": "test", "type": "process", "command": "cargo"}));
        let files = VsCodeIntegration::new()
            .render(
                ComponentKind::Tasks,
                &[Component::Task(&build), Component::Task(&test)],
            )
            .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, ".vscode/tasks.json");
        assert_eq!(
            files[0].content,
            crate::FileContent::Json(json!({
                "version": "2.0.0",
                "tasks": [
                    {"label": "build", "type": "shell", "command": "cargo", "args": ["build"], "group": "build"},
                    {"label": "test", "type": "process", "command": "cargo"}
                ]
            }))
        );
        assert_eq!(files[0].components.len(), 2);
    }

    #[test]
    fn prompts_become_prompt_files() {
        let prompt: PromptComponent = serde_json::from_value(json!({
            "id": "review", "description": "Code review", "content": "Review this."
        }))
        .unwrap();
        let files = VsCodeIntegration::new()
            .render(ComponentKind::AiPrompts, &[Component::Prompt(&prompt)])
            .unwrap();
        assert_eq!(files[0].path, ".github/prompts/review.prompt.md");
        assert_eq!(
            files[0].content,
            crate::FileContent::Text(
                "---\ndescription: Code review\n---\n\nReview this.\n".to_string()
            )
        );
    }

    #[test]
    fn hooks_are_unsupported() {
        let result = VsCodeIntegration::new().render(ComponentKind::Hooks, &[]);
        assert!(matches!(result, Err(crate::Error::UnsupportedKind { .. })));
    }
}
