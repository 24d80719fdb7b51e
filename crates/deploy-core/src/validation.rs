//! Structural validation of configuration bundles
//!
//! Validation never fails for problems in the bundle itself. Every finding is
//! returned as a [`ValidationIssue`]; only a broken call (options for another
//! platform) is an [`Error`].

use std::collections::{BTreeMap, BTreeSet};

use deploy_fs::validate_path_identifier;
use deploy_meta::{
    BundleComponents, Component, ComponentEntry, ComponentKind, ConfigurationBundle,
    DeploymentOptions, LimitOverrides, Platform,
};
use deploy_security::Severity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::failure::DeployErrorCode;
use crate::pool::WorkerPool;

/// Highest exchange-format major version this build reads.
pub const SUPPORTED_FORMAT_MAJOR: u64 = 1;

pub const DEFAULT_SOFT_SIZE_BYTES: usize = 256 * 1024;
pub const DEFAULT_HARD_SIZE_BYTES: usize = 1024 * 1024;

const LAUNCH_REQUESTS: &[&str] = &["launch", "attach"];
const TASK_TRIGGERS: &[&str] = &["default", "folderOpen"];

/// Fields every instance of a kind must carry.
const REQUIRED_FIELDS: &[(ComponentKind, &[&str])] = &[
    (ComponentKind::Settings, &["id"]),
    (ComponentKind::Extensions, &["id"]),
    (ComponentKind::AiPrompts, &["id", "content"]),
    (ComponentKind::Tasks, &["id", "command"]),
    (ComponentKind::Launch, &["id", "type", "request"]),
    (ComponentKind::Snippets, &["id", "prefix", "body"]),
    (ComponentKind::Hooks, &["id", "event", "command"]),
    (ComponentKind::Agents, &["id", "instructions"]),
    (ComponentKind::Templates, &["id", "content"]),
];

fn required_fields(kind: ComponentKind) -> &'static [&'static str] {
    REQUIRED_FIELDS
        .iter()
        .find(|(k, _)| *k == kind)
        .map_or(&[], |(_, fields)| fields)
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// Location in the bundle, e.g. `components.tasks[0].command`
    pub field: String,
    pub message: String,
    pub code: DeployErrorCode,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn error(field: impl Into<String>, code: DeployErrorCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
            severity: code.default_severity(),
        }
    }

    pub fn warning(
        field: impl Into<String>,
        code: DeployErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
            severity: Severity::Low,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn has_error(&self, code: DeployErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn has_warning(&self, code: DeployErrorCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }

    fn absorb(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.is_valid = self.errors.is_empty();
    }
}

/// Size and count limits applied per component and per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub soft_size_bytes: usize,
    pub hard_size_bytes: usize,
    pub max_counts: BTreeMap<ComponentKind, usize>,
}

impl Default for Limits {
    fn default() -> Self {
        let max_counts = [
            (ComponentKind::Settings, 50),
            (ComponentKind::Extensions, 200),
            (ComponentKind::AiPrompts, 100),
            (ComponentKind::Tasks, 100),
            (ComponentKind::Launch, 50),
            (ComponentKind::Snippets, 500),
            (ComponentKind::Hooks, 50),
            (ComponentKind::Agents, 50),
            (ComponentKind::Templates, 100),
        ]
        .into_iter()
        .collect();
        Self {
            soft_size_bytes: DEFAULT_SOFT_SIZE_BYTES,
            hard_size_bytes: DEFAULT_HARD_SIZE_BYTES,
            max_counts,
        }
    }
}

impl Limits {
    pub fn with_overrides(&self, overrides: &LimitOverrides) -> Self {
        let mut limits = self.clone();
        if let Some(soft) = overrides.soft_size_bytes {
            limits.soft_size_bytes = soft;
        }
        if let Some(hard) = overrides.hard_size_bytes {
            limits.hard_size_bytes = hard;
        }
        for kind in ComponentKind::ALL {
            if let Some(cap) = overrides.count_limit(kind) {
                limits.max_counts.insert(kind, cap);
            }
        }
        limits
    }

    pub fn count_limit(&self, kind: ComponentKind) -> Option<usize> {
        self.max_counts.get(&kind).copied()
    }
}

/// Checks bundles against structure, limits and platform compatibility.
#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    limits: Limits,
}

impl ValidationEngine {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Validate a parsed bundle for deployment to `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContractViolation`] when `options` target a different
    /// platform. Bundle problems are reported in the returned result.
    pub fn validate(
        &self,
        bundle: &ConfigurationBundle,
        platform: Platform,
        options: &DeploymentOptions,
    ) -> Result<ValidationResult> {
        if options.platform != platform {
            return Err(Error::ContractViolation {
                message: format!(
                    "options target {} but validation was requested for {}",
                    options.platform, platform
                ),
            });
        }

        let limits = self.limits.with_overrides(&options.limits);
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        check_version(&bundle.metadata.version, &mut errors);
        check_targets(&bundle.metadata.target_platforms, platform, &mut errors, &mut warnings);

        for section in bundle.components.unrecognized.keys() {
            warnings.push(ValidationIssue::warning(
                format!("components.{section}"),
                DeployErrorCode::UnsupportedComponent,
                format!("Unrecognized section '{section}' is preserved but not deployed"),
            ));
        }

        let entries: Vec<ComponentEntry<'_>> = bundle
            .components
            .entries()
            .into_iter()
            .filter(|entry| options.selects(&entry.key()))
            .collect();

        check_counts(&entries, &limits, &mut errors, &mut warnings);
        check_duplicates(&entries, &mut errors);
        check_support(&entries, platform, &mut warnings);

        let pool = WorkerPool::new(options.workers);
        for (entry_errors, entry_warnings) in
            pool.map_ordered(&entries, |entry| check_component(entry, &limits))
        {
            errors.extend(entry_errors);
            warnings.extend(entry_warnings);
        }

        let result = ValidationResult::new(errors, warnings);
        tracing::debug!(
            platform = %platform,
            components = entries.len(),
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Validated bundle"
        );
        Ok(result)
    }

    /// Validate a raw exchange document before it is typed.
    ///
    /// Shape problems (wrong JSON types, missing required keys) are reported
    /// as issues. When the document is well-formed it is parsed and the
    /// bundle-level checks of [`ValidationEngine::validate`] are added.
    pub fn validate_document(
        &self,
        document: &Value,
        platform: Platform,
        options: &DeploymentOptions,
    ) -> Result<(ValidationResult, Option<ConfigurationBundle>)> {
        let shape = check_shape(document);
        if !shape.is_valid {
            return Ok((shape, None));
        }

        match ConfigurationBundle::from_value(document.clone()) {
            Ok(bundle) => {
                let mut result = shape;
                result.absorb(self.validate(&bundle, platform, options)?);
                Ok((result, Some(bundle)))
            }
            Err(e) => {
                let mut result = shape;
                result.absorb(ValidationResult::new(
                    vec![ValidationIssue::error(
                        "$",
                        DeployErrorCode::InvalidBundleFormat,
                        e.to_string(),
                    )],
                    Vec::new(),
                ));
                Ok((result, None))
            }
        }
    }

    /// Parse and validate exchange-format JSON text.
    pub fn validate_json(
        &self,
        content: &str,
        platform: Platform,
        options: &DeploymentOptions,
    ) -> Result<(ValidationResult, Option<ConfigurationBundle>)> {
        match serde_json::from_str::<Value>(content) {
            Ok(document) => self.validate_document(&document, platform, options),
            Err(e) => Ok((
                ValidationResult::new(
                    vec![ValidationIssue::error(
                        "$",
                        DeployErrorCode::InvalidBundleFormat,
                        format!("Bundle is not valid JSON: {e}"),
                    )],
                    Vec::new(),
                ),
                None,
            )),
        }
    }
}

fn check_version(version: &str, errors: &mut Vec<ValidationIssue>) {
    match semver::Version::parse(version) {
        Ok(parsed) if parsed.major > SUPPORTED_FORMAT_MAJOR => {
            errors.push(ValidationIssue::error(
                "metadata.version",
                DeployErrorCode::UnsupportedVersion,
                format!(
                    "Bundle format {version} is newer than the supported {SUPPORTED_FORMAT_MAJOR}.x"
                ),
            ));
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationIssue::error(
            "metadata.version",
            DeployErrorCode::InvalidValue,
            format!("'{version}' is not a semantic version: {e}"),
        )),
    }
}

fn check_targets(
    targets: &[String],
    platform: Platform,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    if targets.is_empty() {
        warnings.push(ValidationIssue::warning(
            "metadata.targetPlatforms",
            DeployErrorCode::PlatformIncompatible,
            "Bundle declares no target platforms; compatibility is assumed",
        ));
        return;
    }

    let mut declared = BTreeSet::new();
    for (i, target) in targets.iter().enumerate() {
        match target.parse::<Platform>() {
            Ok(p) => {
                declared.insert(p);
            }
            Err(_) => warnings.push(ValidationIssue::warning(
                format!("metadata.targetPlatforms[{i}]"),
                DeployErrorCode::PlatformNotFound,
                format!("Unknown platform '{target}'"),
            )),
        }
    }

    if !declared.contains(&platform) {
        errors.push(ValidationIssue::error(
            "metadata.targetPlatforms",
            DeployErrorCode::PlatformIncompatible,
            format!(
                "Bundle targets [{}] and does not include {}",
                targets.join(", "),
                platform
            ),
        ));
    }
}

fn check_counts(
    entries: &[ComponentEntry<'_>],
    limits: &Limits,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    for kind in ComponentKind::ALL {
        let Some(cap) = limits.count_limit(kind) else {
            continue;
        };
        let count = entries.iter().filter(|e| e.component.kind() == kind).count();
        let field = format!("components.{kind}");
        if count > cap {
            errors.push(ValidationIssue::error(
                field,
                DeployErrorCode::CountLimitExceeded,
                format!("{count} {kind} components exceed the limit of {cap}"),
            ));
        } else if count > 0 && count * 5 >= cap * 4 {
            warnings.push(ValidationIssue::warning(
                field,
                DeployErrorCode::CountLimitExceeded,
                format!("{count} {kind} components are close to the limit of {cap}"),
            ));
        }
    }
}

fn check_duplicates(entries: &[ComponentEntry<'_>], errors: &mut Vec<ValidationIssue>) {
    let mut seen = BTreeSet::new();
    for entry in entries {
        let key = entry.key();
        if !seen.insert(key.clone()) {
            errors.push(ValidationIssue::error(
                format!("{}.id", entry.location()),
                DeployErrorCode::DuplicateComponent,
                format!("Duplicate component {key}"),
            ));
        }
    }
}

fn check_support(
    entries: &[ComponentEntry<'_>],
    platform: Platform,
    warnings: &mut Vec<ValidationIssue>,
) {
    let unsupported: BTreeSet<ComponentKind> = entries
        .iter()
        .map(|e| e.component.kind())
        .filter(|kind| !platform.supports(*kind))
        .collect();
    for kind in unsupported {
        warnings.push(ValidationIssue::warning(
            format!("components.{kind}"),
            DeployErrorCode::UnsupportedComponent,
            format!(
                "{} does not support {kind} components; they will be skipped",
                platform.display_name()
            ),
        ));
    }
}

/// Checks that only need the component itself.
fn check_component(
    entry: &ComponentEntry<'_>,
    limits: &Limits,
) -> (Vec<ValidationIssue>, Vec<ValidationIssue>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let location = entry.location();
    let at = |field: &str| format!("{location}.{field}");
    let component = entry.component;

    if let Err(message) = validate_path_identifier(component.id(), "Component id") {
        errors.push(ValidationIssue::error(at("id"), DeployErrorCode::InvalidValue, message));
    }

    let mut require = |field: &str, value: &str| {
        if value.trim().is_empty() {
            errors.push(ValidationIssue::error(
                at(field),
                DeployErrorCode::MissingRequiredField,
                format!("{field} must not be empty"),
            ));
        }
    };
    match component {
        Component::Prompt(c) => require("content", &c.content),
        Component::Task(c) => require("command", &c.command),
        Component::Launch(c) => {
            require("type", &c.debugger_type);
            require("request", &c.request);
        }
        Component::Snippet(c) => require("prefix", &c.prefix),
        Component::Hook(c) => {
            require("event", &c.event);
            require("command", &c.command);
        }
        Component::Agent(c) => require("instructions", &c.instructions),
        Component::Template(c) => require("content", &c.content),
        Component::Settings(_) | Component::Extension(_) => {}
    }

    match component {
        Component::Launch(c)
            if !c.request.is_empty() && !LAUNCH_REQUESTS.contains(&c.request.as_str()) =>
        {
            errors.push(ValidationIssue::error(
                at("request"),
                DeployErrorCode::InvalidValue,
                format!("request must be one of {LAUNCH_REQUESTS:?}, got '{}'", c.request),
            ));
        }
        Component::Task(c) => {
            if let Some(run_on) = &c.run_on
                && !TASK_TRIGGERS.contains(&run_on.as_str())
            {
                errors.push(ValidationIssue::error(
                    at("runOn"),
                    DeployErrorCode::InvalidValue,
                    format!("runOn must be one of {TASK_TRIGGERS:?}, got '{run_on}'"),
                ));
            }
        }
        Component::Extension(c) => {
            let well_formed = c
                .id
                .split_once('.')
                .is_some_and(|(publisher, name)| !publisher.is_empty() && !name.is_empty());
            if !well_formed {
                errors.push(ValidationIssue::error(
                    at("id"),
                    DeployErrorCode::InvalidValue,
                    format!("Extension id '{}' must have the form publisher.name", c.id),
                ));
            }
        }
        Component::Snippet(c) if c.body_lines().is_none() => {
            errors.push(ValidationIssue::error(
                at("body"),
                DeployErrorCode::InvalidType,
                "body must be a string or an array of strings",
            ));
        }
        _ => {}
    }

    let size = component.serialized_size();
    if size > limits.hard_size_bytes {
        errors.push(ValidationIssue::error(
            location.clone(),
            DeployErrorCode::SizeLimitExceeded,
            format!("Component is {size} bytes, above the limit of {}", limits.hard_size_bytes),
        ));
    } else if size > limits.soft_size_bytes {
        warnings.push(ValidationIssue::warning(
            location.clone(),
            DeployErrorCode::SizeLimitExceeded,
            format!("Component is {size} bytes, above the recommended {}", limits.soft_size_bytes),
        ));
    }

    (errors, warnings)
}

/// Check JSON types of a raw document against the exchange format.
fn check_shape(document: &Value) -> ValidationResult {
    let mut errors = Vec::new();
    let Some(root) = document.as_object() else {
        errors.push(ValidationIssue::error(
            "$",
            DeployErrorCode::InvalidBundleFormat,
            "Bundle must be a JSON object",
        ));
        return ValidationResult::new(errors, Vec::new());
    };

    match root.get("metadata") {
        None => errors.push(ValidationIssue::error(
            "metadata",
            DeployErrorCode::MissingRequiredField,
            "metadata is required",
        )),
        Some(Value::Object(metadata)) => {
            match metadata.get("version") {
                None => errors.push(ValidationIssue::error(
                    "metadata.version",
                    DeployErrorCode::MissingRequiredField,
                    "metadata.version is required",
                )),
                Some(Value::String(_)) => {}
                Some(other) => errors.push(type_error("metadata.version", "a string", other)),
            }
            if let Some(targets) = metadata.get("targetPlatforms") {
                match targets {
                    Value::Array(items) => {
                        for (i, item) in items.iter().enumerate() {
                            if !item.is_string() {
                                errors.push(type_error(
                                    &format!("metadata.targetPlatforms[{i}]"),
                                    "a string",
                                    item,
                                ));
                            }
                        }
                    }
                    other => errors.push(type_error("metadata.targetPlatforms", "an array", other)),
                }
            }
        }
        Some(other) => errors.push(type_error("metadata", "an object", other)),
    }

    match root.get("components") {
        None | Some(Value::Null) => {}
        Some(Value::Object(sections)) => {
            for kind in ComponentKind::ALL {
                let Some(section) = sections.get(kind.as_str()) else {
                    continue;
                };
                check_section_shape(kind, section, &mut errors);
            }
        }
        Some(other) => errors.push(type_error("components", "an object", other)),
    }

    ValidationResult::new(errors, Vec::new())
}

fn check_section_shape(kind: ComponentKind, section: &Value, errors: &mut Vec<ValidationIssue>) {
    let field = format!("components.{kind}");
    let Value::Array(items) = section else {
        errors.push(type_error(&field, "an array", section));
        return;
    };

    for (i, item) in items.iter().enumerate() {
        let location = format!("{field}[{i}]");
        let Value::Object(map) = item else {
            errors.push(type_error(&location, "an object", item));
            continue;
        };
        let mut missing = false;
        for required in required_fields(kind) {
            if !map.contains_key(*required) {
                missing = true;
                errors.push(ValidationIssue::error(
                    format!("{location}.{required}"),
                    DeployErrorCode::MissingRequiredField,
                    format!("{required} is required for {kind} components"),
                ));
            }
        }
        if missing {
            continue;
        }
        if let Err(e) = parse_instance(kind, item) {
            errors.push(ValidationIssue::error(location, DeployErrorCode::InvalidType, e));
        }
    }
}

/// Deserialize one instance into its kind's struct, keeping only the error.
fn parse_instance(kind: ComponentKind, item: &Value) -> std::result::Result<(), String> {
    let section = serde_json::json!({ kind.as_str(): [item] });
    serde_json::from_value::<BundleComponents>(section)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn type_error(field: &str, expected: &str, found: &Value) -> ValidationIssue {
    let actual = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    ValidationIssue::error(
        field,
        DeployErrorCode::InvalidType,
        format!("{field} must be {expected}, found {actual}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn options() -> DeploymentOptions {
        DeploymentOptions::new(Platform::VsCode, "/tmp/backups")
    }

    fn bundle(components: Value) -> ConfigurationBundle {
        ConfigurationBundle::from_value(json!({
            "metadata": {"version": "1.0.0", "targetPlatforms": ["vscode"]},
            "components": components
        }))
        .unwrap()
    }

    fn validate(bundle: &ConfigurationBundle) -> ValidationResult {
        ValidationEngine::default()
            .validate(bundle, Platform::VsCode, &options())
            .unwrap()
    }

    #[test]
    fn clean_bundle_is_valid() {
        let result = validate(&bundle(json!({
            "settings": [{"id": "editor", "values": {"editor.tabSize": 2}}],
            "tasks": [{"id": "build", "command": "cargo", "args": ["build"]}]
        })));
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn platform_mismatch_is_a_contract_violation() {
        let err = ValidationEngine::default()
            .validate(&bundle(json!({})), Platform::Cursor, &options())
            .unwrap_err();
        assert!(matches!(err, Error::ContractViolation { .. }));
    }

    #[test]
    fn undeclared_platform_is_incompatible() {
        let bundle = ConfigurationBundle::from_value(json!({
            "metadata": {"version": "1.0.0", "targetPlatforms": ["cursor", "neovim"]}
        }))
        .unwrap();
        let result = validate(&bundle);
        assert!(result.has_error(DeployErrorCode::PlatformIncompatible));
        assert!(result.has_warning(DeployErrorCode::PlatformNotFound));
    }

    #[test]
    fn missing_targets_warn() {
        let bundle = ConfigurationBundle::from_json(r#"{"metadata": {"version": "1.0.0"}}"#).unwrap();
        let result = validate(&bundle);
        assert!(result.is_valid);
        assert!(result.has_warning(DeployErrorCode::PlatformIncompatible));
    }

    #[rstest]
    #[case("1.4.2", None)]
    #[case("2.0.0", Some(DeployErrorCode::UnsupportedVersion))]
    #[case("one", Some(DeployErrorCode::InvalidValue))]
    fn version_checks(#[case] version: &str, #[case] expected: Option<DeployErrorCode>) {
        let bundle = ConfigurationBundle::from_value(json!({
            "metadata": {"version": version, "targetPlatforms": ["vscode"]}
        }))
        .unwrap();
        let result = validate(&bundle);
        assert_eq!(result.errors.first().map(|e| e.code), expected);
    }

    #[test]
    fn enum_fields_are_checked() {
        let result = validate(&bundle(json!({
            "launch": [{"id": "run", "type": "node", "request": "spawn"}],
            "tasks": [{"id": "watch", "command": "npm run watch", "runOn": "startup"}]
        })));
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["components.tasks[0].runOn", "components.launch[0].request"]
        );
    }

    #[test]
    fn empty_required_text_is_missing() {
        let result = validate(&bundle(json!({
            "ai-prompts": [{"id": "blank", "content": "   "}]
        })));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, DeployErrorCode::MissingRequiredField);
        assert_eq!(result.errors[0].field, "components.ai-prompts[0].content");
    }

    #[test]
    fn unsafe_ids_and_duplicates_are_errors() {
        let result = validate(&bundle(json!({
            "ai-prompts": [
                {"id": "../escape", "content": "x"},
                {"id": "twice", "content": "a"},
                {"id": "twice", "content": "b"}
            ]
        })));
        assert!(result.has_error(DeployErrorCode::InvalidValue));
        assert!(result.has_error(DeployErrorCode::DuplicateComponent));
    }

    #[test]
    fn size_limits_warn_then_fail() {
        let engine = ValidationEngine::new(Limits {
            soft_size_bytes: 64,
            hard_size_bytes: 256,
            ..Limits::default()
        });
        let result = engine
            .validate(
                &bundle(json!({
                    "ai-prompts": [
                        {"id": "medium", "content": "m".repeat(100)},
                        {"id": "large", "content": "l".repeat(400)}
                    ]
                })),
                Platform::VsCode,
                &options(),
            )
            .unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "components.ai-prompts[1]");
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, DeployErrorCode::SizeLimitExceeded);
    }

    #[test]
    fn count_limits_warn_at_eighty_percent() {
        let prompts: Vec<Value> = (0..4)
            .map(|i| json!({"id": format!("p{i}"), "content": "x"}))
            .collect();
        let mut overrides = LimitOverrides::default();
        overrides.max_counts.insert("ai-prompts".into(), 5);
        let at_warning = ValidationEngine::default()
            .validate(
                &bundle(json!({ "ai-prompts": prompts })),
                Platform::VsCode,
                &options().with_limits(overrides.clone()),
            )
            .unwrap();
        assert!(at_warning.is_valid);
        assert!(at_warning.has_warning(DeployErrorCode::CountLimitExceeded));

        overrides.max_counts.insert("ai-prompts".into(), 3);
        let over = ValidationEngine::default()
            .validate(
                &bundle(json!({ "ai-prompts": prompts })),
                Platform::VsCode,
                &options().with_limits(overrides),
            )
            .unwrap();
        assert!(over.has_error(DeployErrorCode::CountLimitExceeded));
    }

    #[test]
    fn unsupported_kinds_and_sections_warn() {
        let result = validate(&bundle(json!({
            "hooks": [{"id": "fmt", "event": "PostToolUse", "command": "cargo fmt"}],
            "workflows": [{"id": "future"}]
        })));
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings.iter().all(|w| w.code == DeployErrorCode::UnsupportedComponent));
    }

    #[test]
    fn skipped_components_are_not_validated() {
        let bundle = bundle(json!({
            "launch": [{"id": "run", "type": "node", "request": "spawn"}]
        }));
        let options = options().with_skip_components(vec!["launch".parse().unwrap()]);
        let result = ValidationEngine::default()
            .validate(&bundle, Platform::VsCode, &options)
            .unwrap();
        assert!(result.is_valid);
    }

    #[test]
    fn document_type_errors_are_reported() {
        let document = json!({
            "metadata": {"version": 1, "targetPlatforms": "vscode"},
            "components": {
                "tasks": {"id": "build"},
                "ai-prompts": [{"id": "x"}, "loose", {"id": "y", "content": 3}]
            }
        });
        let (result, bundle) = ValidationEngine::default()
            .validate_document(&document, Platform::VsCode, &options())
            .unwrap();
        assert!(bundle.is_none());
        let found: Vec<(&str, DeployErrorCode)> = result
            .errors
            .iter()
            .map(|e| (e.field.as_str(), e.code))
            .collect();
        assert_eq!(
            found,
            vec![
                ("metadata.version", DeployErrorCode::InvalidType),
                ("metadata.targetPlatforms", DeployErrorCode::InvalidType),
                ("components.ai-prompts[0].content", DeployErrorCode::MissingRequiredField),
                ("components.ai-prompts[1]", DeployErrorCode::InvalidType),
                ("components.ai-prompts[2]", DeployErrorCode::InvalidType),
                ("components.tasks", DeployErrorCode::InvalidType),
            ]
        );
    }

    #[test]
    fn well_formed_document_is_parsed_and_validated() {
        let (result, bundle) = ValidationEngine::default()
            .validate_json(
                r#"{"metadata": {"version": "1.0.0", "targetPlatforms": ["vscode"]},
                    "components": {"tasks": [{"id": "build", "command": "make"}]}}"#,
                Platform::VsCode,
                &options(),
            )
            .unwrap();
        assert!(result.is_valid);
        assert_eq!(bundle.unwrap().components.count(ComponentKind::Tasks), 1);
    }

    #[test]
    fn invalid_json_text_is_a_format_error() {
        let (result, bundle) = ValidationEngine::default()
            .validate_json("{", Platform::VsCode, &options())
            .unwrap();
        assert!(bundle.is_none());
        assert!(result.has_error(DeployErrorCode::InvalidBundleFormat));
    }
}
