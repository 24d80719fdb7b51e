//! The declarative scan rule table.
//!
//! Built-in rules are plain data compiled once on first use. A rule matches
//! a component when its pattern matches one of the component's text fields,
//! optionally restricted to some kinds and some field names.

use std::collections::HashSet;
use std::sync::LazyLock;

use deploy_meta::{ComponentKind, CustomRuleConfig};
use regex::Regex;

use crate::error::{Error, Result};
use crate::violation::ViolationType;

use deploy_meta::ComponentKind::{
    Agents, AiPrompts, Extensions, Hooks, Launch, Settings, Snippets, Tasks, Templates,
};

/// A compiled scan rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub violation_type: ViolationType,
    pub pattern: Regex,
    /// Kinds the rule applies to; empty means all
    pub kinds: Vec<ComponentKind>,
    /// Field names the rule is restricted to; empty means all
    pub fields: Vec<String>,
    pub description: String,
    pub recommendation: String,
}

impl Rule {
    pub fn applies_to(&self, kind: ComponentKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    /// Whether the rule inspects `field`. A restriction `cwd` also covers
    /// nested paths such as `options.cwd`.
    pub fn inspects(&self, field: &str) -> bool {
        self.fields.is_empty()
            || self.fields.iter().any(|f| {
                field == f
                    || field
                        .strip_suffix(f.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Compile a user-declared rule.
    pub fn from_config(config: &CustomRuleConfig) -> Result<Self> {
        let violation_type = config.category.parse()?;
        let pattern = Regex::new(&config.pattern).map_err(|e| Error::InvalidPattern {
            rule: config.id.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            id: config.id.clone(),
            violation_type,
            pattern,
            kinds: config.kinds.clone(),
            fields: config.fields.clone(),
            description: config.description.clone(),
            recommendation: config
                .recommendation
                .clone()
                .unwrap_or_else(|| "Review and remove the flagged content".to_string()),
        })
    }
}

struct RuleDef {
    id: &'static str,
    violation_type: ViolationType,
    pattern: &'static str,
    kinds: &'static [ComponentKind],
    fields: &'static [&'static str],
    description: &'static str,
    recommendation: &'static str,
}

const INSTRUCTION_KINDS: &[ComponentKind] = &[AiPrompts, Agents, Templates, Settings];
const COMMAND_KINDS: &[ComponentKind] = &[Tasks, Launch, Hooks, Snippets, Settings];
const ALL_KINDS: &[ComponentKind] = &[];

const BUILTIN: &[RuleDef] = &[
    // AI injection
    RuleDef {
        id: "ai-ignore-instructions",
        violation_type: ViolationType::AiInjection,
        pattern: r"(?i)\b(ignore|disregard|forget)\s+(all\s+|any\s+|the\s+)?(previous|prior|above|earlier|preceding)\s+(instructions|prompts|rules|directions|context)",
        kinds: INSTRUCTION_KINDS,
        fields: &[],
        description: "Attempts to override prior model instructions",
        recommendation: "Remove instruction-override phrasing from the prompt",
    },
    RuleDef {
        id: "ai-reveal-system-prompt",
        violation_type: ViolationType::AiInjection,
        pattern: r"(?i)\b(reveal|print|show|output|leak|repeat)\s+(the\s+|your\s+)?(system\s+prompt|hidden\s+instructions|initial\s+instructions)",
        kinds: INSTRUCTION_KINDS,
        fields: &[],
        description: "Attempts to exfiltrate the system prompt",
        recommendation: "Remove requests to disclose system or hidden instructions",
    },
    RuleDef {
        id: "ai-role-override",
        violation_type: ViolationType::AiInjection,
        pattern: r"(?i)\byou\s+are\s+now\s+(in\s+)?(developer|dan|jailbroken|unrestricted|god)\b",
        kinds: INSTRUCTION_KINDS,
        fields: &[],
        description: "Attempts to switch the model into an unrestricted persona",
        recommendation: "Remove persona-override phrasing",
    },
    RuleDef {
        id: "ai-safety-bypass",
        violation_type: ViolationType::AiInjection,
        pattern: r"(?i)\b(bypass|disable|override|ignore)\s+(all\s+|your\s+)?(safety|security|content)\s+(filters?|guidelines|restrictions|checks|policies)",
        kinds: INSTRUCTION_KINDS,
        fields: &[],
        description: "Attempts to disable model safety measures",
        recommendation: "Remove safety-bypass phrasing",
    },
    // Malicious code
    RuleDef {
        id: "mal-recursive-delete",
        violation_type: ViolationType::MaliciousCode,
        pattern: r"\brm\s+-[a-zA-Z]*(rf|fr)[a-zA-Z]*\s+(/|~|\$HOME)(\s|\*|$)",
        kinds: COMMAND_KINDS,
        fields: &[],
        description: "Recursively deletes a root or home directory",
        recommendation: "Remove the destructive delete command",
    },
    RuleDef {
        id: "mal-pipe-to-shell",
        violation_type: ViolationType::MaliciousCode,
        pattern: r"(?i)\b(curl|wget)\b[^|\n]*\|\s*(sudo\s+)?(sh|bash|zsh|python[0-9.]*|perl)\b",
        kinds: COMMAND_KINDS,
        fields: &[],
        description: "Downloads and executes remote code",
        recommendation: "Vendor the script or pin and verify it before running",
    },
    RuleDef {
        id: "mal-encoded-exec",
        violation_type: ViolationType::MaliciousCode,
        pattern: r"(?i)(base64\s+(-d|--decode)[^|\n]*\|\s*(sh|bash)\b|powershell(\.exe)?\s[^\n]*-(enc|encodedcommand)\s)",
        kinds: COMMAND_KINDS,
        fields: &[],
        description: "Executes an encoded payload",
        recommendation: "Replace the encoded payload with a readable command",
    },
    RuleDef {
        id: "mal-reverse-shell",
        violation_type: ViolationType::MaliciousCode,
        pattern: r"(?i)(/dev/tcp/\S+|\bnc(at)?\b[^\n]*\s-e\s)",
        kinds: COMMAND_KINDS,
        fields: &[],
        description: "Opens a reverse shell",
        recommendation: "Remove the network shell command",
    },
    RuleDef {
        id: "mal-fork-bomb",
        violation_type: ViolationType::MaliciousCode,
        pattern: r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
        kinds: COMMAND_KINDS,
        fields: &[],
        description: "Shell fork bomb",
        recommendation: "Remove the fork bomb",
    },
    // Sensitive data
    RuleDef {
        id: "secret-aws-access-key",
        violation_type: ViolationType::SensitiveData,
        pattern: r"\b(AKIA|ASIA|ABIA|ACCA)[A-Z0-9]{16}\b",
        kinds: ALL_KINDS,
        fields: &[],
        description: "AWS access key id",
        recommendation: "Remove the key and rotate it; reference it through an environment variable",
    },
    RuleDef {
        id: "secret-private-key",
        violation_type: ViolationType::SensitiveData,
        pattern: r"-----BEGIN\s+(RSA\s+|EC\s+|DSA\s+|OPENSSH\s+)?PRIVATE\s+KEY-----",
        kinds: ALL_KINDS,
        fields: &[],
        description: "Embedded private key",
        recommendation: "Remove the private key and rotate it",
    },
    RuleDef {
        id: "secret-github-token",
        violation_type: ViolationType::SensitiveData,
        pattern: r"\bgh[pousr]_[A-Za-z0-9]{36,}\b",
        kinds: ALL_KINDS,
        fields: &[],
        description: "GitHub token",
        recommendation: "Remove the token and revoke it",
    },
    RuleDef {
        id: "secret-api-key",
        violation_type: ViolationType::SensitiveData,
        pattern: r"\bsk-(ant-|proj-)?[A-Za-z0-9_\-]{20,}\b",
        kinds: ALL_KINDS,
        fields: &[],
        description: "API secret key",
        recommendation: "Remove the key and reference it through an environment variable",
    },
    RuleDef {
        id: "secret-assignment",
        violation_type: ViolationType::SensitiveData,
        pattern: r#"(?i)\b(password|passwd|secret|api[_-]?key|access[_-]?token|auth[_-]?token|client[_-]?secret)\b["']?\s*[=:]\s*["']?[A-Za-z0-9_\-+/.]{8,}"#,
        kinds: ALL_KINDS,
        fields: &[],
        description: "Hard-coded credential",
        recommendation: "Move the credential into an environment variable or secret store",
    },
    RuleDef {
        id: "secret-connection-string",
        violation_type: ViolationType::SensitiveData,
        pattern: r"(?i)\b(mongodb(\+srv)?|mysql|postgres(ql)?|redis|amqp|mssql)://[^:\s/]+:[^@\s]+@",
        kinds: ALL_KINDS,
        fields: &[],
        description: "Connection string with embedded credentials",
        recommendation: "Strip credentials from the connection string",
    },
    // Dangerous capability
    RuleDef {
        id: "cap-privilege-escalation",
        violation_type: ViolationType::DangerousCapability,
        pattern: r"(?i)(^|[\s;&|])(sudo|doas|su\s+-)\s",
        kinds: &[Tasks, Hooks, Launch],
        fields: &[],
        description: "Runs commands with elevated privileges",
        recommendation: "Run the command without privilege escalation",
    },
    RuleDef {
        id: "cap-world-writable",
        violation_type: ViolationType::DangerousCapability,
        pattern: r"\bchmod\s+(-R\s+)?(0?777|a\+rwx)\b",
        kinds: &[Tasks, Hooks, Launch],
        fields: &[],
        description: "Makes files world-writable",
        recommendation: "Use the narrowest permissions that work",
    },
    RuleDef {
        id: "cap-permission-bypass",
        violation_type: ViolationType::DangerousCapability,
        pattern: r"(?i)(dangerously[-_]?skip[-_]?permissions|bypassPermissions|autoApprove|\byolo\b)",
        kinds: &[Settings, Agents, Hooks],
        fields: &[],
        description: "Disables assistant permission prompts",
        recommendation: "Keep permission prompts enabled",
    },
    RuleDef {
        id: "cap-unrestricted-tools",
        violation_type: ViolationType::DangerousCapability,
        pattern: r"^\s*\*\s*$",
        kinds: &[Agents],
        fields: &["tools"],
        description: "Grants an agent every tool",
        recommendation: "List the tools the agent needs",
    },
    // Unsafe extension
    RuleDef {
        id: "ext-insecure-source",
        violation_type: ViolationType::UnsafeExtension,
        pattern: r"(?i)^(http://|ftp://|file:|\\\\)",
        kinds: &[Extensions],
        fields: &["source"],
        description: "Extension is fetched over an insecure or local channel",
        recommendation: "Install extensions from the marketplace or over HTTPS",
    },
    RuleDef {
        id: "ext-sideloaded-vsix",
        violation_type: ViolationType::UnsafeExtension,
        pattern: r"(?i)^https?://\S+\.vsix$",
        kinds: &[Extensions],
        fields: &["source"],
        description: "Extension package is side-loaded from a URL",
        recommendation: "Install the extension from a marketplace",
    },
    // Insecure launch configuration
    RuleDef {
        id: "launch-exposed-debugger",
        violation_type: ViolationType::InsecureLaunchConfig,
        pattern: r"(?i)(--inspect(-brk)?=0\.0\.0\.0|--remote-debugging-address=0\.0\.0\.0|^0\.0\.0\.0$)",
        kinds: &[Launch],
        fields: &[],
        description: "Debugger listens on every network interface",
        recommendation: "Bind the debugger to 127.0.0.1",
    },
    RuleDef {
        id: "launch-disabled-security",
        violation_type: ViolationType::InsecureLaunchConfig,
        pattern: r"(?i)(--disable-web-security|--no-sandbox|NODE_TLS_REJECT_UNAUTHORIZED=0|--allow-file-access-from-files)",
        kinds: &[Launch],
        fields: &[],
        description: "Launch configuration disables runtime security features",
        recommendation: "Remove the security-disabling flag",
    },
    // Path traversal
    RuleDef {
        id: "path-unsafe-id",
        violation_type: ViolationType::PathTraversal,
        pattern: r"(\.\.|[/\\]|^[A-Za-z]:)",
        kinds: &[AiPrompts, Agents, Templates, Hooks],
        fields: &["id"],
        description: "Component id would escape its target directory",
        recommendation: "Use a plain file-name id",
    },
    RuleDef {
        id: "path-parent-escape",
        violation_type: ViolationType::PathTraversal,
        pattern: r"(\.\.[/\\]){2,}",
        kinds: ALL_KINDS,
        fields: &["cwd", "program", "args", "source"],
        description: "Path climbs out of the workspace",
        recommendation: "Use workspace-relative paths such as ${workspaceFolder}",
    },
    RuleDef {
        id: "path-system-file",
        violation_type: ViolationType::PathTraversal,
        pattern: r"(?i)(/etc/(passwd|shadow|sudoers)|/root/\.ssh|\.ssh/id_(rsa|ed25519)|c:\\windows\\system32\\config)",
        kinds: ALL_KINDS,
        fields: &[],
        description: "References a sensitive system file",
        recommendation: "Remove references to system credential files",
    },
    // Auto-run capability
    RuleDef {
        id: "autorun-folder-open",
        violation_type: ViolationType::AutoRunCapability,
        pattern: r"(?i)^folderOpen$",
        kinds: &[Tasks],
        fields: &["runOn"],
        description: "Task runs automatically when the folder opens",
        recommendation: "Let the user start the task manually",
    },
    RuleDef {
        id: "autorun-session-hook",
        violation_type: ViolationType::AutoRunCapability,
        pattern: r"(?i)^(SessionStart|UserPromptSubmit|promptSubmit|agentSpawn)$",
        kinds: &[Hooks],
        fields: &["event"],
        description: "Hook runs automatically at session or prompt start",
        recommendation: "Confirm the hook command is expected to run unattended",
    },
    // Suspicious patterns
    RuleDef {
        id: "sus-encoded-blob",
        violation_type: ViolationType::SuspiciousPattern,
        pattern: r"[A-Za-z0-9+/]{160,}={0,2}",
        kinds: ALL_KINDS,
        fields: &[],
        description: "Long encoded blob",
        recommendation: "Check what the encoded content decodes to",
    },
    RuleDef {
        id: "sus-hidden-characters",
        violation_type: ViolationType::SuspiciousPattern,
        pattern: r"[\x{200B}-\x{200F}\x{202A}-\x{202E}\x{2066}-\x{2069}\x{FEFF}]",
        kinds: ALL_KINDS,
        fields: &[],
        description: "Invisible or bidirectional control characters",
        recommendation: "Remove invisible characters",
    },
];

#[allow(clippy::expect_used)]
static BUILTIN_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    BUILTIN
        .iter()
        .map(|def| Rule {
            id: def.id.to_string(),
            violation_type: def.violation_type,
            pattern: Regex::new(def.pattern).expect("built-in rule patterns are valid"),
            kinds: def.kinds.to_vec(),
            fields: def.fields.iter().map(|f| f.to_string()).collect(),
            description: def.description.to_string(),
            recommendation: def.recommendation.to_string(),
        })
        .collect()
});

/// An ordered collection of rules. Order decides which rule reports a
/// violation when several of the same type match one component.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleSet {
    /// The built-in rule table.
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_RULES.clone(),
        }
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Built-in rules followed by user-declared ones.
    pub fn with_custom(custom: &[CustomRuleConfig]) -> Result<Self> {
        let mut set = Self::builtin();
        for config in custom {
            set.push(Rule::from_config(config)?)?;
        }
        Ok(set)
    }

    pub fn push(&mut self, rule: Rule) -> Result<()> {
        if self.rules.iter().any(|r| r.id == rule.id) {
            return Err(Error::DuplicateRule { rule: rule.id });
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules that apply to `kind`, in table order.
    pub fn for_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |rule| rule.applies_to(kind))
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Violation types covered for a kind.
    pub fn categories(&self, kind: ComponentKind) -> HashSet<ViolationType> {
        self.for_kind(kind).map(|rule| rule.violation_type).collect()
    }
}
