//! Target platforms a bundle can be deployed into.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::component::ComponentKind;
use crate::error::Error;

/// A target IDE environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "vscode")]
    VsCode,
    #[serde(rename = "cursor")]
    Cursor,
    #[serde(rename = "windsurf")]
    Windsurf,
    #[serde(rename = "claude-code")]
    ClaudeCode,
    #[serde(rename = "kiro")]
    Kiro,
}

impl Platform {
    /// Every supported platform, in a stable order.
    pub const ALL: [Platform; 5] = [
        Platform::VsCode,
        Platform::Cursor,
        Platform::Windsurf,
        Platform::ClaudeCode,
        Platform::Kiro,
    ];

    /// Machine identifier used in bundles and on disk.
    pub fn id(&self) -> &'static str {
        match self {
            Self::VsCode => "vscode",
            Self::Cursor => "cursor",
            Self::Windsurf => "windsurf",
            Self::ClaudeCode => "claude-code",
            Self::Kiro => "kiro",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::VsCode => "VS Code",
            Self::Cursor => "Cursor",
            Self::Windsurf => "Windsurf",
            Self::ClaudeCode => "Claude Code",
            Self::Kiro => "Kiro",
        }
    }

    /// The platform's own configuration directory under a workspace root.
    pub fn config_dir(&self) -> &'static str {
        match self {
            Self::VsCode => ".vscode",
            Self::Cursor => ".cursor",
            Self::Windsurf => ".windsurf",
            Self::ClaudeCode => ".claude",
            Self::Kiro => ".kiro",
        }
    }

    /// Component kinds this platform can receive.
    pub fn supported_kinds(&self) -> &'static [ComponentKind] {
        use ComponentKind::*;
        match self {
            Self::VsCode => &[Settings, Extensions, AiPrompts, Tasks, Launch, Snippets],
            Self::Cursor | Self::Windsurf => {
                &[Settings, Extensions, AiPrompts, Tasks, Launch, Snippets]
            }
            Self::ClaudeCode => &[Settings, AiPrompts, Hooks, Agents],
            Self::Kiro => &[Settings, AiPrompts, Hooks, Agents, Templates],
        }
    }

    /// Whether `kind` can be deployed to this platform.
    pub fn supports(&self, kind: ComponentKind) -> bool {
        self.supported_kinds().contains(&kind)
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vscode" | "vs-code" | "code" => Ok(Self::VsCode),
            "cursor" | "cursor-ide" => Ok(Self::Cursor),
            "windsurf" => Ok(Self::Windsurf),
            "claude-code" | "claude" | "claudecode" => Ok(Self::ClaudeCode),
            "kiro" | "kiro-ide" => Ok(Self::Kiro),
            _ => Err(Error::UnknownPlatform { id: s.to_string() }),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
