//! Platform-specific enrichment of failures

use deploy_meta::Platform;
use serde::{Deserialize, Serialize};

use super::DeployError;
use super::code::DeployErrorCode;

/// Extra detail about the platform a failure happened on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformContext {
    pub platform: Platform,
    pub config_dir: String,
    pub hint: String,
}

/// Attach platform context and a platform-specific hint to `error`.
pub fn enrich_for_platform(mut error: DeployError, platform: Platform) -> DeployError {
    error.platform_context = Some(PlatformContext {
        platform,
        config_dir: platform.config_dir().to_string(),
        hint: hint(error.code, platform),
    });
    error
}

fn hint(code: DeployErrorCode, platform: Platform) -> String {
    let name = platform.display_name();
    let dir = platform.config_dir();
    match (code, platform) {
        (DeployErrorCode::PermissionDenied | DeployErrorCode::FileLocked, Platform::ClaudeCode) => {
            format!("{name} rewrites {dir}/settings.json while running; exit open sessions and retry")
        }
        (DeployErrorCode::PermissionDenied | DeployErrorCode::FileLocked, Platform::Kiro) => {
            format!("{name} watches {dir}/hooks; close the workspace in {name} and retry")
        }
        (DeployErrorCode::PermissionDenied | DeployErrorCode::FileLocked, _) => {
            format!("{name} may hold files under {dir} open; close the window and retry")
        }
        (DeployErrorCode::UnsupportedComponent, _) => {
            let kinds: Vec<&str> = platform
                .supported_kinds()
                .iter()
                .map(|kind| kind.as_str())
                .collect();
            format!("{name} accepts: {}", kinds.join(", "))
        }
        (DeployErrorCode::PlatformConfigInvalid, _) => {
            format!("Fix or remove the unparsable file under {dir} before deploying")
        }
        _ => format!("{name} configuration lives under {dir}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_context_without_touching_code() {
        let error = DeployError::new(DeployErrorCode::PermissionDenied, "denied");
        let enriched = enrich_for_platform(error, Platform::ClaudeCode);
        assert_eq!(enriched.code, DeployErrorCode::PermissionDenied);
        let ctx = enriched.platform_context.unwrap();
        assert_eq!(ctx.config_dir, ".claude");
        assert!(ctx.hint.contains("settings.json"));
    }

    #[test]
    fn unsupported_component_lists_kinds() {
        let error = DeployError::new(DeployErrorCode::UnsupportedComponent, "tasks");
        let enriched = enrich_for_platform(error, Platform::Kiro);
        let hint = enriched.platform_context.unwrap().hint;
        assert!(hint.contains("templates"));
        assert!(!hint.contains("tasks"));
    }
}
