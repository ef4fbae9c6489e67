//! Doctor command - verify system requirements and configuration.

use crate::agent::AgentRegistry;
use crate::cli::Output;
use crate::config::Settings;
use crate::server::REQUIRED_ENV_VARS;
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: Option<&str>) -> anyhow::Result<()> {
    Output::header("Marketlens Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    let mut section = |title: &str, results: Vec<CheckResult>| {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        println!();
        checks.extend(results);
    };

    section("MCP Bridge", vec![check_tool(&settings.mcp.command)]);
    section(
        "Environment",
        REQUIRED_ENV_VARS
            .iter()
            .map(|name| check_env_var(name, std::env::var(name).ok()))
            .collect(),
    );
    section("Agent Profiles", vec![check_profiles(settings)]);
    section("Configuration", vec![check_config_file(config_path), check_security(settings)]);

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Marketlens.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!(
            "All checks passed with {} warning(s).",
            warnings
        ));
    } else {
        Output::success("All checks passed! Marketlens is ready to use.");
    }

    Ok(())
}

/// Check if the MCP launcher is available.
fn check_tool(name: &str) -> CheckResult {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => {
            // Try to extract version from first line
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            CheckResult::ok(name, &version)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", install_hint(name)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", install_hint(name))
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), install_hint(name)),
    }
}

/// Check one required environment variable. Secrets are masked.
fn check_env_var(name: &str, value: Option<String>) -> CheckResult {
    let hint = format!("Set with: export {}=...", name);
    match value {
        None => CheckResult::error(name, "not set", &hint),
        Some(v) if v.trim().is_empty() => CheckResult::error(name, "empty", &hint),
        Some(v) if name == "OPENAI_API_KEY" && !v.starts_with("sk-") => CheckResult::warning(
            name,
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Some(v) if name.ends_with("PASSWORD") || name.ends_with("KEY") => {
            CheckResult::ok(name, &format!("configured ({})", mask(&v)))
        }
        Some(v) => CheckResult::ok(name, &v),
    }
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check that profile overrides load and validate.
fn check_profiles(settings: &Settings) -> CheckResult {
    let source = settings
        .profiles
        .custom_dir
        .clone()
        .unwrap_or_else(|| "built-in".to_string());
    match AgentRegistry::load(settings.profiles.custom_dir.as_deref()) {
        Ok(_) => CheckResult::ok("Profiles", &source),
        Err(e) => CheckResult::error("Profiles", &e.to_string(), "Fix or remove the override files"),
    }
}

/// Check if config file exists.
fn check_config_file(config_path: Option<&str>) -> CheckResult {
    let config_path = match config_path {
        Some(p) => Settings::expand_path(p),
        None => Settings::default_config_path(),
    };
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: marketlens config edit",
        )
    }
}

/// Warn about open endpoints in production.
fn check_security(settings: &Settings) -> CheckResult {
    if settings.is_production() && settings.security.api_keys.is_empty() {
        CheckResult::warning(
            "API keys",
            "none configured in production",
            "Set API_KEYS or security.api_keys",
        )
    } else if settings.security.api_keys.is_empty() {
        CheckResult::ok("API keys", "not required (development)")
    } else {
        CheckResult::ok(
            "API keys",
            &format!("{} configured", settings.security.api_keys.len()),
        )
    }
}

/// Platform-specific install hint for the MCP launcher.
fn install_hint(name: &str) -> &'static str {
    if name != "uvx" {
        "Check mcp.command in the config file"
    } else if cfg!(target_os = "macos") {
        "Install uv with: brew install uv"
    } else {
        "Install uv with: curl -LsSf https://astral.sh/uv/install.sh | sh"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_check_env_var() {
        assert_eq!(check_env_var("NEO4J_URI", None).status, CheckStatus::Error);
        assert_eq!(check_env_var("NEO4J_URI", Some(" ".to_string())).status, CheckStatus::Error);

        let uri = check_env_var("NEO4J_URI", Some("bolt://localhost:7687".to_string()));
        assert_eq!(uri.status, CheckStatus::Ok);
        assert_eq!(uri.message, "bolt://localhost:7687");

        let password = check_env_var("NEO4J_PASSWORD", Some("correct-horse-battery".to_string()));
        assert!(!password.message.contains("horse"));

        let odd_key = check_env_var("OPENAI_API_KEY", Some("not-a-key".to_string()));
        assert_eq!(odd_key.status, CheckStatus::Warning);
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("short"), "****");
        assert_eq!(mask("sk-abcdefghijklmnop"), "sk-a...mnop");
    }

    #[test]
    fn test_security_warning_in_production() {
        let mut settings = Settings::default();
        settings.general.environment = "production".to_string();
        assert_eq!(check_security(&settings).status, CheckStatus::Warning);
        settings.security.api_keys = vec!["k".to_string()];
        assert_eq!(check_security(&settings).status, CheckStatus::Ok);
    }
}
