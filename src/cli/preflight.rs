//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::McpSettings;
use crate::error::{MarketlensError, Result};
use crate::server::REQUIRED_ENV_VARS;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering a query needs the API key, the database, and the bridge.
    Ask,
    /// Listing tools needs the database and the bridge.
    Tools,
    /// Classification runs entirely locally.
    Classify,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, mcp: &McpSettings) -> Result<()> {
    match operation {
        Operation::Ask => {
            check_env(REQUIRED_ENV_VARS)?;
            check_tool(&mcp.command)?;
        }
        Operation::Tools => {
            check_env(&["NEO4J_URI", "NEO4J_USERNAME", "NEO4J_PASSWORD"])?;
            check_tool(&mcp.command)?;
        }
        Operation::Classify => {
            // No external requirements for classification
        }
    }
    Ok(())
}

/// Check that every variable is set and non-empty.
fn check_env(names: &[&str]) -> Result<()> {
    let missing: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| std::env::var(name).map_or(true, |v| v.is_empty()))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MarketlensError::Config(format!(
            "Missing environment variables: {}. Set them with: export {}=...",
            missing.join(", "),
            missing[0]
        )))
    }
}

/// Check if the MCP launcher is available.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(MarketlensError::ToolUnavailable(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
            MarketlensError::ToolUnavailable(format!("{} not found on PATH", name)),
        ),
        Err(e) => Err(MarketlensError::ToolUnavailable(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_classify_no_requirements() {
        // Classification should always pass pre-flight (no external requirements)
        assert!(check(Operation::Classify, &McpSettings::default()).is_ok());
    }

    #[test]
    fn test_missing_tool_is_unavailable() {
        let err = check_tool("marketlens-definitely-not-installed").unwrap_err();
        assert!(matches!(err, MarketlensError::ToolUnavailable(_)));
    }

    #[test]
    fn test_check_env_names_missing_variables() {
        let err = check_env(&["MARKETLENS_TEST_UNSET_VAR"]).unwrap_err();
        assert!(err.to_string().contains("MARKETLENS_TEST_UNSET_VAR"));
        assert!(check_env(&[]).is_ok());
    }
}
