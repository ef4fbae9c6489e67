//! Tools command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::mcp::{McpSessionManager, ScopedSession, SessionManager};
use anyhow::Result;

/// Open one tool session, list its tools, and close it.
pub async fn run_tools(settings: &Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Tools, &settings.mcp) {
        Output::error(&format!("{}", e));
        Output::info("Run 'marketlens doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let manager = McpSessionManager::new(settings.mcp.clone());
    let spinner = Output::spinner(&format!("Starting {}...", settings.mcp.command));
    let opened = manager.open().await;
    spinner.finish_and_clear();

    let session = ScopedSession::new(opened?);
    Output::header(&format!("Tools ({})", session.tools().len()));
    for tool in session.tools() {
        Output::tool(&tool.name, tool.description.as_deref());
    }
    session.close(&manager).await;

    Ok(())
}
