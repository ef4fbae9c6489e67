//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::QueryPipeline;
use crate::routing::Query;
use crate::server::{validate_query, QueryResponse};
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Run the ask command.
pub async fn run_ask(query: &str, json: bool, settings: Settings) -> Result<()> {
    let text = validate_query(query, settings.security.max_query_length)?;

    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings.mcp) {
        Output::error(&format!("{}", e));
        Output::info("Run 'marketlens doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = QueryPipeline::new(&settings)?;
    let query = Query::new(text);
    let agent = pipeline.classifier().classify(&query);

    // Ctrl+C cancels the query and still closes the tool session.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let spinner = Output::spinner(&format!("Asking the {} agent...", agent));
    let result = pipeline.run_with_cancellation(&query, &cancel).await;
    spinner.finish_and_clear();

    match result {
        Ok(outcome) => {
            if json {
                let response = QueryResponse::from(outcome);
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Ok(());
            }

            Output::header(&format!("{} agent", outcome.agent));
            Output::report(&outcome.report);
            println!();
            Output::kv("Request", &outcome.request_id.to_string());
            Output::kv("Tool calls", &outcome.tool_calls.to_string());
            Output::kv("Elapsed", &format!("{:.1}s", outcome.elapsed.as_secs_f32()));
            if outcome.report.is_degraded() {
                Output::warning("Some sections were not present in the agent's answer.");
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Query failed ({}): {}", e.kind(), e));
            if e.is_retryable() {
                Output::info("This failure is transient; try again shortly.");
            }
            Err(e.into())
        }
    }
}
