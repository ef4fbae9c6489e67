//! Serve command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::QueryPipeline;
use crate::server::{self, AppState};
use std::sync::Arc;

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let pipeline = Arc::new(QueryPipeline::new(&settings)?);
    let state = Arc::new(AppState::new(pipeline, settings));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Marketlens API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("Environment", &state.settings.general.environment);
    println!();
    println!("Endpoints:");
    Output::kv("Info", "GET  /");
    Output::kv("Health", "GET  /health");
    Output::kv("Query", "POST /crewai");
    Output::kv("Query", "POST /query");
    println!();
    if state.settings.security.api_keys.is_empty() {
        Output::warning("No API keys configured; query endpoints are open.");
    }
    Output::info("Press Ctrl+C to stop the server.");

    server::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    Output::info("Server stopped.");
    Ok(())
}
