//! Marketlens CLI entry point.

use anyhow::Result;
use clap::Parser;
use marketlens::cli::{commands, Cli, Commands};
use marketlens::config::Settings;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration. Warnings about bad overrides go to a temporary
    // stderr logger since the real one depends on these settings.
    let settings =
        tracing::subscriber::with_default(bootstrap_subscriber(std::io::stderr), || {
            match &cli.config {
                Some(path) => Settings::load_from(Some(&Settings::expand_path(path))),
                None => Settings::load(),
            }
        })?;

    // Initialize logging: RUST_LOG, then -v, then general.log_level
    let filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_directive(cli.verbose, &settings)),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if settings.is_production() {
        // Structured lines for log shippers
        registry.with(fmt::layer().json().with_target(false)).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }

    // Execute command
    match &cli.command {
        Commands::Serve { host, port } => {
            let host = host.clone().unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            commands::run_serve(&host, port, settings).await?;
        }

        Commands::Ask { query, json } => {
            commands::run_ask(query, *json, settings).await?;
        }

        Commands::Classify { query } => {
            commands::run_classify(query, &settings)?;
        }

        Commands::Tools => {
            commands::run_tools(&settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings, cli.config.as_deref())?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, cli.config.as_deref())?;
        }
    }

    Ok(())
}

/// Warn-level logger used only while settings are being loaded.
fn bootstrap_subscriber<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fmt()
        .with_writer(writer)
        .with_target(false)
        .with_max_level(tracing::Level::WARN)
        .finish()
}

fn default_directive(verbose: u8, settings: &Settings) -> String {
    let level = match verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("marketlens={}", level)
}
