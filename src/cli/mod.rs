//! CLI module for Marketlens.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Marketlens - marketing analytics query router
///
/// Routes marketing questions to a specialist agent that queries the
/// analytics graph through an MCP tool bridge and answers with a
/// four-section report.
#[derive(Parser, Debug)]
#[command(name = "marketlens")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (default: server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (default: server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Answer a marketing analytics question
    Ask {
        /// The question to ask
        query: String,

        /// Print the full JSON response instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Show which agent would handle a question, without running it
    Classify {
        /// The question to classify
        query: String,
    },

    /// Open a tool session and list the tools it offers
    Tools,

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["marketlens", "-vv", "ask", "top campaigns", "--json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Ask { query, json } => {
                assert_eq!(query, "top campaigns");
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["marketlens", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { host: None, port: None }));
    }

    #[test]
    fn test_parse_config_path() {
        let cli = Cli::try_parse_from(["marketlens", "--config", "/tmp/m.toml", "config", "path"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/tmp/m.toml"));
        assert!(matches!(cli.command, Commands::Config { action: ConfigAction::Path }));
    }
}
