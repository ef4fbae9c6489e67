//! Marketlens - marketing analytics query router
//!
//! Routes free-text marketing questions to a specialist agent, lets that agent
//! query an analytics graph through an MCP tool bridge, and returns a
//! four-section report.
//!
//! # Overview
//!
//! Each query goes through the same steps:
//! - classify the text into an agent kind (Ads, Website, General)
//! - look up that kind's agent profile
//! - open a fresh tool session for this query only
//! - run one task through the agent framework under a deadline
//! - close the session, on every path
//! - normalize the output into Executive Summary, Performance Metrics,
//!   Optimization Opportunities and Action Plan
//!
//! # Architecture
//!
//! - `routing` - Query type and keyword classifier
//! - `agent` - Profiles, registry, tasks, executor, OpenAI framework
//! - `mcp` - MCP stdio client and scoped tool sessions
//! - `report` - Fixed-section report formatter
//! - `pipeline` - Per-query orchestration and state machine
//! - `server` - HTTP API
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use marketlens::config::Settings;
//! use marketlens::pipeline::QueryPipeline;
//! use marketlens::routing::Query;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = QueryPipeline::new(&settings)?;
//!
//!     let outcome = pipeline
//!         .run(&Query::new("What are my top performing Google Ads campaigns?"))
//!         .await?;
//!     println!("{}", outcome.report.to_markdown());
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod mcp;
pub mod openai;
pub mod pipeline;
pub mod report;
pub mod routing;
pub mod server;

pub use error::{MarketlensError, Result};
