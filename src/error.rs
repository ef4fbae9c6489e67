//! Error types for Marketlens.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Library-level error type for Marketlens operations.
#[derive(Error, Debug)]
pub enum MarketlensError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tool bridge unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Agent execution timed out after {}s", .0.as_secs())]
    AgentExecutionTimeout(Duration),

    #[error("Agent execution failed: {0}")]
    AgentExecutionError(String),

    #[error("Query was cancelled")]
    Cancelled,

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    /// The server answered a request with a JSON-RPC error object.
    #[error("'{method}' failed ({code}): {message}")]
    Rpc {
        method: String,
        code: i32,
        message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure classes surfaced at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    ToolUnavailable,
    AgentExecutionTimeout,
    AgentExecutionError,
    Cancelled,
    InvalidInput,
    Internal,
}

impl FailureKind {
    /// Whether the caller may retry the same query.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FailureKind::ToolUnavailable | FailureKind::AgentExecutionTimeout | FailureKind::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::ToolUnavailable => "ToolUnavailable",
            FailureKind::AgentExecutionTimeout => "AgentExecutionTimeout",
            FailureKind::AgentExecutionError => "AgentExecutionError",
            FailureKind::Cancelled => "Cancelled",
            FailureKind::InvalidInput => "InvalidInput",
            FailureKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MarketlensError {
    /// Classify this error into a boundary failure kind.
    pub fn kind(&self) -> FailureKind {
        match self {
            MarketlensError::ToolUnavailable(_) => FailureKind::ToolUnavailable,
            MarketlensError::AgentExecutionTimeout(_) => FailureKind::AgentExecutionTimeout,
            MarketlensError::AgentExecutionError(_) | MarketlensError::OpenAI(_) => {
                FailureKind::AgentExecutionError
            }
            MarketlensError::Cancelled => FailureKind::Cancelled,
            MarketlensError::InvalidInput(_) => FailureKind::InvalidInput,
            _ => FailureKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Result type alias for Marketlens operations.
pub type Result<T> = std::result::Result<T, MarketlensError>;
