//! Agent framework contract.
//!
//! The framework's reasoning loop is opaque to the pipeline: it receives a
//! profile, a task description and a live tool session, and returns either
//! raw output or a classified error.

use super::profile::AgentProfile;
use crate::mcp::ToolSession;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by an agent framework.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// A tool call could not be completed. Worth retrying.
    #[error("Tool '{tool}' invocation failed: {message}")]
    ToolInvocation { tool: String, message: String },

    #[error("Malformed task: {0}")]
    MalformedTask(String),

    #[error("{0}")]
    Framework(String),
}

impl AgentError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AgentError::ToolInvocation { .. })
    }
}

/// Raw output of one task execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Final text produced by the agent.
    pub output: String,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of iterations (LLM calls) used.
    pub iterations: usize,
}

impl ExecutionResult {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            tool_calls: Vec::new(),
            iterations: 1,
        }
    }
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

/// The agent framework collaborator.
#[async_trait]
pub trait AgentFramework: Send + Sync {
    async fn execute(
        &self,
        profile: &AgentProfile,
        task_description: &str,
        tools: &dyn ToolSession,
        timeout: Duration,
    ) -> std::result::Result<ExecutionResult, AgentError>;
}
