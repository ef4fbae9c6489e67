//! Agents: profiles, the registry, tasks, and task execution.
//!
//! A query is answered by exactly one agent profile. The profile, the query
//! and the open tool session form a [`Task`], which the [`TaskExecutor`]
//! drives through an [`AgentFramework`] under a deadline.

mod executor;
mod framework;
mod profile;
mod registry;
mod runner;
mod task;

pub use executor::{RetryPolicy, TaskExecutor};
pub use framework::{AgentError, AgentFramework, ExecutionResult, ToolCallRecord};
pub use profile::{AgentKind, AgentProfile};
pub use registry::AgentRegistry;
pub use runner::{tool_definitions, OpenAiAgent};
pub use task::Task;
