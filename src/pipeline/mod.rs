//! Query pipeline.
//!
//! Coordinates one query from classification to the formatted report:
//! classify, select the profile, open a tool session, run the task, close the
//! session, format. The session is closed on every path out of the pipeline.

mod state;

pub use state::{QueryState, StateTrace};

use crate::agent::{
    AgentKind, AgentRegistry, OpenAiAgent, RetryPolicy, Task, TaskExecutor,
};
use crate::config::{Settings, TaskPrompts};
use crate::error::{FailureKind, MarketlensError, Result};
use crate::mcp::{McpSessionManager, ScopedSession, SessionManager};
use crate::report::{self, Report};
use crate::routing::{Classifier, Query};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// A successfully answered query.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub request_id: Uuid,
    pub agent: AgentKind,
    pub report: Report,
    /// Tool calls the agent made while answering.
    pub tool_calls: usize,
    pub elapsed: Duration,
    pub trace: StateTrace,
}

/// The query pipeline. Shared read-only across concurrent requests.
pub struct QueryPipeline {
    registry: Arc<AgentRegistry>,
    classifier: Classifier,
    sessions: Arc<dyn SessionManager>,
    executor: TaskExecutor,
    prompts: TaskPrompts,
    timeout: Duration,
}

impl QueryPipeline {
    /// Build the production pipeline: MCP sessions and the OpenAI agent.
    pub fn new(settings: &Settings) -> Result<Self> {
        let registry = AgentRegistry::load(settings.profiles.custom_dir.as_deref())?;
        info!(
            "Agent framework: OpenAI ({}), timeout {}s",
            settings.agent.model, settings.agent.timeout_secs
        );

        let executor = TaskExecutor::new(
            Arc::new(OpenAiAgent::from_settings(&settings.agent)),
            RetryPolicy::from_settings(&settings.agent),
        );

        Ok(Self::with_components(
            Arc::new(registry),
            Arc::new(McpSessionManager::new(settings.mcp.clone())),
            executor,
            settings.task.clone(),
            settings.agent.timeout(),
        ))
    }

    /// Build a pipeline from explicit components.
    pub fn with_components(
        registry: Arc<AgentRegistry>,
        sessions: Arc<dyn SessionManager>,
        executor: TaskExecutor,
        prompts: TaskPrompts,
        timeout: Duration,
    ) -> Self {
        let classifier = Classifier::from_registry(&registry);
        Self {
            registry,
            classifier,
            sessions,
            executor,
            prompts,
            timeout,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> Arc<dyn SessionManager> {
        self.sessions.clone()
    }

    /// Answer a query. Dropping the returned future aborts the session.
    pub async fn run(&self, query: &Query) -> Result<QueryOutcome> {
        self.run_with_cancellation(query, &CancellationToken::new())
            .await
    }

    /// Answer a query, giving up with [`MarketlensError::Cancelled`] as soon
    /// as `cancel` fires. The session is closed before returning.
    pub async fn run_with_cancellation(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome> {
        let mut trace = StateTrace::new();
        let result = self.run_traced(query, cancel, &mut trace).await;
        debug!("Query {} path: {}", query.fingerprint(), trace);
        result
    }

    /// Answer a query, recording every state transition in `trace`.
    #[instrument(skip_all, fields(query = %query.fingerprint()))]
    pub async fn run_traced(
        &self,
        query: &Query,
        cancel: &CancellationToken,
        trace: &mut StateTrace,
    ) -> Result<QueryOutcome> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();

        let kind = self.classifier.classify(query);
        trace.advance(QueryState::Classified);

        let profile = self.registry.profile_for(kind);
        trace.advance(QueryState::AgentSelected);
        info!("Routing query {} to {} agent ({})", request_id, kind, profile.role);

        trace.advance(QueryState::SessionOpen);
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MarketlensError::Cancelled),
            opened = self.sessions.open() => opened,
        };
        let session = match opened {
            Ok(session) => session,
            Err(e) => {
                // Nothing was opened, so there is nothing to close.
                let e = match e.kind() {
                    FailureKind::ToolUnavailable | FailureKind::Cancelled => e,
                    _ => MarketlensError::ToolUnavailable(e.to_string()),
                };
                trace.advance(QueryState::Failed);
                trace.advance(QueryState::SessionClosed);
                trace.advance(QueryState::Failed);
                error!("Query {} failed: {}", request_id, e);
                return Err(e);
            }
        };

        let scoped = ScopedSession::new(session);
        debug!("Session {} open with {} tool(s)", scoped.session().id(), scoped.tools().len());

        trace.advance(QueryState::Executing);
        let executed = {
            let task = Task::new(query, kind, profile, scoped.tools(), &self.prompts);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(MarketlensError::Cancelled),
                result = self.executor.run(task, scoped.session(), self.timeout) => result,
            }
        };
        trace.advance(if executed.is_ok() {
            QueryState::Succeeded
        } else {
            QueryState::Failed
        });

        scoped.close(self.sessions.as_ref()).await;
        trace.advance(QueryState::SessionClosed);

        let result = match executed {
            Ok(result) => result,
            Err(e) => {
                trace.advance(QueryState::Failed);
                error!("Query {} failed: {}", request_id, e);
                return Err(e);
            }
        };

        let report = report::format(&result);
        trace.advance(QueryState::Formatted);

        let elapsed = started.elapsed();
        trace.advance(QueryState::Returned);
        info!(
            "Query {} answered by {} agent in {:.1}s ({} tool call(s))",
            request_id,
            kind,
            elapsed.as_secs_f32(),
            result.tool_calls.len()
        );

        Ok(QueryOutcome {
            request_id,
            agent: kind,
            report,
            tool_calls: result.tool_calls.len(),
            elapsed,
            trace: trace.clone(),
        })
    }
}
