//! Task executor: one task, one deadline, bounded retries.

use super::framework::{AgentFramework, ExecutionResult};
use super::task::Task;
use crate::config::AgentSettings;
use crate::error::{MarketlensError, Result};
use crate::mcp::ToolSession;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Backoff schedule for transient tool failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&AgentSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            max_delay: Duration::from_millis(settings.retry_max_delay_ms),
        }
    }

    /// Delay before retry number `retry` (0-based), doubling each time.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Drives the agent framework through exactly one task.
pub struct TaskExecutor {
    framework: Arc<dyn AgentFramework>,
    retry: RetryPolicy,
}

impl TaskExecutor {
    pub fn new(framework: Arc<dyn AgentFramework>, retry: RetryPolicy) -> Self {
        Self { framework, retry }
    }

    /// Run the task against the session's tools.
    ///
    /// The timeout covers every attempt and backoff. Once it expires the
    /// in-flight framework call is dropped. The caller still owns and must
    /// close the session.
    #[instrument(skip_all, fields(agent = %task.kind(), query = %task.query().fingerprint()))]
    pub async fn run(
        &self,
        task: Task<'_>,
        session: &dyn ToolSession,
        timeout: Duration,
    ) -> Result<ExecutionResult> {
        if task.description().trim().is_empty() {
            return Err(MarketlensError::AgentExecutionError(
                "Malformed task: empty task description".to_string(),
            ));
        }

        let deadline = Instant::now() + timeout;
        match tokio::time::timeout_at(deadline, self.run_with_retries(&task, session, deadline)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Task abandoned after {}s", timeout.as_secs_f32());
                Err(MarketlensError::AgentExecutionTimeout(timeout))
            }
        }
    }

    async fn run_with_retries(
        &self,
        task: &Task<'_>,
        session: &dyn ToolSession,
        deadline: Instant,
    ) -> Result<ExecutionResult> {
        let mut retry = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let attempt = self
                .framework
                .execute(task.profile(), task.description(), session, remaining)
                .await;

            match attempt {
                Ok(result) => {
                    info!(
                        "Task finished after {} iteration(s), {} tool call(s)",
                        result.iterations,
                        result.tool_calls.len()
                    );
                    return Ok(result);
                }
                Err(e) if e.is_transient() && retry < self.retry.max_retries => {
                    let delay = self.retry.delay_for_retry(retry);
                    warn!(
                        "Transient failure (retry {}/{} in {:?}): {}",
                        retry + 1,
                        self.retry.max_retries,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(MarketlensError::AgentExecutionError(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::framework::AgentError;
    use crate::agent::{AgentKind, AgentProfile};
    use crate::config::TaskPrompts;
    use crate::mcp::{ToolDescriptor, ToolOutput};
    use crate::routing::Query;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullSession;

    #[async_trait]
    impl ToolSession for NullSession {
        fn id(&self) -> &str {
            "null"
        }
        fn tools(&self) -> &[ToolDescriptor] {
            &[]
        }
        async fn invoke(&self, _name: &str, _arguments: Value) -> Result<ToolOutput> {
            Err(MarketlensError::Protocol("no tools".to_string()))
        }
        async fn close(&mut self) {}
        fn abort(&mut self) {}
    }

    /// Fails with the scripted errors in order, then succeeds.
    struct ScriptedFramework {
        failures: Vec<AgentError>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedFramework {
        fn new(failures: Vec<AgentError>) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl AgentFramework for ScriptedFramework {
        async fn execute(
            &self,
            _profile: &AgentProfile,
            _task_description: &str,
            _tools: &dyn ToolSession,
            _timeout: Duration,
        ) -> std::result::Result<ExecutionResult, AgentError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.failures.get(n) {
                Some(e) => Err(e.clone()),
                None => Ok(ExecutionResult::text("## Executive Summary\nAll good")),
            }
        }
    }

    fn transient() -> AgentError {
        AgentError::ToolInvocation {
            tool: "read_neo4j_cypher".to_string(),
            message: "connection reset".to_string(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    async fn run(framework: Arc<ScriptedFramework>, timeout: Duration) -> Result<ExecutionResult> {
        let query = Query::new("top campaigns");
        let profile = AgentProfile::builtin(AgentKind::Ads);
        let task = Task::new(&query, AgentKind::Ads, &profile, &[], &TaskPrompts::default());
        TaskExecutor::new(framework, fast_policy())
            .run(task, &NullSession, timeout)
            .await
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(4000),
        };
        assert_eq!(policy.delay_for_retry(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_retry(30), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let framework = Arc::new(ScriptedFramework::new(vec![transient(), transient()]));
        let result = run(framework.clone(), Duration::from_secs(5)).await.unwrap();
        assert!(result.output.contains("Executive Summary"));
        assert_eq!(framework.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let framework = Arc::new(ScriptedFramework::new(vec![transient(); 5]));
        let err = run(framework.clone(), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, MarketlensError::AgentExecutionError(_)));
        assert_eq!(framework.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_failure_is_not_retried() {
        let framework = Arc::new(ScriptedFramework::new(vec![AgentError::Framework(
            "invalid api key".to_string(),
        )]));
        let err = run(framework.clone(), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, MarketlensError::AgentExecutionError(ref m) if m.contains("invalid api key")));
        assert_eq!(framework.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_abandons_execution() {
        let framework = Arc::new(ScriptedFramework {
            delay: Duration::from_secs(30),
            ..ScriptedFramework::new(vec![])
        });
        let err = run(framework, Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, MarketlensError::AgentExecutionTimeout(_)));
    }

    #[tokio::test]
    async fn test_empty_description_is_malformed() {
        let query = Query::new("anything");
        let profile = AgentProfile::builtin(AgentKind::General);
        let prompts = TaskPrompts {
            description: String::new(),
            expected_output: String::new(),
            ..TaskPrompts::default()
        };
        let task = Task::new(&query, AgentKind::General, &profile, &[], &prompts);
        let framework = Arc::new(ScriptedFramework::new(vec![]));

        let err = TaskExecutor::new(framework.clone(), fast_policy())
            .run(task, &NullSession, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketlensError::AgentExecutionError(_)));
        assert_eq!(framework.calls.load(Ordering::SeqCst), 0);
    }
}
