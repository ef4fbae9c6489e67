//! Tool session lifecycle.
//!
//! Every query opens its own session, uses it for exactly one task, and
//! closes it again. Sessions are never pooled.

use super::client::McpSession;
use super::protocol::ToolDescriptor;
use crate::config::McpSettings;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

/// Output of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    /// The tool ran but reported a failure (bad query, unknown tool).
    pub is_error: bool,
}

/// One open connection to the tool-calling bridge.
#[async_trait]
pub trait ToolSession: Send + Sync {
    fn id(&self) -> &str;

    /// Tools discovered when the session was opened.
    fn tools(&self) -> &[ToolDescriptor];

    /// Invoke a tool. A call the server rejected comes back as an
    /// `is_error` output. `Err` means the call never completed (IO, EOF,
    /// undecodable reply), which the executor treats as transient.
    async fn invoke(&self, name: &str, arguments: Value) -> Result<ToolOutput>;

    /// Release the session. Idempotent and infallible.
    async fn close(&mut self);

    /// Best-effort synchronous release, used when the owner is dropped
    /// before reaching [`close`](Self::close).
    fn abort(&mut self);
}

/// Opens and closes tool sessions.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Open a fresh session. Failure means the data source is unavailable.
    async fn open(&self) -> Result<Box<dyn ToolSession>>;

    /// Close a session. Must not fail and may be called more than once.
    async fn close(&self, session: &mut dyn ToolSession) {
        session.close().await;
    }
}

/// Session manager that spawns an MCP stdio server per session.
pub struct McpSessionManager {
    settings: McpSettings,
}

impl McpSessionManager {
    pub fn new(settings: McpSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionManager for McpSessionManager {
    async fn open(&self) -> Result<Box<dyn ToolSession>> {
        let session = McpSession::spawn(&self.settings).await?;
        Ok(Box::new(session))
    }
}

/// Scope guard over an open session.
///
/// [`close`](Self::close) is the normal release path. If the guard is dropped
/// without it (the owning future was cancelled or panicked), the session is
/// aborted on drop.
pub struct ScopedSession {
    session: Box<dyn ToolSession>,
    released: bool,
}

impl ScopedSession {
    pub fn new(session: Box<dyn ToolSession>) -> Self {
        Self {
            session,
            released: false,
        }
    }

    pub fn session(&self) -> &dyn ToolSession {
        self.session.as_ref()
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        self.session.tools()
    }

    /// Close through the manager and disarm the drop guard.
    pub async fn close(mut self, manager: &dyn SessionManager) {
        manager.close(self.session.as_mut()).await;
        self.released = true;
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if !self.released {
            warn!("Session {} dropped without close; aborting", self.session.id());
            self.session.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSession {
        closes: Arc<AtomicUsize>,
        aborts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ToolSession for CountingSession {
        fn id(&self) -> &str {
            "counting"
        }

        fn tools(&self) -> &[ToolDescriptor] {
            &[]
        }

        async fn invoke(&self, _name: &str, _arguments: Value) -> Result<ToolOutput> {
            Ok(ToolOutput {
                text: String::new(),
                is_error: false,
            })
        }

        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn abort(&mut self) {
            self.aborts.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NoopManager;

    #[async_trait]
    impl SessionManager for NoopManager {
        async fn open(&self) -> Result<Box<dyn ToolSession>> {
            unreachable!()
        }
    }

    fn counting() -> (ScopedSession, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let aborts = Arc::new(AtomicUsize::new(0));
        let session = CountingSession {
            closes: closes.clone(),
            aborts: aborts.clone(),
        };
        (ScopedSession::new(Box::new(session)), closes, aborts)
    }

    #[tokio::test]
    async fn test_explicit_close_disarms_guard() {
        let (scoped, closes, aborts) = counting();
        scoped.close(&NoopManager).await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(aborts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_without_close_aborts() {
        let (scoped, closes, aborts) = counting();
        drop(scoped);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
    }
}
