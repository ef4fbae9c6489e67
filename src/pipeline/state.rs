//! Per-query state machine.

use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Where a query is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryState {
    Received,
    Classified,
    AgentSelected,
    SessionOpen,
    Executing,
    Succeeded,
    Failed,
    SessionClosed,
    Formatted,
    Returned,
}

impl QueryState {
    /// Whether `next` is a legal successor of `self`.
    ///
    /// `Failed` appears twice on a failure path: once when the failure
    /// happens and once, terminally, after the session is closed.
    pub fn can_transition_to(self, next: QueryState) -> bool {
        use QueryState::*;
        matches!(
            (self, next),
            (Received, Classified)
                | (Classified, AgentSelected)
                | (AgentSelected, SessionOpen)
                | (SessionOpen, Executing)
                | (SessionOpen, Failed)
                | (Executing, Succeeded)
                | (Executing, Failed)
                | (Succeeded, SessionClosed)
                | (Failed, SessionClosed)
                | (SessionClosed, Formatted)
                | (SessionClosed, Failed)
                | (Formatted, Returned)
        )
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Ordered record of the states a query passed through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTrace {
    states: Vec<QueryState>,
}

impl Default for StateTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTrace {
    /// A fresh trace, starting at `Received`.
    pub fn new() -> Self {
        Self {
            states: vec![QueryState::Received],
        }
    }

    pub fn current(&self) -> QueryState {
        self.states
            .last()
            .copied()
            .unwrap_or(QueryState::Received)
    }

    /// Record a transition. Illegal transitions are logged and still recorded
    /// so the trace shows what actually happened.
    pub fn advance(&mut self, next: QueryState) {
        let current = self.current();
        if !current.can_transition_to(next) {
            warn!("Illegal query state transition {} -> {}", current, next);
        }
        self.states.push(next);
    }

    pub fn states(&self) -> &[QueryState] {
        &self.states
    }

    /// `Returned`, or `Failed` reached after the session was closed.
    pub fn is_terminal(&self) -> bool {
        match self.states.as_slice() {
            [.., QueryState::Returned] => true,
            [.., QueryState::SessionClosed, QueryState::Failed] => true,
            _ => false,
        }
    }

    /// Whether every recorded step was a legal transition.
    pub fn is_valid(&self) -> bool {
        self.states
            .windows(2)
            .all(|w| w[0].can_transition_to(w[1]))
    }
}

impl fmt::Display for StateTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.states.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", names.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use QueryState::*;

    fn trace(states: &[QueryState]) -> StateTrace {
        let mut trace = StateTrace::new();
        for state in states {
            trace.advance(*state);
        }
        trace
    }

    #[test]
    fn test_success_path() {
        let t = trace(&[
            Classified,
            AgentSelected,
            SessionOpen,
            Executing,
            Succeeded,
            SessionClosed,
            Formatted,
            Returned,
        ]);
        assert!(t.is_valid());
        assert!(t.is_terminal());
        assert_eq!(t.current(), Returned);
    }

    #[test]
    fn test_failure_passes_through_session_closed() {
        let t = trace(&[
            Classified,
            AgentSelected,
            SessionOpen,
            Executing,
            Failed,
            SessionClosed,
            Failed,
        ]);
        assert!(t.is_valid());
        assert!(t.is_terminal());
    }

    #[test]
    fn test_failed_before_close_is_not_terminal() {
        let t = trace(&[Classified, AgentSelected, SessionOpen, Failed]);
        assert!(t.is_valid());
        assert!(!t.is_terminal());
    }

    #[test]
    fn test_illegal_transition_is_recorded() {
        let t = trace(&[Executing]);
        assert!(!t.is_valid());
        assert_eq!(t.current(), Executing);
    }

    #[test]
    fn test_display() {
        let t = trace(&[Classified]);
        assert_eq!(t.to_string(), "Received -> Classified");
    }
}
