//! A bound unit of agent work.

use super::profile::{AgentKind, AgentProfile};
use crate::config::TaskPrompts;
use crate::mcp::ToolDescriptor;
use crate::routing::Query;

/// One query bound to a profile and a session's tool list.
///
/// Borrowed from the registry and the open session, so a task cannot
/// outlive the session it was built for.
#[derive(Debug)]
pub struct Task<'a> {
    query: &'a Query,
    kind: AgentKind,
    profile: &'a AgentProfile,
    tools: &'a [ToolDescriptor],
    description: String,
}

impl<'a> Task<'a> {
    pub fn new(
        query: &'a Query,
        kind: AgentKind,
        profile: &'a AgentProfile,
        tools: &'a [ToolDescriptor],
        prompts: &TaskPrompts,
    ) -> Self {
        Self {
            query,
            kind,
            profile,
            tools,
            description: prompts.render_task(query.text()),
        }
    }

    pub fn query(&self) -> &Query {
        self.query
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn profile(&self) -> &AgentProfile {
        self.profile
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        self.tools
    }

    /// Rendered task description handed to the agent framework.
    pub fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_renders_query_into_description() {
        let query = Query::new("Which suburbs produce the most leads?");
        let profile = AgentProfile::builtin(AgentKind::General);
        let task = Task::new(&query, AgentKind::General, &profile, &[], &TaskPrompts::default());

        assert!(task.description().contains("Which suburbs produce the most leads?"));
        assert_eq!(task.kind(), AgentKind::General);
        assert!(task.tools().is_empty());
    }
}
