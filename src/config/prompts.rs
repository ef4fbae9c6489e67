//! Task prompt templates for Marketlens.
//!
//! Templates use `{{variable}}` placeholders. `{{query}}` is always provided;
//! anything in `variables` is available too (e.g. `{{business_name}}`).

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").ok())
        .as_ref()
}

/// Templates used to turn a query into an agent task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPrompts {
    /// Task description handed to the agent.
    pub description: String,
    /// What the finished answer must look like.
    pub expected_output: String,
    /// Custom variables available in both templates.
    pub variables: HashMap<String, String>,
}

impl Default for TaskPrompts {
    fn default() -> Self {
        Self {
            description: r#"Process the following marketing analytics query about the Neo4j graph database: {{query}}

Use the available tools to inspect the graph schema and run read-only Cypher queries.
Base every figure you report on data returned by the tools.
Provide a detailed and comprehensive answer to the query."#
                .to_string(),

            expected_output: r#"A report answering: {{query}}

Structure the answer under exactly these Markdown headings, in this order:
## Executive Summary
## Performance Metrics
## Optimization Opportunities
## Action Plan

If the data does not support a section, keep the heading and say so briefly."#
                .to_string(),
            variables: HashMap::new(),
        }
    }
}

impl TaskPrompts {
    /// Render a template with the given variables in a single pass.
    /// Substituted values are never rescanned; unknown placeholders stay as written.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let Some(pattern) = placeholder_pattern() else {
            return template.to_string();
        };
        pattern
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render the full task description for a query.
    /// The query takes precedence over a custom variable of the same name.
    pub fn render_task(&self, query: &str) -> String {
        let mut vars = self.variables.clone();
        vars.insert("query".to_string(), query.to_string());

        let description = Self::render(&self.description, &vars);
        let expected = Self::render(&self.expected_output, &vars);
        if expected.trim().is_empty() {
            description
        } else {
            format!("{}\n\nExpected output:\n{}", description, expected)
        }
    }
}
