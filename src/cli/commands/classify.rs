//! Classify command implementation.

use crate::agent::AgentRegistry;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::routing::{Classifier, Query};
use anyhow::Result;

/// Show which agent would answer a query. Runs nothing.
pub fn run_classify(query: &str, settings: &Settings) -> Result<()> {
    preflight::check(Operation::Classify, &settings.mcp)?;

    let registry = AgentRegistry::load(settings.profiles.custom_dir.as_deref())?;
    let classifier = Classifier::from_registry(&registry);

    let query = Query::new(query);
    let kind = classifier.classify(&query);
    let profile = registry.profile_for(kind);

    Output::success(&format!("{} agent", kind));
    Output::kv("Role", &profile.role);
    Output::kv("Goal", &profile.goal);

    let matched: Vec<&str> = profile
        .keywords
        .iter()
        .filter(|k| query.normalized().contains(k.as_str()))
        .map(String::as_str)
        .collect();
    if matched.is_empty() {
        Output::kv("Matched", "no keywords (fallback)");
    } else {
        Output::kv("Matched", &matched.join(", "));
    }

    Ok(())
}
