//! Agent kinds and the static profiles that describe each analysis persona.

use serde::{Deserialize, Serialize};

/// The closed set of analysis pipelines a query can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Paid search and advertising campaigns.
    Ads,
    /// Website traffic, behaviour and conversion.
    Website,
    /// Everything else.
    General,
}

impl AgentKind {
    /// All kinds, in classification priority order.
    pub const ALL: [AgentKind; 3] = [AgentKind::Ads, AgentKind::Website, AgentKind::General];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Ads => "ads",
            AgentKind::Website => "website",
            AgentKind::General => "general",
        }
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ads" | "google_ads" => Ok(AgentKind::Ads),
            "website" | "web" => Ok(AgentKind::Website),
            "general" => Ok(AgentKind::General),
            _ => Err(format!("Unknown agent kind: {}", s)),
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static configuration for one analysis persona.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    /// Role name presented to the model.
    pub role: String,
    /// What the agent is trying to achieve.
    pub goal: String,
    /// Operating instructions (the persona's backstory and method).
    pub instructions: String,
    /// Lower-cased keywords that route a query to this profile.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl AgentProfile {
    /// Built-in profile for the given kind.
    pub fn builtin(kind: AgentKind) -> Self {
        match kind {
            AgentKind::Ads => Self {
                role: "Google Ads Performance Analyst".to_string(),
                goal: "Analyze paid search campaigns in the marketing graph and find the \
                    changes that will lower cost per lead and raise return on ad spend."
                    .to_string(),
                instructions: r#"You are a paid search specialist for trade businesses (plumbers, electricians, builders).
Query the Neo4j graph for campaigns, ad groups, keywords and their spend, clicks, impressions, conversions and cost.
Compare campaigns against each other and against their own history before drawing conclusions.
Quote the numbers you relied on. Never invent metrics that the graph did not return."#
                    .to_string(),
                keywords: to_keywords(&[
                    "ads",
                    "campaign",
                    "adwords",
                    "cpc",
                    "ctr",
                    "roas",
                    "ad spend",
                    "impressions",
                    "bidding",
                ]),
            },
            AgentKind::Website => Self {
                role: "Website Conversion Analyst".to_string(),
                goal: "Analyze website traffic and visitor behaviour in the marketing graph and \
                    find what is stopping visitors from becoming leads."
                    .to_string(),
                instructions: r#"You are a conversion rate specialist for trade business websites.
Query the Neo4j graph for pages, sessions, traffic sources, bounce rates and conversion events.
Look for the pages and sources where visitors drop off, and relate them to lead volume.
Quote the numbers you relied on. Never invent metrics that the graph did not return."#
                    .to_string(),
                keywords: to_keywords(&[
                    "website",
                    "conversion",
                    "landing page",
                    "bounce",
                    "traffic",
                    "page view",
                    "seo",
                ]),
            },
            AgentKind::General => Self {
                role: "Marketing Data Analyst".to_string(),
                goal: "Answer marketing questions about the business using the data held in the \
                    Neo4j graph database."
                    .to_string(),
                instructions: r#"You are a generalist marketing analyst with access to the business's graph database.
Inspect the graph schema first, then write focused Cypher queries to answer the question.
Quote the numbers you relied on. Never invent metrics that the graph did not return."#
                    .to_string(),
                keywords: Vec::new(),
            },
        }
    }

    /// Render the system prompt for this profile.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are a {}.\n\nGoal: {}\n\n{}",
            self.role, self.goal, self.instructions
        )
    }
}

fn to_keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_kind_parse_and_display() {
        assert_eq!("Ads".parse::<AgentKind>().unwrap(), AgentKind::Ads);
        assert_eq!("website".parse::<AgentKind>().unwrap(), AgentKind::Website);
        assert!("social".parse::<AgentKind>().is_err());
        assert_eq!(AgentKind::General.to_string(), "general");
    }

    #[test]
    fn test_builtin_keywords_are_lowercase() {
        for kind in AgentKind::ALL {
            let profile = AgentProfile::builtin(kind);
            assert!(profile.keywords.iter().all(|k| *k == k.to_lowercase()));
        }
        assert!(AgentProfile::builtin(AgentKind::General).keywords.is_empty());
    }

    #[test]
    fn test_system_prompt_contains_role_and_goal() {
        let profile = AgentProfile::builtin(AgentKind::Ads);
        let prompt = profile.system_prompt();
        assert!(prompt.contains(&profile.role));
        assert!(prompt.contains(&profile.goal));
    }
}
