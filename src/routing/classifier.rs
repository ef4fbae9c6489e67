//! Keyword-based query classifier.

use super::Query;
use crate::agent::{AgentKind, AgentRegistry};
use tracing::debug;

/// Ordered keyword rules. The first rule with a matching keyword wins and
/// anything left over falls back to [`AgentKind::General`].
///
/// The Ads-before-Website order is inherited tie-breaking, not a ranking of
/// relevance. A query mentioning both is routed to Ads.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<(AgentKind, Vec<String>)>,
}

impl Classifier {
    /// Build the rule table from the registry's profile keywords.
    pub fn from_registry(registry: &AgentRegistry) -> Self {
        let rules = registry
            .iter()
            .filter(|(kind, _)| *kind != AgentKind::General)
            .map(|(kind, profile)| (kind, profile.keywords.clone()))
            .collect();
        Self { rules }
    }

    /// Pick exactly one agent kind for the query. Never fails.
    pub fn classify(&self, query: &Query) -> AgentKind {
        let text = query.normalized();
        let mut matched = self
            .rules
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|(kind, _)| *kind);

        match matched.next() {
            Some(kind) => {
                let others: Vec<AgentKind> = matched.collect();
                if !others.is_empty() {
                    debug!(
                        "Query {} also matched {:?}; priority order selects {}",
                        query.fingerprint(),
                        others,
                        kind
                    );
                }
                kind
            }
            None => AgentKind::General,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::from_registry(&AgentRegistry::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> AgentKind {
        Classifier::default().classify(&Query::new(text))
    }

    #[test]
    fn test_ads_keywords_win_regardless_of_case() {
        assert_eq!(classify("What are my top performing Google Ads campaigns?"), AgentKind::Ads);
        assert_eq!(classify("CAMPAIGN budget"), AgentKind::Ads);
        assert_eq!(classify("How can we improve our plumbing ads ROAS?"), AgentKind::Ads);
    }

    #[test]
    fn test_ads_checked_before_website() {
        assert_eq!(classify("Which campaign drives the most website conversion?"), AgentKind::Ads);
        assert_eq!(classify("ads landing page"), AgentKind::Ads);
    }

    #[test]
    fn test_website_keywords() {
        assert_eq!(classify("Why is our landing page conversion rate declining?"), AgentKind::Website);
        assert_eq!(classify("WEBSITE health"), AgentKind::Website);
        assert_eq!(classify("Conversion trend last month"), AgentKind::Website);
    }

    #[test]
    fn test_fallback_to_general() {
        assert_eq!(classify(""), AgentKind::General);
        assert_eq!(classify("   "), AgentKind::General);
        assert_eq!(
            classify("Which staff member manages the delivery service?"),
            AgentKind::General
        );
    }

    #[test]
    fn test_every_ads_keyword_routes_to_ads() {
        let classifier = Classifier::default();
        let registry = AgentRegistry::builtin();
        for keyword in &registry.profile_for(AgentKind::Ads).keywords {
            let query = Query::new(format!("tell me about website {}", keyword.to_uppercase()));
            assert_eq!(classifier.classify(&query), AgentKind::Ads, "keyword {}", keyword);
        }
    }
}
