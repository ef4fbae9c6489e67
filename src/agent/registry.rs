//! Process-wide agent registry.
//!
//! Built once at startup and shared read-only by every request.

use super::profile::{AgentKind, AgentProfile};
use crate::error::{MarketlensError, Result};
use std::path::PathBuf;
use tracing::info;

/// Immutable table of agent profiles, one per [`AgentKind`].
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    ads: AgentProfile,
    website: AgentProfile,
    general: AgentProfile,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AgentRegistry {
    /// Registry holding the built-in profiles.
    pub fn builtin() -> Self {
        Self {
            ads: AgentProfile::builtin(AgentKind::Ads),
            website: AgentProfile::builtin(AgentKind::Website),
            general: AgentProfile::builtin(AgentKind::General),
        }
    }

    /// Build a registry from explicit profiles, validating each one.
    pub fn new(ads: AgentProfile, website: AgentProfile, general: AgentProfile) -> Result<Self> {
        validate(AgentKind::Ads, &ads)?;
        validate(AgentKind::Website, &website)?;
        validate(AgentKind::General, &general)?;
        Ok(Self {
            ads,
            website,
            general,
        })
    }

    /// Load the registry, overriding built-in profiles with `<kind>.toml`
    /// files found in `custom_dir`.
    pub fn load(custom_dir: Option<&str>) -> Result<Self> {
        let Some(dir) = custom_dir else {
            return Ok(Self::builtin());
        };

        let dir = PathBuf::from(shellexpand::tilde(dir).to_string());
        let load_one = |kind: AgentKind| -> Result<AgentProfile> {
            let path = dir.join(format!("{}.toml", kind.as_str()));
            if path.exists() {
                info!("Loading {} profile from {:?}", kind, path);
                let content = std::fs::read_to_string(&path)?;
                let mut profile: AgentProfile = toml::from_str(&content)?;
                profile.keywords = profile
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                Ok(profile)
            } else {
                Ok(AgentProfile::builtin(kind))
            }
        };

        Self::new(
            load_one(AgentKind::Ads)?,
            load_one(AgentKind::Website)?,
            load_one(AgentKind::General)?,
        )
    }

    /// Profile for the given kind. Total over the closed enumeration.
    pub fn profile_for(&self, kind: AgentKind) -> &AgentProfile {
        match kind {
            AgentKind::Ads => &self.ads,
            AgentKind::Website => &self.website,
            AgentKind::General => &self.general,
        }
    }

    /// Iterate profiles in classification priority order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentKind, &AgentProfile)> {
        AgentKind::ALL.into_iter().map(move |k| (k, self.profile_for(k)))
    }
}

fn validate(kind: AgentKind, profile: &AgentProfile) -> Result<()> {
    if profile.role.trim().is_empty() {
        return Err(MarketlensError::Config(format!(
            "Agent profile '{}' has an empty role",
            kind
        )));
    }
    // An empty keyword is a substring of every query.
    if profile.keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(MarketlensError::Config(format!(
            "Agent profile '{}' has a blank routing keyword",
            kind
        )));
    }
    if kind != AgentKind::General && profile.keywords.is_empty() {
        return Err(MarketlensError::Config(format!(
            "Agent profile '{}' needs at least one routing keyword",
            kind
        )));
    }
    Ok(())
}
