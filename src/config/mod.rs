//! Configuration module for Marketlens.
//!
//! Handles loading application settings and task prompt templates.

mod prompts;
mod settings;

pub use prompts::TaskPrompts;
pub use settings::{
    AgentSettings, GeneralSettings, McpSettings, ProfileSettings, SecuritySettings,
    ServerSettings, Settings,
};
