//! Configuration settings for Marketlens.

use super::prompts::TaskPrompts;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub mcp: McpSettings,
    pub agent: AgentSettings,
    pub security: SecuritySettings,
    pub profiles: ProfileSettings,
    pub task: TaskPrompts,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Deployment environment (development, test, production).
    pub environment: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Built frontend to serve alongside the API. Unknown paths fall back
    /// to its `index.html`.
    pub static_dir: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 12000,
            static_dir: None,
        }
    }
}

/// Settings for the MCP tool bridge to the graph database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpSettings {
    /// Executable that starts the MCP server.
    pub command: String,
    /// Arguments passed to the command.
    pub args: Vec<String>,
    /// Start the server with this process's full environment, so proxy,
    /// locale and `UV_*` settings reach it. When false the server gets a
    /// clean environment holding only `env_passthrough` and `env`.
    pub inherit_env: bool,
    /// Environment variables copied from this process into the server's.
    pub env_passthrough: Vec<String>,
    /// Extra environment variables set on the server process.
    pub env: HashMap<String, String>,
    /// Time allowed for spawn + initialize + tools/list.
    pub handshake_timeout_secs: u64,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            command: "uvx".to_string(),
            args: vec!["mcp-neo4j-cypher".to_string()],
            inherit_env: true,
            env_passthrough: vec![
                "NEO4J_URI".to_string(),
                "NEO4J_USERNAME".to_string(),
                "NEO4J_PASSWORD".to_string(),
                "NEO4J_DATABASE".to_string(),
                "PATH".to_string(),
                "HOME".to_string(),
            ],
            env: HashMap::new(),
            handshake_timeout_secs: 30,
        }
    }
}

impl McpSettings {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// Agent execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// LLM model driving the agent.
    pub model: String,
    /// Upper bound for one query's execution, retries included.
    pub timeout_secs: u64,
    /// Maximum LLM round trips per attempt.
    pub max_iterations: usize,
    /// Retries after a transient tool failure.
    pub max_retries: u32,
    /// First backoff delay; doubles per retry.
    pub retry_base_delay_ms: u64,
    /// Backoff ceiling.
    pub retry_max_delay_ms: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 300, // 5 minutes
            max_iterations: 15,
            max_retries: 2,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 4000,
        }
    }
}

impl AgentSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP security settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Accepted API keys. Empty disables authentication.
    pub api_keys: Vec<String>,
    /// CORS origins allowed in production.
    pub allowed_origins: Vec<String>,
    /// Requests allowed per client per window.
    pub rate_limit_requests: usize,
    /// Rate limit window in seconds.
    pub rate_limit_window_secs: u64,
    /// Maximum accepted query length in characters.
    pub max_query_length: usize,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            allowed_origins: Vec::new(),
            rate_limit_requests: 100,
            rate_limit_window_secs: 3600, // 1 hour
            max_query_length: 1000,
        }
    }
}

/// Agent profile customization.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProfileSettings {
    /// Directory holding `ads.toml`, `website.toml`, `general.toml` overrides.
    pub custom_dir: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None,
    /// then apply environment overrides.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply overrides from an environment-like lookup.
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(env) = get("ENVIRONMENT") {
            self.general.environment = env;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.general.log_level = level.to_lowercase();
        }
        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(dir) = get("STATIC_DIR") {
            self.server.static_dir = Some(dir);
        }
        if let Some(port) = get("PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.agent.model = model;
        }
        if let Some(keys) = get("API_KEYS") {
            self.security.api_keys = split_list(&keys);
        }
        if let Some(origins) = get("ALLOWED_ORIGINS") {
            self.security.allowed_origins = split_list(&origins);
        }
        if let Some(requests) = get("RATE_LIMIT_REQUESTS") {
            match requests.parse() {
                Ok(n) => self.security.rate_limit_requests = n,
                Err(_) => warn!("Ignoring invalid RATE_LIMIT_REQUESTS value: {}", requests),
            }
        }
        if let Some(window) = get("RATE_LIMIT_WINDOW") {
            match window.parse() {
                Ok(n) => self.security.rate_limit_window_secs = n,
                Err(_) => warn!("Ignoring invalid RATE_LIMIT_WINDOW value: {}", window),
            }
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::MarketlensError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("marketlens")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    pub fn is_production(&self) -> bool {
        self.general.environment.eq_ignore_ascii_case("production")
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
