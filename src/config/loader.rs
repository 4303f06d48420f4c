//! Configuration Loader
//!
//! Loads and validates configuration from a TOML file. Every field has a
//! sensible default so a missing file or a sparse one still produces a
//! runnable simulation; secrets (the advisory API key) come from the
//! environment, never from the file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub feed: FeedSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub advisor: AdvisorSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Ledger configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// JSON snapshot file; omit for a purely in-memory ledger
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            snapshot_path: Some("state/ledger.json".to_string()),
        }
    }
}

/// Discovery feed configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSection {
    /// Push feed WebSocket URL
    pub ws_url: String,
    /// Aggregator latest-profiles endpoint
    pub profiles_url: String,
    /// Aggregator per-address pair endpoint
    pub pairs_url: String,
    /// Chain filter for aggregator listings
    pub chain_id: String,
    /// HTTP poll cadence in seconds
    pub scan_interval_secs: u64,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Profiles expanded into pair lookups per cycle
    pub profile_batch: usize,
    /// Push feed reconnect budget
    pub max_reconnect_attempts: u32,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            ws_url: crate::feed::push::DEFAULT_WS_URL.to_string(),
            profiles_url: crate::feed::scanner::DEFAULT_PROFILES_URL.to_string(),
            pairs_url: crate::feed::scanner::DEFAULT_PAIRS_URL.to_string(),
            chain_id: "solana".to_string(),
            scan_interval_secs: 15,
            request_timeout_secs: 10,
            profile_batch: 10,
            max_reconnect_attempts: 5,
        }
    }
}

/// Agent configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// Identity the agent trades for
    pub owner: String,
    /// Position-management tick in seconds
    pub tick_interval_secs: u64,
    /// Global cooldown between entries in seconds
    pub trade_cooldown_secs: u64,
    /// Seen-token memory in seconds
    pub seen_ttl_secs: u64,
    /// Dead-position age threshold in seconds
    pub dead_position_secs: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            owner: "paper-account".to_string(),
            tick_interval_secs: 10,
            trade_cooldown_secs: 15,
            seen_ttl_secs: 600,
            dead_position_secs: 300,
        }
    }
}

/// Advisory strategy configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorSection {
    /// Use the external reasoning service when a key is available
    pub enabled: bool,
    /// Chat-completions endpoint
    pub api_url: String,
    /// Model identifier
    pub model: String,
    /// Round-trip cap in seconds
    pub timeout_secs: u64,
}

impl Default for AdvisorSection {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: crate::agent::advisor::DEFAULT_ADVISOR_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 15,
        }
    }
}

impl AdvisorSection {
    /// Resolve the API key from the environment. Absence only disables the
    /// advisory strategy, never the agent.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Load configuration from a TOML file; a missing file yields the defaults
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)?
    } else {
        warn!("Config file {} not found, using defaults", path.display());
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.owner.trim().is_empty() {
            return Err(ConfigError::Validation(
                "agent.owner must not be empty".to_string(),
            ));
        }
        if self.agent.tick_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "agent.tick_interval_secs must be > 0".to_string(),
            ));
        }
        if self.feed.scan_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "feed.scan_interval_secs must be > 0".to_string(),
            ));
        }
        if self.feed.profile_batch == 0 {
            return Err(ConfigError::Validation(
                "feed.profile_batch must be > 0".to_string(),
            ));
        }
        if self.advisor.timeout_secs == 0 || self.advisor.timeout_secs > 60 {
            return Err(ConfigError::Validation(format!(
                "advisor.timeout_secs must be within 1..=60, got {}",
                self.advisor.timeout_secs
            )));
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.feed.scan_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.feed.request_timeout_secs)
    }
}
