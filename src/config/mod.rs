//! Configuration loading and validation

mod loader;

pub use loader::{
    load_config, AdvisorSection, AgentSection, Config, ConfigError, EngineSection, FeedSection,
    LoggingSection,
};
