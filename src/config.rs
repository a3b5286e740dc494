//! Configuration
//!
//! `ThreadlineConfig` collects every tunable of the thread provider. All
//! fields have defaults, so an empty TOML document is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use threadline_client::ClientConfig;

use crate::utils::error::{ThreadlineError, ThreadlineResult};

/// Thread provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadlineConfig {
    /// Use the streaming advance path unless a send overrides it
    pub stream_by_default: bool,
    /// Request a generated name once a thread has enough messages
    pub auto_generate_thread_name: bool,
    /// Message count that triggers name generation
    pub auto_generate_name_threshold: usize,
    /// Cooldown between speculative executions of one tool call
    pub speculative_cooldown_ms: u64,
    /// Quiet window before a component-state write goes to the server
    pub component_state_debounce_ms: u64,
    /// Per-tool call budget for tools that declare none; `None` is unlimited
    pub default_tool_call_limit: Option<u32>,
    pub thread_list_cache_ttl_secs: u64,
    pub thread_list_cache_capacity: u64,
    /// Buffered events per subscriber before lagging ones miss events
    pub event_channel_capacity: usize,
    pub client: ClientConfig,
}

impl Default for ThreadlineConfig {
    fn default() -> Self {
        Self {
            stream_by_default: true,
            auto_generate_thread_name: true,
            auto_generate_name_threshold: 3,
            speculative_cooldown_ms: 150,
            component_state_debounce_ms: 500,
            default_tool_call_limit: Some(10),
            thread_list_cache_ttl_secs: 300,
            thread_list_cache_capacity: 64,
            event_channel_capacity: 256,
            client: ClientConfig::default(),
        }
    }
}

impl ThreadlineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> ThreadlineResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ThreadlineResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded configuration file");
        Self::from_toml_str(&content)
    }

    /// Reject settings the provider cannot run with.
    pub fn validate(&self) -> ThreadlineResult<()> {
        if self.auto_generate_name_threshold == 0 {
            return Err(ThreadlineError::config(
                "auto_generate_name_threshold must be at least 1",
            ));
        }
        if self.thread_list_cache_capacity == 0 {
            return Err(ThreadlineError::config(
                "thread_list_cache_capacity must be at least 1",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(ThreadlineError::config(
                "event_channel_capacity must be at least 1",
            ));
        }
        if self.client.base_url.trim().is_empty() {
            return Err(ThreadlineError::config("client.base_url must not be empty"));
        }
        Ok(())
    }

    pub fn speculative_cooldown(&self) -> Duration {
        Duration::from_millis(self.speculative_cooldown_ms)
    }

    pub fn component_state_debounce(&self) -> Duration {
        Duration::from_millis(self.component_state_debounce_ms)
    }

    pub fn thread_list_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.thread_list_cache_ttl_secs)
    }
}
