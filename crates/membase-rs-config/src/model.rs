//! Configuration schema for membase.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public testnet hub used when no base URL is configured.
pub const DEFAULT_HUB_URL: &str = "https://testnet.hub.membase.io";

/// Root config for the membase SDK.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MembaseConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl MembaseConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> MembaseConfigBuilder {
        MembaseConfigBuilder::new()
    }
}

/// Builder for assembling a `MembaseConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct MembaseConfigBuilder {
    config: MembaseConfig,
}

impl MembaseConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: MembaseConfig::default(),
        }
    }

    /// Replace the hub client configuration.
    pub fn hub(mut self, hub: HubConfig) -> Self {
        self.config.hub = hub;
        self
    }

    /// Replace the memory configuration.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    /// Point the hub client at a different base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.hub.base_url = base_url.into();
        self
    }

    /// Set the account that owns uploaded memories.
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.config.memory.account = account.into();
        self
    }

    /// Finalize and return the built `MembaseConfig`.
    pub fn build(self) -> MembaseConfig {
        self.config
    }
}

/// Hub storage client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Hub identity of this agent; used as the default bucket when set.
    #[serde(default)]
    pub membase_id: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Pause inserted between two queued uploads.
    #[serde(default = "default_upload_interval_ms")]
    pub upload_interval_ms: u64,
    #[serde(default = "default_idle_poll_interval_ms")]
    pub idle_poll_interval_ms: u64,
}

impl HubConfig {
    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay between consecutive uploads as a `Duration`.
    pub fn upload_interval(&self) -> Duration {
        Duration::from_millis(self.upload_interval_ms)
    }

    /// Polling period used while waiting for the upload queue to go idle.
    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            membase_id: String::new(),
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
            upload_interval_ms: default_upload_interval_ms(),
            idle_poll_interval_ms: default_idle_poll_interval_ms(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_HUB_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    format!("membase-rs/{}", env!("CARGO_PKG_VERSION"))
}

fn default_upload_interval_ms() -> u64 {
    100
}

fn default_idle_poll_interval_ms() -> u64 {
    100
}

/// Retry policy for idempotent hub reads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for every further attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl RetryConfig {
    /// Backoff to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let multiplier = 2u64.saturating_pow(exponent);
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

/// Conversation memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    /// Account that owns uploaded memories.
    #[serde(default = "default_account")]
    pub account: String,
    #[serde(default)]
    pub auto_upload_to_hub: bool,
    #[serde(default)]
    pub preload_from_hub: bool,
    #[serde(default)]
    pub default_conversation_id: Option<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            account: default_account(),
            auto_upload_to_hub: false,
            preload_from_hub: false,
            default_conversation_id: None,
        }
    }
}

fn default_account() -> String {
    "default".to_string()
}

#[cfg(test)]
mod tests {
    use super::{MembaseConfig, RetryConfig};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn retry_delay_doubles_per_attempt() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 250,
        };
        assert_eq!(retry.delay_after(1), Duration::from_millis(250));
        assert_eq!(retry.delay_after(2), Duration::from_millis(500));
        assert_eq!(retry.delay_after(3), Duration::from_millis(1000));
    }

    #[test]
    fn retry_delay_saturates_instead_of_overflowing() {
        let retry = RetryConfig {
            max_attempts: 100,
            base_delay_ms: u64::MAX / 2,
        };
        assert_eq!(retry.delay_after(64), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn builder_overrides_selected_fields() {
        let config = MembaseConfig::builder()
            .base_url("http://localhost:8080")
            .account("agent-7")
            .build();
        assert_eq!(config.hub.base_url, "http://localhost:8080");
        assert_eq!(config.memory.account, "agent-7");
        assert_eq!(config.hub.timeout_ms, 30_000);
        assert!(config.hub.user_agent.starts_with("membase-rs/"));
    }
}
