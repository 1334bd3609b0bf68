//! Environment variable overrides applied on top of file layers.

use crate::MembaseConfig;
use log::debug;

/// Hub base URL.
pub const ENV_HUB: &str = "MEMBASE_HUB";
/// Hub identity of this agent.
pub const ENV_MEMBASE_ID: &str = "MEMBASE_ID";
/// Account that owns uploaded memories.
pub const ENV_ACCOUNT: &str = "MEMBASE_ACCOUNT";

impl MembaseConfig {
    /// Apply `MEMBASE_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply `MEMBASE_*` overrides using the provided variable lookup.
    ///
    /// Unset and blank variables leave the current value untouched.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        if let Some(base_url) = read(ENV_HUB) {
            debug!("hub base url overridden from {ENV_HUB}");
            self.hub.base_url = base_url;
        }
        if let Some(membase_id) = read(ENV_MEMBASE_ID) {
            debug!("membase id overridden from {ENV_MEMBASE_ID}");
            self.hub.membase_id = membase_id;
        }
        if let Some(account) = read(ENV_ACCOUNT) {
            debug!("memory account overridden from {ENV_ACCOUNT}");
            self.memory.account = account;
        }
    }

    /// Default config with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }
}
