//! Public SDK surface for membase.
//!
//! This crate re-exports the config, hub and memory crates and wires them
//! together from a single [`MembaseConfig`].

/// Re-export for convenience.
pub use membase_rs_config as config;
/// Re-export for convenience.
pub use membase_rs_hub as hub;
/// Re-export for convenience.
pub use membase_rs_memory as memory;

pub use membase_rs_config::MembaseConfig;
pub use membase_rs_hub::HubClient;
pub use membase_rs_memory::{BufferedMemory, Message, MessageRole, MultiMemory};

use anyhow::Context;
use log::info;
use membase_rs_hub::HubTransport;
use std::sync::Arc;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Applications are still
/// expected to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}

/// A hub client and the conversation registry bound to it.
#[derive(Debug)]
pub struct Membase {
    hub: HubClient,
    memory: MultiMemory,
}

impl Membase {
    /// Connect to the configured hub over HTTP.
    ///
    /// When `memory.preload_from_hub` is set every conversation of the
    /// account is hydrated before returning.
    pub async fn open(config: MembaseConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid membase config")?;
        let hub = HubClient::from_config(config.hub.clone()).context("failed to build hub client")?;
        Ok(Self::assemble(config, hub).await)
    }

    /// Same as [`Membase::open`] over an explicit transport.
    pub async fn open_with_transport(
        config: MembaseConfig,
        transport: Arc<dyn HubTransport>,
    ) -> anyhow::Result<Self> {
        config.validate().context("invalid membase config")?;
        let hub = HubClient::new(config.hub.clone(), transport);
        Ok(Self::assemble(config, hub).await)
    }

    async fn assemble(config: MembaseConfig, hub: HubClient) -> Self {
        let memory_config = config.memory;
        let mut builder = MultiMemory::builder(memory_config.account.clone())
            .hub(Arc::new(hub.clone()))
            .auto_upload(memory_config.auto_upload_to_hub);
        if let Some(id) = memory_config.default_conversation_id {
            builder = builder.default_conversation_id(id);
        }
        let memory = if memory_config.preload_from_hub {
            builder.build_preloaded().await
        } else {
            builder.build()
        };
        info!(
            "membase opened (account={}, auto_upload={}, conversations={})",
            memory_config.account,
            memory_config.auto_upload_to_hub,
            memory.conversations().len()
        );
        Self { hub, memory }
    }

    pub fn hub(&self) -> &HubClient {
        &self.hub
    }

    pub fn memory(&self) -> &MultiMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MultiMemory {
        &mut self.memory
    }

    /// Wait for queued uploads, then discard anything still pending.
    pub async fn shutdown(self) {
        self.hub.wait_for_idle().await;
        self.hub.close();
    }
}
