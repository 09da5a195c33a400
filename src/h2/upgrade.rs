//! Registry of protocol upgrade handlers.
//!
//! Maps a protocol identifier such as "QTP/0.1" to a callback that takes
//! ownership of an upgraded QUIC connection. The registry is populated
//! while the server is being constructed, before the endpoint accepts its
//! first connection, and is read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

/// A handler which continues a QUIC connection under another protocol.
///
/// Invoked after the 101 response has been written; long-running work is
/// expected to be spawned onto its own task.
pub type UpgradeHandler = Arc<dyn Fn(quinn::Connection) + Send + Sync>;

/// Registered upgrade handlers by protocol identifier.
#[derive(Default)]
pub struct UpgradeRegistry {
    handlers: HashMap<String, UpgradeHandler>,
}

impl UpgradeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for the given protocol identifier.
    pub fn register<F>(&mut self, protocol: impl Into<String>, handler: F)
    where
        F: Fn(quinn::Connection) + Send + Sync + 'static,
    {
        self.handlers.insert(protocol.into(), Arc::new(handler));
    }

    /// Look up the handler for a protocol identifier.
    pub fn get(&self, protocol: &str) -> Option<UpgradeHandler> {
        self.handlers.get(protocol).cloned()
    }
}
