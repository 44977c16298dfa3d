use super::ClientEngine;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Shared routing table from client id to engine.
///
/// Engine creation races between connection-router tasks and the dispatch
/// loop; the DashMap entry API makes the insert-if-absent atomic. The map
/// is never iterated, only probed by key.
pub struct ClientRegistry {
    engines: DashMap<i32, Arc<ClientEngine>>,
    default_max_wait_seconds: f64,
}

impl ClientRegistry {
    pub fn new(default_max_wait_seconds: f64) -> Self {
        Self {
            engines: DashMap::new(),
            default_max_wait_seconds,
        }
    }

    /// Fetch the engine for a client, creating it on first sight.
    pub fn get_or_create(&self, client_id: i32) -> Arc<ClientEngine> {
        self.engines
            .entry(client_id)
            .or_insert_with(|| {
                info!(client_id, "Creating engine for new client");
                Arc::new(ClientEngine::new(client_id, self.default_max_wait_seconds))
            })
            .clone()
    }

    pub fn get(&self, client_id: i32) -> Option<Arc<ClientEngine>> {
        self.engines.get(&client_id).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
