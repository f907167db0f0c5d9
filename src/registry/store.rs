//! Registry implementation
//!
//! The set of live subscriber connections, shared by the broadcaster (which
//! iterates it) and every connection's teardown path (which removes from it).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::connection::Connection;
use super::error::DropReason;
use super::record::ConnectionId;

/// Set of live subscriber connections
///
/// Thread-safe via `RwLock`. The lock is only held to copy or mutate the map,
/// never while a record is being enqueued or a socket is written.
#[derive(Debug, Default)]
pub struct Registry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection
    pub async fn add(&self, connection: Arc<Connection>) {
        let id = connection.id();
        let mut connections = self.connections.write().await;
        connections.insert(id, connection);

        tracing::debug!(
            connection_id = id,
            subscribers = connections.len(),
            "Subscriber registered"
        );
    }

    /// Remove a connection and close it
    ///
    /// Safe to call from several places for the same id: only the first call
    /// removes and closes, later calls return `false`.
    pub async fn remove(&self, id: ConnectionId, reason: DropReason) -> bool {
        let (removed, remaining) = {
            let mut connections = self.connections.write().await;
            let removed = connections.remove(&id);
            (removed, connections.len())
        };

        match removed {
            Some(connection) => {
                connection.close();
                tracing::debug!(
                    connection_id = id,
                    reason = %reason,
                    subscribers = remaining,
                    connected_ms = connection.age().as_millis() as u64,
                    records = connection.enqueued(),
                    "Subscriber removed"
                );
                true
            }
            None => false,
        }
    }

    /// Connections registered at the time of the call
    ///
    /// Connections added or removed after this returns are not reflected.
    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Whether a connection is registered
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no connection is registered
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Remove and close every connection
    ///
    /// Returns how many connections were removed.
    pub async fn clear(&self) -> usize {
        let drained: Vec<Arc<Connection>> = {
            let mut connections = self.connections.write().await;
            connections.drain().map(|(_, conn)| conn).collect()
        };

        for connection in &drained {
            connection.close();
        }

        if !drained.is_empty() {
            tracing::debug!(
                removed = drained.len(),
                reason = %DropReason::Shutdown,
                "Registry cleared"
            );
        }

        drained.len()
    }
}
