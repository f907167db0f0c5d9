//! Broadcast engine
//!
//! The [`Engine`] owns the subscriber [`Registry`], the broadcast channel
//! that every [`LogSink`] feeds, and the [`Broadcaster`] task that drains it.
//! The channel is created with the engine and never replaced.
//!
//! # Lifecycle
//!
//! ```text
//! Engine::new() ──► start() ──► Broadcaster::run() ... ──► stop()
//!                                     ▲                      │
//!     sink().write() ──► channel ─────┘                      ├─ abort broadcaster
//!                                                            └─ close every subscriber
//! ```

pub mod broadcaster;
pub mod config;
pub mod sink;

pub use broadcaster::{fan_out, Broadcaster, FanOut};
pub use config::EngineConfig;
pub use sink::{LogSink, SinkWriter};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::registry::{Connection, ConnectionId, DropReason, Outbound, Record, Registry};
use crate::stats::RelayStats;

/// Broadcaster lifecycle
enum BroadcasterState {
    /// Created, holding the channel receiver until `start`
    Idle(mpsc::Receiver<Record>),
    /// Broadcaster task running
    Running(JoinHandle<()>),
    /// Stopped; the receiver is gone
    Stopped,
}

/// Registry, broadcast channel and broadcaster task
pub struct Engine {
    config: EngineConfig,
    registry: Arc<Registry>,
    stats: Arc<RelayStats>,
    tx: mpsc::Sender<Record>,
    broadcaster: Mutex<BroadcasterState>,
    next_connection_id: AtomicU64,
}

impl Engine {
    /// Create an engine with default configuration
    pub fn new() -> Arc<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with custom configuration
    ///
    /// The broadcaster does not run until [`start`](Self::start) is called;
    /// until then writes queue up to the channel capacity.
    pub fn with_config(config: EngineConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.broadcast_capacity.max(1));

        Arc::new(Self {
            config,
            registry: Arc::new(Registry::new()),
            stats: Arc::new(RelayStats::new()),
            tx,
            broadcaster: Mutex::new(BroadcasterState::Idle(rx)),
            next_connection_id: AtomicU64::new(1),
        })
    }

    /// Get the engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get a reference to the subscriber registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get the relay counters
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Number of live subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.registry.len().await
    }

    /// Spawn the broadcaster task
    ///
    /// Fails with [`Error::AlreadyStarted`] if the broadcaster is running or
    /// the engine has been stopped.
    pub fn start(&self) -> Result<()> {
        let mut state = self
            .broadcaster
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match std::mem::replace(&mut *state, BroadcasterState::Stopped) {
            BroadcasterState::Idle(rx) => {
                let broadcaster =
                    Broadcaster::new(rx, Arc::clone(&self.registry), Arc::clone(&self.stats));
                *state = BroadcasterState::Running(tokio::spawn(broadcaster.run()));

                tracing::info!(
                    broadcast_capacity = self.config.broadcast_capacity,
                    subscriber_capacity = self.config.subscriber_capacity,
                    "Engine started"
                );
                Ok(())
            }
            other => {
                *state = other;
                Err(Error::AlreadyStarted)
            }
        }
    }

    /// Whether the broadcaster task is running
    pub fn is_running(&self) -> bool {
        let state = self
            .broadcaster
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        matches!(&*state, BroadcasterState::Running(handle) if !handle.is_finished())
    }

    /// Stop the broadcaster and disconnect every subscriber
    ///
    /// Records still in the broadcast channel are lost. Later writes fail
    /// with [`Error::EngineStopped`]. Calling `stop` again is a no-op.
    pub async fn stop(&self) {
        let previous = {
            let mut state = self
                .broadcaster
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, BroadcasterState::Stopped)
        };

        match previous {
            BroadcasterState::Running(handle) => {
                handle.abort();
                // Wait for the task to be dropped so the receiver is gone
                let _ = handle.await;
            }
            BroadcasterState::Idle(rx) => drop(rx),
            BroadcasterState::Stopped => return,
        }

        let removed = self.registry.clear().await;
        for _ in 0..removed {
            self.stats.subscriber_removed(DropReason::Shutdown);
        }

        tracing::info!(subscribers = removed, "Engine stopped");
    }

    fn is_stopped(&self) -> bool {
        let state = self
            .broadcaster
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        matches!(&*state, BroadcasterState::Stopped)
    }

    /// Create a new sink feeding this engine
    ///
    /// Each sink has its own closed state.
    pub fn sink(&self) -> LogSink {
        LogSink::new(self.tx.clone(), Arc::clone(&self.stats))
    }

    /// Allocate the next connection id
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Create a subscriber with an empty outbound queue and register it
    pub async fn connect(&self) -> Result<(Arc<Connection>, Outbound)> {
        if self.is_stopped() {
            return Err(Error::EngineStopped);
        }

        let id = self.next_connection_id();
        let (connection, outbound) = Connection::new(id, self.config.subscriber_capacity);

        self.registry.add(Arc::clone(&connection)).await;
        self.stats.subscriber_connected();

        // stop() marks the state before clearing, so a connection added after
        // the clear is caught here
        if self.is_stopped() {
            self.disconnect(id, DropReason::Shutdown).await;
            return Err(Error::EngineStopped);
        }

        Ok((connection, outbound))
    }

    /// Remove a subscriber from the registry
    ///
    /// Returns `true` only for the call that performed the removal.
    pub async fn disconnect(&self, id: ConnectionId, reason: DropReason) -> bool {
        let removed = self.registry.remove(id, reason).await;
        if removed {
            self.stats.subscriber_removed(reason);
        }
        removed
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let state = self
            .broadcaster
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let BroadcasterState::Running(handle) = state {
            handle.abort();
        }
    }
}
