//! Broadcaster
//!
//! The single consumer of the broadcast channel. Each record is offered to
//! every registered subscriber without waiting; a subscriber whose queue is
//! full is dropped rather than waited for.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::registry::{DropReason, Record, Registry};
use crate::stats::RelayStats;

/// Outcome of fanning one record out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Subscribers the record was queued for
    pub delivered: usize,
    /// Subscribers dropped during this pass
    pub dropped: usize,
}

/// Fan-out task state
pub struct Broadcaster {
    rx: mpsc::Receiver<Record>,
    registry: Arc<Registry>,
    stats: Arc<RelayStats>,
}

impl Broadcaster {
    pub(crate) fn new(
        rx: mpsc::Receiver<Record>,
        registry: Arc<Registry>,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            rx,
            registry,
            stats,
        }
    }

    /// Run until every sender of the broadcast channel is gone
    pub async fn run(mut self) {
        tracing::debug!("Broadcaster started");

        while let Some(record) = self.rx.recv().await {
            fan_out(&self.registry, &self.stats, record).await;
        }

        tracing::debug!("Broadcast channel closed, broadcaster exiting");
    }
}

/// Offer one record to every subscriber in a registry snapshot
///
/// Subscribers that cannot take the record immediately are removed from the
/// registry (which closes them). Nothing is retried.
pub async fn fan_out(registry: &Registry, stats: &RelayStats, record: Record) -> FanOut {
    let mut result = FanOut::default();

    for connection in registry.snapshot().await {
        match connection.try_enqueue(record.clone()) {
            Ok(()) => result.delivered += 1,
            Err(e) => {
                let reason = DropReason::from(e);
                result.dropped += 1;

                if registry.remove(connection.id(), reason).await {
                    stats.subscriber_removed(reason);

                    if reason == DropReason::Overflow {
                        tracing::warn!(
                            connection_id = connection.id(),
                            capacity = connection.capacity(),
                            "Subscriber dropped: outbound queue full"
                        );
                    } else {
                        tracing::debug!(
                            connection_id = connection.id(),
                            reason = %reason,
                            "Subscriber dropped"
                        );
                    }
                }
            }
        }
    }

    stats.record_broadcast(result.delivered as u64);

    tracing::trace!(
        bytes = record.len(),
        delivered = result.delivered,
        dropped = result.dropped,
        "Record fanned out"
    );

    result
}
