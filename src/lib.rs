//! ws-log-relay: real-time WebSocket broadcast relay for log records
//!
//! A producer writes log lines into a [`LogSink`]; every line is fanned out,
//! in write order, to each WebSocket subscriber connected at that moment.
//!
//! # Architecture
//!
//! ```text
//!   producer ──► LogSink::write() ──► broadcast channel (capacity B)
//!                                             │
//!                                             ▼
//!                                       Broadcaster (one task)
//!                                             │  registry.snapshot()
//!                      ┌──────────────────────┼──────────────────────┐
//!                      ▼                      ▼                      ▼
//!               outbound queue (C)     outbound queue (C)     outbound queue (C)
//!                      │                      │                      │
//!               outbound drain         outbound drain         outbound drain ──► WebSocket
//! ```
//!
//! A subscriber whose outbound queue is full when the Broadcaster reaches it
//! is dropped from the [`Registry`] instead of being waited for. Delivery is
//! best-effort; there is no replay for late joiners.
//!
//! # Example
//!
//! ```no_run
//! use ws_log_relay::{RelayConfig, RelayServer};
//!
//! # async fn example() -> ws_log_relay::Result<()> {
//! let server = RelayServer::new(RelayConfig::default());
//! let sink = server.engine().sink();
//!
//! tokio::spawn(async move {
//!     let _ = sink.write(br#"{"level":"info","msg":"hello"}"#).await;
//! });
//!
//! server.run().await
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod registry;
pub mod server;
pub mod stats;

pub use engine::{Engine, LogSink, SinkWriter};
pub use error::{Error, Result};
pub use registry::{Connection, ConnectionId, DropReason, Outbound, Record, Registry};
pub use server::{RelayConfig, RelayServer};
pub use stats::{RelayStats, StatsSnapshot};
