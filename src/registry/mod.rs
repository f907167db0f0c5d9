//! Subscriber registry
//!
//! The registry holds every live WebSocket subscriber. Each subscriber is a
//! [`Connection`]: an id plus the enqueue side of a bounded outbound queue.
//! The dequeue side ([`Outbound`]) belongs to that subscriber's outbound drain.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<Registry>
//!                   ┌───────────────────────────┐
//!                   │ connections: HashMap<Id,  │
//!                   │   Arc<Connection> {       │
//!                   │     tx: mpsc::Sender,     │
//!                   │     closed: Notify,       │
//!                   │   }                       │
//!                   │ >                         │
//!                   └─────────────┬─────────────┘
//!                                 │ snapshot()
//!         ┌───────────────────────┼───────────────────────┐
//!         ▼                       ▼                       ▼
//!   try_enqueue()           try_enqueue()           try_enqueue()
//!         │                       │                       │
//!   Outbound::next()        Outbound::next()        Outbound::next()
//!         │                       │                       │
//!         └──► WebSocket          └──► WebSocket          └──► WebSocket
//! ```
//!
//! # Zero-Copy Fan-Out
//!
//! A [`Record`] wraps `bytes::Bytes`, so every subscriber queue shares the
//! same allocation. Only the producer's original slice is copied, once.

pub mod connection;
pub mod error;
pub mod record;
pub mod store;

pub use connection::{Connection, Outbound};
pub use error::{DropReason, EnqueueError};
pub use record::{ConnectionId, Record};
pub use store::Registry;
