//! Relay server
//!
//! HTTP listener with a single WebSocket upgrade route. Each upgraded
//! socket becomes a subscriber of the [`Engine`](crate::engine::Engine).

pub mod config;
pub mod listener;
pub mod session;
pub mod upgrade;

pub use config::RelayConfig;
pub use listener::RelayServer;
