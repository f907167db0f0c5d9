//! Error types
//!
//! Errors surfaced to callers of the relay. Failures of an individual
//! subscriber's socket are not errors at this level; they are handled where
//! they occur and reported through [`DropReason`](crate::registry::DropReason).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Body of the response sent when a WebSocket upgrade cannot be completed
pub const UPGRADE_FAILED_BODY: &str = "Failed to open WebSocket connection";

/// Error type for relay operations
#[derive(Debug)]
pub enum Error {
    /// The WebSocket handshake could not be completed
    UpgradeFailed(String),
    /// Write or close on a sink that was already closed
    AdapterClosed,
    /// The engine was stopped; its broadcast channel no longer accepts records
    EngineStopped,
    /// Non-blocking write found the broadcast channel full; nothing was queued
    SinkFull,
    /// The engine's broadcaster is already running (or has been stopped)
    AlreadyStarted,
    /// I/O error (bind, accept, serve)
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UpgradeFailed(reason) => write!(f, "WebSocket upgrade failed: {}", reason),
            Error::AdapterClosed => write!(f, "Sink is closed"),
            Error::EngineStopped => write!(f, "Engine is stopped"),
            Error::SinkFull => write!(f, "Broadcast channel is full"),
            Error::AlreadyStarted => write!(f, "Engine already started"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::AdapterClosed | Error::EngineStopped => {
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, e)
            }
            Error::SinkFull => std::io::Error::new(std::io::ErrorKind::WouldBlock, e),
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::UpgradeFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, UPGRADE_FAILED_BODY).into_response()
            }
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
        }
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Error::AdapterClosed.to_string(), "Sink is closed");
        assert_eq!(
            Error::UpgradeFailed("missing header".into()).to_string(),
            "WebSocket upgrade failed: missing header"
        );
    }

    #[test]
    fn test_closed_maps_to_broken_pipe() {
        let io: std::io::Error = Error::AdapterClosed.into();
        assert_eq!(io.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_full_maps_to_would_block() {
        let io: std::io::Error = Error::SinkFull.into();
        assert_eq!(io.kind(), std::io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_upgrade_failed_response() {
        let response = Error::UpgradeFailed("bad request".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
