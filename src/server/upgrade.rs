//! WebSocket upgrade route
//!
//! A request that cannot be upgraded gets a 500 with a plain-text body and
//! creates nothing. Registration happens only inside the upgraded callback,
//! so a handshake that fails after the response leaves no subscriber behind.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::{IntoResponse, Response};

use crate::engine::Engine;
use crate::error::Error;

use super::session::run_session;

/// Handle an upgrade request on the relay route
pub async fn upgrade_handler(
    State(engine): State<Arc<Engine>>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            let error = Error::UpgradeFailed(rejection.body_text());
            tracing::warn!(error = %error, "Failed to open WebSocket connection");
            return error.into_response();
        }
    };

    upgrade
        .on_failed_upgrade(|e| {
            tracing::warn!(error = %e, "WebSocket upgrade failed after handshake");
        })
        .on_upgrade(move |socket| run_session(socket, engine))
}
