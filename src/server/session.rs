//! Per-subscriber session
//!
//! Once a WebSocket upgrade succeeds the socket is split in two drains:
//!
//! - the outbound drain runs on the upgrade task and writes one frame per
//!   queued record;
//! - the inbound drain is spawned and only reads, to notice when the peer
//!   goes away. Frame content is ignored.
//!
//! Whichever drain ends first ends the session. Teardown removes the
//! subscriber from the registry, which is idempotent, and closes the socket.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};

use crate::engine::Engine;
use crate::registry::{ConnectionId, DropReason, Outbound, Record};

/// Convert a record to a frame
///
/// UTF-8 payloads become text frames; anything else is sent as binary.
pub fn record_to_message(record: Record) -> Message {
    let data = record.into_bytes();
    match Utf8Bytes::try_from(data.clone()) {
        Ok(text) => Message::Text(text),
        Err(_) => Message::Binary(data),
    }
}

/// Read frames until the peer closes or a read fails
pub async fn inbound_drain<S, E>(mut stream: S, id: ConnectionId) -> DropReason
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(frame)) => {
                tracing::debug!(
                    connection_id = id,
                    code = frame.as_ref().map(|f| u16::from(f.code)),
                    "Subscriber sent close"
                );
                return DropReason::ReadClosed;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = id, error = %e, "Subscriber read failed");
                return DropReason::ReadClosed;
            }
        }
    }

    DropReason::ReadClosed
}

/// Write queued records until the queue is closed or a write fails
pub async fn outbound_drain<K>(sink: &mut K, outbound: &mut Outbound) -> DropReason
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    while let Some(record) = outbound.next().await {
        if let Err(e) = sink.send(record_to_message(record)).await {
            tracing::debug!(
                connection_id = outbound.id(),
                error = %e,
                "Subscriber write failed"
            );
            return DropReason::WriteFailed;
        }
    }

    DropReason::OutboundClosed
}

/// Register an upgraded socket and run it until either drain ends
pub async fn run_session(socket: WebSocket, engine: Arc<Engine>) {
    let (connection, mut outbound) = match engine.connect().await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::debug!(error = %e, "Rejecting subscriber");
            let mut socket = socket;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let id = connection.id();
    // The registry keeps the only long-lived handle to the enqueue side
    drop(connection);

    tracing::debug!(connection_id = id, "Subscriber connected");

    let (mut sink, stream) = socket.split();
    let mut inbound = tokio::spawn(inbound_drain(stream, id));

    let reason = tokio::select! {
        reason = outbound_drain(&mut sink, &mut outbound) => {
            inbound.abort();
            reason
        }
        joined = &mut inbound => joined.unwrap_or(DropReason::ReadClosed),
    };

    engine.disconnect(id, reason).await;
    let _ = sink.close().await;

    tracing::debug!(connection_id = id, reason = %reason, "Subscriber disconnected");
}
