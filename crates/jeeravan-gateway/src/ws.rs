// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport for the realtime event protocol.
//!
//! Client -> Server (JSON text frame):
//! ```json
//! {"event": "ai-message", "data": {"chat": "chat-id", "content": "Hello", "userName": "Asha"}}
//! ```
//!
//! Server -> Client:
//! ```json
//! {"event": "ai-response", "data": {"content": "Namaste!", "chat": "chat-id"}}
//! {"event": "error", "data": {"code": "validation", "message": "..."}}
//! ```

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use jeeravan_agent::{ConnectionContext, ServerEvent, Session};
use jeeravan_config::model::UnauthenticatedPolicy;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::auth::resolve_identity;
use crate::error::ApiError;
use crate::server::AppState;

/// Outbound events buffered per connection.
const OUTBOUND_DEPTH: usize = 32;

/// WebSocket upgrade handler.
///
/// The credential is checked before the upgrade. Without one the
/// connection is either refused with 401 or admitted as a guest, depending
/// on `server.unauthenticated`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    if !origin_allowed(&headers, &state.settings.allowed_origins) {
        debug!("websocket origin not allowed");
        return StatusCode::FORBIDDEN.into_response();
    }

    let mut context = ConnectionContext::new();
    let admitted = match resolve_identity(&state, &headers, &uri).await {
        Ok(identity) => context.authenticate(identity),
        Err(e) => match state.settings.unauthenticated {
            UnauthenticatedPolicy::Guest => {
                debug!(error = %e, "admitting unauthenticated connection as guest");
                context.admit_guest()
            }
            UnauthenticatedPolicy::Reject => {
                let _ = context.reject();
                info!(connection_id = %context.connection_id(), error = %e, "websocket rejected");
                return ApiError(e).into_response();
            }
        },
    };
    if let Err(e) = admitted {
        return ApiError(e).into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, context))
}

/// Browsers always send `Origin`; other clients may omit it.
fn origin_allowed(headers: &HeaderMap, allowed: &[String]) -> bool {
    match headers.get(header::ORIGIN).map(|v| v.to_str()) {
        None => true,
        Some(Ok(origin)) => allowed.iter().any(|a| a == origin),
        Some(Err(_)) => false,
    }
}

/// Runs one admitted connection.
///
/// A writer task drains the session's outbound channel into the socket
/// while this task reads frames and queues them on the session.
async fn handle_socket(socket: WebSocket, state: AppState, mut context: ConnectionContext) {
    let connection_id = context.connection_id().to_string();
    let span = info_span!(
        "ws",
        connection_id = %connection_id,
        identity = context.identity().map(|i| i.id.as_str()).unwrap_or("guest"),
    );

    async move {
        let (mut ws_sender, mut ws_receiver) = socket.split();
        let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_DEPTH);

        let session = match Session::start(
            &context,
            state.pipeline.clone(),
            state.settings.guest_message.clone(),
            tx,
        ) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "failed to start session");
                return;
            }
        };
        state.connections.insert(connection_id.clone(), context.state());

        let writer = tokio::spawn(
            async move {
                while let Some(event) = rx.recv().await {
                    let json = match event.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "failed to encode outbound event");
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            }
            .in_current_span(),
        );

        let shutdown = state.pipeline.supervisor().shutdown_token();
        loop {
            let frame = tokio::select! {
                _ = shutdown.cancelled() => break,
                frame = ws_receiver.next() => frame,
            };
            match frame {
                Some(Ok(Message::Text(text))) => session.dispatch_text(text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Binary(_))) => debug!("ignoring binary frame"),
                // Ping and pong are answered by the protocol layer.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "websocket read failed");
                    break;
                }
            }
        }

        context.close();
        state.connections.remove(&connection_id);
        if let Err(e) = session.close().await {
            warn!(error = %e, "session worker failed");
        }
        // The worker held the last event sender, so the writer now drains
        // and exits on its own.
        let _ = writer.await;
        info!(state = %context.state(), "websocket closed");
    }
    .instrument(span)
    .await
}
