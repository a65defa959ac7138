// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-connection state machine and FIFO turn worker.
//!
//! A connection moves `Connecting -> Authenticated | Guest | Rejected`, and
//! from any of those to `Closed`. Once admitted, a [`Session`] owns a queue
//! and a single worker task, so turns from one connection are processed
//! strictly in arrival order while the transport keeps reading frames.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use jeeravan_core::{Identity, JeeravanError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::events::{AiMessage, ClientEvent, ResponseSink, ServerEvent};
use crate::pipeline::{InboundTurn, MessagePipeline};

/// Maximum queued events per connection before new ones are refused.
const QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticated,
    Guest,
    Rejected,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticated => "authenticated",
            ConnectionState::Guest => "guest",
            ConnectionState::Rejected => "rejected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Connection-local state: id, bound identity, lifecycle state.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    connection_id: String,
    identity: Option<Identity>,
    state: ConnectionState,
}

impl Default for ConnectionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionContext {
    pub fn new() -> Self {
        Self {
            connection_id: uuid::Uuid::new_v4().to_string(),
            identity: None,
            state: ConnectionState::Connecting,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Binds `identity` for the rest of the connection's life.
    pub fn authenticate(&mut self, identity: Identity) -> Result<(), JeeravanError> {
        self.transition(ConnectionState::Authenticated)?;
        self.identity = Some(identity);
        Ok(())
    }

    pub fn admit_guest(&mut self) -> Result<(), JeeravanError> {
        self.transition(ConnectionState::Guest)
    }

    pub fn reject(&mut self) -> Result<(), JeeravanError> {
        self.transition(ConnectionState::Rejected)
    }

    /// Closing is always allowed and idempotent.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }

    fn transition(&mut self, next: ConnectionState) -> Result<(), JeeravanError> {
        if self.state != ConnectionState::Connecting {
            return Err(JeeravanError::Internal(format!(
                "invalid connection transition {} -> {next}",
                self.state
            )));
        }
        self.state = next;
        Ok(())
    }
}

enum Inbound {
    Event(ClientEvent),
    Malformed(String),
}

/// An admitted connection's turn queue.
pub struct Session {
    connection_id: String,
    queue: mpsc::Sender<Inbound>,
    sink: mpsc::Sender<ServerEvent>,
    no_chat_reply: String,
    closed: CancellationToken,
    pending: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl Session {
    /// Starts the worker for an authenticated or guest connection.
    ///
    /// Replies go to `sink`; guests receive `guest_message` for every turn.
    pub fn start(
        context: &ConnectionContext,
        pipeline: MessagePipeline,
        guest_message: String,
        sink: mpsc::Sender<ServerEvent>,
    ) -> Result<Self, JeeravanError> {
        let mode = match (context.state(), context.identity()) {
            (ConnectionState::Authenticated, Some(identity)) => Mode::Owner(identity.clone()),
            (ConnectionState::Guest, _) => Mode::Guest(guest_message),
            (state, _) => {
                return Err(JeeravanError::Auth(format!(
                    "connection in state {state} cannot start a session"
                )));
            }
        };

        let (queue, rx) = mpsc::channel(QUEUE_DEPTH);
        let closed = CancellationToken::new();
        let pending = Arc::new(AtomicUsize::new(0));
        let span = info_span!("connection", connection_id = %context.connection_id());
        let no_chat_reply = pipeline.no_chat_reply().to_string();

        let worker = Worker {
            mode,
            pipeline: pipeline.clone(),
            sink: sink.clone(),
            closed: closed.clone(),
            shutdown: pipeline.supervisor().shutdown_token(),
            pending: Arc::clone(&pending),
        };
        let worker = pipeline
            .supervisor()
            .spawn(worker.run(rx).instrument(span));

        info!(connection_id = %context.connection_id(), state = %context.state(), "session started");
        Ok(Self {
            connection_id: context.connection_id().to_string(),
            queue,
            sink,
            no_chat_reply,
            closed,
            pending,
            worker,
        })
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Events queued or in progress.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Decodes one text frame and queues it. Never blocks on the pipeline.
    pub async fn dispatch_text(&self, text: &str) {
        let inbound = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => Inbound::Event(event),
            Err(e) => Inbound::Malformed(e.to_string()),
        };
        self.enqueue(inbound).await;
    }

    pub async fn dispatch(&self, event: ClientEvent) {
        self.enqueue(Inbound::Event(event)).await;
    }

    async fn enqueue(&self, inbound: Inbound) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.queue.try_send(inbound) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!(connection_id = %self.connection_id, error = %e, "turn queue unavailable, refusing event");
            let err = JeeravanError::Validation("too many pending messages".into());
            let chat = match e.into_inner() {
                Inbound::Event(ClientEvent::AiMessage(message)) => chat_reference(&message),
                Inbound::Malformed(_) => None,
            };
            let _ = self.sink.emit(ServerEvent::error(&err)).await;
            let _ = self
                .sink
                .emit(ServerEvent::reply(&self.no_chat_reply, chat))
                .await;
        }
    }

    /// Stops accepting events. Queued turns that have not started are
    /// dropped; a turn already running finishes on its own.
    pub fn close(self) -> JoinHandle<()> {
        self.closed.cancel();
        debug!(connection_id = %self.connection_id, "session closed");
        self.worker
    }
}

enum Mode {
    Owner(Identity),
    Guest(String),
}

struct Worker {
    mode: Mode,
    pipeline: MessagePipeline,
    sink: mpsc::Sender<ServerEvent>,
    closed: CancellationToken,
    shutdown: CancellationToken,
    pending: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<Inbound>) {
        let mut previous_tail: Option<JoinHandle<()>> = None;
        loop {
            let inbound = tokio::select! {
                biased;
                _ = self.closed.cancelled() => break,
                _ = self.shutdown.cancelled() => break,
                inbound = rx.recv() => match inbound {
                    Some(inbound) => inbound,
                    None => break,
                },
            };

            // The reply of the previous turn must be in history before the
            // next turn reads it.
            if let Some(tail) = previous_tail.take()
                && let Err(e) = tail.await
            {
                warn!(error = %e, "previous reply task failed");
            }

            previous_tail = self.handle(inbound).await;
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }

        let dropped = self.pending.swap(0, Ordering::SeqCst);
        if dropped > 0 {
            debug!(dropped, "discarding queued turns of closed connection");
        }
    }

    async fn handle(&self, inbound: Inbound) -> Option<JoinHandle<()>> {
        let message = match inbound {
            Inbound::Event(ClientEvent::AiMessage(message)) => message,
            Inbound::Malformed(detail) => {
                let err = JeeravanError::Validation(format!("malformed event: {detail}"));
                self.refuse(&err, None).await;
                return None;
            }
        };

        match &self.mode {
            Mode::Guest(guest_message) => {
                let chat = chat_reference(&message);
                let _ = self.sink.emit(ServerEvent::reply(guest_message, chat)).await;
                None
            }
            Mode::Owner(identity) => {
                let chat = chat_reference(&message);
                let blank = message.content.as_deref().is_none_or(|c| c.trim().is_empty());
                let turn = match validate(identity, message) {
                    Ok(turn) => turn,
                    // Blank content never gets a reply bubble.
                    Err(e) if blank => {
                        self.reject(&e).await;
                        return None;
                    }
                    Err(e) => {
                        self.refuse(&e, chat).await;
                        return None;
                    }
                };
                if let Err(e) = self.pipeline.resolve_chat(&turn.owner_id, &turn.chat_id).await {
                    self.refuse(&e, Some(turn.chat_id)).await;
                    return None;
                }
                self.pipeline.process(turn, &self.sink).await.tail
            }
        }
    }

    /// Error event only.
    async fn reject(&self, err: &JeeravanError) {
        debug!(code = err.code(), error = %err, "rejecting event");
        let _ = self.sink.emit(ServerEvent::error(err)).await;
    }

    /// Error event followed by the canned `ai-response`, so clients that
    /// only listen for replies are still answered.
    async fn refuse(&self, err: &JeeravanError, chat: Option<String>) {
        self.reject(err).await;
        let _ = self
            .sink
            .emit(ServerEvent::reply(self.pipeline.no_chat_reply(), chat))
            .await;
    }
}

/// The trimmed chat id of `message`, if it names one.
fn chat_reference(message: &AiMessage) -> Option<String> {
    message
        .chat
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Checks an `ai-message` payload for an authenticated connection.
pub fn validate(identity: &Identity, message: AiMessage) -> Result<InboundTurn, JeeravanError> {
    let content = message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| JeeravanError::Validation("message content must not be empty".into()))?;
    let chat_id = message
        .chat
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| JeeravanError::Validation("message must reference a chat".into()))?;
    let display_name = message
        .user_name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| Some(identity.display_name.clone()).filter(|n| !n.trim().is_empty()));

    Ok(InboundTurn {
        owner_id: identity.id.clone(),
        chat_id,
        content,
        display_name,
    })
}
