// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation core for the Jeeravan assistant.
//!
//! - [`pipeline`]: per-turn augmentation (persist, embed, recall, generate, emit)
//! - [`context`]: conversation window assembly and fallback selection
//! - [`session`]: connection state machine and per-connection FIFO worker
//! - [`cascade`]: chat and account deletion across store and memory
//! - [`supervisor`] and [`shutdown`]: background task tracking and signals

pub mod cascade;
pub mod context;
pub mod events;
pub mod pipeline;
pub mod session;
pub mod shutdown;
pub mod supervisor;

pub use cascade::{AccountDeletion, DeletionCascade};
pub use context::ConversationWindow;
pub use events::{AiMessage, ClientEvent, ResponseSink, ServerEvent};
pub use pipeline::{InboundTurn, MessagePipeline, TurnKind, TurnOutcome};
pub use session::{ConnectionContext, ConnectionState, Session};
pub use supervisor::TaskSupervisor;
