// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message augmentation pipeline.
//!
//! One call to [`MessagePipeline::process`] handles one user turn:
//!
//! 1. persist the user message and embed it, concurrently
//! 2. upsert its memory, recall similar memories, load recent history and
//!    bump chat activity, concurrently
//! 3. assemble the [`ConversationWindow`]
//! 4. generate, substituting a fallback reply on failure
//! 5. emit exactly one `ai-response`
//! 6. for generated replies only, persist and index the reply in the
//!    background
//!
//! Only a failure to persist the user message aborts the turn, and even then
//! a reply is emitted.

use std::sync::Arc;

use jeeravan_config::model::PipelineConfig;
use jeeravan_core::{
    Chat, EmbeddingAdapter, GenerationRequest, JeeravanError, MemoryFilter, MemoryMetadata,
    MemoryRecord, Message, ProviderAdapter, Role, ScoredRecord, StorageAdapter,
};
use jeeravan_memory::SemanticMemory;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::context::{ConversationWindow, pick_fallback};
use crate::events::{ResponseSink, ServerEvent};
use crate::supervisor::TaskSupervisor;

/// A validated user turn from an authenticated connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundTurn {
    pub owner_id: String,
    pub chat_id: String,
    pub content: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// The backend produced the reply.
    Generated,
    /// Generation failed; a canned reply was sent.
    Fallback,
    /// The user message could not be persisted.
    Failed,
}

/// What happened during one turn.
#[derive(Debug)]
pub struct TurnOutcome {
    pub kind: TurnKind,
    pub reply: String,
    /// False when the connection was gone by the time the reply was ready.
    pub delivered: bool,
    /// Background persistence of the reply, present for generated replies.
    pub tail: Option<JoinHandle<()>>,
}

/// Shared, cheaply cloneable pipeline.
#[derive(Clone)]
pub struct MessagePipeline {
    storage: Arc<dyn StorageAdapter>,
    embedder: Arc<dyn EmbeddingAdapter>,
    provider: Arc<dyn ProviderAdapter>,
    memory: SemanticMemory,
    supervisor: TaskSupervisor,
    config: Arc<PipelineConfig>,
}

impl MessagePipeline {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        embedder: Arc<dyn EmbeddingAdapter>,
        provider: Arc<dyn ProviderAdapter>,
        memory: SemanticMemory,
        supervisor: TaskSupervisor,
        config: PipelineConfig,
    ) -> Self {
        Self {
            storage,
            embedder,
            provider,
            memory,
            supervisor,
            config: Arc::new(config),
        }
    }

    pub fn supervisor(&self) -> &TaskSupervisor {
        &self.supervisor
    }

    /// Canned reply for messages that cannot be routed to one of the
    /// sender's chats.
    pub fn no_chat_reply(&self) -> &str {
        &self.config.no_chat_reply
    }

    /// Loads `chat_id` if it exists and belongs to `owner_id`.
    ///
    /// A chat owned by someone else is reported exactly like a missing one.
    pub async fn resolve_chat(&self, owner_id: &str, chat_id: &str) -> Result<Chat, JeeravanError> {
        match self.storage.get_chat(chat_id).await? {
            Some(chat) if chat.owner_id == owner_id => Ok(chat),
            _ => Err(JeeravanError::NotFound {
                entity: "chat",
                id: chat_id.to_string(),
            }),
        }
    }

    /// Runs one turn and emits its reply to `sink`. Never fails.
    pub async fn process(&self, turn: InboundTurn, sink: &dyn ResponseSink) -> TurnOutcome {
        let span = info_span!("turn", chat_id = %turn.chat_id, owner_id = %turn.owner_id);
        self.run(turn, sink).instrument(span).await
    }

    async fn run(&self, turn: InboundTurn, sink: &dyn ResponseSink) -> TurnOutcome {
        let (stored, embedded) = tokio::join!(
            self.storage
                .insert_message(&turn.chat_id, Role::User, &turn.content),
            self.embedder.embed(&turn.content),
        );

        let user_message = match stored {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "failed to persist user message, aborting turn");
                let reply = self.config.failure_reply.clone();
                let delivered = emit(sink, &turn.chat_id, &reply).await;
                return TurnOutcome {
                    kind: TurnKind::Failed,
                    reply,
                    delivered,
                    tail: None,
                };
            }
        };

        let vector = match embedded {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(error = %e, "embedding failed, continuing without memory");
                None
            }
        };

        let ((), memories, history, touched) = tokio::join!(
            self.remember(&user_message, &turn.owner_id, vector.as_deref()),
            self.recall(&turn.owner_id, vector.as_deref(), &user_message.id),
            self.storage
                .get_recent_messages(&turn.chat_id, self.config.recent_messages),
            self.storage.touch_chat(&turn.chat_id),
        );

        if let Err(e) = touched {
            debug!(error = %e, "failed to update chat activity");
        }
        let history = history.unwrap_or_else(|e| {
            warn!(error = %e, "failed to load recent history, using current turn only");
            vec![user_message.clone()]
        });

        let window =
            ConversationWindow::assemble(&memories, &history, self.config.recent_messages);
        debug!(
            turns = window.len(),
            memories = memories.len(),
            "conversation window assembled"
        );

        let request = GenerationRequest {
            turns: window.into_turns(),
            display_name: turn.display_name.clone(),
        };
        let (kind, reply) = match self.provider.generate(request).await {
            Ok(response) if !response.text.trim().is_empty() => (TurnKind::Generated, response.text),
            Ok(response) => {
                warn!(model = %response.model, "generation returned no text, using fallback");
                (TurnKind::Fallback, self.fallback())
            }
            Err(e) => {
                warn!(error = %e, "generation failed, using fallback");
                (TurnKind::Fallback, self.fallback())
            }
        };

        let delivered = emit(sink, &turn.chat_id, &reply).await;

        let tail = (kind == TurnKind::Generated)
            .then(|| self.spawn_tail(turn.owner_id, turn.chat_id, reply.clone()));

        TurnOutcome {
            kind,
            reply,
            delivered,
            tail,
        }
    }

    fn fallback(&self) -> String {
        pick_fallback(&self.config.fallback_replies, &self.config.failure_reply).to_string()
    }

    async fn remember(&self, message: &Message, owner_id: &str, vector: Option<&[f32]>) {
        let Some(vector) = vector else {
            return;
        };
        if let Err(e) = self.memory.upsert(record(message, owner_id, vector.to_vec())).await {
            warn!(error = %e, message_id = %message.id, "failed to store memory");
        }
    }

    /// Top-k memories for the owner, excluding the message being processed.
    async fn recall(
        &self,
        owner_id: &str,
        vector: Option<&[f32]>,
        exclude_id: &str,
    ) -> Vec<ScoredRecord> {
        let Some(vector) = vector else {
            return Vec::new();
        };
        let top_k = self.config.memory_top_k;
        match self
            .memory
            .query(owner_id, vector, top_k + 1, &MemoryFilter::owner(owner_id))
            .await
        {
            Ok(hits) => hits
                .into_iter()
                .filter(|hit| hit.id != exclude_id)
                .take(top_k)
                .collect(),
            Err(e) => {
                warn!(error = %e, "memory recall failed");
                Vec::new()
            }
        }
    }

    fn spawn_tail(&self, owner_id: String, chat_id: String, reply: String) -> JoinHandle<()> {
        let storage = Arc::clone(&self.storage);
        let embedder = Arc::clone(&self.embedder);
        let memory = self.memory.clone();
        let span = info_span!("reply_tail", chat_id = %chat_id);

        self.supervisor.spawn(
            async move {
                let (stored, embedded) = tokio::join!(
                    storage.insert_message(&chat_id, Role::Assistant, &reply),
                    embedder.embed(&reply),
                );
                let message = match stored {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(error = %e, "failed to persist assistant reply");
                        return;
                    }
                };
                match embedded {
                    Ok(vector) => {
                        if let Err(e) = memory.upsert(record(&message, &owner_id, vector)).await {
                            warn!(error = %e, "failed to store reply memory");
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to embed assistant reply"),
                }
                debug!(message_id = %message.id, "assistant reply persisted");
            }
            .instrument(span),
        )
    }
}

fn record(message: &Message, owner_id: &str, vector: Vec<f32>) -> MemoryRecord {
    MemoryRecord {
        id: message.id.clone(),
        vector,
        metadata: MemoryMetadata {
            chat_id: message.chat_id.clone(),
            owner_id: owner_id.to_string(),
            text: message.content.clone(),
        },
    }
}

/// Sends the reply; a vanished connection is not an error.
async fn emit(sink: &dyn ResponseSink, chat_id: &str, reply: &str) -> bool {
    match sink
        .emit(ServerEvent::reply(reply, Some(chat_id.to_string())))
        .await
    {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "connection gone before reply could be sent");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jeeravan_core::AiResponse;
    use jeeravan_test_utils::{MockEmbedder, MockProvider, MockVectorIndex, TestHarness};
    use tokio::sync::mpsc;

    struct Fixture {
        harness: TestHarness,
        pipeline: MessagePipeline,
        owner: String,
        chat: String,
    }

    async fn fixture(memory: SemanticMemory) -> Fixture {
        let harness = TestHarness::builder().build().await.unwrap();
        let owner = harness.storage.create_identity("Asha").await.unwrap();
        let chat = harness.storage.create_chat(&owner.id, "t").await.unwrap();
        let pipeline = MessagePipeline::new(
            harness.storage.clone(),
            harness.embedder.clone(),
            harness.provider.clone(),
            memory,
            TaskSupervisor::new(),
            harness.config.pipeline.clone(),
        );
        Fixture {
            harness,
            pipeline,
            owner: owner.id,
            chat: chat.id,
        }
    }

    fn turn(f: &Fixture, content: &str) -> InboundTurn {
        InboundTurn {
            owner_id: f.owner.clone(),
            chat_id: f.chat.clone(),
            content: content.into(),
            display_name: None,
        }
    }

    async fn run(f: &Fixture, content: &str) -> (TurnOutcome, Vec<ServerEvent>) {
        let (tx, mut rx) = mpsc::channel(8);
        let mut outcome = f.pipeline.process(turn(f, content), &tx).await;
        if let Some(tail) = outcome.tail.take() {
            tail.await.unwrap();
        }
        drop(tx);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (outcome, events)
    }

    #[tokio::test]
    async fn generated_turn_emits_once_and_persists_both_sides() {
        let f = fixture(SemanticMemory::unavailable("test")).await;
        f.harness.provider.push_reply("Bhiya Ram!").await;

        let (outcome, events) = run(&f, "hello").await;
        assert_eq!(outcome.kind, TurnKind::Generated);
        assert_eq!(
            events,
            vec![ServerEvent::AiResponse(AiResponse {
                content: "Bhiya Ram!".into(),
                chat: Some(f.chat.clone()),
            })]
        );

        let stored = f.harness.storage.get_messages(&f.chat, 100).await.unwrap();
        let pairs: Vec<_> = stored.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(
            pairs,
            vec![(Role::User, "hello"), (Role::Assistant, "Bhiya Ram!")]
        );
    }

    #[tokio::test]
    async fn generation_failure_uses_fallback_and_persists_nothing_more() {
        let index = Arc::new(MockVectorIndex::new());
        let f = fixture(SemanticMemory::new(index.clone())).await;
        f.harness.provider.set_failing(true);

        let (outcome, events) = run(&f, "hello").await;
        assert_eq!(outcome.kind, TurnKind::Fallback);
        assert!(outcome.tail.is_none());
        assert!(f.harness.config.pipeline.fallback_replies.contains(&outcome.reply));
        assert_eq!(events.len(), 1);

        let stored = f.harness.storage.get_messages(&f.chat, 100).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].role, Role::User);
        assert_eq!(index.len().await, 1, "only the user turn is indexed");
    }

    #[tokio::test]
    async fn embedding_failure_still_replies() {
        let index = Arc::new(MockVectorIndex::new());
        let f = fixture(SemanticMemory::new(index.clone())).await;
        f.harness.embedder.set_failing(true);

        let (outcome, events) = run(&f, "hello").await;
        assert_eq!(outcome.kind, TurnKind::Generated);
        assert_eq!(events.len(), 1);
        assert_eq!(index.upserts(), 0);
        assert_eq!(index.queries(), 0);
    }

    #[tokio::test]
    async fn persistence_failure_emits_failure_reply() {
        let f = fixture(SemanticMemory::unavailable("test")).await;
        let mut t = turn(&f, "hello");
        t.chat_id = "missing-chat".into();

        let (tx, mut rx) = mpsc::channel(2);
        let outcome = f.pipeline.process(t, &tx).await;
        assert_eq!(outcome.kind, TurnKind::Failed);
        assert!(f.harness.provider.requests().await.is_empty());

        let ServerEvent::AiResponse(reply) = rx.recv().await.unwrap() else {
            panic!("expected ai-response");
        };
        assert_eq!(reply.content, "Something went wrong. Please try again later.");
        assert_eq!(reply.chat.as_deref(), Some("missing-chat"));
    }

    #[tokio::test]
    async fn unavailable_memory_still_produces_reply() {
        let f = fixture(SemanticMemory::unavailable("test")).await;
        let (outcome, events) = run(&f, "kya haal?").await;
        assert!(!outcome.reply.is_empty());
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn second_turn_sees_first_exchange() {
        let f = fixture(SemanticMemory::unavailable("test")).await;
        f.harness.provider.push_reply("reply one").await;
        run(&f, "hi").await;
        run(&f, "what did I just say?").await;

        let requests = f.harness.provider.requests().await;
        let second: Vec<_> = requests[1]
            .turns
            .iter()
            .map(|t| (t.role, t.content.as_str()))
            .collect();
        assert_eq!(
            second,
            vec![
                (Role::User, "hi"),
                (Role::Assistant, "reply one"),
                (Role::User, "what did I just say?"),
            ]
        );
    }

    #[tokio::test]
    async fn recall_excludes_the_current_message() {
        let index = Arc::new(MockVectorIndex::new());
        let f = fixture(SemanticMemory::new(index)).await;
        f.harness.provider.push_reply("noted").await;
        run(&f, "I love poha").await;
        run(&f, "I love poha").await;

        let requests = f.harness.provider.requests().await;
        let first = &requests[0].turns;
        assert!(
            !first[0].content.starts_with("Relevant previous messages:"),
            "fresh chat recalls nothing"
        );
        let memory_turn = &requests[1].turns[0].content;
        assert!(memory_turn.starts_with("Relevant previous messages:"));
        assert_eq!(memory_turn.matches("I love poha").count(), 1);
    }

    #[tokio::test]
    async fn failing_index_degrades_to_plain_reply() {
        let index = Arc::new(MockVectorIndex::new());
        index.set_failing(true);
        let f = fixture(SemanticMemory::new(index.clone())).await;
        f.harness.provider.push_reply("Poha khao!").await;

        let (outcome, events) = run(&f, "breakfast?").await;
        assert_eq!(outcome.kind, TurnKind::Generated);
        assert_eq!(events, vec![ServerEvent::reply("Poha khao!", Some(f.chat.clone()))]);

        let stored = f.harness.storage.get_messages(&f.chat, 10).await.unwrap();
        let pairs: Vec<_> = stored.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(
            pairs,
            vec![(Role::User, "breakfast?"), (Role::Assistant, "Poha khao!")]
        );
        // User upsert, reply upsert and the recall query were all attempted.
        assert_eq!(index.upserts(), 2);
        assert_eq!(index.queries(), 1);
        let request = &f.harness.provider.requests().await[0];
        assert_eq!(request.turns.len(), 1);
    }

    #[tokio::test]
    async fn display_name_is_carried_once() {
        let f = fixture(SemanticMemory::unavailable("test")).await;
        let mut t = turn(&f, "hello");
        t.display_name = Some("Asha".into());

        let (tx, _rx) = mpsc::channel(2);
        if let Some(tail) = f.pipeline.process(t, &tx).await.tail {
            tail.await.unwrap();
        }

        let request = &f.harness.provider.requests().await[0];
        assert_eq!(request.display_name.as_deref(), Some("Asha"));
        assert_eq!(request.turns.len(), 1);
        assert!(request.turns.iter().all(|t| !t.content.contains("Asha")));
    }

    #[tokio::test]
    async fn closed_connection_does_not_stop_persistence() {
        let f = fixture(SemanticMemory::unavailable("test")).await;
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let outcome = f.pipeline.process(turn(&f, "bye"), &tx).await;
        assert!(!outcome.delivered);
        outcome.tail.unwrap().await.unwrap();
        assert_eq!(f.harness.storage.get_messages(&f.chat, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn resolve_chat_hides_foreign_chats() {
        let f = fixture(SemanticMemory::unavailable("test")).await;
        let other = f.harness.storage.create_identity("Ravi").await.unwrap();
        assert!(f.pipeline.resolve_chat(&f.owner, &f.chat).await.is_ok());
        let err = f.pipeline.resolve_chat(&other.id, &f.chat).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn mocks_are_pipeline_compatible() {
        fn assert_embedder<T: EmbeddingAdapter>() {}
        fn assert_provider<T: ProviderAdapter>() {}
        assert_embedder::<MockEmbedder>();
        assert_provider::<MockProvider>();
    }
}
