// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime protocol tests against a live listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use jeeravan_agent::{MessagePipeline, TaskSupervisor};
use jeeravan_config::model::{JeeravanConfig, MemoryBackend, UnauthenticatedPolicy};
use jeeravan_core::{Role, StorageAdapter};
use jeeravan_gateway::{
    AppState, GatewaySettings, TokenAuthenticator, bind, build_router, issue_token, serve,
};
use jeeravan_memory::SemanticMemory;
use jeeravan_test_utils::{MockVectorIndex, TestHarness};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Server {
    harness: TestHarness,
    addr: SocketAddr,
    shutdown: CancellationToken,
}

impl Server {
    async fn start(harness: TestHarness) -> Self {
        let memory = SemanticMemory::new(Arc::new(MockVectorIndex::new()));
        let pipeline = MessagePipeline::new(
            harness.storage.clone(),
            harness.embedder.clone(),
            harness.provider.clone(),
            memory.clone(),
            TaskSupervisor::new(),
            harness.config.pipeline.clone(),
        );
        let auth = TokenAuthenticator::new(&harness.config.auth, harness.storage.clone()).unwrap();
        let state = AppState::new(
            harness.storage.clone(),
            harness.provider.clone(),
            memory,
            pipeline,
            Arc::new(auth),
            GatewaySettings::from_config(&harness.config),
        );
        let router = build_router(state).unwrap();
        let listener = bind("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(serve(listener, router, shutdown.clone()));
        Self {
            harness,
            addr,
            shutdown,
        }
    }

    async fn with_two_replies() -> Self {
        let harness = TestHarness::builder()
            .with_mock_responses(vec!["Namaste Asha!".into(), "You said hi.".into()])
            .build()
            .await
            .unwrap();
        Self::start(harness).await
    }

    fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.harness.storage
    }

    /// Returns `(identity id, chat id, token)`.
    async fn owner_with_chat(&self) -> (String, String, String) {
        let who = self.storage().create_identity("Asha").await.unwrap();
        let chat = self.storage().create_chat(&who.id, "Poha").await.unwrap();
        let token = issue_token(&self.harness.config.auth, &who.id).unwrap();
        (who.id, chat.id, token)
    }

    async fn connect_bearer(&self, token: &str) -> Client {
        let mut request = format!("ws://{}/ws", self.addr)
            .into_client_request()
            .unwrap();
        request
            .headers_mut()
            .insert("authorization", format!("Bearer {token}").parse().unwrap());
        connect_async(request).await.unwrap().0
    }

    async fn wait_for_messages(&self, chat_id: &str, count: usize) {
        for _ in 0..100 {
            if self.storage().get_messages(chat_id, 100).await.unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("chat {chat_id} never reached {count} messages");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn send_message(client: &mut Client, data: Value) {
    let frame = json!({"event": "ai-message", "data": data}).to_string();
    client.send(Message::text(frame)).await.unwrap();
}

async fn next_event(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("no event within timeout")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn message_round_trip_persists_both_turns() {
    let server = Server::with_two_replies().await;
    let (_, chat_id, token) = server.owner_with_chat().await;
    let mut client = server.connect_bearer(&token).await;

    send_message(&mut client, json!({"chat": chat_id, "content": "hello"})).await;
    let event = next_event(&mut client).await;
    assert_eq!(event["event"], "ai-response");
    assert_eq!(event["data"]["chat"], chat_id.as_str());
    assert_eq!(event["data"]["content"], "Namaste Asha!");

    server.wait_for_messages(&chat_id, 2).await;
    let messages = server.storage().get_messages(&chat_id, 10).await.unwrap();
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "hello");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Namaste Asha!");
}

#[tokio::test]
async fn second_turn_sees_first_exchange() {
    let server = Server::with_two_replies().await;
    let (_, chat_id, token) = server.owner_with_chat().await;
    let mut client = server.connect_bearer(&token).await;

    send_message(&mut client, json!({"chat": chat_id, "content": "hi"})).await;
    send_message(
        &mut client,
        json!({"chat": chat_id, "content": "what did I just say?"}),
    )
    .await;
    assert_eq!(next_event(&mut client).await["data"]["content"], "Namaste Asha!");
    assert_eq!(next_event(&mut client).await["data"]["content"], "You said hi.");

    let requests = server.harness.provider.requests().await;
    assert_eq!(requests.len(), 2);
    let texts: Vec<_> = requests[1]
        .turns
        .iter()
        .map(|t| (t.role, t.content.as_str()))
        .collect();
    let tail = &texts[texts.len() - 3..];
    assert_eq!(
        tail,
        &[
            (Role::User, "hi"),
            (Role::Assistant, "Namaste Asha!"),
            (Role::User, "what did I just say?"),
        ]
    );
}

#[tokio::test]
async fn blank_content_is_rejected_without_persisting() {
    let server = Server::with_two_replies().await;
    let (_, chat_id, token) = server.owner_with_chat().await;
    let mut client = server.connect_bearer(&token).await;

    send_message(&mut client, json!({"chat": chat_id, "content": "   "})).await;
    let event = next_event(&mut client).await;
    assert_eq!(event["event"], "error");
    assert_eq!(event["data"]["code"], "validation");

    // A follow-up proves the rejected message left nothing behind.
    send_message(&mut client, json!({"chat": chat_id, "content": "hello"})).await;
    assert_eq!(next_event(&mut client).await["event"], "ai-response");
    let messages = server.storage().get_messages(&chat_id, 10).await.unwrap();
    assert_eq!(messages[0].content, "hello");
    assert_eq!(server.harness.provider.requests().await.len(), 1);
}

#[tokio::test]
async fn foreign_chat_is_not_found() {
    let server = Server::with_two_replies().await;
    let (_, chat_id, _) = server.owner_with_chat().await;
    let intruder = server.storage().create_identity("Ravi").await.unwrap();
    let token = issue_token(&server.harness.config.auth, &intruder.id).unwrap();
    let mut client = server.connect_bearer(&token).await;

    send_message(&mut client, json!({"chat": chat_id, "content": "hello"})).await;
    let event = next_event(&mut client).await;
    assert_eq!(event["event"], "error");
    assert_eq!(event["data"]["code"], "not_found");

    let reply = next_event(&mut client).await;
    assert_eq!(reply["event"], "ai-response");
    assert_eq!(
        reply["data"]["content"],
        server.harness.config.pipeline.no_chat_reply.as_str()
    );
    assert_eq!(reply["data"]["chat"], chat_id.as_str());
    assert!(server.storage().get_messages(&chat_id, 10).await.unwrap().is_empty());
    assert!(server.harness.provider.requests().await.is_empty());
}

#[tokio::test]
async fn message_without_chat_gets_canned_reply() {
    let server = Server::with_two_replies().await;
    let (_, _, token) = server.owner_with_chat().await;
    let mut client = server.connect_bearer(&token).await;

    send_message(&mut client, json!({"content": "hello"})).await;
    assert_eq!(next_event(&mut client).await["data"]["code"], "validation");
    let reply = next_event(&mut client).await;
    assert_eq!(reply["event"], "ai-response");
    assert!(reply["data"]["chat"].is_null());
}

#[tokio::test]
async fn malformed_frame_gets_error_event() {
    let server = Server::with_two_replies().await;
    let (_, _, token) = server.owner_with_chat().await;
    let mut client = server.connect_bearer(&token).await;

    client.send(Message::text("not json")).await.unwrap();
    let event = next_event(&mut client).await;
    assert_eq!(event["data"]["code"], "validation");
    let reply = next_event(&mut client).await;
    assert_eq!(reply["event"], "ai-response");
    assert!(reply["data"]["chat"].is_null());
}

#[tokio::test]
async fn missing_credential_is_refused() {
    let server = Server::with_two_replies().await;
    let err = connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap_err();
    match err {
        tungstenite::Error::Http(response) => assert_eq!(response.status(), 401),
        other => panic!("expected HTTP rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn query_token_is_accepted() {
    let server = Server::with_two_replies().await;
    let (_, chat_id, token) = server.owner_with_chat().await;
    let (mut client, _) = connect_async(format!("ws://{}/ws?token={token}", server.addr))
        .await
        .unwrap();

    send_message(&mut client, json!({"chat": chat_id, "content": "hello"})).await;
    assert_eq!(next_event(&mut client).await["event"], "ai-response");
}

#[tokio::test]
async fn guest_gets_canned_reply() {
    let mut config = JeeravanConfig::default();
    config.memory.backend = MemoryBackend::Disabled;
    config.auth.jwt_secret = Some("guest-mode-secret".into());
    config.server.unauthenticated = UnauthenticatedPolicy::Guest;
    let guest_message = config.server.guest_message.clone();
    let harness = TestHarness::builder()
        .with_config(config)
        .build()
        .await
        .unwrap();
    let server = Server::start(harness).await;

    let (mut client, _) = connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();
    send_message(&mut client, json!({"chat": "c-1", "content": "hello"})).await;
    let event = next_event(&mut client).await;
    assert_eq!(event["event"], "ai-response");
    assert_eq!(event["data"]["content"], guest_message.as_str());
    assert_eq!(event["data"]["chat"], "c-1");

    send_message(&mut client, json!({"content": "again"})).await;
    assert!(next_event(&mut client).await["data"]["chat"].is_null());
    assert!(server.harness.provider.requests().await.is_empty());
}
