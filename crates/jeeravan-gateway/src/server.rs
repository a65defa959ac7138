// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderValue, Method, header};
use axum::routing::{delete, get};
use axum::{Router, middleware as axum_middleware};
use dashmap::DashMap;
use jeeravan_agent::{ConnectionState, DeletionCascade, MessagePipeline};
use jeeravan_config::model::{JeeravanConfig, UnauthenticatedPolicy};
use jeeravan_core::{AuthAdapter, JeeravanError, ProviderAdapter, StorageAdapter};
use jeeravan_memory::SemanticMemory;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::require_identity;
use crate::{handlers, ws};

/// Transport-level settings taken from configuration.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub cookie_name: String,
    pub unauthenticated: UnauthenticatedPolicy,
    pub guest_message: String,
    pub allowed_origins: Vec<String>,
}

impl GatewaySettings {
    pub fn from_config(config: &JeeravanConfig) -> Self {
        Self {
            cookie_name: config.auth.cookie_name.clone(),
            unauthenticated: config.server.unauthenticated,
            guest_message: config.server.guest_message.clone(),
            allowed_origins: config.server.allowed_origins.clone(),
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageAdapter>,
    pub provider: Arc<dyn ProviderAdapter>,
    pub memory: SemanticMemory,
    pub pipeline: MessagePipeline,
    pub cascade: DeletionCascade,
    pub auth: Arc<dyn AuthAdapter>,
    pub settings: Arc<GatewaySettings>,
    /// Live realtime connections by connection id.
    pub connections: Arc<DashMap<String, ConnectionState>>,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        provider: Arc<dyn ProviderAdapter>,
        memory: SemanticMemory,
        pipeline: MessagePipeline,
        auth: Arc<dyn AuthAdapter>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            cascade: DeletionCascade::new(storage.clone(), memory.clone()),
            storage,
            provider,
            memory,
            pipeline,
            auth,
            settings: Arc::new(settings),
            connections: Arc::new(DashMap::new()),
            start_time: Instant::now(),
        }
    }
}

/// Builds the application router.
///
/// - GET /health (public)
/// - GET /ws (auth during the handshake)
/// - POST, GET /api/chat and DELETE /api/chat/{chat_id} (auth middleware)
/// - DELETE /api/auth/account (auth middleware)
pub fn build_router(state: AppState) -> Result<Router, JeeravanError> {
    let cors = cors_layer(&state.settings.allowed_origins)?;

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/api/chat",
            get(handlers::list_chats).post(handlers::create_chat),
        )
        .route("/api/chat/{chat_id}", delete(handlers::delete_chat))
        .route("/api/auth/account", delete(handlers::delete_account))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Ok(Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, JeeravanError> {
    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o)
                .map_err(|e| JeeravanError::Config(format!("invalid allowed origin {o:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Binds the listener for `host:port`.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, JeeravanError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|e| JeeravanError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Serves `router` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), JeeravanError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "gateway listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| JeeravanError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;
    info!("gateway stopped accepting connections");
    Ok(())
}
