// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `jeeravan serve` command implementation.
//!
//! Opens SQLite storage, connects the Gemini backend and semantic memory,
//! sends the chat model one test prompt, then serves the gateway until SIGINT or
//! SIGTERM. In-flight turns are drained before storage is checkpointed.

use std::sync::Arc;
use std::time::Duration;

use jeeravan_agent::{MessagePipeline, TaskSupervisor, shutdown};
use jeeravan_config::model::JeeravanConfig;
use jeeravan_core::{
    AuthAdapter, EmbeddingAdapter, JeeravanError, ProviderAdapter, StorageAdapter,
};
use jeeravan_gateway::{AppState, GatewaySettings, TokenAuthenticator, bind, build_router, serve};
use jeeravan_gemini::GeminiProvider;
use jeeravan_memory::SemanticMemory;
use jeeravan_storage::SqliteStorage;
use tracing::{info, warn};

/// Runs the `jeeravan serve` command.
pub async fn run_serve(config: JeeravanConfig) -> Result<(), JeeravanError> {
    init_tracing(&config.assistant.log_level);
    info!(name = %config.assistant.name, "starting jeeravan serve");

    let storage: Arc<dyn StorageAdapter> = {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        Arc::new(storage)
    };

    let gemini = Arc::new(GeminiProvider::new(&config).await?);
    log_model_diagnostics(&gemini).await;

    let memory = jeeravan_memory::connect(
        &config.memory,
        &config.storage.database_path,
        config.gemini.embedding_dimensions,
    )
    .await;
    info!(backend = memory.backend_name(), "semantic memory ready");

    let supervisor = TaskSupervisor::new();
    let state = build_state(
        &config,
        storage.clone(),
        gemini.clone(),
        gemini,
        memory,
        supervisor.clone(),
    )?;
    let router = build_router(state)?;

    let listener = bind(&config.server.host, config.server.port).await?;
    let cancel = shutdown::install_signal_handler();
    serve(listener, router, cancel).await?;

    let drain = Duration::from_secs(config.server.drain_timeout_secs);
    if supervisor.drain(drain).await {
        info!("in-flight turns drained");
    } else {
        warn!(
            remaining = supervisor.active(),
            timeout_secs = drain.as_secs(),
            "drain timed out, abandoning in-flight turns"
        );
    }

    storage.close().await?;
    info!("jeeravan serve shutdown complete");
    Ok(())
}

/// Wires the pipeline, authenticator and gateway state from their parts.
pub fn build_state(
    config: &JeeravanConfig,
    storage: Arc<dyn StorageAdapter>,
    embedder: Arc<dyn EmbeddingAdapter>,
    provider: Arc<dyn ProviderAdapter>,
    memory: SemanticMemory,
    supervisor: TaskSupervisor,
) -> Result<AppState, JeeravanError> {
    let pipeline = MessagePipeline::new(
        storage.clone(),
        embedder,
        provider.clone(),
        memory.clone(),
        supervisor,
        config.pipeline.clone(),
    );
    let auth: Arc<dyn AuthAdapter> =
        Arc::new(TokenAuthenticator::new(&config.auth, storage.clone())?);
    Ok(AppState::new(
        storage,
        provider,
        memory,
        pipeline,
        auth,
        GatewaySettings::from_config(config),
    ))
}

/// Startup check of the chat model. Failures are logged, never fatal.
async fn log_model_diagnostics(gemini: &GeminiProvider) {
    let diagnostics = gemini.diagnose().await;
    match &diagnostics.models {
        Ok(models) => info!(count = models.len(), "Gemini models visible"),
        Err(e) => warn!(error = %e, "could not list Gemini models"),
    }
    match &diagnostics.sample {
        Ok(_) => info!(model = %diagnostics.chat_model, "chat model responded"),
        Err(e) => warn!(
            model = %diagnostics.chat_model,
            error = %e,
            "chat model check failed, replies will use fallbacks until it recovers"
        ),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("jeeravan={log_level},warn")));

    // `try_init` so a second call (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}
