// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Gemini backend for the Jeeravan assistant.
//!
//! [`GeminiProvider`] implements both [`EmbeddingAdapter`] and
//! [`ProviderAdapter`]: one configured chat model, one embedding model, and a
//! persona instruction applied to every generation call. Model listing and
//! probing live in [`GeminiProvider::diagnose`] and never run per message.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use jeeravan_config::JeeravanConfig;
use jeeravan_core::{
    AdapterType, ConversationTurn, EmbeddingAdapter, GenerationRequest, GenerationResponse,
    HealthStatus, JeeravanError, PluginAdapter, ProviderAdapter, Role,
};
use tracing::{debug, info, warn};

use crate::client::GeminiClient;
use crate::types::{Content, GenerateContentRequest, GenerationConfig, ModelInfo};

/// Persona used when neither `system_prompt_file` nor `system_prompt` is set.
pub const DEFAULT_PERSONA: &str = include_str!("persona.md");

/// Gemini-backed generation and embedding.
pub struct GeminiProvider {
    client: GeminiClient,
    chat_model: String,
    embedding_model: String,
    dimensions: usize,
    temperature: Option<f32>,
    system_prompt: String,
}

/// Result of [`GeminiProvider::diagnose`].
#[derive(Debug, Clone)]
pub struct ModelDiagnostics {
    /// Models visible to the key, or the listing error.
    pub models: Result<Vec<ModelInfo>, String>,
    /// Sample reply from the configured chat model, or the error that prevented it.
    pub sample: Result<String, String>,
    pub chat_model: String,
}

impl GeminiProvider {
    /// Creates a provider from the given configuration.
    ///
    /// # API Key Resolution
    /// 1. `config.gemini.api_key` if set (the loader already folds in `GEMINI_API_KEY`)
    /// 2. `GEMINI_API_KEY` environment variable
    /// 3. Returns error if neither is available
    ///
    /// # Persona Resolution
    /// 1. `config.assistant.system_prompt_file` if set and readable
    /// 2. `config.assistant.system_prompt` if set
    /// 3. [`DEFAULT_PERSONA`]
    pub async fn new(config: &JeeravanConfig) -> Result<Self, JeeravanError> {
        let api_key = resolve_api_key(&config.gemini.api_key)?;
        let system_prompt = load_system_prompt(
            &config.assistant.system_prompt,
            &config.assistant.system_prompt_file,
        )
        .await;

        let client = GeminiClient::new(
            &api_key,
            &config.gemini.base_url,
            Duration::from_secs(config.gemini.timeout_secs),
            config.gemini.max_retries,
        )?;

        info!(
            chat_model = %config.gemini.chat_model,
            embedding_model = %config.gemini.embedding_model,
            "Gemini provider initialized"
        );

        Ok(Self {
            client,
            chat_model: config.gemini.chat_model.clone(),
            embedding_model: config.gemini.embedding_model.clone(),
            dimensions: config.gemini.embedding_dimensions,
            temperature: config.gemini.temperature,
            system_prompt,
        })
    }

    /// The designated chat model id.
    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    /// Persona instruction for one call, with the user's name appended when known.
    fn system_instruction(&self, display_name: Option<&str>) -> Content {
        let text = match display_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => format!("{}\n\nThe user's name is {name}.", self.system_prompt),
            None => self.system_prompt.clone(),
        };
        Content::text(None, text)
    }

    /// Builds the `generateContent` body for a window of turns.
    fn to_request(&self, request: &GenerationRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Some(self.system_instruction(request.display_name.as_deref())),
            contents: to_contents(&request.turns),
            generation_config: self.temperature.map(|t| GenerationConfig {
                temperature: Some(t),
            }),
        }
    }

    /// Lists visible models and sends the chat model a one-line prompt.
    ///
    /// Never fails: each half reports its own error.
    pub async fn diagnose(&self) -> ModelDiagnostics {
        let models = self.client.list_models().await.map_err(|e| e.to_string());
        let sample = self
            .generate(GenerationRequest {
                turns: vec![ConversationTurn::user("Test message")],
                display_name: None,
            })
            .await
            .map(|r| r.text)
            .map_err(|e| e.to_string());
        ModelDiagnostics {
            models,
            sample,
            chat_model: self.chat_model.clone(),
        }
    }

    /// Creates a provider with an existing client (for testing).
    #[cfg(test)]
    fn with_client(client: GeminiClient, system_prompt: &str) -> Self {
        Self {
            client,
            chat_model: "models/gemini-test".into(),
            embedding_model: "models/text-embedding-004".into(),
            dimensions: 3,
            temperature: None,
            system_prompt: system_prompt.into(),
        }
    }
}

/// Maps turns onto Gemini contents.
///
/// Consecutive turns with the same role are merged with a blank line, and
/// leading model turns are dropped because a conversation must open with a
/// user turn.
fn to_contents(turns: &[ConversationTurn]) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::with_capacity(turns.len());
    for turn in turns.iter().filter(|t| !t.content.trim().is_empty()) {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        if contents.is_empty() && role == "model" {
            continue;
        }
        match contents.last_mut() {
            Some(last) if last.role.as_deref() == Some(role) => {
                if let Some(part) = last.parts.last_mut() {
                    part.text.push_str("\n\n");
                    part.text.push_str(&turn.content);
                }
            }
            _ => contents.push(Content::text(Some(role), turn.content.clone())),
        }
    }
    contents
}

#[async_trait]
impl PluginAdapter for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, JeeravanError> {
        // No API call here: health checks must not spend quota.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), JeeravanError> {
        debug!("Gemini provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for GeminiProvider {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, JeeravanError> {
        let body = self.to_request(&request);
        if body.contents.is_empty() {
            return Err(JeeravanError::Validation(
                "generation requires at least one user turn".into(),
            ));
        }

        let response = self.client.generate_content(&self.chat_model, &body).await?;
        match response.text() {
            Some(text) => Ok(GenerationResponse {
                text,
                model: response
                    .model_version
                    .unwrap_or_else(|| self.chat_model.clone()),
            }),
            None => {
                let reason = response
                    .prompt_feedback
                    .and_then(|f| f.block_reason)
                    .or_else(|| {
                        response
                            .candidates
                            .first()
                            .and_then(|c| c.finish_reason.clone())
                    })
                    .unwrap_or_else(|| "no candidates".into());
                warn!(reason = %reason, "Gemini returned no text");
                Err(JeeravanError::backend(format!(
                    "Gemini returned an empty response ({reason})"
                )))
            }
        }
    }
}

#[async_trait]
impl EmbeddingAdapter for GeminiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, JeeravanError> {
        let values = self
            .client
            .embed_content(&self.embedding_model, text, Some(self.dimensions))
            .await?;
        if values.len() != self.dimensions {
            return Err(JeeravanError::backend(format!(
                "embedding has {} dimensions, expected {}",
                values.len(),
                self.dimensions
            )));
        }
        Ok(values)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn resolve_api_key(config_key: &Option<String>) -> Result<String, JeeravanError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("GEMINI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            JeeravanError::Config(
                "Gemini API key not found. Set gemini.api_key in config or GEMINI_API_KEY environment variable.".into(),
            )
        })
}

/// Loads the persona following priority: file > inline > default.
async fn load_system_prompt(inline_prompt: &Option<String>, prompt_file: &Option<String>) -> String {
    if let Some(file_path) = prompt_file {
        match tokio::fs::read_to_string(file_path).await {
            Ok(content) if !content.trim().is_empty() => {
                info!(path = file_path, "loaded system prompt from file");
                return content.trim().to_string();
            }
            Ok(_) => warn!(path = file_path, "system prompt file is empty, falling back"),
            Err(e) => warn!(
                path = file_path,
                error = %e,
                "failed to read system prompt file, falling back"
            ),
        }
    }

    if let Some(prompt) = inline_prompt
        && !prompt.trim().is_empty()
    {
        return prompt.clone();
    }

    DEFAULT_PERSONA.trim().to_string()
}
