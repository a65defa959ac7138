// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Generative Language API.
//!
//! Provides [`GeminiClient`] which handles authentication, transient error
//! retry, and the `generateContent`, `embedContent`, and model listing calls.

use std::time::Duration;

use jeeravan_core::JeeravanError;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{
    ApiErrorResponse, Content, EmbedContentRequest, EmbedContentResponse, GenerateContentRequest,
    GenerateContentResponse, ListModelsResponse, ModelInfo,
};

/// Delay between attempts after a transient failure.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// HTTP client for Gemini API communication.
///
/// Holds the API key as a default header and retries transient errors
/// (429, 500, 503) up to `max_retries` times.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl GeminiClient {
    /// Creates a new client.
    pub fn new(
        api_key: &str,
        base_url: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, JeeravanError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| JeeravanError::Config(format!("invalid API key header value: {e}")))?;
        key.set_sensitive(true);
        headers.insert("x-goog-api-key", key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| JeeravanError::BackendUnavailable {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    /// Runs `generateContent` against `model`.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, JeeravanError> {
        let url = format!("{}/{}:generateContent", self.base_url, model_path(model));
        self.post_json(&url, request).await
    }

    /// Embeds a single text with `model`.
    pub async fn embed_content(
        &self,
        model: &str,
        text: &str,
        output_dimensionality: Option<usize>,
    ) -> Result<Vec<f32>, JeeravanError> {
        let model = model_path(model);
        let url = format!("{}/{model}:embedContent", self.base_url);
        let request = EmbedContentRequest {
            model: model.clone(),
            content: Content::text(None, text),
            output_dimensionality,
        };
        let response: EmbedContentResponse = self.post_json(&url, &request).await?;
        Ok(response.embedding.values)
    }

    /// Lists every model visible to the API key, following pagination.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, JeeravanError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = format!("{}/models?pageSize=100", self.base_url);
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(token);
            }
            let page: ListModelsResponse = self.send_with_retry(self.client.get(url)).await?;
            models.extend(page.models);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(models)
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, JeeravanError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send_with_retry(self.client.post(url).json(body)).await
    }

    /// Sends `request`, retrying transient statuses, and decodes the JSON body.
    async fn send_with_retry<R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<R, JeeravanError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying Gemini request after transient error");
                tokio::time::sleep(RETRY_DELAY).await;
            }

            let attempt_request = request.try_clone().ok_or_else(|| {
                JeeravanError::Internal("Gemini request body is not cloneable".into())
            })?;
            let response = match attempt_request.send().await {
                Ok(response) => response,
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.max_retries => {
                    warn!(error = %e, "Gemini request failed to connect, will retry");
                    last_error = Some(request_failed(e));
                    continue;
                }
                Err(e) => return Err(request_failed(e)),
            };

            let status = response.status();
            debug!(status = %status, attempt, "Gemini response received");

            if status.is_success() {
                let body = response.text().await.map_err(|e| {
                    JeeravanError::BackendUnavailable {
                        message: format!("failed to read response body: {e}"),
                        source: Some(Box::new(e)),
                    }
                })?;
                return serde_json::from_str(&body).map_err(|e| {
                    JeeravanError::BackendUnavailable {
                        message: format!("failed to parse Gemini response: {e}"),
                        source: Some(Box::new(e)),
                    }
                });
            }

            let body = response.text().await.unwrap_or_default();
            let error = JeeravanError::backend(describe_error(status, &body));
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, "transient Gemini error, will retry");
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error.unwrap_or_else(|| JeeravanError::backend("Gemini request failed after retries")))
    }
}

fn request_failed(e: reqwest::Error) -> JeeravanError {
    JeeravanError::BackendUnavailable {
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Builds a readable message from an error response.
fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api) => format!(
            "Gemini API error ({}): {}",
            api.error.status.as_deref().unwrap_or(status.as_str()),
            api.error.message
        ),
        Err(_) => format!("API returned {status}: {body}"),
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

/// Model ids are addressed as `models/<id>`; bare ids are accepted too.
pub fn model_path(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}
