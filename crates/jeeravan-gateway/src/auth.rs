// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed-token authentication.
//!
//! Credentials are HS256 JWTs whose `id` claim names an identity. They are
//! read, in order, from the credential cookie, an `Authorization: Bearer`
//! header, or a `token` query parameter. A token is only accepted while its
//! identity still exists in the store.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use jeeravan_config::model::AuthConfig;
use jeeravan_core::{AuthAdapter, Identity, JeeravanError, StorageAdapter};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// [`AuthAdapter`] verifying HS256 tokens against the identity store.
pub struct TokenAuthenticator {
    key: DecodingKey,
    validation: Validation,
    storage: Arc<dyn StorageAdapter>,
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("key", &"[redacted]")
            .field("leeway", &self.validation.leeway)
            .finish()
    }
}

impl TokenAuthenticator {
    pub fn new(config: &AuthConfig, storage: Arc<dyn StorageAdapter>) -> Result<Self, JeeravanError> {
        let secret = signing_secret(config)?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        if config.require_expiry {
            validation.set_required_spec_claims(&["exp"]);
        } else {
            validation.required_spec_claims.clear();
        }
        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            storage,
        })
    }
}

#[async_trait]
impl AuthAdapter for TokenAuthenticator {
    async fn authenticate(&self, credential: &str) -> Result<Identity, JeeravanError> {
        let claims = jsonwebtoken::decode::<Claims>(credential, &self.key, &self.validation)
            .map_err(|e| JeeravanError::Auth(format!("invalid or expired token: {e}")))?
            .claims;
        self.storage
            .get_identity(&claims.id)
            .await?
            .ok_or_else(|| JeeravanError::Auth("identity no longer exists".into()))
    }
}

/// Mints a credential for `identity_id`, expiring after `token_ttl_secs`
/// (no expiry when that is zero).
pub fn issue_token(config: &AuthConfig, identity_id: &str) -> Result<String, JeeravanError> {
    let secret = signing_secret(config)?;
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    let claims = Claims {
        id: identity_id.to_string(),
        exp: (config.token_ttl_secs > 0).then(|| now + config.token_ttl_secs),
        iat: Some(now),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JeeravanError::Internal(format!("failed to sign token: {e}")))
}

fn signing_secret(config: &AuthConfig) -> Result<&str, JeeravanError> {
    config
        .jwt_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| JeeravanError::Config("auth.jwt_secret is not set".into()))
}

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Finds the credential in cookie, bearer header or query string.
pub fn extract_credential(headers: &HeaderMap, uri: &Uri, cookie_name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(cookie_name)
        && !cookie.value().is_empty()
    {
        return Some(cookie.value().to_string());
    }

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

/// Resolves the request's credential to an identity.
pub async fn resolve_identity(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<Identity, JeeravanError> {
    let credential = extract_credential(headers, uri, &state.settings.cookie_name)
        .ok_or_else(|| JeeravanError::Auth("no authentication token found".into()))?;
    state.auth.authenticate(&credential).await
}

/// Rejects requests without a valid credential and stores the resolved
/// [`Identity`] as a request extension.
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_identity(&state, request.headers(), request.uri()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            debug!(error = %e, path = %request.uri().path(), "request rejected");
            ApiError(e).into_response()
        }
    }
}
