// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP rendering of [`JeeravanError`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jeeravan_core::JeeravanError;
use serde::Serialize;
use tracing::error;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: &'static str,
    pub message: String,
}

/// Wrapper turning a [`JeeravanError`] into a JSON response.
#[derive(Debug)]
pub struct ApiError(pub JeeravanError);

impl From<JeeravanError> for ApiError {
    fn from(err: JeeravanError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            JeeravanError::Auth(_) => StatusCode::UNAUTHORIZED,
            JeeravanError::Validation(_) => StatusCode::BAD_REQUEST,
            JeeravanError::NotFound { .. } => StatusCode::NOT_FOUND,
            JeeravanError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            JeeravanError::BackendUnavailable { .. } | JeeravanError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the log.
        let message = if status.is_server_error() {
            error!(error = %self.0, "request failed");
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };
        let body = ErrorResponse {
            error: self.0.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
