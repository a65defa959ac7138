// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for the generation backend.

use async_trait::async_trait;

use crate::error::JeeravanError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GenerationRequest, GenerationResponse};

/// Generates a reply for a chronological conversation.
///
/// The backend is stateless: every call carries the full window. The persona
/// instruction is owned by the implementation and applied to every call.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, JeeravanError>;
}
