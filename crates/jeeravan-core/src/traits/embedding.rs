// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::JeeravanError;
use crate::traits::adapter::PluginAdapter;

/// Converts text into a fixed-dimensionality vector.
///
/// Embedding adapters power semantic memory by turning message content
/// into vectors. Failures surface as [`JeeravanError::BackendUnavailable`].
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, JeeravanError>;

    /// Dimensionality of every vector returned by [`Self::embed`].
    fn dimensions(&self) -> usize;
}
