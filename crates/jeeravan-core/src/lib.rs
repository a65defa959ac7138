// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Jeeravan assistant.
//!
//! This crate provides the trait definitions, error taxonomy, and domain
//! types used throughout the Jeeravan workspace. Every backend (generation,
//! storage, vector index) implements traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::JeeravanError;
pub use types::{
    AdapterType, AiResponse, Chat, ConversationTurn, GenerationRequest, GenerationResponse,
    HealthStatus, Identity, MemoryFilter, MemoryMetadata, MemoryRecord, Message, Role,
    ScoredRecord,
};

pub use traits::{
    AuthAdapter, EmbeddingAdapter, PluginAdapter, ProviderAdapter, StorageAdapter, VectorIndex,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(JeeravanError::Auth("x".into()).code(), "auth");
        assert_eq!(JeeravanError::Validation("x".into()).code(), "validation");
        assert_eq!(JeeravanError::backend("x").code(), "backend_unavailable");
        assert_eq!(
            JeeravanError::StoreUnavailable("x".into()).code(),
            "store_unavailable"
        );
        assert_eq!(
            JeeravanError::persistence(std::io::Error::other("disk")).code(),
            "persistence"
        );
        assert_eq!(
            JeeravanError::NotFound {
                entity: "chat",
                id: "c1".into()
            }
            .code(),
            "not_found"
        );
    }

    #[test]
    fn not_found_display() {
        let err = JeeravanError::NotFound {
            entity: "chat",
            id: "c1".into(),
        };
        assert_eq!(err.to_string(), "chat not found: c1");
    }

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Provider,
            AdapterType::Embedding,
            AdapterType::Storage,
            AdapterType::VectorIndex,
            AdapterType::Auth,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn health_status_labels() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert_eq!(HealthStatus::Degraded("slow".into()).label(), "degraded");
        assert_eq!(HealthStatus::Unhealthy("down".into()).label(), "unhealthy");
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_provider_adapter<T: ProviderAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_embedding_adapter<T: EmbeddingAdapter>() {}
        fn _assert_vector_index<T: VectorIndex>() {}
        fn _assert_auth_adapter<T: AuthAdapter>() {}
    }
}
