// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle surface shared by every external backend.

use async_trait::async_trait;

use crate::error::JeeravanError;
use crate::types::{AdapterType, HealthStatus};

/// Common identity and lifecycle of a backend: the conversation store, the
/// Gemini client, a vector index, the token authenticator.
///
/// `health_check` feeds `GET /health` and `jeeravan doctor`. An `Err`
/// means the check itself could not run and is reported as unhealthy.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Stable backend name, e.g. `"sqlite"` or `"pinecone"`.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    /// Which capability this backend provides.
    fn adapter_type(&self) -> AdapterType;

    async fn health_check(&self) -> Result<HealthStatus, JeeravanError>;

    /// Releases connections and flushes pending writes.
    async fn shutdown(&self) -> Result<(), JeeravanError>;
}
