// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection authenticator trait.

use async_trait::async_trait;

use crate::error::JeeravanError;
use crate::types::Identity;

/// Validates a credential and resolves it to an identity.
///
/// Fails with [`JeeravanError::Auth`] when the credential is malformed,
/// badly signed, expired, or names an identity that no longer exists.
#[async_trait]
pub trait AuthAdapter: Send + Sync + 'static {
    async fn authenticate(&self, credential: &str) -> Result<Identity, JeeravanError>;
}
