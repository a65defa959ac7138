// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `jeeravan identity create` command implementation.

use jeeravan_config::model::JeeravanConfig;
use jeeravan_core::{Identity, JeeravanError, StorageAdapter};
use jeeravan_gateway::issue_token;
use jeeravan_storage::SqliteStorage;

/// Creates an identity and prints its id and a signed credential.
pub async fn run_create(config: &JeeravanConfig, name: &str) -> Result<(), JeeravanError> {
    let (identity, token) = create_identity(config, name).await?;
    println!("identity: {}", identity.id);
    println!("name:     {}", identity.display_name);
    println!("token:    {token}");
    Ok(())
}

async fn create_identity(
    config: &JeeravanConfig,
    name: &str,
) -> Result<(Identity, String), JeeravanError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(JeeravanError::Validation(
            "identity name must not be empty".into(),
        ));
    }
    if config.auth.jwt_secret.as_deref().is_none_or(str::is_empty) {
        return Err(JeeravanError::Config(
            "auth.jwt_secret is required to sign credentials".into(),
        ));
    }

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let identity = storage.create_identity(name).await?;
    let token = issue_token(&config.auth, &identity.id)?;
    storage.close().await?;
    Ok((identity, token))
}
