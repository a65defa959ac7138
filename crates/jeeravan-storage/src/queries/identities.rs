// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity operations.

use jeeravan_core::{Identity, JeeravanError};
use rusqlite::{OptionalExtension, params};

use super::{format_ts, now, ts_column};
use crate::database::{Database, map_tr_err};

/// Create an identity with a fresh UUID.
pub async fn create_identity(db: &Database, display_name: &str) -> Result<Identity, JeeravanError> {
    let identity = Identity {
        id: uuid::Uuid::new_v4().to_string(),
        display_name: display_name.to_string(),
        created_at: now(),
    };
    let row = identity.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO identities (id, display_name, created_at) VALUES (?1, ?2, ?3)",
                params![row.id, row.display_name, format_ts(row.created_at)],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(identity)
}

/// Look up an identity by id.
pub async fn get_identity(db: &Database, id: &str) -> Result<Option<Identity>, JeeravanError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Identity>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, display_name, created_at FROM identities WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Identity {
                        id: row.get(0)?,
                        display_name: row.get(1)?,
                        created_at: ts_column(row, 2)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete an identity. Remaining chats and messages cascade through foreign keys.
pub async fn delete_identity(db: &Database, id: &str) -> Result<(), JeeravanError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute("DELETE FROM identities WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
