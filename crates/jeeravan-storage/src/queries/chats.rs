// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat CRUD operations.

use jeeravan_core::{Chat, JeeravanError};
use rusqlite::{OptionalExtension, params};

use super::{format_ts, now, sql_limit, ts_column};
use crate::database::{Database, map_tr_err};

const CHAT_COLUMNS: &str = "id, owner_id, title, last_activity, created_at";

fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        last_activity: ts_column(row, 3)?,
        created_at: ts_column(row, 4)?,
    })
}

/// Create a chat owned by `owner_id`. Fails if the owner does not exist.
pub async fn create_chat(db: &Database, owner_id: &str, title: &str) -> Result<Chat, JeeravanError> {
    let ts = now();
    let chat = Chat {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        title: title.to_string(),
        last_activity: ts,
        created_at: ts,
    };
    let row = chat.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO chats (id, owner_id, title, last_activity, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.id,
                    row.owner_id,
                    row.title,
                    format_ts(row.last_activity),
                    format_ts(row.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(chat)
}

/// Look up a chat by id.
pub async fn get_chat(db: &Database, id: &str) -> Result<Option<Chat>, JeeravanError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Chat>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1"),
                params![id],
                row_to_chat,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Chats of an owner, most recent activity first.
pub async fn list_chats(
    db: &Database,
    owner_id: &str,
    limit: usize,
) -> Result<Vec<Chat>, JeeravanError> {
    let owner_id = owner_id.to_string();
    let limit = sql_limit(limit);
    db.connection()
        .call(move |conn| -> Result<Vec<Chat>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHAT_COLUMNS} FROM chats WHERE owner_id = ?1
                 ORDER BY last_activity DESC, rowid DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![owner_id, limit], row_to_chat)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Bump the chat's last-activity marker to now. Unknown ids are ignored.
pub async fn touch_chat(db: &Database, id: &str) -> Result<(), JeeravanError> {
    let id = id.to_string();
    let ts = format_ts(now());
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE chats SET last_activity = ?1 WHERE id = ?2",
                params![ts, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a chat row. Messages still present cascade through the foreign key.
pub async fn delete_chat(db: &Database, id: &str) -> Result<(), JeeravanError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute("DELETE FROM chats WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete every chat of an owner and their messages in one transaction.
pub async fn delete_chats_for_owner(db: &Database, owner_id: &str) -> Result<u64, JeeravanError> {
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM messages WHERE chat_id IN (SELECT id FROM chats WHERE owner_id = ?1)",
                params![owner_id],
            )?;
            let chats = tx.execute("DELETE FROM chats WHERE owner_id = ?1", params![owner_id])?;
            tx.commit()?;
            Ok(chats as u64)
        })
        .await
        .map_err(map_tr_err)
}
