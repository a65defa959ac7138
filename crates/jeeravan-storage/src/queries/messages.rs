// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message operations. Messages are immutable; order within a chat is
//! `(created_at, rowid)` so same-millisecond inserts keep insertion order.

use jeeravan_core::{JeeravanError, Message, Role};
use rusqlite::params;

use super::{format_ts, now, sql_limit, ts_column};
use crate::database::{Database, map_tr_err};

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(2)?;
    let role = Role::from_str_value(&role).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown role `{role}`").into(),
        )
    })?;
    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        role,
        content: row.get(3)?,
        created_at: ts_column(row, 4)?,
    })
}

/// Insert a new message. Fails if the chat does not exist.
pub async fn insert_message(
    db: &Database,
    chat_id: &str,
    role: Role,
    content: &str,
) -> Result<Message, JeeravanError> {
    let message = Message {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        role,
        content: content.to_string(),
        created_at: now(),
    };
    let row = message.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO messages (id, chat_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.id,
                    row.chat_id,
                    row.role.as_str(),
                    row.content,
                    format_ts(row.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(message)
}

/// The `limit` most recent messages of a chat, returned oldest first.
pub async fn get_recent_messages(
    db: &Database,
    chat_id: &str,
    limit: usize,
) -> Result<Vec<Message>, JeeravanError> {
    let chat_id = chat_id.to_string();
    let limit = sql_limit(limit);
    let mut messages = db
        .connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, role, content, created_at FROM messages
                 WHERE chat_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![chat_id, limit], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;
    messages.reverse();
    Ok(messages)
}

/// The first `limit` messages of a chat in chronological order.
pub async fn get_messages(
    db: &Database,
    chat_id: &str,
    limit: usize,
) -> Result<Vec<Message>, JeeravanError> {
    let chat_id = chat_id.to_string();
    let limit = sql_limit(limit);
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, role, content, created_at FROM messages
                 WHERE chat_id = ?1 ORDER BY created_at ASC, rowid ASC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![chat_id, limit], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete all messages of a chat, returning how many were removed.
pub async fn delete_messages_for_chat(db: &Database, chat_id: &str) -> Result<u64, JeeravanError> {
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let n = conn.execute("DELETE FROM messages WHERE chat_id = ?1", params![chat_id])?;
            Ok(n as u64)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::chats::create_chat;
    use crate::queries::identities::create_identity;
    use tempfile::tempdir;

    async fn setup_db_with_chat() -> (Database, String, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("messages.db").to_str().unwrap())
            .await
            .unwrap();
        let owner = create_identity(&db, "Asha").await.unwrap();
        let chat = create_chat(&db, &owner.id, "t").await.unwrap();
        (db, chat.id, dir)
    }

    #[tokio::test]
    async fn recent_messages_are_the_tail_oldest_first() {
        let (db, chat, _dir) = setup_db_with_chat().await;
        for i in 0..5 {
            insert_message(&db, &chat, Role::User, &format!("m{i}"))
                .await
                .unwrap();
        }

        let recent = get_recent_messages(&db, &chat, 3).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn get_messages_is_the_head() {
        let (db, chat, _dir) = setup_db_with_chat().await;
        insert_message(&db, &chat, Role::User, "hi").await.unwrap();
        insert_message(&db, &chat, Role::Assistant, "hello").await.unwrap();
        insert_message(&db, &chat, Role::User, "bye").await.unwrap();

        let head = get_messages(&db, &chat, 2).await.unwrap();
        assert_eq!(head.len(), 2);
        assert_eq!(head[0].role, Role::User);
        assert_eq!(head[1].role, Role::Assistant);
        assert_eq!(head[1].content, "hello");
    }

    #[tokio::test]
    async fn insert_into_missing_chat_fails() {
        let (db, _chat, _dir) = setup_db_with_chat().await;
        let err = insert_message(&db, "no-such-chat", Role::User, "x")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "persistence");
    }

    #[tokio::test]
    async fn delete_for_chat_empties_it() {
        let (db, chat, _dir) = setup_db_with_chat().await;
        insert_message(&db, &chat, Role::User, "a").await.unwrap();
        insert_message(&db, &chat, Role::User, "b").await.unwrap();
        assert_eq!(delete_messages_for_chat(&db, &chat).await.unwrap(), 2);
        assert!(get_messages(&db, &chat, 100).await.unwrap().is_empty());
    }
}
