// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation window assembly.
//!
//! A window is one optional synthetic user turn carrying recalled memories,
//! followed by at most `limit` recent messages of the chat, oldest first.
//! Windows are rebuilt on every turn and never persisted. The user's name is
//! not part of the window; it travels in `GenerationRequest::display_name`.

use jeeravan_core::{ConversationTurn, Message, ScoredRecord};
use rand::seq::SliceRandom;

/// Header line of the synthetic memory turn.
pub const MEMORY_PREAMBLE: &str = "Relevant previous messages:";

/// Ephemeral context handed to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationWindow {
    pub memory: Option<ConversationTurn>,
    pub recent: Vec<ConversationTurn>,
}

impl ConversationWindow {
    /// Builds a window from recalled memories and the chat's recent messages.
    ///
    /// `recent` must be oldest first; only its last `limit` entries are kept.
    pub fn assemble(memories: &[ScoredRecord], recent: &[Message], limit: usize) -> Self {
        let skip = recent.len().saturating_sub(limit);
        Self {
            memory: memory_turn(memories),
            recent: recent[skip..].iter().map(ConversationTurn::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.recent.len() + usize::from(self.memory.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_turns(self) -> Vec<ConversationTurn> {
        self.memory.into_iter().chain(self.recent).collect()
    }
}

/// The synthetic leading turn, or `None` when nothing was recalled.
pub fn memory_turn(memories: &[ScoredRecord]) -> Option<ConversationTurn> {
    if memories.is_empty() {
        return None;
    }
    let recalled: Vec<&str> = memories.iter().map(|m| m.metadata.text.as_str()).collect();
    Some(ConversationTurn::user(format!(
        "{MEMORY_PREAMBLE}\n{}",
        recalled.join("\n")
    )))
}

/// Picks one of the configured fallback replies at random.
pub fn pick_fallback<'a>(replies: &'a [String], default: &'a str) -> &'a str {
    replies
        .choose(&mut rand::thread_rng())
        .map(String::as_str)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jeeravan_core::{MemoryMetadata, Role};
    use proptest::prelude::*;

    fn message(i: usize) -> Message {
        Message {
            id: format!("m{i}"),
            chat_id: "c1".into(),
            role: if i % 2 == 0 { Role::User } else { Role::Assistant },
            content: format!("turn {i}"),
            created_at: chrono::Utc::now(),
        }
    }

    fn memory(text: &str) -> ScoredRecord {
        ScoredRecord {
            id: text.into(),
            score: 0.5,
            metadata: MemoryMetadata {
                chat_id: "c0".into(),
                owner_id: "u1".into(),
                text: text.into(),
            },
        }
    }

    #[test]
    fn memory_turn_is_omitted_when_empty() {
        assert!(memory_turn(&[]).is_none());
    }

    #[test]
    fn memory_turn_joins_texts_under_preamble() {
        let turn = memory_turn(&[memory("poha"), memory("jalebi")]).unwrap();
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "Relevant previous messages:\npoha\njalebi");
    }

    #[test]
    fn window_keeps_the_newest_messages_in_order() {
        let recent: Vec<_> = (0..5).map(message).collect();
        let window = ConversationWindow::assemble(&[], &recent, 3);
        let contents: Vec<_> = window.recent.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["turn 2", "turn 3", "turn 4"]);
        assert!(window.memory.is_none());
    }

    #[test]
    fn memory_turn_leads_the_window() {
        let recent = vec![message(0)];
        let turns = ConversationWindow::assemble(&[memory("old")], &recent, 20).into_turns();
        assert_eq!(turns.len(), 2);
        assert!(turns[0].content.starts_with(MEMORY_PREAMBLE));
        assert_eq!(turns[1].content, "turn 0");
    }

    #[test]
    fn fallback_is_one_of_the_configured_replies() {
        let replies = vec!["a".to_string(), "b".to_string()];
        for _ in 0..20 {
            assert!(["a", "b"].contains(&pick_fallback(&replies, "z")));
        }
        assert_eq!(pick_fallback(&[], "z"), "z");
    }

    proptest! {
        #[test]
        fn window_never_exceeds_limit_plus_memory(
            history in 0usize..60,
            limit in 1usize..30,
            recalled in 0usize..5,
        ) {
            let recent: Vec<_> = (0..history).map(message).collect();
            let memories: Vec<_> = (0..recalled).map(|i| memory(&format!("r{i}"))).collect();
            let window = ConversationWindow::assemble(&memories, &recent, limit);

            prop_assert!(window.recent.len() <= limit);
            prop_assert_eq!(window.recent.len(), history.min(limit));
            prop_assert_eq!(window.memory.is_some(), recalled > 0);
            if let Some(last) = window.recent.last() {
                prop_assert_eq!(&last.content, &format!("turn {}", history - 1));
            }
        }
    }
}
