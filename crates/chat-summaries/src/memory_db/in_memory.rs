use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::memory::{ChatMessage, ChatRole};
use crate::memory_db::error::{StoreError, StoreResult};
use crate::memory_db::schema::*;
use crate::memory_db::store::ChatStore;

#[derive(Default)]
struct ChatRows {
    messages: Vec<ChatMessage>,
    summaries: Vec<StoredSummary>,
}

/// [`ChatStore`] backed by process memory. Enforces the same sequence and
/// uniqueness rules as the SQLite store.
#[derive(Clone, Default)]
pub struct InMemoryChatStore {
    chats: Arc<DashMap<String, ChatRows>>,
    next_summary_id: Arc<AtomicI64>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a chat with messages, assigning sequences as `append_message` would.
    pub fn with_messages<I, S>(self, chat_id: &str, messages: I) -> Self
    where
        I: IntoIterator<Item = (ChatRole, S)>,
        S: Into<String>,
    {
        {
            let mut rows = self.chats.entry(chat_id.to_string()).or_default();
            for (role, content) in messages {
                let sequence = rows.messages.len() as i64 + 1;
                rows.messages.push(ChatMessage {
                    chat_id: chat_id.to_string(),
                    sequence,
                    role,
                    content: content.into(),
                    created_at: Utc::now(),
                });
            }
        }
        self
    }

    /// Every summary stored for the chat, in insertion order.
    pub fn summaries(&self, chat_id: &str) -> Vec<StoredSummary> {
        self.chats
            .get(chat_id)
            .map(|rows| rows.summaries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn count_messages(&self, chat_id: &str) -> StoreResult<i64> {
        Ok(self
            .chats
            .get(chat_id)
            .map(|rows| rows.messages.len() as i64)
            .unwrap_or(0))
    }

    async fn find_messages(&self, chat_id: &str, range: SeqRange) -> StoreResult<Vec<ChatMessage>> {
        let Some(rows) = self.chats.get(chat_id) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .messages
            .iter()
            .filter(|message| message.sequence >= range.start && message.sequence <= range.end)
            .cloned()
            .collect())
    }

    async fn find_summaries(
        &self,
        chat_id: &str,
        filter: &SummaryFilter,
    ) -> StoreResult<Vec<StoredSummary>> {
        let Some(rows) = self.chats.get(chat_id) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<StoredSummary> = rows
            .summaries
            .iter()
            .filter(|summary| filter.matches(summary))
            .cloned()
            .collect();
        drop(rows);

        match filter.order {
            SummaryOrder::LevelDescStartAsc => matched.sort_by(|a, b| {
                b.level.cmp(&a.level).then(a.start_seq.cmp(&b.start_seq))
            }),
            SummaryOrder::StartAsc => matched.sort_by_key(|summary| summary.start_seq),
            SummaryOrder::EndDesc => matched.sort_by(|a, b| b.end_seq.cmp(&a.end_seq)),
        }
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn insert_summary(&self, summary: NewSummary) -> StoreResult<StoredSummary> {
        let mut rows = self.chats.entry(summary.chat_id.clone()).or_default();

        let exists = rows.summaries.iter().any(|existing| {
            existing.level == summary.level
                && existing.start_seq == summary.start_seq
                && existing.end_seq == summary.end_seq
        });
        if exists {
            return Err(StoreError::DuplicateSummary {
                chat_id: summary.chat_id,
                level: summary.level,
                start_seq: summary.start_seq,
                end_seq: summary.end_seq,
            });
        }

        let stored = StoredSummary {
            id: self.next_summary_id.fetch_add(1, Ordering::SeqCst) + 1,
            chat_id: summary.chat_id,
            level: summary.level,
            start_seq: summary.start_seq,
            end_seq: summary.end_seq,
            summary: summary.summary,
            token_count: summary.token_count,
            created_at: Utc::now(),
        };
        rows.summaries.push(stored.clone());
        Ok(stored)
    }

    async fn append_message(
        &self,
        chat_id: &str,
        role: ChatRole,
        content: &str,
    ) -> StoreResult<ChatMessage> {
        let mut rows = self.chats.entry(chat_id.to_string()).or_default();
        let message = ChatMessage {
            chat_id: chat_id.to_string(),
            sequence: rows.messages.len() as i64 + 1,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        rows.messages.push(message.clone());
        Ok(message)
    }
}
