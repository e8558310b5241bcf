//! Message storage and retrieval operations
use crate::memory::{ChatMessage, ChatRole};
use crate::memory_db::error::{is_unique_violation, StoreError, StoreResult};
use crate::memory_db::schema::SeqRange;
use chrono::{DateTime, NaiveDateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ConversationStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl ConversationStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> StoreResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Append a message with the next sequence number for the chat. The
    /// sequence is computed and written inside one immediate transaction so
    /// concurrent appends cannot leave gaps.
    pub fn append_message(
        &self,
        chat_id: &str,
        role: ChatRole,
        content: &str,
    ) -> StoreResult<ChatMessage> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let sequence: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM messages WHERE chat_id = ?1",
            [chat_id],
            |row| row.get(0),
        )?;
        let now = Utc::now();

        if let Err(e) = tx.execute(
            "INSERT INTO messages (chat_id, sequence, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![chat_id, sequence, role.as_str(), content, now.to_rfc3339()],
        ) {
            if is_unique_violation(&e) {
                return Err(StoreError::DuplicateMessage { chat_id: chat_id.to_string(), sequence });
            }
            return Err(e.into());
        }
        tx.commit()?;

        debug!("Stored message {} for chat {}", sequence, chat_id);
        Ok(ChatMessage {
            chat_id: chat_id.to_string(),
            sequence,
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    pub fn get_messages_in_range(&self, chat_id: &str, range: SeqRange) -> StoreResult<Vec<ChatMessage>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT chat_id, sequence, role, content, created_at
             FROM messages
             WHERE chat_id = ?1 AND sequence >= ?2 AND sequence <= ?3
             ORDER BY sequence ASC",
        )?;
        let mut rows = stmt.query(params![chat_id, range.start, range.end])?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next()? {
            messages.push(Self::row_to_message(row)?);
        }
        Ok(messages)
    }

    pub fn get_message_count(&self, chat_id: &str) -> StoreResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
            [chat_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Cascade used when a chat is deleted upstream.
    pub fn delete_chat_messages(&self, chat_id: &str) -> StoreResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM messages WHERE chat_id = ?1", [chat_id])?;
        debug!("Deleted {} messages for chat {}", deleted, chat_id);
        Ok(deleted)
    }

    pub(crate) fn parse_datetime_safe(datetime_str: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(datetime_str) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S") {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
        None
    }

    fn row_to_message(row: &Row) -> StoreResult<ChatMessage> {
        let role: String = row.get(2)?;
        let created_at = Self::parse_datetime_safe(&row.get::<_, String>(4)?)
            .unwrap_or_else(|| {
                warn!("Failed to parse message created_at, using current time");
                Utc::now()
            });

        Ok(ChatMessage {
            chat_id: row.get(0)?,
            sequence: row.get(1)?,
            role: role.parse()?,
            content: row.get(3)?,
            created_at,
        })
    }
}
