//! Summary database module - storage for chat messages and their summaries
pub mod schema;
pub mod error;
pub mod store;
pub mod migration;
pub mod conversation_store;
pub mod summary_store;
pub mod in_memory;

pub use schema::*;
pub use error::{StoreError, StoreResult};
pub use store::ChatStore;
pub use migration::MigrationManager;
pub use conversation_store::ConversationStore;
pub use summary_store::SummaryStore;
pub use in_memory::InMemoryChatStore;

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::memory::{ChatMessage, ChatRole};

/// SQLite-backed [`ChatStore`].
pub struct SummaryDatabase {
    pub conversations: ConversationStore,
    pub summaries: SummaryStore,
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl SummaryDatabase {
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        info!("Opening summary database at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| {
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA busy_timeout = 5000;",
                )
            });
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let mut conn = pool.get()?;
            MigrationManager::new(&mut conn).initialize_database()?;
        }

        info!("Summary database initialized successfully");
        Ok(Self::from_pool(Arc::new(pool)))
    }

    /// Single-connection in-memory database; every pooled handle sees the
    /// same data.
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)?;
        {
            let mut conn = pool.get()?;
            MigrationManager::new(&mut conn).initialize_database()?;
        }
        Ok(Self::from_pool(Arc::new(pool)))
    }

    fn from_pool(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self {
            conversations: ConversationStore::new(Arc::clone(&pool)),
            summaries: SummaryStore::new(Arc::clone(&pool)),
            pool,
        }
    }

    /// Remove a chat's messages and summaries together.
    pub fn delete_chat(&self, chat_id: &str) -> StoreResult<(usize, usize)> {
        let summaries = self.summaries.delete_chat_summaries(chat_id)?;
        let messages = self.conversations.delete_chat_messages(chat_id)?;
        Ok((messages, summaries))
    }
}

#[async_trait]
impl ChatStore for SummaryDatabase {
    async fn count_messages(&self, chat_id: &str) -> StoreResult<i64> {
        self.conversations.get_message_count(chat_id)
    }

    async fn find_messages(&self, chat_id: &str, range: SeqRange) -> StoreResult<Vec<ChatMessage>> {
        self.conversations.get_messages_in_range(chat_id, range)
    }

    async fn find_summaries(
        &self,
        chat_id: &str,
        filter: &SummaryFilter,
    ) -> StoreResult<Vec<StoredSummary>> {
        self.summaries.query_summaries(chat_id, filter)
    }

    async fn insert_summary(&self, summary: NewSummary) -> StoreResult<StoredSummary> {
        self.summaries.store_summary(&summary)
    }

    async fn append_message(
        &self,
        chat_id: &str,
        role: ChatRole,
        content: &str,
    ) -> StoreResult<ChatMessage> {
        self.conversations.append_message(chat_id, role, content)
    }
}

impl Drop for SummaryDatabase {
    fn drop(&mut self) {
        if let Ok(conn) = self.pool.get() {
            let _ = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_round_trip() {
        let db = SummaryDatabase::new_in_memory().unwrap();
        for i in 1..=12 {
            let role = if i % 2 == 1 { ChatRole::User } else { ChatRole::Assistant };
            let message = db.append_message("chat-1", role, &format!("message-{}", i)).await.unwrap();
            assert_eq!(message.sequence, i);
        }
        assert_eq!(db.count_messages("chat-1").await.unwrap(), 12);

        let chunk = db.find_messages("chat-1", SeqRange::new(1, 10)).await.unwrap();
        assert_eq!(chunk.len(), 10);
        assert_eq!(chunk[1].role, ChatRole::Assistant);
        assert_eq!(chunk[9].content, "message-10");
    }

    #[tokio::test]
    async fn test_unique_constraint_maps_to_duplicate() {
        let db = SummaryDatabase::new_in_memory().unwrap();
        let row = NewSummary {
            chat_id: "chat-1".to_string(),
            level: SummaryLevel::Chunk,
            start_seq: 1,
            end_seq: 10,
            summary: "first".to_string(),
            token_count: None,
        };
        let stored = db.insert_summary(row.clone()).await.unwrap();
        assert_eq!(stored.token_count, None);

        let err = db.insert_summary(row).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSummary { start_seq: 1, end_seq: 10, .. }));
    }

    #[tokio::test]
    async fn test_summary_filters_in_sql() {
        let db = SummaryDatabase::new_in_memory().unwrap();
        for (level, start, end) in [
            (SummaryLevel::Chunk, 11, 20),
            (SummaryLevel::Chunk, 1, 10),
            (SummaryLevel::Chunk, 21, 30),
            (SummaryLevel::Meta, 1, 100),
        ] {
            db.insert_summary(NewSummary {
                chat_id: "chat-1".to_string(),
                level,
                start_seq: start,
                end_seq: end,
                summary: format!("{}-{}", start, end),
                token_count: Some(7),
            })
            .await
            .unwrap();
        }

        let visible = db
            .find_summaries("chat-1", &SummaryFilter::default().start_at_most(11))
            .await
            .unwrap();
        let keys: Vec<_> = visible.iter().map(|s| (s.level, s.start_seq)).collect();
        assert_eq!(
            keys,
            vec![(SummaryLevel::Meta, 1), (SummaryLevel::Chunk, 1), (SummaryLevel::Chunk, 11)]
        );

        let after = db
            .find_summaries(
                "chat-1",
                &SummaryFilter::default()
                    .level(SummaryLevel::Chunk)
                    .start_after(10)
                    .order(SummaryOrder::StartAsc)
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].start_seq, 11);

        assert_eq!(db.last_summary_end("chat-1", SummaryLevel::Chunk).await.unwrap(), Some(30));
        assert_eq!(db.last_summary_end("chat-1", SummaryLevel::Meta).await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_delete_chat_removes_rows() {
        let db = SummaryDatabase::new_in_memory().unwrap();
        db.append_message("chat-1", ChatRole::User, "hello").await.unwrap();
        db.append_message("chat-2", ChatRole::User, "other").await.unwrap();

        let (messages, summaries) = db.delete_chat("chat-1").unwrap();
        assert_eq!((messages, summaries), (1, 0));
        assert_eq!(db.count_messages("chat-1").await.unwrap(), 0);
        assert_eq!(db.count_messages("chat-2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_timestamps_still_load() {
        let db = SummaryDatabase::new_in_memory().unwrap();
        {
            let conn = db.pool.get().unwrap();
            conn.execute(
                "INSERT INTO messages (chat_id, sequence, role, content, created_at)
                 VALUES ('chat-1', 1, 'user', 'hello', 'last tuesday')",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO summaries (chat_id, level, start_seq, end_seq, summary, token_count, created_at)
                 VALUES ('chat-1', 0, 1, 10, 'recap', NULL, '')",
                [],
            )
            .unwrap();
        }

        let messages = db.find_messages("chat-1", SeqRange::new(1, 1)).await.unwrap();
        assert_eq!(messages[0].content, "hello");

        let summaries = db.find_summaries("chat-1", &SummaryFilter::default()).await.unwrap();
        assert_eq!(summaries[0].summary, "recap");
    }
}
