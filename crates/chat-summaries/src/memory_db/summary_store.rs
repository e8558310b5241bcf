//! Summary storage and retrieval operations
use crate::memory_db::conversation_store::ConversationStore;
use crate::memory_db::error::{is_unique_violation, StoreError, StoreResult};
use crate::memory_db::schema::*;
use chrono::Utc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Row, ToSql};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SummaryStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl SummaryStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> StoreResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Insert a summary. A second row for the same chat, level and range is
    /// rejected with [`StoreError::DuplicateSummary`].
    pub fn store_summary(&self, summary: &NewSummary) -> StoreResult<StoredSummary> {
        let conn = self.get_conn()?;
        let now = Utc::now();

        debug!(
            "Storing level {} summary for chat {} (messages {} to {})",
            summary.level.as_i32(),
            summary.chat_id,
            summary.start_seq,
            summary.end_seq
        );

        let inserted = conn.execute(
            "INSERT INTO summaries
             (chat_id, level, start_seq, end_seq, summary, token_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                &summary.chat_id,
                summary.level.as_i32(),
                summary.start_seq,
                summary.end_seq,
                &summary.summary,
                summary.token_count,
                now.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => Ok(StoredSummary {
                id: conn.last_insert_rowid(),
                chat_id: summary.chat_id.clone(),
                level: summary.level,
                start_seq: summary.start_seq,
                end_seq: summary.end_seq,
                summary: summary.summary.clone(),
                token_count: summary.token_count,
                created_at: now,
            }),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateSummary {
                chat_id: summary.chat_id.clone(),
                level: summary.level,
                start_seq: summary.start_seq,
                end_seq: summary.end_seq,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn query_summaries(&self, chat_id: &str, filter: &SummaryFilter) -> StoreResult<Vec<StoredSummary>> {
        let conn = self.get_conn()?;

        let mut query = String::from(
            "SELECT id, chat_id, level, start_seq, end_seq, summary, token_count, created_at
             FROM summaries
             WHERE chat_id = ?",
        );
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(chat_id.to_string())];

        if let Some(level) = filter.level {
            query.push_str(" AND level = ?");
            params.push(Box::new(level.as_i32()));
        }
        if let Some(seq) = filter.start_seq_gt {
            query.push_str(" AND start_seq > ?");
            params.push(Box::new(seq));
        }
        if let Some(seq) = filter.start_seq_lte {
            query.push_str(" AND start_seq <= ?");
            params.push(Box::new(seq));
        }

        query.push_str(match filter.order {
            SummaryOrder::LevelDescStartAsc => " ORDER BY level DESC, start_seq ASC",
            SummaryOrder::StartAsc => " ORDER BY start_seq ASC",
            SummaryOrder::EndDesc => " ORDER BY end_seq DESC",
        });

        if let Some(limit) = filter.limit {
            query.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let mut stmt = conn.prepare(&query)?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut rows = stmt.query(rusqlite::params_from_iter(param_refs))?;

        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            summaries.push(Self::row_to_summary(row)?);
        }
        Ok(summaries)
    }

    pub fn get_chat_summaries(&self, chat_id: &str) -> StoreResult<Vec<StoredSummary>> {
        self.query_summaries(chat_id, &SummaryFilter::default())
    }

    pub fn delete_chat_summaries(&self, chat_id: &str) -> StoreResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM summaries WHERE chat_id = ?1", [chat_id])?;

        info!("Deleted {} summaries for chat {}", deleted, chat_id);
        Ok(deleted)
    }

    fn row_to_summary(row: &Row) -> StoreResult<StoredSummary> {
        let level: i32 = row.get(2)?;
        let created_at = ConversationStore::parse_datetime_safe(&row.get::<_, String>(7)?)
            .unwrap_or_else(|| {
                warn!("Failed to parse summary created_at, using current time");
                Utc::now()
            });

        Ok(StoredSummary {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            level: SummaryLevel::try_from(level)?,
            start_seq: row.get(3)?,
            end_seq: row.get(4)?,
            summary: row.get(5)?,
            token_count: row.get(6)?,
            created_at,
        })
    }
}
