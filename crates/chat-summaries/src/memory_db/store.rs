//! The narrow store boundary shared by the context builder and the updater
use async_trait::async_trait;

use crate::memory::{ChatMessage, ChatRole};
use crate::memory_db::error::StoreResult;
use crate::memory_db::schema::{
    NewSummary, SeqRange, StoredSummary, SummaryFilter, SummaryLevel, SummaryOrder,
};

/// Queryable row store over a chat's messages and summaries.
///
/// Summaries are append-only: `insert_summary` must reject a second row for
/// the same `(chat_id, level, start_seq, end_seq)` with
/// [`StoreError::DuplicateSummary`](crate::memory_db::StoreError::DuplicateSummary).
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn count_messages(&self, chat_id: &str) -> StoreResult<i64>;

    /// Messages whose sequence lies in `range`, ordered by sequence.
    async fn find_messages(&self, chat_id: &str, range: SeqRange) -> StoreResult<Vec<ChatMessage>>;

    async fn find_summaries(
        &self,
        chat_id: &str,
        filter: &SummaryFilter,
    ) -> StoreResult<Vec<StoredSummary>>;

    async fn insert_summary(&self, summary: NewSummary) -> StoreResult<StoredSummary>;

    /// Appends a message, assigning the next 1-based sequence for the chat.
    async fn append_message(
        &self,
        chat_id: &str,
        role: ChatRole,
        content: &str,
    ) -> StoreResult<ChatMessage>;

    /// `end_seq` of the newest summary at `level`, or `None` if there is none.
    async fn last_summary_end(&self, chat_id: &str, level: SummaryLevel) -> StoreResult<Option<i64>> {
        let filter = SummaryFilter::default()
            .level(level)
            .order(SummaryOrder::EndDesc)
            .limit(1);
        let latest = self.find_summaries(chat_id, &filter).await?;
        Ok(latest.first().map(|summary| summary.end_seq))
    }
}
