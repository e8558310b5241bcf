//! Row types and query shapes for the message and summary tables
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary hierarchy level. Chunk summaries cover raw messages, meta
/// summaries cover runs of chunk summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum SummaryLevel {
    Chunk = 0,
    Meta = 1,
}

impl SummaryLevel {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<SummaryLevel> for i32 {
    fn from(level: SummaryLevel) -> Self {
        level.as_i32()
    }
}

impl TryFrom<i32> for SummaryLevel {
    type Error = anyhow::Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SummaryLevel::Chunk),
            1 => Ok(SummaryLevel::Meta),
            other => Err(anyhow::anyhow!("Unknown summary level: {}", other)),
        }
    }
}

/// Inclusive range of message sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeqRange {
    pub start: i64,
    pub end: i64,
}

impl SeqRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A persisted summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSummary {
    pub id: i64,
    pub chat_id: String,
    pub level: SummaryLevel,
    pub start_seq: i64,
    pub end_seq: i64,
    pub summary: String,
    /// `None` when the text came from the deterministic fallback.
    pub token_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl StoredSummary {
    pub fn range(&self) -> SeqRange {
        SeqRange::new(self.start_seq, self.end_seq)
    }
}

/// Insert payload for a summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSummary {
    pub chat_id: String,
    pub level: SummaryLevel,
    pub start_seq: i64,
    pub end_seq: i64,
    pub summary: String,
    pub token_count: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryOrder {
    /// Meta summaries first, then chunk summaries; each by `start_seq`.
    #[default]
    LevelDescStartAsc,
    StartAsc,
    EndDesc,
}

/// Equality/range filter over a chat's summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryFilter {
    pub level: Option<SummaryLevel>,
    pub start_seq_gt: Option<i64>,
    pub start_seq_lte: Option<i64>,
    pub order: SummaryOrder,
    pub limit: Option<usize>,
}

impl SummaryFilter {
    pub fn level(mut self, level: SummaryLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn start_after(mut self, seq: i64) -> Self {
        self.start_seq_gt = Some(seq);
        self
    }

    pub fn start_at_most(mut self, seq: i64) -> Self {
        self.start_seq_lte = Some(seq);
        self
    }

    pub fn order(mut self, order: SummaryOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, summary: &StoredSummary) -> bool {
        self.level.map_or(true, |level| summary.level == level)
            && self.start_seq_gt.map_or(true, |seq| summary.start_seq > seq)
            && self.start_seq_lte.map_or(true, |seq| summary.start_seq <= seq)
    }
}

/// A chat's summaries split by level, each list ordered by `start_seq`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryOverview {
    pub meta: Vec<StoredSummary>,
    pub chunks: Vec<StoredSummary>,
}

impl SummaryOverview {
    pub fn from_summaries(summaries: Vec<StoredSummary>) -> Self {
        let (mut meta, mut chunks): (Vec<_>, Vec<_>) = summaries
            .into_iter()
            .partition(|summary| summary.level == SummaryLevel::Meta);
        meta.sort_by_key(|summary| summary.start_seq);
        chunks.sort_by_key(|summary| summary.start_seq);
        Self { meta, chunks }
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty() && self.chunks.is_empty()
    }

    /// Highest message sequence covered by any chunk summary.
    pub fn covered_through(&self) -> i64 {
        self.chunks.last().map(|summary| summary.end_seq).unwrap_or(0)
    }
}
