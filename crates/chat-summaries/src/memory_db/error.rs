//! Errors surfaced by the store boundary
use crate::memory_db::schema::SummaryLevel;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A summary for this exact `(chat_id, level, start_seq, end_seq)` already exists.
    #[error("duplicate {level:?} summary for chat {chat_id} covering {start_seq}-{end_seq}")]
    DuplicateSummary {
        chat_id: String,
        level: SummaryLevel,
        start_seq: i64,
        end_seq: i64,
    },

    #[error("message sequence {sequence} already exists in chat {chat_id}")]
    DuplicateMessage { chat_id: String, sequence: i64 },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateSummary { .. } | StoreError::DuplicateMessage { .. }
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.into())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::Backend(anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }
}

/// True when SQLite rejected a write because of a UNIQUE constraint.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
