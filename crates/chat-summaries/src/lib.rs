//! Hierarchical chat summarization and summary-aware context assembly.
//!
//! Before a model call, [`ContextBuilder`] keeps the trailing context window
//! verbatim and splices stored summaries of older messages into the system
//! prompt. After the call, [`SummaryUpdater`] compresses newly eligible
//! message ranges into chunk summaries and rolls chunk summaries up into
//! meta summaries.

pub mod config;
pub mod context_engine;
pub mod memory;
pub mod memory_db;
pub mod metrics;
pub mod model_runtime;
pub mod telemetry;
pub mod utils;
pub mod worker_threads;

// Public API exports
pub use config::{Config, Locale, SummaryConfig};
pub use context_engine::{
    BuiltContext, ContextBuilder, ContextOrchestrator, HaltReason, PassReport, SummaryUpdater,
};
pub use memory::{ChatMessage, ChatRole, SanitizedMessage};
pub use memory_db::{
    ChatStore, InMemoryChatStore, NewSummary, SeqRange, StoreError, StoreResult, StoredSummary,
    SummaryDatabase, SummaryFilter, SummaryLevel, SummaryOrder, SummaryOverview,
};
pub use model_runtime::{GenerationOutput, GenerationRequest, HttpTextGenerator, TextGenerator};
pub use worker_threads::SummaryWorker;
