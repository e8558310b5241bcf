//! Context engine module - summary-aware prompt assembly and history compression

pub mod chunking;
pub mod segments;
pub mod context_builder;
pub mod summary_updater;
pub mod orchestrator;

pub use chunking::{are_chunks_sequential, calculate_chunk_boundaries, is_fallback_summary};
pub use segments::{format_summary_segments, parse_summary_segments, SegmentHeader};
pub use context_builder::{BuiltContext, ContextBuilder};
pub use summary_updater::{HaltReason, PassReport, SummaryUpdater};
pub use orchestrator::ContextOrchestrator;
