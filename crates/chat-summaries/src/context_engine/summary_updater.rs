//! Post-turn compression of chat history into chunk and meta summaries
//!
//! Chunk summaries (level 0) cover fixed runs of raw messages. Once enough
//! contiguous chunk summaries exist, they are rolled up into a meta summary
//! (level 1). Rows are append-only; the store's uniqueness rule on
//! `(chat_id, level, start_seq, end_seq)` is what keeps overlapping runs from
//! writing the same range twice.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::SummaryConfig;
use crate::context_engine::chunking::{
    are_chunks_sequential, build_chunk_fallback_summary, build_meta_fallback_summary,
    format_transcript, TranscriptLine,
};
use crate::memory_db::{
    ChatStore, NewSummary, SeqRange, StoreError, StoredSummary, SummaryFilter, SummaryLevel,
    SummaryOrder,
};
use crate::metrics;
use crate::model_runtime::{GenerationRequest, TextGenerator};
use crate::utils::TextUtils;

pub const CHUNK_SUMMARY_SYSTEM_PROMPT: &str = "You are a diligent note-taking assistant. \
Summarize the following chat segment focusing on key facts, decisions, action items, and follow-ups. \
Omit greetings and filler. Respond in the predominant language of the excerpt. Keep it concise.";

pub const META_SUMMARY_SYSTEM_PROMPT: &str = "You are compiling a higher-level recap from multiple chat summaries. \
Synthesize the main themes, decisions, and outstanding items. \
Preserve important names, numbers, and commitments without duplicating detail.";

pub const CHUNK_PROMPT_PREFIX: &str = "Summarize the following conversation segment:";
pub const META_PROMPT_PREFIX: &str = "Create a concise higher-level summary of the following conversation chunks:";

/// Why a pass stopped before running out of eligible work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    ChunkFailed(SeqRange),
    MetaFailed(SeqRange),
    NonContiguousChunks { after_seq: i64 },
    MetaReadFailed,
}

/// What one updater pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub total_messages: i64,
    pub chunks_created: usize,
    pub metas_created: usize,
    pub fallbacks: usize,
    pub duplicates: usize,
    pub halted: Option<HaltReason>,
}

struct GeneratedSummary {
    text: String,
    token_count: Option<i64>,
    fell_back: bool,
}

pub struct SummaryUpdater {
    store: Arc<dyn ChatStore>,
    generator: Arc<dyn TextGenerator>,
    config: SummaryConfig,
}

impl SummaryUpdater {
    pub fn new(
        store: Arc<dyn ChatStore>,
        generator: Arc<dyn TextGenerator>,
        config: SummaryConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self { store, generator, config })
    }

    /// Error boundary for the post-response path: runs one pass and logs the
    /// outcome. Nothing is returned to the caller.
    pub async fn update_summaries(&self, chat_id: &str) {
        match self.run_pass(chat_id).await {
            Ok(report) => {
                if report.chunks_created + report.metas_created > 0 {
                    info!(
                        "Summaries updated for chat {}: {} chunk, {} meta ({} fallback, {} duplicate)",
                        chat_id,
                        report.chunks_created,
                        report.metas_created,
                        report.fallbacks,
                        report.duplicates
                    );
                }
                if let Some(reason) = report.halted {
                    warn!("Summary pass for chat {} stopped early: {:?}", chat_id, reason);
                }
            }
            Err(e) => error!("Error updating chat summaries for {}: {:#}", chat_id, e),
        }
    }

    /// One full pass: chunk summaries first, then as many meta summaries as
    /// the chunk summaries allow. Store read failures abort the pass.
    pub async fn run_pass(&self, chat_id: &str) -> anyhow::Result<PassReport> {
        let mut report = PassReport::default();

        let total_messages = self.store.count_messages(chat_id).await?;
        report.total_messages = total_messages;
        if total_messages < self.config.min_messages_for_summary() as i64 {
            debug!("Chat {} has {} messages, nothing to summarize", chat_id, total_messages);
            return Ok(report);
        }

        let previous_end = self
            .store
            .last_summary_end(chat_id, SummaryLevel::Chunk)
            .await?
            .unwrap_or(0);

        self.process_chunk_summaries(chat_id, total_messages, previous_end, &mut report)
            .await;
        self.process_meta_summaries(chat_id, &mut report).await?;

        Ok(report)
    }

    async fn process_chunk_summaries(
        &self,
        chat_id: &str,
        total_messages: i64,
        previous_end: i64,
        report: &mut PassReport,
    ) {
        let boundaries = self.config.chunk_boundaries(total_messages, previous_end);
        debug!(
            "Chat {}: {} messages, last chunk end {}, {} new chunk(s)",
            chat_id,
            total_messages,
            previous_end,
            boundaries.len()
        );

        for boundary in boundaries {
            match self.create_chunk_summary(chat_id, boundary).await {
                Ok(fell_back) => {
                    report.chunks_created += 1;
                    if fell_back {
                        report.fallbacks += 1;
                    }
                }
                Err(e) if is_duplicate(&e) => {
                    debug!("Chunk {}-{} already summarized for chat {}", boundary.start, boundary.end, chat_id);
                    metrics::inc_summary_duplicate("chunk");
                    report.duplicates += 1;
                }
                Err(e) => {
                    error!(
                        "Failed to create chunk summary {}-{} for chat {}: {:#}",
                        boundary.start, boundary.end, chat_id, e
                    );
                    report.halted = Some(HaltReason::ChunkFailed(boundary));
                    return;
                }
            }
        }
    }

    /// Returns whether the stored text came from the fallback.
    async fn create_chunk_summary(&self, chat_id: &str, boundary: SeqRange) -> anyhow::Result<bool> {
        let messages = self.store.find_messages(chat_id, boundary).await?;
        if messages.len() != boundary.len() {
            return Err(anyhow::anyhow!(
                "Expected {} messages for chunk {}-{} but received {}",
                boundary.len(),
                boundary.start,
                boundary.end,
                messages.len()
            ));
        }

        let lines: Vec<TranscriptLine> = messages
            .iter()
            .filter(|message| message.role.is_conversational())
            .map(|message| TranscriptLine {
                role: message.role,
                content: TextUtils::truncate_with_ellipsis(&message.content, self.config.message_char_limit)
                    .into_owned(),
            })
            .collect();

        let request = GenerationRequest::new(
            CHUNK_SUMMARY_SYSTEM_PROMPT,
            format!("{}\n\n{}", CHUNK_PROMPT_PREFIX, format_transcript(&lines)),
            self.config.chunk_summary_max_tokens,
        );
        let label = format!("chunk {}-{}", boundary.start, boundary.end);
        let generated = self
            .generate_with_fallback(request, &label, || build_chunk_fallback_summary(&lines, &self.config))
            .await;

        self.store
            .insert_summary(NewSummary {
                chat_id: chat_id.to_string(),
                level: SummaryLevel::Chunk,
                start_seq: boundary.start,
                end_seq: boundary.end,
                summary: generated.text,
                token_count: generated.token_count,
            })
            .await?;

        metrics::inc_summary_created("chunk");
        if generated.fell_back {
            metrics::inc_summary_fallback("chunk");
        }
        Ok(generated.fell_back)
    }

    async fn process_meta_summaries(&self, chat_id: &str, report: &mut PassReport) -> anyhow::Result<()> {
        let mut last_meta_end = self
            .store
            .last_summary_end(chat_id, SummaryLevel::Meta)
            .await?
            .unwrap_or(0);
        let group_size = self.config.summary_group_size;

        loop {
            let filter = SummaryFilter::default()
                .level(SummaryLevel::Chunk)
                .start_after(last_meta_end)
                .order(SummaryOrder::StartAsc)
                .limit(group_size);
            let chunks = match self.store.find_summaries(chat_id, &filter).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    error!("Failed to load chunk summaries for chat {}: {}", chat_id, e);
                    report.halted = Some(HaltReason::MetaReadFailed);
                    return Ok(());
                }
            };

            if chunks.is_empty() || chunks.len() < group_size {
                return Ok(());
            }

            if !are_chunks_sequential(chunks.iter().map(StoredSummary::range)) {
                warn!(
                    "Chunk summaries after {} are not sequential for chat {}; skipping meta summary generation",
                    last_meta_end, chat_id
                );
                report.halted = Some(HaltReason::NonContiguousChunks { after_seq: last_meta_end });
                return Ok(());
            }

            let span = SeqRange::new(chunks[0].start_seq, chunks[chunks.len() - 1].end_seq);
            match self.create_meta_summary(chat_id, &chunks, span).await {
                Ok(fell_back) => {
                    report.metas_created += 1;
                    if fell_back {
                        report.fallbacks += 1;
                    }
                }
                Err(e) if is_duplicate(&e) => {
                    debug!("Meta summary {}-{} already exists for chat {}", span.start, span.end, chat_id);
                    metrics::inc_summary_duplicate("meta");
                    report.duplicates += 1;
                    return Ok(());
                }
                Err(e) => {
                    error!(
                        "Failed to create meta summary {}-{} for chat {}: {:#}",
                        span.start, span.end, chat_id, e
                    );
                    report.halted = Some(HaltReason::MetaFailed(span));
                    return Ok(());
                }
            }

            last_meta_end = span.end;
        }
    }

    async fn create_meta_summary(
        &self,
        chat_id: &str,
        chunks: &[StoredSummary],
        span: SeqRange,
    ) -> anyhow::Result<bool> {
        let combined = chunks
            .iter()
            .map(|chunk| {
                format!(
                    "Messages {}-{}:\n{}",
                    chunk.start_seq,
                    chunk.end_seq,
                    TextUtils::truncate_with_ellipsis(chunk.summary.trim(), self.config.message_char_limit)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = GenerationRequest::new(
            META_SUMMARY_SYSTEM_PROMPT,
            format!("{}\n\n{}", META_PROMPT_PREFIX, combined),
            self.config.meta_summary_max_tokens,
        );
        let label = format!("meta {}-{}", span.start, span.end);
        let generated = self
            .generate_with_fallback(request, &label, || build_meta_fallback_summary(chunks, &self.config))
            .await;

        self.store
            .insert_summary(NewSummary {
                chat_id: chat_id.to_string(),
                level: SummaryLevel::Meta,
                start_seq: span.start,
                end_seq: span.end,
                summary: generated.text,
                token_count: generated.token_count,
            })
            .await?;

        metrics::inc_summary_created("meta");
        if generated.fell_back {
            metrics::inc_summary_fallback("meta");
        }
        Ok(generated.fell_back)
    }

    /// Generation errors and empty output both resolve to the fallback text
    /// with no token count.
    async fn generate_with_fallback<F>(
        &self,
        request: GenerationRequest,
        label: &str,
        fallback: F,
    ) -> GeneratedSummary
    where
        F: FnOnce() -> String + Send,
    {
        let failure = match self.generator.generate(request).await {
            Ok(output) => {
                let text = output.text.trim();
                if !text.is_empty() {
                    return GeneratedSummary {
                        text: text.to_string(),
                        token_count: output.completion_tokens,
                        fell_back: false,
                    };
                }
                "Empty summary text returned from model".to_string()
            }
            Err(e) => format!("{:#}", e),
        };

        warn!(
            "LLM summary failed ({}) via {} - {}",
            label,
            self.generator.name(),
            failure
        );
        GeneratedSummary {
            text: fallback(),
            token_count: None,
            fell_back: true,
        }
    }
}

fn is_duplicate(e: &anyhow::Error) -> bool {
    e.downcast_ref::<StoreError>()
        .map(StoreError::is_duplicate)
        .unwrap_or(false)
}
