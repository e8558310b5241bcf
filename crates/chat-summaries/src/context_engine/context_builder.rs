//! Builds the system prompt and recent-message window for one chat turn

use std::sync::Arc;
use tracing::{debug, error};

use crate::config::SummaryConfig;
use crate::context_engine::segments::format_summary_segments;
use crate::memory::SanitizedMessage;
use crate::memory_db::{ChatStore, SummaryFilter, SummaryOrder};
use crate::metrics;

/// What gets sent to the model for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltContext {
    pub system_prompt: String,
    pub recent_messages: Vec<SanitizedMessage>,
}

/// Splices stored summaries into the persona prompt and trims the history
/// to the context window. Read-only with respect to the store.
pub struct ContextBuilder {
    store: Arc<dyn ChatStore>,
    config: SummaryConfig,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn ChatStore>, config: SummaryConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Never fails: a summary read error degrades to the base prompt.
    pub async fn build_context(
        &self,
        chat_id: &str,
        sanitized_messages: &[SanitizedMessage],
        base_system_prompt: &str,
    ) -> BuiltContext {
        let window_start = sanitized_messages.len().saturating_sub(self.config.context_window);
        let recent_messages = sanitized_messages[window_start..].to_vec();

        let outside_cutoff = sanitized_messages.len() as i64 - self.config.context_window as i64;
        if outside_cutoff <= 0 {
            return Self::unmodified(base_system_prompt, recent_messages);
        }

        let filter = SummaryFilter::default()
            .start_at_most(outside_cutoff)
            .order(SummaryOrder::LevelDescStartAsc);
        let summaries = match self.store.find_summaries(chat_id, &filter).await {
            Ok(summaries) => summaries,
            Err(e) => {
                error!("Failed to load summaries for chat {}: {}", chat_id, e);
                metrics::inc_context_build("store_error");
                return Self::unmodified(base_system_prompt, recent_messages);
            }
        };

        if summaries.is_empty() {
            return Self::unmodified(base_system_prompt, recent_messages);
        }

        debug!(
            "Adding {} summaries to context for chat {} (cutoff {})",
            summaries.len(),
            chat_id,
            outside_cutoff
        );
        metrics::inc_context_build("with_summaries");

        let segments = format_summary_segments(&summaries, self.config.locale);
        let system_prompt = format!(
            "{}\n\n{}\n{}",
            base_system_prompt.trim(),
            self.config.locale.summary_header(),
            segments.join("\n\n")
        );

        BuiltContext { system_prompt, recent_messages }
    }

    fn unmodified(base_system_prompt: &str, recent_messages: Vec<SanitizedMessage>) -> BuiltContext {
        BuiltContext {
            system_prompt: base_system_prompt.to_string(),
            recent_messages,
        }
    }
}
