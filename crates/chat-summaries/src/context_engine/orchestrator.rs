//! Per-turn entry points: build context before the model call, schedule
//! summarization after it.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SummaryConfig;
use crate::context_engine::context_builder::{BuiltContext, ContextBuilder};
use crate::context_engine::summary_updater::SummaryUpdater;
use crate::memory::{ChatMessage, ChatRole, SanitizedMessage};
use crate::memory_db::{ChatStore, SeqRange, SummaryFilter, SummaryOrder, SummaryOverview};
use crate::model_runtime::TextGenerator;
use crate::worker_threads::SummaryWorker;

pub struct ContextOrchestrator {
    store: Arc<dyn ChatStore>,
    context_builder: ContextBuilder,
    summary_worker: SummaryWorker,
    config: SummaryConfig,
}

impl ContextOrchestrator {
    pub fn new(
        store: Arc<dyn ChatStore>,
        generator: Arc<dyn TextGenerator>,
        config: SummaryConfig,
    ) -> anyhow::Result<Self> {
        let context_builder = ContextBuilder::new(store.clone(), config.clone())?;
        let updater = SummaryUpdater::new(store.clone(), generator, config.clone())?;
        let summary_worker = SummaryWorker::new(Arc::new(updater));

        info!(
            "Context orchestrator ready (window {}, chunk {}, group {})",
            config.context_window, config.chunk_size, config.summary_group_size
        );

        Ok(Self { store, context_builder, summary_worker, config })
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    pub fn summary_worker(&self) -> &SummaryWorker {
        &self.summary_worker
    }

    /// Context for the next model call.
    pub async fn prepare_turn(
        &self,
        chat_id: &str,
        sanitized_messages: &[SanitizedMessage],
        base_system_prompt: &str,
    ) -> BuiltContext {
        self.context_builder
            .build_context(chat_id, sanitized_messages, base_system_prompt)
            .await
    }

    /// Kick off summarization once the response has been produced. The
    /// returned handle may be dropped.
    pub fn finish_turn(&self, chat_id: &str) -> JoinHandle<()> {
        debug!("Scheduling summary update for chat {}", chat_id);
        self.summary_worker.spawn(chat_id)
    }

    pub async fn record_message(
        &self,
        chat_id: &str,
        role: ChatRole,
        content: &str,
    ) -> anyhow::Result<ChatMessage> {
        Ok(self.store.append_message(chat_id, role, content).await?)
    }

    /// Every stored message of a chat, in sequence order.
    pub async fn load_history(&self, chat_id: &str) -> anyhow::Result<Vec<ChatMessage>> {
        let total = self.store.count_messages(chat_id).await?;
        if total == 0 {
            return Ok(Vec::new());
        }
        Ok(self.store.find_messages(chat_id, SeqRange::new(1, total)).await?)
    }

    /// Stored history as the context builder expects it: user and assistant
    /// turns only.
    pub async fn sanitized_history(&self, chat_id: &str) -> anyhow::Result<Vec<SanitizedMessage>> {
        Ok(self
            .load_history(chat_id)
            .await?
            .into_iter()
            .filter(|message| message.role.is_conversational())
            .map(|message| SanitizedMessage { role: message.role, content: message.content })
            .collect())
    }

    pub async fn list_summaries(&self, chat_id: &str) -> anyhow::Result<SummaryOverview> {
        let filter = SummaryFilter::default().order(SummaryOrder::StartAsc);
        let summaries = self.store.find_summaries(chat_id, &filter).await?;
        Ok(SummaryOverview::from_summaries(summaries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_db::{InMemoryChatStore, SummaryLevel};
    use crate::model_runtime::{GenerationOutput, GenerationRequest};
    use async_trait::async_trait;

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, _request: GenerationRequest) -> anyhow::Result<GenerationOutput> {
            Ok(GenerationOutput { text: self.0.to_string(), completion_tokens: Some(7) })
        }
    }

    fn orchestrator(store: &InMemoryChatStore) -> ContextOrchestrator {
        ContextOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(FixedGenerator("what happened so far")),
            SummaryConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let config = SummaryConfig { chunk_size: 0, ..Default::default() };
        let result = ContextOrchestrator::new(
            Arc::new(InMemoryChatStore::new()),
            Arc::new(FixedGenerator("x")),
            config,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_turns_accumulate_summaries() {
        let store = InMemoryChatStore::new();
        let orchestrator = orchestrator(&store);

        for i in 0..45 {
            let role = if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant };
            orchestrator.record_message("chat-1", role, &format!("turn {}", i)).await.unwrap();
            orchestrator.finish_turn("chat-1").await.unwrap();

            let total = i as i64 + 1;
            for chunk in store.summaries("chat-1") {
                assert!(
                    chunk.end_seq <= total - 20,
                    "chunk {}-{} inside window at {}",
                    chunk.start_seq,
                    chunk.end_seq,
                    total
                );
            }
        }

        let overview = orchestrator.list_summaries("chat-1").await.unwrap();
        assert!(overview.meta.is_empty());
        let ranges: Vec<_> = overview.chunks.iter().map(|s| (s.start_seq, s.end_seq)).collect();
        assert_eq!(ranges, vec![(1, 10), (11, 20)]);

        let history = orchestrator.sanitized_history("chat-1").await.unwrap();
        let built = orchestrator.prepare_turn("chat-1", &history, "You are Mira.").await;

        // 45 messages put the cutoff at 25: both chunks qualify and end
        // before the verbatim window starts at 26.
        assert!(built.system_prompt.starts_with("You are Mira.\n\n=== Prior conversation summary ==="));
        assert!(built.system_prompt.contains("[summary 1-10]\nwhat happened so far"));
        assert!(built.system_prompt.contains("[summary 11-20]"));
        assert_eq!(built.recent_messages.len(), 20);
        assert_eq!(built.recent_messages[0].content, "turn 25");
    }

    #[tokio::test]
    async fn test_sanitized_history_drops_system_rows() {
        let store = InMemoryChatStore::new().with_messages(
            "chat-1",
            [
                (ChatRole::System, "persona loaded"),
                (ChatRole::User, "hi"),
                (ChatRole::Assistant, "hello"),
            ],
        );
        let orchestrator = orchestrator(&store);

        let history = orchestrator.sanitized_history("chat-1").await.unwrap();

        assert_eq!(history, vec![SanitizedMessage::user("hi"), SanitizedMessage::assistant("hello")]);
        assert_eq!(orchestrator.load_history("chat-1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_overview_splits_levels() {
        let store = InMemoryChatStore::new();
        let orchestrator = orchestrator(&store);
        assert!(orchestrator.list_summaries("chat-1").await.unwrap().is_empty());

        let store = store.with_messages("chat-1", (0..120).map(|i| (ChatRole::User, format!("m{}", i))));
        orchestrator.finish_turn("chat-1").await.unwrap();

        let overview = orchestrator.list_summaries("chat-1").await.unwrap();
        assert!(!overview.is_empty());
        assert_eq!(overview.meta.len(), 1);
        assert_eq!(overview.meta[0].level, SummaryLevel::Meta);
        assert_eq!(overview.chunks.len(), 10);
        assert_eq!(overview.covered_through(), 100);
        assert_eq!(store.summaries("chat-1").len(), 11);
    }
}
