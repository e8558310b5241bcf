//! Summary worker implementation
//!
//! Runs the summary updater off the response path. Each call spawns one task
//! and hands back its handle so callers can await it when they need to.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::context_engine::SummaryUpdater;

#[derive(Clone)]
pub struct SummaryWorker {
    updater: Arc<SummaryUpdater>,
}

impl SummaryWorker {
    pub fn new(updater: Arc<SummaryUpdater>) -> Self {
        Self { updater }
    }

    pub fn updater(&self) -> &Arc<SummaryUpdater> {
        &self.updater
    }

    /// Spawn a summary pass for `chat_id`. Errors and panics stay inside the
    /// task; the handle always resolves to `Ok(())`.
    pub fn spawn(&self, chat_id: impl Into<String>) -> JoinHandle<()> {
        let chat_id = chat_id.into();
        let updater = self.updater.clone();

        tokio::spawn(async move {
            debug!("Summary worker started for chat {}", chat_id);
            let outcome = AssertUnwindSafe(updater.update_summaries(&chat_id))
                .catch_unwind()
                .await;
            if outcome.is_err() {
                error!("Summary worker panicked for chat {}", chat_id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SummaryConfig;
    use crate::memory::ChatRole;
    use crate::memory_db::InMemoryChatStore;
    use crate::model_runtime::{GenerationOutput, GenerationRequest, TextGenerator};
    use async_trait::async_trait;

    struct PanickingGenerator;

    #[async_trait]
    impl TextGenerator for PanickingGenerator {
        async fn generate(&self, _request: GenerationRequest) -> anyhow::Result<GenerationOutput> {
            panic!("generator blew up");
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, _request: GenerationRequest) -> anyhow::Result<GenerationOutput> {
            Ok(GenerationOutput { text: "recap".to_string(), completion_tokens: Some(2) })
        }
    }

    fn store_with(total: usize) -> InMemoryChatStore {
        InMemoryChatStore::new().with_messages("chat-1", (0..total).map(|i| (ChatRole::User, format!("m{}", i))))
    }

    #[tokio::test]
    async fn test_spawned_pass_can_be_awaited() {
        let store = store_with(30);
        let updater =
            SummaryUpdater::new(Arc::new(store.clone()), Arc::new(EchoGenerator), SummaryConfig::default()).unwrap();
        let worker = SummaryWorker::new(Arc::new(updater));

        worker.spawn("chat-1").await.unwrap();

        assert_eq!(store.summaries("chat-1").len(), 1);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let store = store_with(30);
        let updater =
            SummaryUpdater::new(Arc::new(store.clone()), Arc::new(PanickingGenerator), SummaryConfig::default()).unwrap();
        let worker = SummaryWorker::new(Arc::new(updater));

        assert!(worker.spawn("chat-1").await.is_ok());
        assert!(store.summaries("chat-1").is_empty());
    }
}
