use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::chat::ChatEngine;
use crate::engine::query::QueryEngine;
use crate::feedback::definition::FeedbackDefinition;
use crate::feedback::provider::FeedbackProvider;
use crate::feedback::recorder::Recorder;
use crate::llm::{ChatModel, Embedder, HttpChatModel, HttpEmbedder};
use crate::search::index::DocumentIndex;
use crate::session::{SessionContext, SessionStore};

/// Async-initialized shared value. The first successful initializer wins;
/// a failed one leaves the cell empty so the next caller retries.
pub struct Memo<T> {
    cell: tokio::sync::Mutex<Option<Arc<T>>>,
}

impl<T> Memo<T> {
    pub fn new() -> Self {
        Self {
            cell: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut cell = self.cell.lock().await;
        if let Some(value) = cell.as_ref() {
            return Ok(value.clone());
        }
        let value = Arc::new(init().await?);
        *cell = Some(value.clone());
        Ok(value)
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionStore>,
    chat_model: Arc<dyn ChatModel>,
    feedback_model: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
    query_engine: Arc<Memo<QueryEngine>>,
    recorder: Arc<Memo<Recorder>>,
}

impl AppState {
    /// State backed by the configured HTTP provider.
    pub fn new(config: Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        let chat_model = HttpChatModel::new(
            http_client.clone(),
            config.llm.clone(),
            config.llm.chat_model.clone(),
            config.llm.temperature,
        );
        // Graders run deterministic
        let feedback_model = HttpChatModel::new(
            http_client.clone(),
            config.llm.clone(),
            config.feedback.model.clone(),
            0.0,
        );
        let embedder = HttpEmbedder::new(http_client, config.llm.clone());

        Ok(Self::with_models(
            config,
            Arc::new(chat_model),
            Arc::new(feedback_model),
            Arc::new(embedder),
        ))
    }

    pub fn with_models(
        config: Config,
        chat_model: Arc<dyn ChatModel>,
        feedback_model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            config,
            sessions: Arc::new(SessionStore::new()),
            chat_model,
            feedback_model,
            embedder,
            query_engine: Arc::new(Memo::new()),
            recorder: Arc::new(Memo::new()),
        }
    }

    /// The process-wide query engine; builds the document index on first use.
    pub async fn query_engine(&self) -> Result<Arc<QueryEngine>> {
        self.query_engine
            .get_or_try_init(|| build_query_engine(&self.config, self.chat_model.clone(), self.embedder.clone()))
            .await
    }

    pub async fn recorder(&self) -> Result<Arc<Recorder>> {
        self.recorder
            .get_or_try_init(|| build_recorder(&self.config, self.feedback_model.clone()))
            .await
    }

    /// Build both shared components now so startup fails on a bad corpus.
    pub async fn warm_up(&self) -> Result<()> {
        let engine = self.query_engine().await?;
        let recorder = self.recorder().await?;
        tracing::info!(
            "Ready: {} chunks from {} documents, feedback model {}",
            engine.index().chunk_count(),
            engine.index().document_count(),
            recorder.provider_model()
        );
        Ok(())
    }

    /// New session with its own chat engine, seeded with the greeting.
    pub async fn create_session(&self) -> Result<Arc<SessionContext>> {
        let chat_engine = ChatEngine::new(
            self.query_engine().await?,
            self.chat_model.clone(),
            self.config.chat_mode,
        );
        let session = SessionContext::new(
            chat_engine,
            self.recorder().await?,
            self.config.feedback.refresh_interval_ms,
        );
        session.initialize(&self.config.greeting);

        let session = self.sessions.insert(session);
        tracing::info!("Created session {}", session.id);
        Ok(session)
    }

    pub fn session(&self, id: &Uuid) -> Option<Arc<SessionContext>> {
        self.sessions.get(id)
    }
}

async fn build_query_engine(
    config: &Config,
    chat_model: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
) -> Result<QueryEngine> {
    tracing::info!("Indexing documents in {}", config.docs_dir.display());
    let index = DocumentIndex::build(&config.docs_dir, embedder).await?;
    Ok(QueryEngine::new(
        Arc::new(index),
        chat_model,
        config.llm.system_prompt.clone(),
        config.retrieval.clone(),
    ))
}

async fn build_recorder(config: &Config, feedback_model: Arc<dyn ChatModel>) -> Result<Recorder> {
    Ok(Recorder::new(
        config.app_id.clone(),
        FeedbackDefinition::default_set(config.feedback.aggregation),
        FeedbackProvider::new(feedback_model),
        config.feedback.max_concurrent_calls,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_memo_initializes_once() {
        let memo: Memo<String> = Memo::new();
        let calls = AtomicUsize::new(0);

        let init = || {
            let calls = &calls;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>("engine".to_string())
            }
        };
        let a = memo.get_or_try_init(init).await.unwrap();
        let b = memo.get_or_try_init(init).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_memo_retries_after_failure() {
        let memo: Memo<u32> = Memo::new();
        let failed = memo
            .get_or_try_init(|| async { Err::<u32, _>(anyhow::anyhow!("no documents")) })
            .await;
        assert!(failed.is_err());
        let value = memo.get_or_try_init(|| async { Ok::<u32, anyhow::Error>(7) }).await.unwrap();
        assert_eq!(*value, 7);
    }
}
