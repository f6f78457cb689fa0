//! LLM access behind two object-safe seams: [`ChatModel`] for completions and
//! [`Embedder`] for vectors. The HTTP implementations speak to Ollama or any
//! OpenAI-compatible endpoint.

pub mod completion;
pub mod embeddings;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::models::ChatMessage;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one non-streaming completion and return the assistant text.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String>;

    fn model_name(&self) -> &str;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; the output is parallel with the input.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Completion model reached over HTTP.
pub struct HttpChatModel {
    client: reqwest::Client,
    config: LlmConfig,
    model: String,
    temperature: f32,
}

impl HttpChatModel {
    pub fn new(client: reqwest::Client, config: LlmConfig, model: String, temperature: f32) -> Self {
        Self {
            client,
            config,
            model,
            temperature,
        }
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        completion::complete(
            &self.client,
            &self.config,
            &self.model,
            self.temperature,
            messages,
        )
        .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Embedding model reached over HTTP.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        embeddings::embed_batch(&self.client, &self.config, texts).await
    }
}
