use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// Per-input cap in bytes. Doc chunks stay far below it; only stray
/// oversized inputs (a whole prompt, a giant table) get clipped.
const MAX_EMBED_CHARS: usize = 6_000;

const OLLAMA_BATCH: usize = 32;
const OPENAI_BATCH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Ollama,
    OpenAi,
}

impl Backend {
    fn from_config(config: &LlmConfig) -> Result<Self> {
        match config.provider.as_str() {
            "ollama" => Ok(Backend::Ollama),
            "openai" => Ok(Backend::OpenAi),
            other => anyhow::bail!("Unsupported LLM provider: {other}"),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Backend::Ollama => "Ollama",
            Backend::OpenAi => "OpenAI",
        }
    }

    fn batch_size(self) -> usize {
        match self {
            Backend::Ollama => OLLAMA_BATCH,
            Backend::OpenAi => OPENAI_BATCH,
        }
    }
}

fn clip(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let end = (0..=MAX_EMBED_CHARS)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0);
    &text[..end]
}

/// One vector per input, in input order. Inputs are clipped and sent in
/// provider-sized batches; a batch that comes back short is an error.
pub async fn embed_batch(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let backend = Backend::from_config(config)?;
    let inputs: Vec<String> = texts.iter().map(|t| clip(t).to_string()).collect();
    let mut vectors = Vec::with_capacity(inputs.len());

    for batch in inputs.chunks(backend.batch_size()) {
        let mut got = match backend {
            Backend::Ollama => ollama_batch(client, config, batch).await?,
            Backend::OpenAi => openai_batch(client, config, batch).await?,
        };
        if got.len() != batch.len() {
            anyhow::bail!(
                "{} returned {} embeddings for a batch of {}",
                backend.label(),
                got.len(),
                batch.len()
            );
        }
        vectors.append(&mut got);
    }

    Ok(vectors)
}

async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder, backend: Backend) -> Result<T> {
    let label = backend.label();
    let resp = request
        .send()
        .await
        .with_context(|| format!("{label} embedding request failed"))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{label} embeddings returned {status}: {body}");
    }

    resp.json()
        .await
        .with_context(|| format!("Malformed {label} embedding response"))
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn ollama_batch(client: &reqwest::Client, config: &LlmConfig, batch: &[String]) -> Result<Vec<Vec<f32>>> {
    let request = client
        .post(format!("{}/api/embed", config.base_url))
        .json(&OllamaEmbedRequest {
            model: &config.embedding_model,
            input: batch,
            truncate: true,
        });
    let body: OllamaEmbedResponse = send_json(request, Backend::Ollama).await?;
    Ok(body.embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

async fn openai_batch(client: &reqwest::Client, config: &LlmConfig, batch: &[String]) -> Result<Vec<Vec<f32>>> {
    let mut request = client
        .post(format!("{}/v1/embeddings", config.base_url))
        .json(&OpenAiEmbedRequest {
            model: &config.embedding_model,
            input: batch,
        });
    if let Some(key) = config.api_key.as_deref() {
        request = request.bearer_auth(key);
    }
    let body: OpenAiEmbedResponse = send_json(request, Backend::OpenAi).await?;
    Ok(in_input_order(body))
}

/// Vectors sorted by the `index` each item echoes back.
fn in_input_order(body: OpenAiEmbedResponse) -> Vec<Vec<f32>> {
    let mut data = body.data;
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}
