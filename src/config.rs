use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::feedback::definition::Aggregation;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert on the Streamlit Python library and your \
     job is to answer technical questions. Assume that all questions are related \
     to the Streamlit Python library. Keep your answers technical and based on \
     facts - do not hallucinate features.";

pub const DEFAULT_GREETING: &str = "Ask me a question about Streamlit's open-source Python library!";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory of documents to index (read recursively at startup)
    pub docs_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Application id stamped on every evaluation record
    pub app_id: String,
    /// First assistant message of every new session
    pub greeting: String,
    /// Whether follow-up prompts are condensed with the chat history
    pub chat_mode: ChatMode,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Feedback (evaluation) configuration
    pub feedback: FeedbackConfig,
}

/// How a session's chat engine turns a prompt into a retrieval query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// Rewrite follow-ups into a standalone question using prior turns.
    Condense,
    /// Send every prompt to the query engine as-is.
    Query,
}

impl FromStr for ChatMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "condense" | "chat" => Ok(ChatMode::Condense),
            "query" => Ok(ChatMode::Query),
            other => anyhow::bail!("Unknown chat mode: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for answering and condensing
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Sampling temperature for answers
    pub temperature: f32,
    /// System prompt sent with every answer
    pub system_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the answer prompt
    pub top_k: usize,
    /// Candidates fetched from each ranked list before fusion
    pub fetch_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Model name used by the feedback provider
    pub model: String,
    /// How per-chunk context relevance scores are combined
    pub aggregation: Aggregation,
    /// Client refresh interval for feedback pills
    pub refresh_interval_ms: u64,
    /// Maximum concurrent provider calls per feedback, shared across records
    pub max_concurrent_calls: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:8501".to_string(),
            app_id: "LlamaIndex_App1".to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            chat_mode: ChatMode::Condense,
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            api_key: None,
            temperature: 0.2,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            fetch_k: 10,
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            aggregation: Aggregation::Mean,
            refresh_interval_ms: 2000,
            max_concurrent_calls: 4,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DOCS_CHAT_DOCS_DIR") {
            config.docs_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("DOCS_CHAT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(app_id) = std::env::var("DOCS_CHAT_APP_ID") {
            config.app_id = app_id;
        }
        if let Ok(greeting) = std::env::var("DOCS_CHAT_GREETING") {
            config.greeting = greeting;
        }
        if let Ok(mode) = std::env::var("DOCS_CHAT_MODE") {
            match mode.parse() {
                Ok(m) => config.chat_mode = m,
                Err(e) => tracing::warn!("Ignoring DOCS_CHAT_MODE: {e}"),
            }
        }
        if let Ok(val) = std::env::var("DOCS_CHAT_TOP_K") {
            if let Ok(v) = val.parse::<usize>() {
                config.retrieval.top_k = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("DOCS_CHAT_FETCH_K") {
            if let Ok(v) = val.parse::<usize>() {
                config.retrieval.fetch_k = v.max(1);
            }
        }

        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY")) {
            config.llm.api_key = Some(key);
        }
        if let Ok(val) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(v) = val.parse::<f32>() {
                config.llm.temperature = v.clamp(0.0, 2.0);
            }
        }
        if let Ok(prompt) = std::env::var("LLM_SYSTEM_PROMPT") {
            config.llm.system_prompt = prompt;
        }

        if let Ok(model) = std::env::var("FEEDBACK_MODEL") {
            config.feedback.model = model;
        }
        if let Ok(agg) = std::env::var("FEEDBACK_AGGREGATION") {
            match agg.parse() {
                Ok(a) => config.feedback.aggregation = a,
                Err(e) => tracing::warn!("Ignoring FEEDBACK_AGGREGATION: {e}"),
            }
        }
        if let Ok(val) = std::env::var("FEEDBACK_REFRESH_MS") {
            if let Ok(v) = val.parse::<u64>() {
                config.feedback.refresh_interval_ms = v.max(250);
            }
        }
        if let Ok(val) = std::env::var("FEEDBACK_MAX_CONCURRENT_CALLS") {
            if let Ok(v) = val.parse::<usize>() {
                config.feedback.max_concurrent_calls = v.max(1);
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_hosted_setup() {
        let config = Config::default();
        assert_eq!(config.llm.chat_model, "gpt-4o-mini");
        assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.docs_dir, PathBuf::from("./data"));
        assert_eq!(config.feedback.aggregation, Aggregation::Mean);
        assert_eq!(config.feedback.refresh_interval_ms, 2000);
        assert_eq!(config.chat_mode, ChatMode::Condense);
    }

    #[test]
    fn test_chat_mode_parse() {
        assert_eq!("condense".parse::<ChatMode>().unwrap(), ChatMode::Condense);
        assert_eq!("Chat".parse::<ChatMode>().unwrap(), ChatMode::Condense);
        assert_eq!(" query ".parse::<ChatMode>().unwrap(), ChatMode::Query);
        assert!("stream".parse::<ChatMode>().is_err());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-secret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
