use anyhow::Result;
use std::fmt::Write;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::query::QueryEngine;
use super::{EngineResponse, SpanTimer};
use crate::config::ChatMode;
use crate::llm::ChatModel;
use crate::models::ChatMessage;

/// Per-session conversational engine over a shared [`QueryEngine`].
///
/// In [`ChatMode::Condense`] every turn after the first is rewritten into a
/// standalone question using the session's history before retrieval.
pub struct ChatEngine {
    query_engine: Arc<QueryEngine>,
    llm: Arc<dyn ChatModel>,
    mode: ChatMode,
    history: Mutex<Vec<ChatMessage>>,
}

impl ChatEngine {
    pub fn new(query_engine: Arc<QueryEngine>, llm: Arc<dyn ChatModel>, mode: ChatMode) -> Self {
        Self {
            query_engine,
            llm,
            mode,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Answer `prompt` in the context of this session. History grows only
    /// when the call succeeds.
    pub async fn chat(&self, prompt: &str) -> Result<EngineResponse> {
        let mut history = self.history.lock().await;

        let mut trace = Vec::new();
        let question = if self.mode == ChatMode::Condense && !history.is_empty() {
            let span = SpanTimer::start("condense", prompt);
            let standalone = self
                .llm
                .complete(vec![ChatMessage::user(condense_prompt(&history, prompt))])
                .await?;
            let standalone = standalone.trim().to_string();
            trace.push(span.finish(standalone.clone()));
            tracing::debug!("Condensed follow-up into: {standalone}");
            standalone
        } else {
            prompt.to_string()
        };

        let mut response = self.query_engine.query(&question).await?;
        trace.append(&mut response.trace);
        response.trace = trace;

        history.push(ChatMessage::user(prompt));
        history.push(ChatMessage::assistant(response.response.clone()));

        Ok(response)
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.clone()
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }
}

fn condense_prompt(history: &[ChatMessage], question: &str) -> String {
    let mut transcript = String::new();
    for msg in history {
        let _ = writeln!(transcript, "{}: {}", msg.role, msg.content);
    }
    format!(
        "Given a conversation (between Human and Assistant) and a follow up message from Human, \
         rewrite the message to be a standalone question that captures all relevant context \
         from the conversation.\n\n\
         <Chat History>\n{transcript}\n\
         <Follow Up Message>\n{question}\n\n\
         <Standalone question>\n"
    )
}
