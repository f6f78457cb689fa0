use anyhow::Result;
use std::fmt::Write;
use std::sync::Arc;

use super::{EngineResponse, SpanTimer};
use crate::config::RetrievalConfig;
use crate::llm::ChatModel;
use crate::models::{ChatMessage, RetrievedChunk};
use crate::search::index::DocumentIndex;

/// One-shot question answering: retrieve, then synthesize from the chunks.
pub struct QueryEngine {
    index: Arc<DocumentIndex>,
    llm: Arc<dyn ChatModel>,
    system_prompt: String,
    retrieval: RetrievalConfig,
}

impl QueryEngine {
    pub fn new(
        index: Arc<DocumentIndex>,
        llm: Arc<dyn ChatModel>,
        system_prompt: String,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            index,
            llm,
            system_prompt,
            retrieval,
        }
    }

    /// Answer a standalone question. LLM and retrieval errors propagate.
    pub async fn query(&self, question: &str) -> Result<EngineResponse> {
        let span = SpanTimer::start("retrieve", question);
        let source_chunks = self
            .index
            .retrieve(question, self.retrieval.top_k, self.retrieval.fetch_k)
            .await?;
        let retrieve_span = span.finish(
            source_chunks
                .iter()
                .map(|c| format!("{}#{}", c.doc_path, c.chunk_index))
                .collect::<Vec<_>>()
                .join(", "),
        );

        let messages = build_messages(&self.system_prompt, &source_chunks, question);
        let span = SpanTimer::start("synthesize", question);
        let response = self.llm.complete(messages).await?;
        let synthesize_span = span.finish(response.clone());

        tracing::debug!(
            "Answered with {} chunks via {}",
            source_chunks.len(),
            self.llm.model_name()
        );

        Ok(EngineResponse {
            response,
            source_chunks,
            trace: vec![retrieve_span, synthesize_span],
        })
    }

    pub fn index(&self) -> &Arc<DocumentIndex> {
        &self.index
    }
}

fn build_context_block(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return "(No relevant documentation was found.)\n".to_string();
    }

    let mut ctx = String::new();
    for chunk in chunks {
        let _ = write!(
            ctx,
            "source: {} (lines {}-{})\n{}\n\n",
            chunk.doc_path, chunk.start_line, chunk.end_line, chunk.content
        );
    }
    ctx
}

fn build_messages(system_prompt: &str, chunks: &[RetrievedChunk], question: &str) -> Vec<ChatMessage> {
    let context = build_context_block(chunks);
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(format!(
            "Context information is below.\n\
             ---------------------\n\
             {context}\
             ---------------------\n\
             Given the context information and not prior knowledge, answer the query.\n\
             Query: {question}\n\
             Answer: "
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, content: &str) -> RetrievedChunk {
        RetrievedChunk {
            doc_path: path.into(),
            title: "t".into(),
            chunk_index: 0,
            content: content.into(),
            start_line: 3,
            end_line: 9,
            bm25_score: 0.0,
            vector_score: 0.0,
            combined_score: 0.0,
        }
    }

    #[test]
    fn test_context_block_lists_sources() {
        let ctx = build_context_block(&[chunk("a.md", "alpha"), chunk("b.md", "beta")]);
        assert!(ctx.contains("source: a.md (lines 3-9)\nalpha"));
        assert!(ctx.contains("source: b.md"));
    }

    #[test]
    fn test_context_block_empty() {
        assert!(build_context_block(&[]).contains("No relevant documentation"));
    }

    #[test]
    fn test_messages_structure() {
        let msgs = build_messages("be precise", &[chunk("a.md", "alpha")], "what is alpha?");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0], ChatMessage::system("be precise"));
        assert_eq!(msgs[1].role, "user");
        assert!(msgs[1].content.contains("alpha\n"));
        assert!(msgs[1].content.contains("Query: what is alpha?"));
    }
}
