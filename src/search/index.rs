use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::chunking::chunk_document;
use crate::llm::Embedder;
use crate::loader::{load_documents, Document};
use crate::models::{DocumentChunk, RetrievedChunk};
use crate::search::bm25::Bm25Index;
use crate::search::hybrid::rrf_fusion;
use crate::search::vector::VectorStore;

/// Chunks embedded per request while building.
const EMBED_BATCH: usize = 64;

/// The retrievable document corpus: chunk table, BM25 index and vectors.
/// Built once per process and shared read-only.
pub struct DocumentIndex {
    chunks: Vec<DocumentChunk>,
    document_count: usize,
    bm25: Bm25Index,
    vectors: VectorStore,
    embedder: Arc<dyn Embedder>,
}

impl DocumentIndex {
    /// Load, chunk and index every document under `docs_dir`.
    pub async fn build(docs_dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let dir = docs_dir.to_path_buf();
        let docs = tokio::task::spawn_blocking(move || load_documents(&dir))
            .await
            .context("Document loading task failed")??;
        Self::from_documents(&docs, embedder).await
    }

    pub async fn from_documents(docs: &[Document], embedder: Arc<dyn Embedder>) -> Result<Self> {
        let chunks: Vec<DocumentChunk> = docs
            .iter()
            .flat_map(|doc| {
                chunk_document(&doc.content, doc.format)
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| DocumentChunk {
                        doc_path: doc.path.clone(),
                        title: doc.title.clone(),
                        chunk_index: i,
                        content: c.content,
                        start_line: c.start_line,
                        end_line: c.end_line,
                    })
            })
            .collect();

        if chunks.is_empty() {
            anyhow::bail!("Documents produced no indexable chunks");
        }

        let bm25 = Bm25Index::in_memory()?;
        bm25.index_chunks(0, &chunks)?;

        let vectors = VectorStore::new();
        for (batch_no, batch) in chunks.chunks(EMBED_BATCH).enumerate() {
            let texts: Vec<String> = batch.iter().map(embedding_text).collect();
            let embeddings = embedder
                .embed(&texts)
                .await
                .context("Failed to embed document chunks")?;
            if embeddings.len() != batch.len() {
                anyhow::bail!(
                    "Embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                );
            }
            vectors.add(batch_no * EMBED_BATCH, embeddings)?;
        }

        tracing::info!(
            "Indexed {} chunks from {} documents",
            chunks.len(),
            docs.len()
        );

        Ok(Self {
            chunks,
            document_count: docs.len(),
            bm25,
            vectors,
            embedder,
        })
    }

    /// Retrieve the `top_k` chunks for `query`, fusing BM25 and vector
    /// rankings over `fetch_k` candidates each. Errors propagate.
    pub async fn retrieve(&self, query: &str, top_k: usize, fetch_k: usize) -> Result<Vec<RetrievedChunk>> {
        let fetch_k = fetch_k.max(top_k);
        let bm25_hits = self.bm25.search(query, fetch_k)?;

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .context("Failed to embed query")?
            .into_iter()
            .next()
            .context("No embedding returned for query")?;
        let vector_hits = self.vectors.search(&query_embedding, fetch_k);

        let fused = rrf_fusion(&bm25_hits, &vector_hits, top_k);

        Ok(fused
            .into_iter()
            .filter_map(|hit| {
                let chunk = self.chunks.get(hit.chunk_id)?;
                Some(RetrievedChunk {
                    doc_path: chunk.doc_path.clone(),
                    title: chunk.title.clone(),
                    chunk_index: chunk.chunk_index,
                    content: chunk.content.clone(),
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                    bm25_score: hit.bm25_score,
                    vector_score: hit.vector_score,
                    combined_score: hit.combined_score,
                })
            })
            .collect())
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }
}

/// Title-prefixed text so short sections keep their topic.
fn embedding_text(chunk: &DocumentChunk) -> String {
    if chunk.content.contains(&chunk.title) {
        chunk.content.clone()
    } else {
        format!("{}\n\n{}", chunk.title, chunk.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::DocFormat;
    use async_trait::async_trait;

    /// Letter-frequency embedding: deterministic and good enough to rank
    /// lexically distinct chunks.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                        v[(c as u8 - b'a') as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("embedding service unavailable")
        }
    }

    fn doc(path: &str, content: &str) -> Document {
        Document {
            path: path.into(),
            title: path.trim_end_matches(".md").into(),
            content: content.into(),
            format: DocFormat::Markdown,
        }
    }

    #[tokio::test]
    async fn test_retrieve_finds_relevant_chunk() {
        let docs = vec![
            doc("caching.md", "# Caching\n\nst.cache_resource shares a resource across sessions."),
            doc("layout.md", "# Layout\n\nst.columns places widgets side by side."),
        ];
        let index = DocumentIndex::from_documents(&docs, Arc::new(LetterEmbedder))
            .await
            .unwrap();
        assert_eq!(index.chunk_count(), 2);
        assert_eq!(index.document_count(), 2);

        let hits = index.retrieve("cache_resource sessions", 1, 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_path, "caching.md");
        assert!(hits[0].combined_score > 0.0);
    }

    #[tokio::test]
    async fn test_build_fails_when_embedding_fails() {
        let docs = vec![doc("a.md", "# A\n\ntext")];
        let result = DocumentIndex::from_documents(&docs, Arc::new(BrokenEmbedder)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_build_missing_dir_fails() {
        let result = DocumentIndex::build(Path::new("/no/such/docs"), Arc::new(LetterEmbedder)).await;
        let err = result.err().unwrap();
        assert!(format!("{err:#}").contains("does not exist"));
    }

    #[test]
    fn test_embedding_text_prefixes_missing_title() {
        let chunk = DocumentChunk {
            doc_path: "a.md".into(),
            title: "Widgets".into(),
            chunk_index: 1,
            content: "Buttons trigger reruns.".into(),
            start_line: 5,
            end_line: 5,
        };
        assert!(embedding_text(&chunk).starts_with("Widgets\n\n"));
    }
}
