use anyhow::{Context, Result};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{doc, Index, IndexWriter, ReloadPolicy};

use crate::models::DocumentChunk;

/// BM25 full-text index over document chunks, built on an in-RAM tantivy index.
///
/// Documents store only the chunk id; the owning [`DocumentIndex`] holds the
/// chunk contents.
///
/// [`DocumentIndex`]: crate::search::index::DocumentIndex
pub struct Bm25Index {
    index: Index,
    f_chunk_id: Field,
    f_title: Field,
    f_doc_path: Field,
    f_content: Field,
}

#[derive(Debug, Clone)]
pub struct Bm25Hit {
    pub chunk_id: usize,
    pub score: f32,
}

impl Bm25Index {
    pub fn in_memory() -> Result<Self> {
        let mut schema_builder = Schema::builder();
        let f_chunk_id =
            schema_builder.add_u64_field("chunk_id", NumericOptions::default() | STORED);
        let f_title = schema_builder.add_text_field("title", TEXT);
        let f_doc_path = schema_builder.add_text_field("doc_path", TEXT);
        let f_content = schema_builder.add_text_field("content", TEXT);
        let schema = schema_builder.build();

        Ok(Self {
            index: Index::create_in_ram(schema),
            f_chunk_id,
            f_title,
            f_doc_path,
            f_content,
        })
    }

    /// Index chunks; the i-th chunk gets id `first_id + i`.
    pub fn index_chunks(&self, first_id: usize, chunks: &[DocumentChunk]) -> Result<()> {
        let mut writer: IndexWriter = self
            .index
            .writer(50_000_000)
            .context("Failed to create index writer")?;

        for (i, chunk) in chunks.iter().enumerate() {
            writer.add_document(doc!(
                self.f_chunk_id => (first_id + i) as u64,
                self.f_title => chunk.title.clone(),
                self.f_doc_path => chunk.doc_path.clone(),
                self.f_content => chunk.content.clone(),
            ))?;
        }

        writer.commit().context("Failed to commit index")?;
        Ok(())
    }

    /// Search the index and return scored hits, best first.
    ///
    /// Query syntax errors are tolerated: user prompts are free text.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<Bm25Hit>> {
        if query_str.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create reader")?;
        let searcher = reader.searcher();

        let query_parser = QueryParser::for_index(
            &self.index,
            vec![self.f_content, self.f_title, self.f_doc_path],
        );
        let (query, errors) = query_parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            tracing::debug!("Lenient query parse dropped {} clause(s)", errors.len());
        }

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .context("Search failed")?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;
            let Some(chunk_id) = doc.get_first(self.f_chunk_id).and_then(|v| v.as_u64()) else {
                continue;
            };
            hits.push(Bm25Hit {
                chunk_id: chunk_id as usize,
                score,
            });
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, title: &str, content: &str) -> DocumentChunk {
        DocumentChunk {
            doc_path: path.into(),
            title: title.into(),
            chunk_index: 0,
            content: content.into(),
            start_line: 1,
            end_line: 1,
        }
    }

    #[test]
    fn test_search_ranks_matching_chunk() {
        let index = Bm25Index::in_memory().unwrap();
        index
            .index_chunks(
                0,
                &[
                    chunk("caching.md", "Caching", "st.cache_data memoizes function results"),
                    chunk("layout.md", "Layout", "columns and containers arrange widgets"),
                ],
            )
            .unwrap();

        let hits = index.search("memoizes results", 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, 0);
    }

    #[test]
    fn test_search_tolerates_query_syntax() {
        let index = Bm25Index::in_memory().unwrap();
        index
            .index_chunks(0, &[chunk("a.md", "A", "how do I use columns")])
            .unwrap();
        assert!(index.search("columns? (AND \"unclosed", 5).is_ok());
    }

    #[test]
    fn test_ids_offset_by_first_id() {
        let index = Bm25Index::in_memory().unwrap();
        index
            .index_chunks(7, &[chunk("a.md", "A", "session state")])
            .unwrap();
        let hits = index.search("session", 5).unwrap();
        assert_eq!(hits[0].chunk_id, 7);
    }

    #[test]
    fn test_empty_query() {
        let index = Bm25Index::in_memory().unwrap();
        assert!(index.search("   ", 5).unwrap().is_empty());
    }
}
