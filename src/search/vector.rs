use anyhow::Result;
use parking_lot::RwLock;

struct VectorEntry {
    chunk_id: usize,
    embedding: Vec<f32>,
}

/// In-memory vector store with cosine similarity search.
#[derive(Default)]
pub struct VectorStore {
    entries: RwLock<Vec<VectorEntry>>,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk_id: usize,
    pub score: f32,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add embeddings; the i-th embedding belongs to chunk `first_id + i`.
    pub fn add(&self, first_id: usize, embeddings: Vec<Vec<f32>>) -> Result<()> {
        let mut entries = self.entries.write();

        if let (Some(existing), Some(new)) = (entries.first(), embeddings.first()) {
            if existing.embedding.len() != new.len() {
                anyhow::bail!(
                    "Embedding dimension mismatch: store has {}, got {}",
                    existing.embedding.len(),
                    new.len()
                );
            }
        }

        for (i, embedding) in embeddings.into_iter().enumerate() {
            entries.push(VectorEntry {
                chunk_id: first_id + i,
                embedding,
            });
        }

        Ok(())
    }

    /// Search by cosine similarity against a query embedding.
    pub fn search(&self, query_embedding: &[f32], limit: usize) -> Vec<VectorHit> {
        let entries = self.entries.read();

        let mut scored: Vec<VectorHit> = entries
            .iter()
            .map(|e| VectorHit {
                chunk_id: e.chunk_id,
                score: cosine_similarity(query_embedding, &e.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
