use std::collections::HashMap;

use crate::search::bm25::Bm25Hit;
use crate::search::vector::VectorHit;

/// RRF constant.
const RRF_K: f32 = 60.0;
/// Bonus for a chunk ranked first in either list.
const TOP_RANK_BONUS: f32 = 0.05;

/// A chunk's fused ranking across the BM25 and vector lists.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub chunk_id: usize,
    pub bm25_score: f32,
    pub vector_score: f32,
    pub combined_score: f32,
}

/// Reciprocal Rank Fusion of one BM25 list and one vector list.
///
/// Each appearance contributes `1 / (k + rank + 1)`; rank-1 hits in either
/// list get a flat bonus. Ties break on chunk id so the order is deterministic.
pub fn rrf_fusion(bm25_hits: &[Bm25Hit], vector_hits: &[VectorHit], limit: usize) -> Vec<FusedHit> {
    let mut fused: HashMap<usize, FusedHit> = HashMap::new();

    for (rank, hit) in bm25_hits.iter().enumerate() {
        let e = slot(&mut fused, hit.chunk_id);
        e.bm25_score = e.bm25_score.max(hit.score);
        e.combined_score += rrf_term(rank);
    }

    for (rank, hit) in vector_hits.iter().enumerate() {
        let e = slot(&mut fused, hit.chunk_id);
        e.vector_score = e.vector_score.max(hit.score);
        e.combined_score += rrf_term(rank);
    }

    let mut leaders: Vec<usize> = bm25_hits
        .first()
        .map(|h| h.chunk_id)
        .into_iter()
        .chain(vector_hits.first().map(|h| h.chunk_id))
        .collect();
    leaders.dedup();
    for id in leaders {
        if let Some(e) = fused.get_mut(&id) {
            e.combined_score += TOP_RANK_BONUS;
        }
    }

    let mut results: Vec<FusedHit> = fused.into_values().collect();
    results.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk_id.cmp(&b.chunk_id))
    });
    results.truncate(limit);
    results
}

fn slot(fused: &mut HashMap<usize, FusedHit>, chunk_id: usize) -> &mut FusedHit {
    fused.entry(chunk_id).or_insert(FusedHit {
        chunk_id,
        bm25_score: 0.0,
        vector_score: 0.0,
        combined_score: 0.0,
    })
}

fn rrf_term(rank: usize) -> f32 {
    1.0 / (RRF_K + rank as f32 + 1.0)
}
