/// Ranking and embedding-quality metrics.
///
/// - MRR: mean over probes of 1 / rank of the first expected node (0 when absent).
/// - recall@K: fraction of probes with any expected node in the top K.
/// - Type similarity: mean cosine between node vectors of the same type vs. different
///   types. A larger gap means the embedding separates node kinds better.

use serde::{Deserialize, Serialize};

use crate::corpus::NodeType;
use crate::intent::IntentCategory;
use crate::search::Ranking;

/// Per-probe result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub probe_id: String,
    pub intent: IntentCategory,
    /// 1-based rank of the first expected node, if it was ranked at all
    pub first_hit_rank: Option<usize>,
    pub hit_at_k: bool,
    pub elapsed_ms: f64,
}

impl ProbeOutcome {
    pub fn from_ranking(probe_id: &str, expected: &[String], ranking: &Ranking, k: usize, elapsed_ms: f64) -> Self {
        let first_hit_rank = expected.iter().filter_map(|id| ranking.rank_of(id)).min();
        ProbeOutcome {
            probe_id: probe_id.to_string(),
            intent: ranking.intent,
            first_hit_rank,
            hit_at_k: first_hit_rank.is_some_and(|r| r <= k),
            elapsed_ms,
        }
    }

    pub fn reciprocal_rank(&self) -> f64 {
        self.first_hit_rank.map_or(0.0, |r| 1.0 / r as f64)
    }
}

pub fn mean_reciprocal_rank(outcomes: &[ProbeOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    outcomes.iter().map(ProbeOutcome::reciprocal_rank).sum::<f64>() / outcomes.len() as f64
}

pub fn recall_at_k(outcomes: &[ProbeOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    outcomes.iter().filter(|o| o.hit_at_k).count() as f64 / outcomes.len() as f64
}

/// Probe ids that hit in `baseline` but miss in `candidate`.
pub fn regressions(baseline: &[ProbeOutcome], candidate: &[ProbeOutcome]) -> Vec<String> {
    baseline
        .iter()
        .filter(|b| b.hit_at_k)
        .filter(|b| {
            !candidate
                .iter()
                .any(|c| c.probe_id == b.probe_id && c.hit_at_k)
        })
        .map(|b| b.probe_id.clone())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypeSimilarity {
    pub intra: f64,
    pub inter: f64,
    pub gap: f64,
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let na: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Mean intra-type and inter-type cosine over all node pairs.
///
/// Returns `None` unless there is at least one pair of each kind.
pub fn type_similarity(vectors: &[(NodeType, &[f32])]) -> Option<TypeSimilarity> {
    let (mut intra, mut intra_n, mut inter, mut inter_n) = (0.0, 0usize, 0.0, 0usize);
    for (i, (ti, vi)) in vectors.iter().enumerate() {
        for (tj, vj) in &vectors[i + 1..] {
            let c = cosine(vi, vj);
            if ti == tj {
                intra += c;
                intra_n += 1;
            } else {
                inter += c;
                inter_n += 1;
            }
        }
    }
    if intra_n == 0 || inter_n == 0 {
        return None;
    }
    let (intra, inter) = (intra / intra_n as f64, inter / inter_n as f64);
    Some(TypeSimilarity { intra, inter, gap: intra - inter })
}
