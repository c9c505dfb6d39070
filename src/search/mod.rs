/// Hybrid retrieval: three independent relevance signals fused under an intent profile.
///
///   1. Vector:  clamped cosine similarity between query and node feature vectors
///   2. Keyword: BM25 with intent-keyword boost, min-max normalized per query
///   3. Graph:   query-term coverage of a node's nearest neighbors
///
/// Each signal is a pure function returning a value in [0, 1]. The fused score is
/// their weighted sum, so it stays in [0, 1] whenever the profile sums to 1.

pub mod fusion;
pub mod graph;
pub mod keyword;
pub mod vector;

use serde::{Deserialize, Serialize};

use crate::corpus::NodeType;
use crate::intent::{IntentCategory, IntentProfile};

pub use fusion::RetrievalEngine;
pub use graph::{graph_score, GraphSignal};
pub use keyword::{Bm25Params, KeywordIndex};
pub use vector::vector_score;

/// A retrieval request. Created per call and discarded after scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    /// Maximum hits to return (engine default when None)
    #[serde(default)]
    pub limit: Option<usize>,
    /// Drop hits whose fused score is below this value
    #[serde(default)]
    pub min_confidence: Option<f64>,
    /// Query vector in the same space as the node features
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Query {
    pub fn new(text: &str) -> Self {
        Query {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Per-signal values behind a fused score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalBreakdown {
    pub vector: f64,
    pub keyword: f64,
    pub graph: f64,
}

impl SignalBreakdown {
    pub fn is_zero(&self) -> bool {
        self.vector == 0.0 && self.keyword == 0.0 && self.graph == 0.0
    }
}

/// A ranked node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredNode {
    pub node_id: String,
    pub node_type: NodeType,
    /// Fused score in [0, 1]
    pub score: f64,
    pub breakdown: SignalBreakdown,
}

/// Result of one ranking pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ranking {
    pub intent: IntentCategory,
    pub profile: IntentProfile,
    pub hits: Vec<ScoredNode>,
}

impl Ranking {
    /// (node_id, score) pairs in rank order.
    pub fn pairs(&self) -> Vec<(String, f64)> {
        self.hits.iter().map(|h| (h.node_id.clone(), h.score)).collect()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.node_id.as_str()).collect()
    }

    /// 1-based rank of `id`, if present.
    pub fn rank_of(&self, id: &str) -> Option<usize> {
        self.hits.iter().position(|h| h.node_id == id).map(|p| p + 1)
    }
}

/// Min-max normalization over a slice of values.
///
/// Edge case: if max == min (including single-element slices) every value maps to 1.0
/// when that shared value is positive and to 0.0 otherwise, so a candidate with no
/// evidence never looks fully relevant.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        let v = if max > 0.0 { 1.0 } else { 0.0 };
        return vec![v; values.len()];
    }
    values.iter().map(|&v| (v - min) / (max - min)).collect()
}
