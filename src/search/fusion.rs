/// Fusion scorer: classify intent, pick a weight profile, fuse the three signals, sort.
///
/// The engine is immutable after construction and holds no interior mutability, so one
/// instance behind an `Arc` serves concurrent queries without coordination.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::corpus::Corpus;
use crate::errors::EngineError;
use crate::intent::{IntentCategory, IntentClassifier, IntentProfile, IntentTables, ProfileTable, WeightMode};

use super::{
    graph::GraphSignal, keyword::KeywordIndex, vector::vector_score, Bm25Params, Query, Ranking,
    ScoredNode, SignalBreakdown,
};

pub struct RetrievalEngine {
    corpus: Arc<Corpus>,
    classifier: IntentClassifier,
    profiles: ProfileTable,
    keyword: KeywordIndex,
    graph: GraphSignal,
    mode: WeightMode,
    default_limit: usize,
    min_confidence: Option<f64>,
}

impl RetrievalEngine {
    /// Build signal indexes over `corpus` using the given tables and retrieval settings.
    ///
    /// Starts in adaptive mode; use `with_mode` for a fixed global profile.
    pub fn new(
        corpus: Arc<Corpus>,
        tables: &IntentTables,
        config: &RetrievalConfig,
    ) -> Result<Self, EngineError> {
        let classifier = IntentClassifier::new(tables)?;
        let keyword = KeywordIndex::build(&corpus, Bm25Params::from(config), tables.intent_keywords.clone());
        let graph = GraphSignal::build(&corpus, config.graph_neighbor_limit);

        tracing::debug!(
            nodes = corpus.len(),
            neighbor_limit = config.graph_neighbor_limit,
            "Retrieval engine ready"
        );

        Ok(RetrievalEngine {
            corpus,
            classifier,
            profiles: tables.profiles.clone(),
            keyword,
            graph,
            mode: WeightMode::Adaptive,
            default_limit: config.default_limit,
            min_confidence: config.min_confidence,
        })
    }

    /// Engine over the builtin tables and default settings.
    pub fn with_defaults(corpus: Arc<Corpus>) -> Result<Self, EngineError> {
        Self::new(corpus, &IntentTables::builtin()?, &RetrievalConfig::default())
    }

    pub fn with_mode(mut self, mode: WeightMode) -> Result<Self, EngineError> {
        mode.validate()?;
        self.mode = mode;
        Ok(self)
    }

    pub fn mode(&self) -> WeightMode {
        self.mode
    }

    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    pub fn classify(&self, text: &str) -> IntentCategory {
        self.classifier.classify(text)
    }

    /// Profile applied to a query of the given intent under the current mode.
    pub fn profile_for(&self, intent: IntentCategory) -> IntentProfile {
        match self.mode {
            WeightMode::Adaptive => self.profiles.get(intent),
            WeightMode::Fixed(p) => p,
        }
    }

    /// Score and order `candidates` (corpus indices) for `query`.
    ///
    /// Ties are broken by node id so equal scores always come back in the same order.
    /// A query/node vector length mismatch aborts the whole pass: it means the projector
    /// that produced the query vector is not the one that produced the node features.
    /// Candidate indices outside the corpus are rejected before any scoring.
    pub fn rank(&self, query: &Query, candidates: &[usize]) -> Result<Ranking, EngineError> {
        if let Some(&bad) = candidates.iter().find(|&&idx| idx >= self.corpus.len()) {
            return Err(EngineError::Corpus(format!(
                "candidate index {} out of range for a corpus of {} nodes",
                bad,
                self.corpus.len()
            )));
        }
        let intent = self.classify(&query.text);
        let profile = self.profile_for(intent);

        let query_terms: HashSet<String> = KeywordIndex::query_terms(&query.text).into_iter().collect();
        let keyword_scores = self.keyword.score_candidates(&query.text, candidates);

        let mut hits = Vec::with_capacity(candidates.len());
        for (pos, &idx) in candidates.iter().enumerate() {
            let node = self.corpus.node(idx);
            let vector = match (&query.embedding, &node.features) {
                (Some(q), Some(f)) => vector_score(q, f)?,
                _ => 0.0,
            };
            let keyword = keyword_scores[pos];
            let graph = self.graph.score(&self.corpus, &query_terms, idx);
            hits.push(ScoredNode {
                node_id: node.id.clone(),
                node_type: node.node_type,
                score: profile.fuse(vector, keyword, graph),
                breakdown: SignalBreakdown { vector, keyword, graph },
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });

        tracing::debug!(
            intent = %intent,
            vector_weight = profile.vector,
            keyword_weight = profile.keyword,
            graph_weight = profile.graph,
            candidates = candidates.len(),
            "Ranked candidates"
        );

        Ok(Ranking { intent, profile, hits })
    }

    /// Rank the whole corpus, then apply the confidence floor and result limit.
    ///
    /// "No good matches" is an empty list, never an error.
    pub fn retrieve(&self, query: &Query) -> Result<Ranking, EngineError> {
        let candidates: Vec<usize> = (0..self.corpus.len()).collect();
        let mut ranking = self.rank(query, &candidates)?;

        if let Some(min) = query.min_confidence.or(self.min_confidence) {
            ranking.hits.retain(|h| h.score >= min);
        }
        ranking.hits.truncate(query.limit.unwrap_or(self.default_limit));
        Ok(ranking)
    }
}
