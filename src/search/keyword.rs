/// Keyword relevance signal: BM25 over node names and descriptions.
///
/// Fields are combined BM25F-style (weighted term frequencies and lengths). Query terms
/// that belong to the intent keyword vocabulary carry `intent_boost` times the weight of
/// ordinary terms, so paraphrases like "save money" compete with exact tool names.
/// Raw scores are min-max normalized over the candidate set of the current query.

use std::collections::{HashMap, HashSet};

use crate::config::RetrievalConfig;
use crate::corpus::text::tokenize;
use crate::corpus::{Corpus, Node};

use super::normalize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub name_weight: f64,
    pub description_weight: f64,
    pub intent_boost: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for Bm25Params {
    fn from(config: &RetrievalConfig) -> Self {
        Bm25Params {
            k1: config.bm25_k1,
            b: config.bm25_b,
            name_weight: config.name_weight,
            description_weight: config.description_weight,
            intent_boost: config.intent_boost,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct DocTerms {
    /// Field-weighted term frequency
    tf: HashMap<String, f64>,
    /// Field-weighted document length
    len: f64,
}

/// Inverted statistics for the whole corpus.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    docs: Vec<DocTerms>,
    doc_freq: HashMap<String, usize>,
    avg_len: f64,
    params: Bm25Params,
    intent_keywords: HashSet<String>,
}

fn index_node(node: &Node, params: &Bm25Params) -> DocTerms {
    let mut doc = DocTerms::default();
    let fields = [
        (node.name.as_str(), params.name_weight),
        (node.description.as_deref().unwrap_or(""), params.description_weight),
    ];
    for (text, weight) in fields {
        for term in tokenize(text) {
            *doc.tf.entry(term).or_default() += weight;
            doc.len += weight;
        }
    }
    doc
}

impl KeywordIndex {
    pub fn build(corpus: &Corpus, params: Bm25Params, intent_keywords: HashSet<String>) -> Self {
        let docs: Vec<DocTerms> = corpus.nodes().iter().map(|n| index_node(n, &params)).collect();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in &docs {
            for term in doc.tf.keys() {
                *doc_freq.entry(term.clone()).or_default() += 1;
            }
        }

        let avg_len = if docs.is_empty() {
            0.0
        } else {
            docs.iter().map(|d| d.len).sum::<f64>() / docs.len() as f64
        };

        KeywordIndex { docs, doc_freq, avg_len, params, intent_keywords }
    }

    /// Distinct query terms in first-seen order.
    pub fn query_terms(query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        tokenize(query).into_iter().filter(|t| seen.insert(t.clone())).collect()
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.docs.len() as f64;
        let df = self.doc_freq.get(term).copied().unwrap_or(0) as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Unnormalized BM25 score of node `idx` for the given query terms.
    pub fn raw_score(&self, terms: &[String], idx: usize) -> f64 {
        let doc = &self.docs[idx];
        if doc.len == 0.0 {
            return 0.0;
        }
        let Bm25Params { k1, b, intent_boost, .. } = self.params;
        let avg_len = if self.avg_len > 0.0 { self.avg_len } else { 1.0 };

        terms
            .iter()
            .filter_map(|term| doc.tf.get(term).map(|tf| (term, *tf)))
            .map(|(term, tf)| {
                let saturation = tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * doc.len / avg_len));
                let boost = if self.intent_keywords.contains(term) { intent_boost } else { 1.0 };
                boost * self.idf(term) * saturation
            })
            .sum()
    }

    /// Keyword scores in [0, 1] for `candidates`, normalized within this candidate set.
    pub fn score_candidates(&self, query: &str, candidates: &[usize]) -> Vec<f64> {
        let terms = Self::query_terms(query);
        let raw: Vec<f64> = candidates.iter().map(|&i| self.raw_score(&terms, i)).collect();
        normalize(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Node, NodeType};

    fn corpus() -> Corpus {
        Corpus::new(
            vec![
                Node::new("spot", NodeType::Tool, "SpotFleet Manager", "Runs batch jobs on spot instances"),
                Node::new("rightsizer", NodeType::Tool, "Rightsizer", "Shrinks oversized instances to reduce cost"),
                Node::new("grafana", NodeType::Tool, "Grafana", "Dashboards for metrics"),
                Node {
                    description: None,
                    ..Node::new("blank", NodeType::Other, "", "")
                },
            ],
            vec![],
        )
        .unwrap()
    }

    fn keywords() -> HashSet<String> {
        ["cost", "reduce", "money"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scores_normalized_to_unit_range() {
        let corpus = corpus();
        let index = KeywordIndex::build(&corpus, Bm25Params::default(), keywords());
        let scores = index.score_candidates("spot instances dashboards", &[0, 1, 2, 3]);
        assert_eq!(scores.len(), 4);
        for s in &scores {
            assert!((0.0..=1.0).contains(s));
        }
        assert_eq!(scores[0], 1.0);
        assert_eq!(scores[3], 0.0);
    }

    #[test]
    fn test_missing_text_scores_zero() {
        let corpus = corpus();
        let index = KeywordIndex::build(&corpus, Bm25Params::default(), keywords());
        let terms = KeywordIndex::query_terms("spot instances");
        assert_eq!(index.raw_score(&terms, 3), 0.0);
    }

    #[test]
    fn test_intent_keywords_boost_paraphrase_matches() {
        let corpus = corpus();
        let boosted = KeywordIndex::build(&corpus, Bm25Params::default(), keywords());
        let plain = KeywordIndex::build(&corpus, Bm25Params::default(), HashSet::new());

        // "cost" only appears in rightsizer; the boost widens its lead over spot.
        let terms = KeywordIndex::query_terms("instances cost");
        let ratio_plain = plain.raw_score(&terms, 1) / plain.raw_score(&terms, 0);
        let ratio_boosted = boosted.raw_score(&terms, 1) / boosted.raw_score(&terms, 0);
        assert!(ratio_boosted > ratio_plain);
        assert!(boosted.raw_score(&terms, 1) > boosted.raw_score(&terms, 0));
    }

    #[test]
    fn test_no_overlap_anywhere_is_all_zero() {
        let corpus = corpus();
        let index = KeywordIndex::build(&corpus, Bm25Params::default(), keywords());
        assert_eq!(index.score_candidates("kubernetes", &[0, 1, 2]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_repeated_query_terms_not_double_counted() {
        assert_eq!(KeywordIndex::query_terms("cost cost costs"), vec!["cost"]);
    }
}
