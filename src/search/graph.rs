/// Graph proximity signal.
///
/// Surfaces nodes that share no words with the query but sit next to nodes that do.
/// For each of a node's nearest neighbors we take the fraction of query terms found
/// in the neighbor's text, then average over those neighbors.

use std::collections::HashSet;

use crate::corpus::text::term_set;
use crate::corpus::Corpus;

/// Average query-term coverage over `neighbor_terms`.
///
/// No neighbors, or no query terms, scores exactly 0.0.
pub fn graph_score(query_terms: &HashSet<String>, neighbor_terms: &[&HashSet<String>]) -> f64 {
    if query_terms.is_empty() || neighbor_terms.is_empty() {
        return 0.0;
    }
    let total: f64 = neighbor_terms
        .iter()
        .map(|terms| {
            let found = query_terms.iter().filter(|t| terms.contains(*t)).count();
            found as f64 / query_terms.len() as f64
        })
        .sum();
    total / neighbor_terms.len() as f64
}

/// Precomputed term sets for every node, plus the neighbor exploration limit.
#[derive(Debug, Clone)]
pub struct GraphSignal {
    node_terms: Vec<HashSet<String>>,
    neighbor_limit: usize,
}

impl GraphSignal {
    pub fn build(corpus: &Corpus, neighbor_limit: usize) -> Self {
        let node_terms = corpus.nodes().iter().map(|n| term_set(&n.text())).collect();
        GraphSignal { node_terms, neighbor_limit }
    }

    /// Graph proximity of node `idx` to the query.
    pub fn score(&self, corpus: &Corpus, query_terms: &HashSet<String>, idx: usize) -> f64 {
        let neighbors: Vec<&HashSet<String>> = corpus
            .neighbors(idx, self.neighbor_limit)
            .map(|n| &self.node_terms[n])
            .collect();
        graph_score(query_terms, &neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Edge, Node, NodeType};

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_zero_neighbors_is_exactly_zero() {
        assert_eq!(graph_score(&set(&["cost"]), &[]), 0.0);
    }

    #[test]
    fn test_empty_query_is_zero() {
        let n = set(&["cost"]);
        assert_eq!(graph_score(&HashSet::new(), &[&n]), 0.0);
    }

    #[test]
    fn test_average_coverage() {
        let q = set(&["reduce", "cost"]);
        let a = set(&["reduce", "cost", "cloud"]);
        let b = set(&["cost"]);
        let c = set(&["latency"]);
        // (1.0 + 0.5 + 0.0) / 3
        assert!((graph_score(&q, &[&a, &b, &c]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_neighbor_limit_respected() {
        let mut nodes = vec![Node::new("hub", NodeType::Tool, "Hub", "central")];
        let mut edges = Vec::new();
        for i in 0..7 {
            let id = format!("n{}", i);
            // only the last two neighbors (by id order) mention the query term
            let desc = if i >= 5 { "billing" } else { "unrelated" };
            nodes.push(Node::new(&id, NodeType::Concept, &id, desc));
            edges.push(Edge::new("hub", &id, "links"));
        }
        let corpus = Corpus::new(nodes, edges).unwrap();
        let signal = GraphSignal::build(&corpus, 5);
        let q = set(&["billing"]);
        // neighbors n0..n4 are explored (equal strength, id order); none mention billing
        assert_eq!(signal.score(&corpus, &q, 0), 0.0);

        let wide = GraphSignal::build(&corpus, 7);
        assert!((wide.score(&corpus, &q, 0) - 2.0 / 7.0).abs() < 1e-12);
    }
}
