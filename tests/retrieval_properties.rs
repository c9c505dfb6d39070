use std::collections::HashSet;
use std::sync::Arc;

use intentrank::config::RetrievalConfig;
use intentrank::corpus::{Corpus, Edge, Node, NodeType};
use intentrank::intent::{IntentProfile, IntentTables, WeightMode};
use intentrank::projection::{FitData, ProjectionConfig, ProjectionModel, ProjectionStrategy, SourceEmbeddings};
use intentrank::search::{graph_score, normalize, vector_score, Query, RetrievalEngine};
use proptest::prelude::*;

const VOCAB: &[&str] = &[
    "cost", "cloud", "spot", "kubernetes", "alert", "pipeline", "deploy", "token", "audit",
    "schema", "model", "drift", "latency", "budget", "rollback", "secret", "compare", "debug",
];

const EPS: f64 = 1e-9;

fn arb_text(max_words: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(VOCAB), 1..=max_words).prop_map(|w| w.join(" "))
}

fn arb_node_type() -> impl Strategy<Value = NodeType> {
    prop_oneof![
        Just(NodeType::Tool),
        Just(NodeType::UseCase),
        Just(NodeType::Capability),
        Just(NodeType::Workflow),
        Just(NodeType::Concept),
    ]
}

/// Random small corpus: nodes with vocabulary text and features, plus random edges.
fn arb_corpus() -> impl Strategy<Value = Corpus> {
    (2usize..12).prop_flat_map(|n| {
        (
            prop::collection::vec((arb_node_type(), arb_text(3), arb_text(8)), n),
            prop::collection::vec((0..n, 0..n), 0..n * 2),
            prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 8), n),
        )
            .prop_map(|(specs, pairs, features)| {
                let nodes: Vec<Node> = specs
                    .into_iter()
                    .enumerate()
                    .map(|(i, (t, name, desc))| Node::new(&format!("n{:02}", i), t, &name, &desc))
                    .collect();
                let edges: Vec<Edge> = pairs
                    .into_iter()
                    .filter(|(s, t)| s != t)
                    .map(|(s, t)| Edge::new(&format!("n{:02}", s), &format!("n{:02}", t), "related_to"))
                    .collect();
                let corpus = Corpus::new(nodes, edges).unwrap();
                corpus.with_features(features).unwrap()
            })
    })
}

fn arb_mode() -> impl Strategy<Value = WeightMode> {
    prop_oneof![
        Just(WeightMode::Adaptive),
        (0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0)
            .prop_filter("non-zero weights", |(a, b, c)| a + b + c > 1e-3)
            .prop_map(|(a, b, c)| {
                let s = a + b + c;
                WeightMode::Fixed(IntentProfile::new(a / s, b / s, c / s))
            }),
    ]
}

proptest! {
    #[test]
    fn normalize_stays_in_unit_range(values in prop::collection::vec(-1e6f64..1e6, 0..40)) {
        let out = normalize(&values);
        prop_assert_eq!(out.len(), values.len());
        for v in &out {
            prop_assert!((0.0..=1.0).contains(v), "normalized to {}", v);
        }
        let distinct = values.iter().any(|v| (v - values[0]).abs() >= f64::EPSILON);
        if distinct {
            prop_assert!(out.iter().any(|v| (v - 1.0).abs() < EPS));
            prop_assert!(out.iter().any(|v| v.abs() < EPS));
        }
    }

    #[test]
    fn equal_values_normalize_by_sign(value in -10.0f64..10.0, len in 1usize..10) {
        let out = normalize(&vec![value; len]);
        let expected = if value > 0.0 { 1.0 } else { 0.0 };
        prop_assert!(out.iter().all(|v| *v == expected));
    }

    #[test]
    fn graph_score_is_a_fraction(
        query in prop::collection::hash_set(prop::sample::select(VOCAB), 0..6),
        neighbors in prop::collection::vec(prop::collection::hash_set(prop::sample::select(VOCAB), 0..8), 0..6),
    ) {
        let query: HashSet<String> = query.into_iter().map(String::from).collect();
        let neighbors: Vec<HashSet<String>> = neighbors
            .into_iter()
            .map(|s| s.into_iter().map(String::from).collect())
            .collect();
        let refs: Vec<&HashSet<String>> = neighbors.iter().collect();
        let score = graph_score(&query, &refs);
        prop_assert!((0.0..=1.0 + EPS).contains(&score), "graph score {}", score);
        if query.is_empty() || refs.is_empty() {
            prop_assert_eq!(score, 0.0);
        }
    }

    #[test]
    fn vector_score_is_clamped(
        a in prop::collection::vec(-5.0f32..5.0, 16),
        b in prop::collection::vec(-5.0f32..5.0, 16),
    ) {
        let s = vector_score(&a, &b).unwrap();
        prop_assert!((0.0..=1.0 + EPS).contains(&s), "vector score {}", s);
    }

    #[test]
    fn fused_scores_bounded_and_ordered(
        corpus in arb_corpus(),
        query in arb_text(5),
        query_vec in prop::collection::vec(-1.0f32..1.0, 8),
        mode in arb_mode(),
    ) {
        let n = corpus.len();
        let engine = RetrievalEngine::new(Arc::new(corpus), &IntentTables::builtin().unwrap(), &RetrievalConfig::default())
            .unwrap()
            .with_mode(mode)
            .unwrap();
        let ranking = engine
            .retrieve(&Query::new(&query).with_limit(n).with_embedding(query_vec))
            .unwrap();

        prop_assert_eq!(ranking.hits.len(), n);
        prop_assert!((ranking.profile.sum() - 1.0).abs() < 1e-6);
        for hit in &ranking.hits {
            let b = hit.breakdown;
            for s in [hit.score, b.vector, b.keyword, b.graph] {
                prop_assert!((-EPS..=1.0 + EPS).contains(&s), "{} scored {}", hit.node_id, s);
            }
        }
        for w in ranking.hits.windows(2) {
            prop_assert!(
                w[0].score > w[1].score || (w[0].score == w[1].score && w[0].node_id < w[1].node_id),
                "{} ({}) before {} ({})", w[0].node_id, w[0].score, w[1].node_id, w[1].score
            );
        }
    }

    #[test]
    fn projection_output_has_target_dim(
        samples in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 48), 3..10),
        strategy in prop_oneof![
            Just(ProjectionStrategy::Truncate),
            Just(ProjectionStrategy::Pca),
            Just(ProjectionStrategy::LearnedLinear),
        ],
        target in 32usize..=64,
    ) {
        let edges = (1..samples.len()).map(|i| (i - 1, i)).collect();
        let data = FitData::new(samples.iter().cloned().map(SourceEmbeddings::single).collect(), edges);
        let model = ProjectionModel::fit(&ProjectionConfig::new(strategy, target), &data).unwrap();
        for s in &data.samples {
            let a = model.project(s).unwrap();
            let b = model.project(s).unwrap();
            prop_assert_eq!(a.len(), target);
            prop_assert_eq!(a, b);
        }
    }
}

#[test]
fn builtin_profiles_sum_to_one() {
    let tables = IntentTables::builtin().unwrap();
    for (intent, profile) in tables.profiles.iter() {
        assert!(profile.validate(intent.as_str()).is_ok(), "{}", intent);
    }
}
