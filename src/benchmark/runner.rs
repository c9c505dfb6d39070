/// Benchmark runner: evaluates each configuration against the probe set.
///
/// Every configuration walks `Pending → Loading → Scoring → Unloading → Done`:
///
/// 1. Loading: embed node texts and probe queries through the model slot (one backend
///    resident at a time), fit the projection if the configuration has one, build the
///    retrieval engine.
/// 2. Scoring: rank the corpus for every probe and record the rank of the first
///    expected node.
/// 3. Unloading: drop the engine and fitted model, finalize metrics.
///
/// A configuration that fails is recorded as `Failed` with its error and the phase it
/// reached; the remaining configurations still run.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::embedding::{embed_sources, BackendSpec, ModelSlot};
use crate::intent::{IntentProfile, IntentTables, WeightMode};
use crate::projection::{self, FitData, ProjectionConfig};
use crate::search::{Query, RetrievalEngine};

use super::dataset::Dataset;
use super::metrics::{mean_reciprocal_rank, recall_at_k, type_similarity, ProbeOutcome, TypeSimilarity};
use super::report::append_results;
use super::{BenchmarkConfig, BenchmarkResult, ConfigKind, RunPhase};

/// Weights used when a configuration measures embedding quality alone.
const VECTOR_ONLY: WeightMode = WeightMode::Fixed(IntentProfile::new(1.0, 0.0, 0.0));

/// Phase bookkeeping for one configuration run.
#[derive(Debug)]
struct RunTracker {
    phases: Vec<RunPhase>,
}

impl RunTracker {
    fn new() -> Self {
        RunTracker { phases: vec![RunPhase::Pending] }
    }

    fn current(&self) -> RunPhase {
        self.phases.last().copied().unwrap_or(RunPhase::Pending)
    }

    fn advance(&mut self, config: &str, next: RunPhase) {
        let from = self.current();
        if from.can_advance_to(next) {
            tracing::debug!(config, from = %from, to = %next, "Run phase");
            self.phases.push(next);
        } else {
            tracing::warn!(config, from = %from, to = %next, "Ignoring invalid run phase transition");
        }
    }
}

/// Everything Loading produces and Scoring consumes.
struct Prepared {
    engine: RetrievalEngine,
    query_vectors: Option<Vec<Vec<f32>>>,
    peak_resident_bytes: usize,
    backends: Vec<String>,
}

struct Scored {
    outcomes: Vec<ProbeOutcome>,
    type_similarity: Option<TypeSimilarity>,
}

pub struct Harness {
    slot: ModelSlot,
    tables: IntentTables,
    retrieval: RetrievalConfig,
    recall_k: usize,
    results_log: Option<std::path::PathBuf>,
    progress: bool,
}

impl Harness {
    pub fn new(slot: ModelSlot, tables: IntentTables, retrieval: RetrievalConfig, recall_k: usize) -> Self {
        Harness {
            slot,
            tables,
            retrieval,
            recall_k: recall_k.max(1),
            results_log: None,
            progress: true,
        }
    }

    /// Append every result to this JSON-lines file.
    pub fn with_results_log(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.results_log = Some(path.into());
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn recall_k(&self) -> usize {
        self.recall_k
    }

    /// Evaluate `configs` in order. Never fails as a whole: each configuration yields a
    /// result, `Done` or `Failed`.
    pub async fn evaluate(&self, configs: &[BenchmarkConfig], dataset: &Dataset) -> Vec<BenchmarkResult> {
        let pb = if self.progress {
            let pb = ProgressBar::new((configs.len() * dataset.probes.len()) as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{pos}/{len}] {msg} [{elapsed_precise} / {eta_precise}]")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut results = Vec::with_capacity(configs.len());
        for config in configs {
            pb.set_message(config.name.clone());
            let result = self.run_config(config, dataset, &pb).await;
            match &result.error {
                None => tracing::info!(
                    config = %result.config_name,
                    mrr = result.mrr,
                    recall = result.recall_at_k,
                    k = result.k,
                    "Configuration evaluated"
                ),
                Some(e) => tracing::warn!(
                    config = %result.config_name,
                    phase = %result.phase_reached,
                    error = %e,
                    "Configuration failed"
                ),
            }
            results.push(result);
        }
        pb.finish_with_message("done");

        if let Some(path) = &self.results_log {
            if let Err(e) = append_results(path, &results) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to append results log");
            }
        }
        results
    }

    async fn run_config(&self, config: &BenchmarkConfig, dataset: &Dataset, pb: &ProgressBar) -> BenchmarkResult {
        let started = Instant::now();
        let mut tracker = RunTracker::new();
        let mut backends = Vec::new();
        let mut peak = 0usize;

        let outcome = self
            .run_phases(config, dataset, pb, &mut tracker, &mut backends, &mut peak)
            .await;
        let phase_reached = tracker.current();

        let mut result = BenchmarkResult {
            run_id: Uuid::new_v4(),
            config_name: config.name.clone(),
            config: config.kind.clone(),
            timestamp: Utc::now(),
            status: RunPhase::Done,
            phase_reached,
            phases: Vec::new(),
            error: None,
            k: self.recall_k,
            mrr: 0.0,
            recall_at_k: 0.0,
            probes: Vec::new(),
            type_similarity: None,
            mean_probe_ms: 0.0,
            total_ms: 0,
            peak_resident_bytes: peak,
            backends,
        };

        match outcome {
            Ok(scored) => {
                tracker.advance(&config.name, RunPhase::Done);
                result.mrr = mean_reciprocal_rank(&scored.outcomes);
                result.recall_at_k = recall_at_k(&scored.outcomes);
                result.mean_probe_ms = if scored.outcomes.is_empty() {
                    0.0
                } else {
                    scored.outcomes.iter().map(|o| o.elapsed_ms).sum::<f64>() / scored.outcomes.len() as f64
                };
                result.type_similarity = scored.type_similarity;
                result.probes = scored.outcomes;
            }
            Err(e) => {
                tracker.advance(&config.name, RunPhase::Failed);
                result.status = RunPhase::Failed;
                result.error = Some(format!("{:#}", e));
                let remaining = dataset.probes.len().saturating_sub(result.probes.len());
                pb.inc(remaining as u64);
            }
        }

        result.phases = tracker.phases;
        result.total_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn run_phases(
        &self,
        config: &BenchmarkConfig,
        dataset: &Dataset,
        pb: &ProgressBar,
        tracker: &mut RunTracker,
        backends: &mut Vec<String>,
        peak: &mut usize,
    ) -> anyhow::Result<Scored> {
        tracker.advance(&config.name, RunPhase::Loading);
        let prepared = match &config.kind {
            ConfigKind::Weights { mode, vector_backend } => {
                self.prepare_weights(*mode, vector_backend.as_ref(), dataset).await?
            }
            ConfigKind::Projection { projection, primary, secondary } => {
                self.prepare_projection(projection, primary, secondary.as_ref(), dataset)
                    .await?
            }
        };
        *backends = prepared.backends.clone();
        *peak = prepared.peak_resident_bytes;

        tracker.advance(&config.name, RunPhase::Scoring);
        let outcomes = self.score(&prepared, dataset, pb)?;
        let vectors: Vec<_> = prepared
            .engine
            .corpus()
            .nodes()
            .iter()
            .filter_map(|n| n.features.as_deref().map(|f| (n.node_type, f)))
            .collect();
        let type_similarity = type_similarity(&vectors);

        tracker.advance(&config.name, RunPhase::Unloading);
        drop(prepared);

        Ok(Scored { outcomes, type_similarity })
    }

    async fn prepare_weights(
        &self,
        mode: WeightMode,
        vector_backend: Option<&BackendSpec>,
        dataset: &Dataset,
    ) -> anyhow::Result<Prepared> {
        let (corpus, query_vectors, peak, backends) = match vector_backend {
            Some(spec) => {
                let mut texts = dataset.node_texts();
                texts.extend(dataset.probe_texts());
                let embedded = embed_sources(&self.slot, spec, None, &texts)
                    .await
                    .with_context(|| format!("embedding with {}", spec))?;
                let table_bytes = embedded.table_bytes();
                let mut vectors: Vec<Vec<f32>> =
                    embedded.embeddings.into_iter().map(|e| e.primary).collect();
                let queries = vectors.split_off(dataset.corpus.len());
                let corpus = dataset.corpus.with_features(vectors)?;
                (
                    Arc::new(corpus),
                    Some(queries),
                    embedded.peak_backend_bytes + table_bytes,
                    embedded.backends,
                )
            }
            None => (Arc::clone(&dataset.corpus), None, 0, Vec::new()),
        };

        let engine = RetrievalEngine::new(corpus, &self.tables, &self.retrieval)?.with_mode(mode)?;
        Ok(Prepared { engine, query_vectors, peak_resident_bytes: peak, backends })
    }

    async fn prepare_projection(
        &self,
        projection: &ProjectionConfig,
        primary: &BackendSpec,
        secondary: Option<&BackendSpec>,
        dataset: &Dataset,
    ) -> anyhow::Result<Prepared> {
        let n = dataset.corpus.len();
        let mut texts = dataset.node_texts();
        texts.extend(dataset.probe_texts());
        let embedded = embed_sources(&self.slot, primary, secondary, &texts)
            .await
            .context("embedding corpus and probes")?;
        let table_bytes = embedded.table_bytes();
        let backend_bytes = embedded.peak_backend_bytes;
        let backends = embedded.backends;

        let mut samples = embedded.embeddings;
        let queries = samples.split_off(n);
        let data = FitData::new(samples, dataset.corpus.edge_indices());

        let config = projection.clone();
        let (model, data) = tokio::task::spawn_blocking(move || {
            projection::fit(&config, &data).map(|model| (model, data))
        })
        .await
        .context("projection fitting task")??;

        let features = model.project_all(&data.samples)?;
        let query_vectors = model.project_all(&queries)?;
        let feature_bytes = (features.len() + query_vectors.len()) * model.target_dim * std::mem::size_of::<f32>();

        let corpus = dataset.corpus.with_features(features)?;
        let engine = RetrievalEngine::new(Arc::new(corpus), &self.tables, &self.retrieval)?.with_mode(VECTOR_ONLY)?;

        Ok(Prepared {
            engine,
            query_vectors: Some(query_vectors),
            peak_resident_bytes: backend_bytes + table_bytes + feature_bytes + model.resident_bytes(),
            backends,
        })
    }

    fn score(&self, prepared: &Prepared, dataset: &Dataset, pb: &ProgressBar) -> anyhow::Result<Vec<ProbeOutcome>> {
        let n = dataset.corpus.len();
        let mut outcomes = Vec::with_capacity(dataset.probes.len());
        for (i, probe) in dataset.probes.iter().enumerate() {
            let started = Instant::now();
            let mut query = Query::new(&probe.query).with_limit(n);
            if let Some(vectors) = &prepared.query_vectors {
                query = query.with_embedding(vectors[i].clone());
            }
            let ranking = prepared
                .engine
                .retrieve(&query)
                .with_context(|| format!("probe '{}'", probe.id))?;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            outcomes.push(ProbeOutcome::from_ranking(&probe.id, &probe.expected, &ranking, self.recall_k, elapsed_ms));
            pb.inc(1);
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::dataset::Probe;
    use crate::corpus::{Corpus, Edge, Node, NodeType};
    use crate::projection::ProjectionStrategy;

    fn dataset() -> Dataset {
        let nodes = vec![
            Node::new("kubecost", NodeType::Tool, "Kubecost", "Kubernetes cost allocation per namespace"),
            Node::new("spot", NodeType::Tool, "Spot Advisor", "Move batch jobs to spot instances"),
            Node::new("vault", NodeType::Tool, "Vault", "Secret storage and credential rotation"),
            Node::new("rotation", NodeType::UseCase, "Credential rotation", "Rotate database passwords automatically"),
            Node::new("grafana", NodeType::Tool, "Grafana", "Dashboards and alerting for metrics"),
        ];
        let edges = vec![
            Edge::new("vault", "rotation", "enables"),
            Edge::new("kubecost", "grafana", "exports_to"),
        ];
        let probes = vec![
            Probe { id: "p1".into(), query: "kubernetes cost".into(), expected: vec!["kubecost".into()], domain: None },
            Probe { id: "p2".into(), query: "rotate passwords".into(), expected: vec!["rotation".into(), "vault".into()], domain: None },
        ];
        Dataset::new("unit", Corpus::new(nodes, edges).unwrap(), probes).unwrap()
    }

    fn harness() -> Harness {
        Harness::new(
            ModelSlot::new(),
            IntentTables::builtin().unwrap(),
            RetrievalConfig::default(),
            3,
        )
        .with_progress(false)
    }

    #[tokio::test]
    async fn test_weights_config_runs_to_done() {
        let configs = vec![BenchmarkConfig::weights("adaptive", WeightMode::Adaptive, Some(BackendSpec::hashing(64, 0)))];
        let results = harness().evaluate(&configs, &dataset()).await;
        let r = &results[0];
        assert!(r.succeeded(), "{:?}", r.error);
        assert_eq!(
            r.phases,
            vec![RunPhase::Pending, RunPhase::Loading, RunPhase::Scoring, RunPhase::Unloading, RunPhase::Done]
        );
        assert_eq!(r.probes.len(), 2);
        assert_eq!(r.recall_at_k, 1.0);
        assert_eq!(r.backends, vec!["hashing-64"]);
        assert!(r.peak_resident_bytes > 0);
    }

    #[tokio::test]
    async fn test_failed_config_is_isolated() {
        let configs = vec![
            BenchmarkConfig::projection(
                "split-missing-second",
                ProjectionConfig::new(ProjectionStrategy::SplitSpace, 32),
                BackendSpec::hashing(64, 0),
                None,
            ),
            BenchmarkConfig::weights("fixed", WeightMode::baseline(), None),
        ];
        let results = harness().evaluate(&configs, &dataset()).await;
        assert_eq!(results.len(), 2);

        let failed = &results[0];
        assert_eq!(failed.status, RunPhase::Failed);
        assert_eq!(failed.phase_reached, RunPhase::Loading);
        assert!(failed.error.as_deref().unwrap_or("").contains("missing second model"));
        assert_eq!(failed.phases.last(), Some(&RunPhase::Failed));

        assert!(results[1].succeeded());
    }

    #[tokio::test]
    async fn test_projection_config_reports_resources() {
        let configs = vec![BenchmarkConfig::projection(
            "pca",
            ProjectionConfig::new(ProjectionStrategy::Pca, 32),
            BackendSpec::hashing(64, 0),
            None,
        )];
        let results = harness().evaluate(&configs, &dataset()).await;
        let r = &results[0];
        assert!(r.succeeded(), "{:?}", r.error);
        assert!(r.type_similarity.is_some());
        // tables (7 texts x 64) + features (7 x 32) + PCA parameters, all f32
        assert!(r.peak_resident_bytes >= (7 * 64 + 7 * 32) * 4);
    }

    #[tokio::test]
    async fn test_results_appended_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("results.jsonl");
        let h = harness().with_results_log(&log);
        let configs = vec![BenchmarkConfig::weights("fixed", WeightMode::baseline(), None)];
        h.evaluate(&configs, &dataset()).await;
        h.evaluate(&configs, &dataset()).await;
        let lines = std::fs::read_to_string(&log).unwrap();
        assert_eq!(lines.lines().count(), 2);
    }
}
