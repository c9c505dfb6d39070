/// Benchmark harness for comparing retrieval and projection configurations.
///
/// Provides dataset types, metrics, the runner with its per-configuration state machine,
/// and report/log output. A configuration either varies the fusion weights
/// (`ConfigKind::Weights`) or the embedding projection (`ConfigKind::Projection`).

pub mod dataset;
pub mod metrics;
pub mod report;
pub mod runner;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embedding::BackendSpec;
use crate::intent::WeightMode;
use crate::projection::{ProjectionConfig, ProjectionStrategy};

use self::metrics::{ProbeOutcome, TypeSimilarity};

/// One named configuration to evaluate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub name: String,
    #[serde(flatten)]
    pub kind: ConfigKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigKind {
    /// Full three-signal fusion under `mode`; raw backend vectors feed the vector signal.
    Weights {
        mode: WeightMode,
        #[serde(default)]
        vector_backend: Option<BackendSpec>,
    },
    /// Vector-only ranking over projected features, isolating embedding quality.
    Projection {
        projection: ProjectionConfig,
        primary: BackendSpec,
        #[serde(default)]
        secondary: Option<BackendSpec>,
    },
}

impl BenchmarkConfig {
    pub fn weights(name: &str, mode: WeightMode, vector_backend: Option<BackendSpec>) -> Self {
        BenchmarkConfig {
            name: name.to_string(),
            kind: ConfigKind::Weights { mode, vector_backend },
        }
    }

    pub fn projection(
        name: &str,
        projection: ProjectionConfig,
        primary: BackendSpec,
        secondary: Option<BackendSpec>,
    ) -> Self {
        BenchmarkConfig {
            name: name.to_string(),
            kind: ConfigKind::Projection { projection, primary, secondary },
        }
    }

    /// Backends this configuration loads, in load order.
    pub fn backends(&self) -> Vec<&BackendSpec> {
        match &self.kind {
            ConfigKind::Weights { vector_backend, .. } => vector_backend.iter().collect(),
            ConfigKind::Projection { primary, secondary, .. } => {
                std::iter::once(primary).chain(secondary.iter()).collect()
            }
        }
    }
}

/// Predefined configurations for comparison runs.
pub fn default_configs() -> Vec<BenchmarkConfig> {
    let primary = BackendSpec::hashing(256, 0);
    let secondary = BackendSpec::hashing(256, 1);
    let projected = |name: &str, strategy: ProjectionStrategy, two: bool| {
        BenchmarkConfig::projection(
            name,
            ProjectionConfig::new(strategy, 64),
            primary.clone(),
            two.then(|| secondary.clone()),
        )
    };

    vec![
        BenchmarkConfig::weights("fixed", WeightMode::baseline(), Some(primary.clone())),
        BenchmarkConfig::weights("adaptive", WeightMode::Adaptive, Some(primary.clone())),
        projected("truncate-64", ProjectionStrategy::Truncate, false),
        projected("pca-64", ProjectionStrategy::Pca, false),
        projected("learned-64", ProjectionStrategy::LearnedLinear, false),
        projected("split-64", ProjectionStrategy::SplitSpace, true),
        projected("blend-64", ProjectionStrategy::WeightedBlend, true),
        projected("concat-pca-64", ProjectionStrategy::ConcatPca, true),
    ]
}

/// Lifecycle of one configuration run.
///
/// `Pending → Loading → Scoring → Unloading → Done`; `Failed` is reachable from any
/// non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Pending,
    Loading,
    Scoring,
    Unloading,
    Done,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }

    pub fn can_advance_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Pending, Loading) | (Loading, Scoring) | (Scoring, Unloading) | (Unloading, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Pending => "pending",
            RunPhase::Loading => "loading",
            RunPhase::Scoring => "scoring",
            RunPhase::Unloading => "unloading",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of one configuration. Failed runs keep their error and the phase they reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub run_id: Uuid,
    pub config_name: String,
    pub config: ConfigKind,
    pub timestamp: DateTime<Utc>,
    /// `Done` or `Failed`
    pub status: RunPhase,
    /// Last non-terminal phase entered
    pub phase_reached: RunPhase,
    pub phases: Vec<RunPhase>,
    pub error: Option<String>,
    pub k: usize,
    pub mrr: f64,
    pub recall_at_k: f64,
    pub probes: Vec<ProbeOutcome>,
    pub type_similarity: Option<TypeSimilarity>,
    pub mean_probe_ms: f64,
    pub total_ms: u64,
    pub peak_resident_bytes: usize,
    pub backends: Vec<String>,
}

impl BenchmarkResult {
    pub fn succeeded(&self) -> bool {
        self.status == RunPhase::Done
    }

    pub fn outcome(&self, probe_id: &str) -> Option<&ProbeOutcome> {
        self.probes.iter().find(|p| p.probe_id == probe_id)
    }
}
