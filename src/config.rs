/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: intentrank.toml (in working directory) or an explicit path
/// 3. Environment variables: prefixed INTENTRANK_, nested sections split on "__"
///    (e.g., INTENTRANK_PROJECTION__TARGET_DIM=128)

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::embedding::BackendSpec;
use crate::errors::EngineError;
use crate::projection::ProjectionConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// stderr log format: auto (pretty on a terminal, JSON otherwise), pretty, json
    #[serde(default)]
    pub log_format: LogFormat,

    /// Optional file path for JSON log output (in addition to stderr)
    #[serde(default)]
    pub log_file: Option<String>,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub projection: ProjectionConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub benchmark: BenchmarkSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Auto,
    Pretty,
    Json,
}

/// Tunables for the fusion scorer and its signal computers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Result limit applied when a query does not carry its own
    pub default_limit: usize,
    /// Drop hits scoring below this fused score (None keeps everything)
    pub min_confidence: Option<f64>,
    /// Maximum neighbors consulted by the graph proximity signal
    pub graph_neighbor_limit: usize,
    pub bm25_k1: f64,
    pub bm25_b: f64,
    /// BM25F field weight for node names
    pub name_weight: f64,
    /// BM25F field weight for node descriptions
    pub description_weight: f64,
    /// Multiplier for query terms found in the intent keyword list
    pub intent_boost: f64,
    /// Replacement intent tables (TOML); the compiled-in tables are used when unset
    pub tables_path: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            default_limit: 10,
            min_confidence: None,
            graph_neighbor_limit: 5,
            bm25_k1: 1.2,
            bm25_b: 0.75,
            name_weight: 2.0,
            description_weight: 1.0,
            intent_boost: 5.0,
            tables_path: None,
        }
    }
}

/// Which embedding backends feed the projector.
///
/// Only one backend is ever resident at a time; a secondary backend is loaded after
/// the primary has been released.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub primary: BackendSpec,
    pub secondary: Option<BackendSpec>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            primary: BackendSpec::default(),
            secondary: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkSettings {
    /// Cutoff for recall@K
    pub recall_k: usize,
    /// JSON-lines file that every benchmark run appends its results to
    pub results_log: String,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        BenchmarkSettings {
            recall_k: 10,
            results_log: "data/benchmark/results.jsonl".to_string(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            log_file: None,
            retrieval: RetrievalConfig::default(),
            projection: ProjectionConfig::default(),
            embedding: EmbeddingConfig::default(),
            benchmark: BenchmarkSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, intentrank.toml, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: INTENTRANK_LOG_LEVEL=debug overrides log_level in intentrank.toml
    pub fn load() -> Result<Config, EngineError> {
        Self::load_from(Path::new("intentrank.toml"))
    }

    /// Same layering as `load()` but reading the TOML layer from `path`.
    pub fn load_from(path: &Path) -> Result<Config, EngineError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("INTENTRANK_").split("__"))
            .extract()
            .map_err(|e| EngineError::Config(format!("Failed to load config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make scoring or fitting meaningless.
    pub fn validate(&self) -> Result<(), EngineError> {
        let r = &self.retrieval;
        if r.bm25_k1 <= 0.0 {
            return Err(EngineError::Config("retrieval.bm25_k1 must be positive".into()));
        }
        if !(0.0..=1.0).contains(&r.bm25_b) {
            return Err(EngineError::Config("retrieval.bm25_b must be within [0, 1]".into()));
        }
        if r.name_weight < 0.0 || r.description_weight < 0.0 || r.intent_boost < 0.0 {
            return Err(EngineError::Config(
                "retrieval field weights and intent_boost must be non-negative".into(),
            ));
        }
        if let Some(min) = r.min_confidence {
            if !(0.0..=1.0).contains(&min) {
                return Err(EngineError::Config("retrieval.min_confidence must be within [0, 1]".into()));
            }
        }
        if self.benchmark.recall_k == 0 {
            return Err(EngineError::Config("benchmark.recall_k must be at least 1".into()));
        }
        self.projection.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ProjectionStrategy;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Auto);
        assert_eq!(config.log_file, None);
        assert_eq!(config.retrieval.graph_neighbor_limit, 5);
        assert_eq!(config.retrieval.intent_boost, 5.0);
        assert_eq!(config.benchmark.recall_k, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_projection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intentrank.toml");
        std::fs::write(
            &path,
            "log_level = \"debug\"\nlog_format = \"json\"\n\n[projection]\nstrategy = \"concat_pca\"\ntarget_dim = 128\n\n[retrieval]\nbm25_k1 = 1.5\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.projection.strategy, ProjectionStrategy::ConcatPca);
        assert_eq!(config.projection.target_dim, 128);
        assert_eq!(config.retrieval.bm25_k1, 1.5);
        // untouched sections keep their defaults
        assert_eq!(config.retrieval.bm25_b, 0.75);
    }

    #[test]
    fn test_out_of_range_target_dim_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intentrank.toml");
        std::fs::write(&path, "[projection]\ntarget_dim = 4096\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("4096"), "unexpected error: {}", err);
    }
}
