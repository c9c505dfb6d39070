/// Embedding projection: compress raw embeddings from one or two source models into a
/// fixed-size feature vector.
///
/// `fit` turns a `ProjectionConfig` plus training data into an immutable `ProjectionModel`;
/// `ProjectionModel::project` applies it. Every projected vector has exactly
/// `target_dim` entries. Strategies are a closed enum dispatched with `match`, so adding
/// one is a compile-time checked change in this file.

pub mod hybrid;
pub mod learned;
pub mod linalg;
pub mod pca;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::corpus::Corpus;
use crate::errors::{EngineError, ErrorKind};

use self::hybrid::BlendModel;
use self::learned::LinearMap;
use self::linalg::{fnv1a, l2_normalize, prefix_padded, FNV_OFFSET};
use self::pca::PcaBasis;

pub const MIN_TARGET_DIM: usize = 32;
pub const MAX_TARGET_DIM: usize = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionStrategy {
    /// First `target_dim` components of the primary embedding
    Truncate,
    /// Principal components of the corpus
    #[default]
    Pca,
    /// Linear map trained on graph edges with a margin-ranking loss
    LearnedLinear,
    /// Prefix slices of two source embeddings, concatenated
    SplitSpace,
    /// Per-source PCA, then a weighted sum
    WeightedBlend,
    /// PCA over the concatenation of both sources. Each source is L2-normalized
    /// before concatenation so neither dominates the shared components by scale.
    ConcatPca,
}

impl ProjectionStrategy {
    pub const ALL: [ProjectionStrategy; 6] = [
        ProjectionStrategy::Truncate,
        ProjectionStrategy::Pca,
        ProjectionStrategy::LearnedLinear,
        ProjectionStrategy::SplitSpace,
        ProjectionStrategy::WeightedBlend,
        ProjectionStrategy::ConcatPca,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectionStrategy::Truncate => "truncate",
            ProjectionStrategy::Pca => "pca",
            ProjectionStrategy::LearnedLinear => "learned_linear",
            ProjectionStrategy::SplitSpace => "split_space",
            ProjectionStrategy::WeightedBlend => "weighted_blend",
            ProjectionStrategy::ConcatPca => "concat_pca",
        }
    }

    /// Hybrid strategies consume two source embeddings per node.
    pub fn requires_secondary(&self) -> bool {
        matches!(
            self,
            ProjectionStrategy::SplitSpace
                | ProjectionStrategy::WeightedBlend
                | ProjectionStrategy::ConcatPca
        )
    }
}

impl fmt::Display for ProjectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectionStrategy {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectionStrategy::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ProjectionError::UnknownStrategy(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("target_dim {target_dim} outside supported range 32..=768")]
    InvalidTargetDim { target_dim: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("missing second model: strategy '{0}' needs both a primary and a secondary embedding")]
    MissingSecondModel(ProjectionStrategy),

    #[error("invalid blend weights ({primary}, {secondary}): weights must be non-negative and not both zero")]
    InvalidBlendWeights { primary: f32, secondary: f32 },

    #[error("invalid training configuration: {0}")]
    InvalidTraining(String),

    #[error("insufficient training signal: {0}")]
    InsufficientTrainingSignal(String),

    #[error("cannot fit strategy '{0}' on an empty corpus")]
    EmptyCorpus(ProjectionStrategy),

    #[error("unknown projection strategy '{0}'")]
    UnknownStrategy(String),
}

impl ProjectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProjectionError::InsufficientTrainingSignal(_) | ProjectionError::EmptyCorpus(_) => {
                ErrorKind::DataInsufficiency
            }
            _ => ErrorKind::Configuration,
        }
    }
}

/// Relative weights of the two sources for `weighted_blend`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub primary: f32,
    pub secondary: f32,
}

impl Default for BlendWeights {
    fn default() -> Self {
        BlendWeights { primary: 0.5, secondary: 0.5 }
    }
}

impl BlendWeights {
    pub fn validate(&self) -> Result<(), ProjectionError> {
        let ok = self.primary.is_finite()
            && self.secondary.is_finite()
            && self.primary >= 0.0
            && self.secondary >= 0.0
            && self.primary + self.secondary > 0.0;
        if ok {
            Ok(())
        } else {
            Err(ProjectionError::InvalidBlendWeights {
                primary: self.primary,
                secondary: self.secondary,
            })
        }
    }
}

/// Tunables for `learned_linear`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    pub margin: f32,
    pub batch_size: usize,
    pub weight_decay: f32,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 50,
            learning_rate: 0.05,
            margin: 0.5,
            batch_size: 32,
            weight_decay: 1e-4,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ProjectionError> {
        let fail = |msg: &str| Err(ProjectionError::InvalidTraining(msg.to_string()));
        if self.epochs == 0 {
            return fail("epochs must be at least 1");
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return fail("learning_rate must be positive");
        }
        if !(self.margin.is_finite() && self.margin >= 0.0) {
            return fail("margin must be non-negative");
        }
        if self.batch_size == 0 {
            return fail("batch_size must be at least 1");
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return fail("weight_decay must be non-negative");
        }
        Ok(())
    }
}

/// `[projection]` section of the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub strategy: ProjectionStrategy,
    pub target_dim: usize,
    /// L2-normalize projected vectors
    pub normalize: bool,
    pub blend_weights: BlendWeights,
    pub training: TrainingConfig,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        ProjectionConfig {
            strategy: ProjectionStrategy::default(),
            target_dim: 64,
            normalize: true,
            blend_weights: BlendWeights::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl ProjectionConfig {
    pub fn new(strategy: ProjectionStrategy, target_dim: usize) -> Self {
        ProjectionConfig { strategy, target_dim, ..Default::default() }
    }

    pub fn validate(&self) -> Result<(), ProjectionError> {
        if !(MIN_TARGET_DIM..=MAX_TARGET_DIM).contains(&self.target_dim) {
            return Err(ProjectionError::InvalidTargetDim { target_dim: self.target_dim });
        }
        match self.strategy {
            ProjectionStrategy::WeightedBlend => self.blend_weights.validate(),
            ProjectionStrategy::LearnedLinear => self.training.validate(),
            _ => Ok(()),
        }
    }
}

/// Raw embeddings of one node from the primary and (optionally) secondary model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEmbeddings {
    pub primary: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Vec<f32>>,
}

impl SourceEmbeddings {
    pub fn single(primary: Vec<f32>) -> Self {
        SourceEmbeddings { primary, secondary: None }
    }

    pub fn pair(primary: Vec<f32>, secondary: Vec<f32>) -> Self {
        SourceEmbeddings { primary, secondary: Some(secondary) }
    }

    fn require_secondary(&self, strategy: ProjectionStrategy) -> Result<&[f32], ProjectionError> {
        self.secondary
            .as_deref()
            .ok_or(ProjectionError::MissingSecondModel(strategy))
    }
}

/// Training input: one `SourceEmbeddings` per node plus the true edges between them
/// (as sample indices). Only `learned_linear` reads the edges.
#[derive(Debug, Clone, Default)]
pub struct FitData {
    pub samples: Vec<SourceEmbeddings>,
    pub edges: Vec<(usize, usize)>,
}

impl FitData {
    pub fn new(samples: Vec<SourceEmbeddings>, edges: Vec<(usize, usize)>) -> Self {
        FitData { samples, edges }
    }

    /// Collect node embeddings and edges from a corpus. Every node must carry embeddings.
    pub fn from_corpus(corpus: &Corpus) -> Result<Self, EngineError> {
        let samples = corpus
            .nodes()
            .iter()
            .map(|n| {
                n.embeddings.clone().ok_or_else(|| {
                    EngineError::Corpus(format!("node '{}' has no embeddings to project", n.id))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FitData { samples, edges: corpus.edge_indices() })
    }

    /// Stable hash over every sample value and edge; changes whenever the data does.
    pub fn fingerprint(&self) -> u64 {
        let mut h = fnv1a(&(self.samples.len() as u64).to_le_bytes(), FNV_OFFSET);
        for s in &self.samples {
            h = fnv1a(&(s.primary.len() as u64).to_le_bytes(), h);
            for x in &s.primary {
                h = fnv1a(&x.to_bits().to_le_bytes(), h);
            }
            match &s.secondary {
                Some(sec) => {
                    h = fnv1a(&(sec.len() as u64 + 1).to_le_bytes(), h);
                    for x in sec {
                        h = fnv1a(&x.to_bits().to_le_bytes(), h);
                    }
                }
                None => h = fnv1a(&[0u8], h),
            }
        }
        for (s, t) in &self.edges {
            h = fnv1a(&(*s as u64).to_le_bytes(), h);
            h = fnv1a(&(*t as u64).to_le_bytes(), h);
        }
        h
    }

    fn primaries(&self) -> Vec<Vec<f32>> {
        self.samples.iter().map(|s| s.primary.clone()).collect()
    }

    fn secondaries(&self, strategy: ProjectionStrategy) -> Result<Vec<Vec<f32>>, ProjectionError> {
        self.samples
            .iter()
            .map(|s| s.require_secondary(strategy).map(<[f32]>::to_vec))
            .collect()
    }
}

/// Source dimensionalities a model was fitted on; `None` means any length is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceDims {
    pub primary: Option<usize>,
    pub secondary: Option<usize>,
}

impl SourceDims {
    fn of(data: &FitData) -> Self {
        match data.samples.first() {
            Some(s) => SourceDims {
                primary: Some(s.primary.len()),
                secondary: s.secondary.as_ref().map(Vec::len),
            },
            None => SourceDims::default(),
        }
    }

    fn check(&self, input: &SourceEmbeddings) -> Result<(), ProjectionError> {
        check_len(self.primary, input.primary.len())?;
        if let (Some(expected), Some(sec)) = (self.secondary, &input.secondary) {
            check_len(Some(expected), sec.len())?;
        }
        Ok(())
    }
}

impl fmt::Display for SourceDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.primary, self.secondary) {
            (Some(p), Some(s)) => write!(f, "{}+{}", p, s),
            (Some(p), None) => write!(f, "{}", p),
            _ => f.write_str("any"),
        }
    }
}

fn check_len(expected: Option<usize>, actual: usize) -> Result<(), ProjectionError> {
    match expected {
        Some(expected) if expected != actual => {
            Err(ProjectionError::DimensionMismatch { expected, actual })
        }
        _ => Ok(()),
    }
}

/// Strategy-specific fitted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedParams {
    Truncate,
    Pca(PcaBasis),
    LearnedLinear(LinearMap),
    SplitSpace,
    WeightedBlend(BlendModel),
    ConcatPca(PcaBasis),
}

impl FittedParams {
    /// Number of stored f32 parameters.
    pub fn parameter_count(&self) -> usize {
        match self {
            FittedParams::Truncate | FittedParams::SplitSpace => 0,
            FittedParams::Pca(b) | FittedParams::ConcatPca(b) => b.parameter_count(),
            FittedParams::LearnedLinear(m) => m.parameter_count(),
            FittedParams::WeightedBlend(m) => m.parameter_count(),
        }
    }
}

/// A fitted projection. Immutable; refit to change anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionModel {
    pub strategy: ProjectionStrategy,
    pub target_dim: usize,
    pub normalize: bool,
    pub source_dims: SourceDims,
    /// `FitData::fingerprint` of the data this model was fitted on
    pub corpus_fingerprint: u64,
    pub params: FittedParams,
}

/// Fit a projection model. Blocking and CPU-bound; async callers should use
/// `tokio::task::spawn_blocking`.
pub fn fit(config: &ProjectionConfig, data: &FitData) -> Result<ProjectionModel, ProjectionError> {
    ProjectionModel::fit(config, data)
}

/// Project one node's raw embeddings with `model`.
pub fn project(model: &ProjectionModel, input: &SourceEmbeddings) -> Result<Vec<f32>, ProjectionError> {
    model.project(input)
}

impl ProjectionModel {
    pub fn fit(config: &ProjectionConfig, data: &FitData) -> Result<Self, ProjectionError> {
        config.validate()?;
        let strategy = config.strategy;
        let target = config.target_dim;

        let dims = SourceDims::of(data);
        for s in &data.samples {
            dims.check(s)?;
            if strategy.requires_secondary() {
                s.require_secondary(strategy)?;
            }
        }

        let params = match strategy {
            ProjectionStrategy::Truncate => FittedParams::Truncate,
            ProjectionStrategy::SplitSpace => FittedParams::SplitSpace,
            ProjectionStrategy::Pca => {
                FittedParams::Pca(PcaBasis::fit(&data.primaries(), target, strategy)?)
            }
            ProjectionStrategy::LearnedLinear => {
                FittedParams::LearnedLinear(LinearMap::train(&data.primaries(), &data.edges, target, &config.training)?)
            }
            ProjectionStrategy::WeightedBlend => FittedParams::WeightedBlend(BlendModel::fit(
                &data.primaries(),
                &data.secondaries(strategy)?,
                target,
                config.blend_weights,
            )?),
            ProjectionStrategy::ConcatPca => {
                let joined: Vec<Vec<f32>> = data
                    .primaries()
                    .iter()
                    .zip(data.secondaries(strategy)?)
                    .map(|(p, s)| hybrid::concat_normalized(p, &s))
                    .collect();
                FittedParams::ConcatPca(PcaBasis::fit(&joined, target, strategy)?)
            }
        };

        let model = ProjectionModel {
            strategy,
            target_dim: target,
            normalize: config.normalize,
            source_dims: dims,
            corpus_fingerprint: data.fingerprint(),
            params,
        };

        tracing::info!(
            strategy = %strategy,
            target_dim = target,
            samples = data.samples.len(),
            parameters = model.params.parameter_count(),
            "Projection model fitted"
        );
        Ok(model)
    }

    /// Project raw embeddings to exactly `target_dim` values.
    ///
    /// Deterministic: the same model and input always give bit-identical output.
    pub fn project(&self, input: &SourceEmbeddings) -> Result<Vec<f32>, ProjectionError> {
        self.source_dims.check(input)?;
        let target = self.target_dim;

        let mut out = match &self.params {
            FittedParams::Truncate => prefix_padded(&input.primary, target),
            FittedParams::Pca(basis) => basis.apply(&input.primary),
            FittedParams::LearnedLinear(map) => map.apply(&input.primary),
            FittedParams::SplitSpace => {
                hybrid::split_space(&input.primary, input.require_secondary(self.strategy)?, target)
            }
            FittedParams::WeightedBlend(model) => {
                model.apply(&input.primary, input.require_secondary(self.strategy)?)
            }
            FittedParams::ConcatPca(basis) => {
                let joined = hybrid::concat_normalized(&input.primary, input.require_secondary(self.strategy)?);
                basis.apply(&joined)
            }
        };

        if self.normalize {
            l2_normalize(&mut out);
        }
        Ok(out)
    }

    pub fn project_all(&self, inputs: &[SourceEmbeddings]) -> Result<Vec<Vec<f32>>, ProjectionError> {
        inputs.iter().map(|i| self.project(i)).collect()
    }

    /// Whether this model still matches the data and dimensionality it would be used with.
    pub fn is_valid_for(&self, fingerprint: u64, target_dim: usize) -> bool {
        self.corpus_fingerprint == fingerprint && self.target_dim == target_dim
    }

    /// Check that a consumer expecting `required` values per vector can use this model.
    pub fn ensure_output_len(&self, required: usize) -> Result<(), ProjectionError> {
        if self.target_dim != required {
            return Err(ProjectionError::DimensionMismatch {
                expected: required,
                actual: self.target_dim,
            });
        }
        Ok(())
    }

    pub fn parameter_count(&self) -> usize {
        self.params.parameter_count()
    }

    pub fn resident_bytes(&self) -> usize {
        self.parameter_count() * std::mem::size_of::<f32>()
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), strategy = %self.strategy, "Projection model saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| EngineError::Config(format!("invalid projection model {}: {}", path.display(), e)))
    }
}

/// Keeps one fitted model per configuration and refits it when the training data or
/// target dimensionality changes.
#[derive(Debug, Clone)]
pub struct Projector {
    config: ProjectionConfig,
    model: Option<ProjectionModel>,
}

impl Projector {
    pub fn new(config: ProjectionConfig) -> Result<Self, ProjectionError> {
        config.validate()?;
        Ok(Projector { config, model: None })
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    pub fn model(&self) -> Option<&ProjectionModel> {
        self.model.as_ref()
    }

    /// Return a model valid for `data`, fitting only when the cached one is stale.
    pub fn ensure_fitted(&mut self, data: &FitData) -> Result<&ProjectionModel, ProjectionError> {
        let fingerprint = data.fingerprint();
        let stale = !self
            .model
            .as_ref()
            .is_some_and(|m| m.is_valid_for(fingerprint, self.config.target_dim));
        if stale {
            if self.model.is_some() {
                tracing::info!(strategy = %self.config.strategy, "Training data changed, refitting projection");
            }
            self.model = Some(ProjectionModel::fit(&self.config, data)?);
        }
        match &self.model {
            Some(m) => Ok(m),
            None => Err(ProjectionError::EmptyCorpus(self.config.strategy)),
        }
    }

    /// Project every sample of `data` for a consumer that expects `consumer_dim` values.
    pub fn features_for(
        &mut self,
        consumer_dim: usize,
        data: &FitData,
    ) -> Result<Vec<Vec<f32>>, ProjectionError> {
        let model = self.ensure_fitted(data)?;
        model.ensure_output_len(consumer_dim)?;
        model.project_all(&data.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-embeddings: `n` samples of length `dim`.
    fn samples(n: usize, dim: usize, salt: u32) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| {
                (0..dim)
                    .map(|j| {
                        let x = (i as u32 + 1)
                            .wrapping_mul(2654435761)
                            .wrapping_add((j as u32 + salt).wrapping_mul(40503));
                        (x % 1000) as f32 / 500.0 - 1.0
                    })
                    .collect()
            })
            .collect()
    }

    fn single_data(n: usize, dim: usize) -> FitData {
        FitData::new(samples(n, dim, 0).into_iter().map(SourceEmbeddings::single).collect(), vec![])
    }

    fn pair_data(n: usize, dim: usize) -> FitData {
        let primary = samples(n, dim, 0);
        let secondary = samples(n, dim / 2, 7);
        FitData::new(
            primary.into_iter().zip(secondary).map(|(p, s)| SourceEmbeddings::pair(p, s)).collect(),
            vec![],
        )
    }

    #[test]
    fn test_target_dim_bounds() {
        for bad in [0, 31, 769, 4096] {
            let err = ProjectionConfig::new(ProjectionStrategy::Pca, bad).validate().unwrap_err();
            assert!(matches!(err, ProjectionError::InvalidTargetDim { target_dim } if target_dim == bad));
        }
        assert!(ProjectionConfig::new(ProjectionStrategy::Pca, 32).validate().is_ok());
        assert!(ProjectionConfig::new(ProjectionStrategy::Pca, 768).validate().is_ok());
    }

    #[test]
    fn test_pca_pads_to_target_when_samples_are_few() {
        let data = single_data(10, 96);
        let model = fit(&ProjectionConfig::new(ProjectionStrategy::Pca, 54), &data).unwrap();
        for s in &data.samples {
            let out = project(&model, s).unwrap();
            assert_eq!(out.len(), 54);
            assert!(out[10..].iter().all(|v| *v == 0.0), "tail not zero: {:?}", &out[10..]);
        }
        // unseen input is padded the same way
        let unseen = SourceEmbeddings::single(samples(1, 96, 99).remove(0));
        let out = model.project(&unseen).unwrap();
        assert_eq!(out.len(), 54);
        assert!(out[10..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_projection_is_idempotent() {
        let mut data = pair_data(12, 64);
        data.edges = vec![(0, 1), (1, 2), (3, 4), (5, 6), (7, 8), (9, 10)];
        for strategy in ProjectionStrategy::ALL {
            let model = fit(&ProjectionConfig::new(strategy, 32), &data).unwrap();
            let a = model.project(&data.samples[3]).unwrap();
            let b = model.project(&data.samples[3]).unwrap();
            assert_eq!(a.len(), 32, "{}", strategy);
            let bits_a: Vec<u32> = a.iter().map(|x| x.to_bits()).collect();
            let bits_b: Vec<u32> = b.iter().map(|x| x.to_bits()).collect();
            assert_eq!(bits_a, bits_b, "{} not deterministic", strategy);
        }
    }

    #[test]
    fn test_concat_pca_ignores_source_scale() {
        let data = pair_data(12, 64);
        let scaled = FitData::new(
            data.samples
                .iter()
                .map(|s| {
                    let secondary = s.secondary.as_ref().unwrap().iter().map(|x| x * 1024.0).collect();
                    SourceEmbeddings::pair(s.primary.clone(), secondary)
                })
                .collect(),
            vec![],
        );
        let config = ProjectionConfig::new(ProjectionStrategy::ConcatPca, 32);
        let a = fit(&config, &data).unwrap().project(&data.samples[2]).unwrap();
        let b = fit(&config, &scaled).unwrap().project(&scaled.samples[2]).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4, "{} vs {}", x, y);
        }
    }

    #[test]
    fn test_truncate_pads_and_normalizes() {
        let model = fit(&ProjectionConfig::new(ProjectionStrategy::Truncate, 32), &FitData::default()).unwrap();
        let out = model.project(&SourceEmbeddings::single(vec![3.0, 4.0])).unwrap();
        assert_eq!(out.len(), 32);
        assert!((out[0] - 0.6).abs() < 1e-6 && (out[1] - 0.8).abs() < 1e-6);
        assert!(out[2..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_split_space_requires_second_model() {
        let single = single_data(4, 64);
        let err = fit(&ProjectionConfig::new(ProjectionStrategy::SplitSpace, 32), &single).unwrap_err();
        assert!(matches!(err, ProjectionError::MissingSecondModel(ProjectionStrategy::SplitSpace)));

        let model = fit(&ProjectionConfig::new(ProjectionStrategy::SplitSpace, 32), &FitData::default()).unwrap();
        let err = model.project(&SourceEmbeddings::single(vec![1.0; 64])).unwrap_err();
        assert!(matches!(err, ProjectionError::MissingSecondModel(_)));
        assert!(err.to_string().contains("missing second model"));
    }

    #[test]
    fn test_dimension_mismatch_after_fit() {
        let data = single_data(8, 64);
        let model = fit(&ProjectionConfig::new(ProjectionStrategy::Pca, 32), &data).unwrap();
        let err = model.project(&SourceEmbeddings::single(vec![0.5; 48])).unwrap_err();
        assert!(matches!(err, ProjectionError::DimensionMismatch { expected: 64, actual: 48 }));
    }

    #[test]
    fn test_ensure_output_len() {
        let data = single_data(8, 64);
        let model = fit(&ProjectionConfig::new(ProjectionStrategy::Pca, 32), &data).unwrap();
        assert!(model.ensure_output_len(32).is_ok());
        assert!(matches!(
            model.ensure_output_len(64),
            Err(ProjectionError::DimensionMismatch { expected: 64, actual: 32 })
        ));
    }

    #[test]
    fn test_projector_refits_on_change() {
        let mut projector = Projector::new(ProjectionConfig::new(ProjectionStrategy::Pca, 32)).unwrap();
        let data = single_data(8, 64);
        let first = projector.ensure_fitted(&data).unwrap().corpus_fingerprint;
        let again = projector.ensure_fitted(&data).unwrap().corpus_fingerprint;
        assert_eq!(first, again);

        let changed = single_data(9, 64);
        let refit = projector.ensure_fitted(&changed).unwrap().corpus_fingerprint;
        assert_ne!(first, refit);

        let features = projector.features_for(32, &changed).unwrap();
        assert_eq!(features.len(), 9);
        assert!(projector.features_for(48, &changed).is_err());
    }

    #[test]
    fn test_model_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("pca.json");
        let data = pair_data(6, 64);
        let model = fit(&ProjectionConfig::new(ProjectionStrategy::ConcatPca, 32), &data).unwrap();
        model.save(&path).unwrap();
        let loaded = ProjectionModel::load(&path).unwrap();
        assert_eq!(loaded.strategy, ProjectionStrategy::ConcatPca);
        let a = loaded.project(&data.samples[0]).unwrap();
        let b = model.project(&data.samples[0]).unwrap();
        assert_eq!(a.len(), 32);
        assert!(a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-5));
    }

    #[test]
    fn test_strategy_names_round_trip() {
        for s in ProjectionStrategy::ALL {
            assert_eq!(s.as_str().parse::<ProjectionStrategy>().unwrap(), s);
        }
        assert!("svd".parse::<ProjectionStrategy>().is_err());
    }
}
