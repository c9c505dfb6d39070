/// Two-model strategies: split_space, weighted_blend and the concatenation used by concat_pca.

use serde::{Deserialize, Serialize};

use super::linalg::{l2_normalize, normalized, prefix_padded};
use super::pca::PcaBasis;
use super::{BlendWeights, ProjectionError, ProjectionStrategy};

/// `[primary[..p], secondary[..s]]` with p = ⌈target/2⌉ and s = target − p.
///
/// Either slice is zero-padded when its source is shorter than its share.
pub fn split_space(primary: &[f32], secondary: &[f32], target_dim: usize) -> Vec<f32> {
    let p = target_dim.div_ceil(2);
    let s = target_dim - p;
    let mut out = prefix_padded(primary, p);
    out.extend(prefix_padded(secondary, s));
    out
}

/// Unit-normalize each source, then concatenate. Keeps the larger model from dominating PCA.
pub fn concat_normalized(primary: &[f32], secondary: &[f32]) -> Vec<f32> {
    let mut out = normalized(primary);
    out.extend(normalized(secondary));
    out
}

/// One PCA basis per source plus the blend weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendModel {
    pub primary: PcaBasis,
    pub secondary: PcaBasis,
    pub weights: BlendWeights,
}

impl BlendModel {
    pub fn fit(
        primary: &[Vec<f32>],
        secondary: &[Vec<f32>],
        target_dim: usize,
        weights: BlendWeights,
    ) -> Result<Self, ProjectionError> {
        weights.validate()?;
        let strategy = ProjectionStrategy::WeightedBlend;
        Ok(BlendModel {
            primary: PcaBasis::fit(primary, target_dim, strategy)?,
            secondary: PcaBasis::fit(secondary, target_dim, strategy)?,
            weights,
        })
    }

    /// `normalize(w₁·ŷ₁ + w₂·ŷ₂)` where ŷᵢ is the unit-normalized PCA projection of source i.
    pub fn apply(&self, primary: &[f32], secondary: &[f32]) -> Vec<f32> {
        let mut a = self.primary.apply(primary);
        let mut b = self.secondary.apply(secondary);
        l2_normalize(&mut a);
        l2_normalize(&mut b);
        let mut out: Vec<f32> = a
            .iter()
            .zip(&b)
            .map(|(x, y)| self.weights.primary * x + self.weights.secondary * y)
            .collect();
        l2_normalize(&mut out);
        out
    }

    pub fn parameter_count(&self) -> usize {
        self.primary.parameter_count() + self.secondary.parameter_count()
    }
}
