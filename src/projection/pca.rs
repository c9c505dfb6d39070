/// Principal component analysis over a sample of embeddings.
///
/// Centers the samples and decomposes whichever is smaller: the d×d covariance matrix or
/// the n×n Gram matrix (components are then recovered as Xᵀu). Components beyond the
/// data's rank, or with negligible variance, are zero rows, so the output always has
/// `target_dim` entries and the unfilled tail is exactly zero.

use serde::{Deserialize, Serialize};

use super::linalg::{dot, symmetric_eigen, to_f64};
use super::{ProjectionError, ProjectionStrategy};

/// Relative eigenvalue floor below which a direction counts as empty.
const VARIANCE_FLOOR: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaBasis {
    pub mean: Vec<f32>,
    /// `target_dim` rows of length d; rows past the data's rank are all zero
    pub components: Vec<Vec<f32>>,
    /// Variance captured by each component (0 for padding rows)
    pub explained_variance: Vec<f32>,
}

impl PcaBasis {
    /// Fit a basis of `target_dim` components to `samples` (all of equal length).
    ///
    /// The eigendecomposition runs on an m×m matrix with m = min(samples, source
    /// dimension), and each Jacobi sweep costs O(m³). Fitting stays fast while either
    /// side is in the hundreds but takes minutes once both pass a thousand or so
    /// (e.g. 1536-wide vectors over a corpus of several thousand nodes).
    pub fn fit(
        samples: &[Vec<f32>],
        target_dim: usize,
        strategy: ProjectionStrategy,
    ) -> Result<Self, ProjectionError> {
        let Some(first) = samples.first() else {
            return Err(ProjectionError::EmptyCorpus(strategy));
        };
        let d = first.len();
        let n = samples.len();

        let mut mean = vec![0.0f64; d];
        for s in samples {
            if s.len() != d {
                return Err(ProjectionError::DimensionMismatch { expected: d, actual: s.len() });
            }
            for (m, &x) in mean.iter_mut().zip(s) {
                *m += x as f64;
            }
        }
        for m in mean.iter_mut() {
            *m /= n as f64;
        }

        let centered: Vec<Vec<f64>> = samples
            .iter()
            .map(|s| s.iter().zip(&mean).map(|(&x, m)| x as f64 - m).collect())
            .collect();
        let denom = (n.saturating_sub(1)).max(1) as f64;

        let use_gram = gram_path(n, d);
        tracing::info!(
            strategy = %strategy,
            path = if use_gram { "gram" } else { "covariance" },
            matrix = n.min(d),
            samples = n,
            source_dim = d,
            target_dim,
            "Fitting PCA basis"
        );

        let (values, directions) = if use_gram {
            let gram: Vec<Vec<f64>> = centered
                .iter()
                .map(|a| centered.iter().map(|b| dot(a, b) / denom).collect())
                .collect();
            let (values, vectors) = symmetric_eigen(gram);
            // v = Xᵀu, renormalized to unit length
            let directions = vectors
                .iter()
                .map(|u| {
                    let mut v = vec![0.0f64; d];
                    for (ui, row) in u.iter().zip(&centered) {
                        for (vj, xj) in v.iter_mut().zip(row) {
                            *vj += ui * xj;
                        }
                    }
                    let len = dot(&v, &v).sqrt();
                    if len > 0.0 {
                        v.iter_mut().for_each(|x| *x /= len);
                    }
                    super::linalg::fix_sign(&mut v);
                    v
                })
                .collect::<Vec<_>>();
            (values, directions)
        } else {
            let mut cov = vec![vec![0.0f64; d]; d];
            for row in &centered {
                for i in 0..d {
                    let ri = row[i];
                    if ri == 0.0 {
                        continue;
                    }
                    for j in i..d {
                        cov[i][j] += ri * row[j];
                    }
                }
            }
            for i in 0..d {
                for j in i..d {
                    cov[i][j] /= denom;
                    cov[j][i] = cov[i][j];
                }
            }
            symmetric_eigen(cov)
        };

        let top = values.first().copied().unwrap_or(0.0).max(0.0);
        let floor = top * VARIANCE_FLOOR + f64::MIN_POSITIVE;

        let mut components = Vec::with_capacity(target_dim);
        let mut explained_variance = Vec::with_capacity(target_dim);
        for k in 0..target_dim {
            match (values.get(k), directions.get(k)) {
                (Some(&lambda), Some(dir)) if lambda > floor => {
                    components.push(dir.iter().map(|&x| x as f32).collect());
                    explained_variance.push(lambda as f32);
                }
                _ => {
                    components.push(vec![0.0f32; d]);
                    explained_variance.push(0.0);
                }
            }
        }

        let kept = explained_variance.iter().filter(|v| **v > 0.0).count();
        if kept < target_dim {
            tracing::debug!(
                samples = n,
                source_dim = d,
                target_dim,
                kept,
                "PCA rank below target, zero-padding remaining components"
            );
        }

        Ok(PcaBasis {
            mean: mean.iter().map(|&m| m as f32).collect(),
            components,
            explained_variance,
        })
    }

    pub fn source_dim(&self) -> usize {
        self.mean.len()
    }

    /// Number of non-padding components.
    pub fn rank(&self) -> usize {
        self.explained_variance.iter().filter(|v| **v > 0.0).count()
    }

    /// Project `x` onto the basis. Caller guarantees `x.len() == source_dim()`.
    pub fn apply(&self, x: &[f32]) -> Vec<f32> {
        let centered: Vec<f64> = x
            .iter()
            .zip(&self.mean)
            .map(|(&v, &m)| v as f64 - m as f64)
            .collect();
        self.components
            .iter()
            .map(|c| {
                if c.iter().all(|v| *v == 0.0) {
                    0.0
                } else {
                    dot(&to_f64(c), &centered) as f32
                }
            })
            .collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.mean.len() * (self.components.len() + 1)
    }
}

/// Decompose the n×n Gram matrix instead of the d×d covariance when samples are fewer.
fn gram_path(samples: usize, source_dim: usize) -> bool {
    samples <= source_dim
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Vec<f32>> {
        // variance concentrated on axis 0, then axis 2
        vec![
            vec![4.0, 0.0, 1.0, 0.0],
            vec![-4.0, 0.0, -1.0, 0.0],
            vec![2.0, 0.0, -0.5, 0.0],
            vec![-2.0, 0.0, 0.5, 0.0],
            vec![0.0, 0.0, 0.0, 0.0],
        ]
    }

    #[test]
    fn test_empty_corpus_fails() {
        let err = PcaBasis::fit(&[], 4, ProjectionStrategy::Pca).unwrap_err();
        assert!(matches!(err, ProjectionError::EmptyCorpus(ProjectionStrategy::Pca)));
    }

    #[test]
    fn test_components_ordered_by_variance() {
        let basis = PcaBasis::fit(&samples(), 2, ProjectionStrategy::Pca).unwrap();
        assert_eq!(basis.components.len(), 2);
        assert!(basis.explained_variance[0] >= basis.explained_variance[1]);
        // first component is dominated by axis 0
        assert!(basis.components[0][0].abs() > 0.9);
    }

    #[test]
    fn test_rank_deficient_rows_are_zero() {
        // samples lie in a 2-d subspace of R^4; ask for 4 components
        let basis = PcaBasis::fit(&samples(), 4, ProjectionStrategy::Pca).unwrap();
        assert!(basis.rank() <= 2);
        for row in &basis.components[2..] {
            assert!(row.iter().all(|v| *v == 0.0));
        }
        let out = basis.apply(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out.len(), 4);
        assert_eq!(&out[2..], &[0.0, 0.0]);
    }

    #[test]
    fn test_gram_and_covariance_paths_agree() {
        let narrow = samples(); // n = 5 > d = 4 → covariance path
        let cov = PcaBasis::fit(&narrow, 1, ProjectionStrategy::Pca).unwrap();
        let gram = PcaBasis::fit(&narrow[..4], 1, ProjectionStrategy::Pca).unwrap(); // n = 4 <= d → Gram path
        let dot: f32 = cov.components[0].iter().zip(&gram.components[0]).map(|(a, b)| a * b).sum();
        assert!(dot.abs() > 0.99, "leading directions disagree: {}", dot);
    }

    #[test]
    fn test_decomposition_runs_on_smaller_side() {
        assert!(gram_path(300, 1536));
        assert!(gram_path(1536, 1536));
        assert!(!gram_path(5000, 1536));
        assert!(!gram_path(5, 4));
    }

    #[test]
    fn test_mismatched_sample_lengths() {
        let err = PcaBasis::fit(&[vec![1.0, 2.0], vec![1.0]], 1, ProjectionStrategy::Pca).unwrap_err();
        assert!(matches!(err, ProjectionError::DimensionMismatch { expected: 2, actual: 1 }));
    }
}
