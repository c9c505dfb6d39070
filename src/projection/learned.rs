/// Learned linear projection trained for link prediction.
///
/// A map W (target × source) is trained so that projected endpoints of true edges score
/// higher, by dot product, than a corrupted edge sharing the same source node:
///
///   loss = max(0, margin − s(u, v) + s(u, w)),   s(a, b) = (W x_a) · (W x_b)
///
/// The gradient of an active triple is (p_w − p_v) x_uᵀ + p_u (x_w − x_v)ᵀ with p = W x.
/// Training is mini-batch SGD with L2 weight decay. Inputs are unit-normalized first.
/// Everything is seeded, so the same data and config always give the same weights.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::linalg::normalized;
use super::{ProjectionError, ProjectionStrategy, TrainingConfig};

/// Attempts at drawing a corrupted target that is neither endpoint of the true edge.
const MAX_CORRUPTION_DRAWS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearMap {
    /// `target_dim` rows of length `source_dim`
    pub weights: Vec<Vec<f32>>,
    /// Mean hinge loss of the final epoch
    pub final_loss: f32,
}

impl LinearMap {
    pub fn train(
        samples: &[Vec<f32>],
        edges: &[(usize, usize)],
        target_dim: usize,
        config: &TrainingConfig,
    ) -> Result<Self, ProjectionError> {
        config.validate()?;
        let Some(first) = samples.first() else {
            return Err(ProjectionError::EmptyCorpus(ProjectionStrategy::LearnedLinear));
        };
        let n = samples.len();
        if n < 2 {
            return Err(ProjectionError::InsufficientTrainingSignal(format!(
                "learned_linear needs at least 2 samples, got {}",
                n
            )));
        }
        if edges.is_empty() {
            return Err(ProjectionError::InsufficientTrainingSignal(
                "learned_linear needs at least one true edge, got 0".to_string(),
            ));
        }
        if let Some((s, t)) = edges.iter().find(|(s, t)| *s >= n || *t >= n) {
            return Err(ProjectionError::InvalidTraining(format!(
                "edge ({}, {}) references a sample outside 0..{}",
                s, t, n
            )));
        }

        let d = first.len();
        let inputs: Vec<Vec<f64>> = samples
            .iter()
            .map(|s| normalized(s).iter().map(|&x| x as f64).collect())
            .collect();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let scale = (1.0 / d.max(1) as f64).sqrt();
        let mut w: Vec<Vec<f64>> = (0..target_dim)
            .map(|_| (0..d).map(|_| rng.random_range(-scale..scale)).collect())
            .collect();

        let lr = config.learning_rate as f64;
        let margin = config.margin as f64;
        let decay = config.weight_decay as f64;
        let mut order: Vec<usize> = (0..edges.len()).collect();
        let mut epoch_loss = 0.0;

        for epoch in 0..config.epochs {
            order.shuffle(&mut rng);
            let mut total = 0.0;

            for batch in order.chunks(config.batch_size) {
                let mut grad = vec![vec![0.0f64; d]; target_dim];
                for &e in batch {
                    let (u, v) = edges[e];
                    let c = corrupt(&mut rng, n, u, v);
                    let (xu, xv, xc) = (&inputs[u], &inputs[v], &inputs[c]);
                    let (pu, pv, pc) = (apply(&w, xu), apply(&w, xv), apply(&w, xc));

                    let loss = margin - dot(&pu, &pv) + dot(&pu, &pc);
                    if loss <= 0.0 {
                        continue;
                    }
                    total += loss;
                    for (k, row) in grad.iter_mut().enumerate() {
                        let a = pc[k] - pv[k];
                        let b = pu[k];
                        for (j, g) in row.iter_mut().enumerate() {
                            *g += a * xu[j] + b * (xc[j] - xv[j]);
                        }
                    }
                }

                let step = lr / batch.len() as f64;
                for (row, grow) in w.iter_mut().zip(&grad) {
                    for (wj, gj) in row.iter_mut().zip(grow) {
                        *wj -= step * gj + lr * decay * *wj;
                    }
                }
            }

            epoch_loss = total / edges.len() as f64;
            if !epoch_loss.is_finite() {
                return Err(ProjectionError::InvalidTraining(format!(
                    "training diverged at epoch {}; lower learning_rate",
                    epoch + 1
                )));
            }
            tracing::trace!(epoch = epoch + 1, loss = epoch_loss, "learned_linear epoch");
        }

        tracing::debug!(
            edges = edges.len(),
            epochs = config.epochs,
            final_loss = epoch_loss,
            "learned_linear training finished"
        );

        Ok(LinearMap {
            weights: w
                .into_iter()
                .map(|row| row.into_iter().map(|x| x as f32).collect())
                .collect(),
            final_loss: epoch_loss as f32,
        })
    }

    /// W · normalize(x)
    pub fn apply(&self, x: &[f32]) -> Vec<f32> {
        let x: Vec<f64> = normalized(x).iter().map(|&v| v as f64).collect();
        self.weights
            .iter()
            .map(|row| row.iter().zip(&x).map(|(w, v)| *w as f64 * v).sum::<f64>() as f32)
            .collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.iter().map(Vec::len).sum()
    }
}

fn apply(w: &[Vec<f64>], x: &[f64]) -> Vec<f64> {
    w.iter().map(|row| dot(row, x)).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    super::linalg::dot(a, b)
}

/// Random node to stand in for `v`, avoiding both endpoints when the corpus allows it.
fn corrupt(rng: &mut StdRng, n: usize, u: usize, v: usize) -> usize {
    for _ in 0..MAX_CORRUPTION_DRAWS {
        let c = rng.random_range(0..n);
        if c != u && c != v {
            return c;
        }
    }
    (0..n).find(|&c| c != u && c != v).unwrap_or(u)
}
