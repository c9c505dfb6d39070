/// Offline embedding backend using signed feature hashing.
///
/// Each token (see `corpus::text::tokenize`) is hashed with FNV-1a into one of `dim`
/// buckets with a hash-derived sign, and adjacent token pairs add a half-weight feature.
/// The result is L2-normalized. No weights, no network, fully deterministic, so tests and
/// the default benchmark run anywhere. A non-zero `salt` yields an independent hash
/// family, which lets two hashing backends stand in for two different models.

use async_trait::async_trait;

use super::{EmbeddingError, EmbeddingProvider};
use crate::corpus::text::tokenize;
use crate::projection::linalg::{fnv1a, l2_normalize, FNV_OFFSET};

/// Weight of a token-bigram feature relative to a unigram.
const BIGRAM_WEIGHT: f32 = 0.5;

pub struct HashingEmbeddingProvider {
    name: String,
    dim: usize,
    seed: u64,
}

impl HashingEmbeddingProvider {
    pub fn new(dim: usize, salt: u64) -> Result<Self, EmbeddingError> {
        if dim == 0 {
            return Err(EmbeddingError::NotConfigured(
                "hashing backend needs dim >= 1".to_string(),
            ));
        }
        Ok(HashingEmbeddingProvider {
            name: if salt == 0 { format!("hashing-{}", dim) } else { format!("hashing-{}-s{}", dim, salt) },
            dim,
            seed: fnv1a(&salt.to_le_bytes(), FNV_OFFSET),
        })
    }

    fn add_feature(&self, v: &mut [f32], feature: &str, weight: f32) {
        let h = fnv1a(feature.as_bytes(), self.seed);
        let bucket = (h % self.dim as u64) as usize;
        let sign = if h >> 63 == 1 { -1.0 } else { 1.0 };
        v[bucket] += sign * weight;
    }

    /// Synchronous core shared by `embed` and `embed_batch`.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut v = vec![0.0f32; self.dim];
        for t in &tokens {
            self.add_feature(&mut v, t, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut v, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_deterministic_unit_vectors() {
        let p = HashingEmbeddingProvider::new(64, 0).unwrap();
        let a = p.embed("Kubernetes cost monitoring").await.unwrap();
        let b = p.embed("Kubernetes cost monitoring").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let p = HashingEmbeddingProvider::new(16, 0).unwrap();
        assert_eq!(p.embed("the of and").await.unwrap(), vec![0.0; 16]);
    }

    #[tokio::test]
    async fn test_shared_words_increase_similarity() {
        let p = HashingEmbeddingProvider::new(256, 0).unwrap();
        let base = p.embed("spot instance pricing for batch jobs").await.unwrap();
        let close = p.embed("batch jobs on spot instances").await.unwrap();
        let far = p.embed("password rotation policy audit").await.unwrap();
        assert!(cosine(&base, &close) > cosine(&base, &far));
    }

    #[tokio::test]
    async fn test_salt_changes_hash_family() {
        let a = HashingEmbeddingProvider::new(128, 0).unwrap();
        let b = HashingEmbeddingProvider::new(128, 7).unwrap();
        let text = "alerting dashboards for latency";
        assert_ne!(a.embed(text).await.unwrap(), b.embed(text).await.unwrap());
        assert_eq!(b.model_name(), "hashing-128-s7");
    }

    #[test]
    fn test_zero_dim_rejected() {
        assert!(matches!(
            HashingEmbeddingProvider::new(0, 0),
            Err(EmbeddingError::NotConfigured(_))
        ));
    }
}
