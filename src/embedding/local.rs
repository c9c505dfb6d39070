/// Local embedding provider using fastembed
///
/// Offline embedding generation with ONNX sentence-embedding models (all-MiniLM-L6-v2 by
/// default, 384 dimensions). No API key required; weights are downloaded once and cached.
/// All CPU-bound fastembed calls run inside spawn_blocking to avoid blocking the runtime.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use tokio::task;

use super::{EmbeddingError, EmbeddingProvider};

/// Supported models: (name, fastembed model, dimension, approximate resident bytes).
const MODELS: &[(&str, EmbeddingModel, usize, usize)] = &[
    ("all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2, 384, 90 * 1024 * 1024),
    ("bge-small-en-v1.5", EmbeddingModel::BGESmallENV15, 384, 130 * 1024 * 1024),
    ("bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15, 768, 440 * 1024 * 1024),
];

/// `<user cache dir>/intentrank/models`, or `./.intentrank/models` without a home.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("intentrank").join("models"))
        .unwrap_or_else(|| PathBuf::from(".intentrank/models"))
}

/// Local embedding provider backed by fastembed.
///
/// fastembed is synchronous and needs exclusive access for inference, so the model lives
/// behind a Mutex and every call goes through spawn_blocking.
pub struct LocalEmbeddingProvider {
    model: Arc<Mutex<TextEmbedding>>,
    name: String,
    dim: usize,
    resident: usize,
}

impl LocalEmbeddingProvider {
    /// Load `model_name`, downloading weights into `cache_dir` if not cached.
    pub async fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let (name, model, dim, resident) = MODELS
            .iter()
            .find(|(n, ..)| *n == model_name)
            .cloned()
            .ok_or_else(|| {
                let known: Vec<&str> = MODELS.iter().map(|(n, ..)| *n).collect();
                EmbeddingError::NotConfigured(format!(
                    "unknown local model '{}' (known: {})",
                    model_name,
                    known.join(", ")
                ))
            })?;

        tracing::info!(model = name, cache_dir = %cache_dir.display(), "Loading local embedding model");

        let embedding = task::spawn_blocking(move || {
            std::fs::create_dir_all(&cache_dir)
                .map_err(|e| EmbeddingError::ModelInit(format!("Failed to create cache dir: {}", e)))?;
            TextEmbedding::try_new(
                TextInitOptions::new(model)
                    .with_cache_dir(cache_dir)
                    .with_show_download_progress(false),
            )
            .map_err(|e| EmbeddingError::ModelInit(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::ModelInit(e.to_string()))??;

        Ok(LocalEmbeddingProvider {
            model: Arc::new(Mutex::new(embedding)),
            name: name.to_string(),
            dim,
            resident,
        })
    }

    fn run(&self, texts: Vec<String>) -> task::JoinHandle<Result<Vec<Vec<f32>>, EmbeddingError>> {
        let model = Arc::clone(&self.model);
        task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| EmbeddingError::Generation("embedding model lock poisoned".to_string()))?;
            guard
                .embed(texts, None)
                .map_err(|e| EmbeddingError::Generation(e.to_string()))
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.run(vec![text.to_string()])
            .await
            .map_err(|e| EmbeddingError::Generation(e.to_string()))??
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Generation("model returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.to_vec())
            .await
            .map_err(|e| EmbeddingError::Generation(e.to_string()))?
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn resident_bytes(&self) -> usize {
        self.resident
    }
}
