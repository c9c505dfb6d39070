/// Embedding provider trait and supporting types
///
/// Provides a pluggable interface for text embedding generation. Backends are described
/// by a serializable `BackendSpec` and loaded on demand through a `ModelSlot`, which keeps
/// at most one heavy model resident at a time.

pub mod hashing;
#[cfg(feature = "local-embeddings")]
pub mod local;
pub mod openai;
pub mod residency;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::ErrorKind;

pub use hashing::HashingEmbeddingProvider;
pub use openai::OpenAIEmbeddingProvider;
pub use residency::{embed_sources, EmbeddedTexts, ModelSlot, ResidentModel};

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Model initialization failure (download, weights, runtime)
    #[error("Model initialization error: {0}")]
    ModelInit(String),

    /// Embedding generation failure (inference error)
    #[error("Embedding generation error: {0}")]
    Generation(String),

    /// API provider returned an HTTP error
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Provider not configured (e.g., missing API key, backend not compiled in)
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl EmbeddingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmbeddingError::NotConfigured(_) => ErrorKind::Configuration,
            EmbeddingError::Api { status, .. } if (400..500).contains(status) && *status != 429 => {
                ErrorKind::Configuration
            }
            _ => ErrorKind::Runtime,
        }
    }
}

/// A loaded embedding model: text in, fixed-width vectors out.
///
/// The resident model is shared as `Arc<dyn EmbeddingProvider>` inside a `ResidentModel`
/// guard, so implementations are Send + Sync.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text into `dimension()` values.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Model identifier as reported in benchmark output.
    fn model_name(&self) -> &str;

    /// Width of every vector this backend returns.
    fn dimension(&self) -> usize;

    /// Approximate bytes held in memory while the backend is loaded.
    fn resident_bytes(&self) -> usize {
        0
    }
}

fn default_hashing_dim() -> usize {
    256
}

fn default_local_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_openai_model() -> String {
    "text-embedding-3-small".to_string()
}

/// How to construct an embedding backend.
///
/// ```toml
/// [embedding.primary]
/// backend = "hashing"
/// dim = 384
///
/// [embedding.secondary]
/// backend = "local"
/// model = "all-MiniLM-L6-v2"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BackendSpec {
    /// Offline signed feature hashing over tokens
    Hashing {
        #[serde(default = "default_hashing_dim")]
        dim: usize,
        /// Distinguishes two hashing "models" over the same text
        #[serde(default)]
        salt: u64,
    },
    /// fastembed ONNX model (requires the `local-embeddings` feature)
    Local {
        #[serde(default = "default_local_model")]
        model: String,
        #[serde(default)]
        cache_dir: Option<PathBuf>,
    },
    /// OpenAI embeddings API
    #[serde(rename = "openai")]
    OpenAi {
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        dimensions: Option<usize>,
    },
}

impl Default for BackendSpec {
    fn default() -> Self {
        BackendSpec::Hashing { dim: default_hashing_dim(), salt: 0 }
    }
}

impl fmt::Display for BackendSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendSpec::Hashing { dim, salt: 0 } => write!(f, "hashing-{}", dim),
            BackendSpec::Hashing { dim, salt } => write!(f, "hashing-{}-s{}", dim, salt),
            BackendSpec::Local { model, .. } => write!(f, "local:{}", model),
            BackendSpec::OpenAi { model, .. } => write!(f, "openai:{}", model),
        }
    }
}

impl BackendSpec {
    pub fn hashing(dim: usize, salt: u64) -> Self {
        BackendSpec::Hashing { dim, salt }
    }

    /// Construct the backend. Local models may download weights on first use.
    pub async fn load(&self) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        match self {
            BackendSpec::Hashing { dim, salt } => {
                Ok(Arc::new(HashingEmbeddingProvider::new(*dim, *salt)?))
            }
            BackendSpec::Local { model, cache_dir } => load_local(model, cache_dir.clone()).await,
            BackendSpec::OpenAi { model, api_key, dimensions } => {
                let key = match api_key {
                    Some(k) => k.clone(),
                    None => std::env::var("OPENAI_API_KEY").unwrap_or_default(),
                };
                Ok(Arc::new(OpenAIEmbeddingProvider::new(key, model.clone(), *dimensions)?))
            }
        }
    }
}

#[cfg(feature = "local-embeddings")]
async fn load_local(
    model: &str,
    cache_dir: Option<PathBuf>,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    let cache_dir = cache_dir.unwrap_or_else(local::default_cache_dir);
    Ok(Arc::new(local::LocalEmbeddingProvider::new(model, cache_dir).await?))
}

#[cfg(not(feature = "local-embeddings"))]
async fn load_local(
    model: &str,
    _cache_dir: Option<PathBuf>,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    Err(EmbeddingError::NotConfigured(format!(
        "local model '{}' requested but intentrank was built without the local-embeddings feature",
        model
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_spec_from_toml() {
        use figment::providers::{Format, Toml};
        use figment::Figment;

        #[derive(Deserialize)]
        struct Wrapper {
            primary: BackendSpec,
            secondary: BackendSpec,
        }

        let w: Wrapper = Figment::from(Toml::string(
            "[primary]\nbackend = \"hashing\"\ndim = 128\n\n[secondary]\nbackend = \"openai\"\n",
        ))
        .extract()
        .unwrap();
        assert_eq!(w.primary, BackendSpec::hashing(128, 0));
        assert_eq!(
            w.secondary,
            BackendSpec::OpenAi {
                model: "text-embedding-3-small".into(),
                api_key: None,
                dimensions: None
            }
        );
        assert_eq!(w.secondary.to_string(), "openai:text-embedding-3-small");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(EmbeddingError::NotConfigured("x".into()).kind(), ErrorKind::Configuration);
        assert_eq!(EmbeddingError::ModelInit("x".into()).kind(), ErrorKind::Runtime);
        assert_eq!(
            EmbeddingError::Api { status: 401, message: "bad key".into() }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            EmbeddingError::Api { status: 429, message: "slow down".into() }.kind(),
            ErrorKind::Runtime
        );
    }

    #[tokio::test]
    async fn test_openai_without_key_not_configured() {
        let spec = BackendSpec::OpenAi {
            model: "text-embedding-3-small".into(),
            api_key: Some(String::new()),
            dimensions: None,
        };
        let err = spec.load().await.err().unwrap();
        assert!(matches!(err, EmbeddingError::NotConfigured(_)));
    }

    #[cfg(not(feature = "local-embeddings"))]
    #[tokio::test]
    async fn test_local_backend_requires_feature() {
        let spec = BackendSpec::Local { model: default_local_model(), cache_dir: None };
        let err = spec.load().await.err().unwrap();
        assert!(matches!(err, EmbeddingError::NotConfigured(_)));
    }
}
