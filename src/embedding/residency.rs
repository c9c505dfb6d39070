/// Scoped model residency.
///
/// Embedding models can be large, and two of them are never needed at once: a hybrid
/// configuration embeds the corpus with the primary model, then with the secondary.
/// `ModelSlot` enforces that at most one backend is loaded at a time. `acquire` waits for
/// the current holder to finish, loads the requested backend and hands back a
/// `ResidentModel`; dropping the guard unloads the backend and frees the slot, whatever
/// path the holder exits through.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{BackendSpec, EmbeddingError, EmbeddingProvider};
use crate::projection::SourceEmbeddings;

/// Single-occupancy slot for an embedding backend. Cheap to clone; clones share the slot.
#[derive(Clone, Default)]
pub struct ModelSlot {
    lock: Arc<Mutex<()>>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the slot, then load `spec` into it.
    ///
    /// A failed load releases the slot before returning the error.
    pub async fn acquire(&self, spec: &BackendSpec) -> Result<ResidentModel, EmbeddingError> {
        let permit = Arc::clone(&self.lock).lock_owned().await;
        let started = Instant::now();
        let provider = spec.load().await?;

        tracing::info!(
            backend = %spec,
            dimension = provider.dimension(),
            resident_bytes = provider.resident_bytes(),
            load_ms = started.elapsed().as_millis() as u64,
            "Embedding backend loaded"
        );

        Ok(ResidentModel {
            provider,
            spec: spec.clone(),
            loaded_at: Instant::now(),
            _permit: permit,
        })
    }

    /// True while some `ResidentModel` holds the slot.
    pub fn is_occupied(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

/// A loaded backend. Holding it keeps the slot occupied.
pub struct ResidentModel {
    provider: Arc<dyn EmbeddingProvider>,
    spec: BackendSpec,
    loaded_at: Instant,
    _permit: OwnedMutexGuard<()>,
}

impl ResidentModel {
    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    pub fn spec(&self) -> &BackendSpec {
        &self.spec
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn resident_bytes(&self) -> usize {
        self.provider.resident_bytes()
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.provider.embed_batch(texts).await
    }
}

impl Drop for ResidentModel {
    fn drop(&mut self) {
        tracing::info!(
            backend = %self.spec,
            held_ms = self.loaded_at.elapsed().as_millis() as u64,
            "Embedding backend released"
        );
    }
}

/// Raw embeddings of a batch of texts from one or two backends.
#[derive(Debug, Clone)]
pub struct EmbeddedTexts {
    pub embeddings: Vec<SourceEmbeddings>,
    /// Largest single backend footprint seen (backends are never co-resident)
    pub peak_backend_bytes: usize,
    pub backends: Vec<String>,
}

impl EmbeddedTexts {
    /// Bytes held by the raw embedding tables.
    pub fn table_bytes(&self) -> usize {
        self.embeddings
            .iter()
            .map(|e| e.primary.len() + e.secondary.as_ref().map_or(0, Vec::len))
            .sum::<usize>()
            * std::mem::size_of::<f32>()
    }
}

/// Embed `texts` with `primary`, then with `secondary` if given.
///
/// Each backend is acquired, used and released before the next one loads.
pub async fn embed_sources(
    slot: &ModelSlot,
    primary: &BackendSpec,
    secondary: Option<&BackendSpec>,
    texts: &[String],
) -> Result<EmbeddedTexts, EmbeddingError> {
    let (first, first_bytes) = embed_with(slot, primary, texts).await?;
    let mut backends = vec![primary.to_string()];

    let Some(spec) = secondary else {
        return Ok(EmbeddedTexts {
            embeddings: first.into_iter().map(SourceEmbeddings::single).collect(),
            peak_backend_bytes: first_bytes,
            backends,
        });
    };

    let (second, second_bytes) = embed_with(slot, spec, texts).await?;
    backends.push(spec.to_string());
    Ok(EmbeddedTexts {
        embeddings: first
            .into_iter()
            .zip(second)
            .map(|(p, s)| SourceEmbeddings::pair(p, s))
            .collect(),
        peak_backend_bytes: first_bytes.max(second_bytes),
        backends,
    })
}

async fn embed_with(
    slot: &ModelSlot,
    spec: &BackendSpec,
    texts: &[String],
) -> Result<(Vec<Vec<f32>>, usize), EmbeddingError> {
    let model = slot.acquire(spec).await?;
    let vectors = model.embed_batch(texts).await?;
    if vectors.len() != texts.len() {
        return Err(EmbeddingError::Generation(format!(
            "{} returned {} vectors for {} texts",
            spec,
            vectors.len(),
            texts.len()
        )));
    }
    Ok((vectors, model.resident_bytes()))
}
