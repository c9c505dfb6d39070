/// Remote embedding backend for the OpenAI embeddings endpoint.
///
/// The v3 models accept a `dimensions` field that shortens vectors server-side, which
/// makes the backend usable as either projector source without local weights. Inputs
/// are sent in chunks; every returned vector is checked against the advertised
/// dimension before it reaches the projector.

use async_trait::async_trait;

use super::{EmbeddingError, EmbeddingProvider};

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Upper bound on inputs per request accepted by the endpoint.
const MAX_INPUTS_PER_REQUEST: usize = 2048;

#[derive(serde::Serialize)]
struct EmbedRequest<'a> {
    input: &'a [String],
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(serde::Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

fn native_dimension(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        _ => 1536,
    }
}

/// Put response rows back in input order and check count and width.
fn into_vectors(mut response: EmbedResponse, inputs: usize, dim: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if response.data.len() != inputs {
        return Err(EmbeddingError::Generation(format!(
            "endpoint returned {} vectors for {} inputs",
            response.data.len(),
            inputs
        )));
    }
    response.data.sort_by_key(|d| d.index);
    if let Some(bad) = response.data.iter().find(|d| d.embedding.len() != dim) {
        return Err(EmbeddingError::Generation(format!(
            "vector {} has {} values, expected {}",
            bad.index,
            bad.embedding.len(),
            dim
        )));
    }
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Fails with `NotConfigured` when `api_key` is blank; nothing is sent at construction.
    pub fn new(api_key: String, model: String, dimensions: Option<usize>) -> Result<Self, EmbeddingError> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::NotConfigured(
                "openai backend needs an API key: set OPENAI_API_KEY or api_key in the backend spec"
                    .to_string(),
            ));
        }
        if dimensions == Some(0) {
            return Err(EmbeddingError::NotConfigured("openai dimensions must be at least 1".to_string()));
        }

        Ok(OpenAIEmbeddingProvider {
            client: reqwest::Client::new(),
            api_key,
            model,
            dimensions,
        })
    }

    async fn request_chunk(&self, input: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbedRequest {
            input,
            model: &self.model,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::Generation(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api { status: status.as_u16(), message });
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Generation(format!("unreadable response: {}", e)))?;
        into_vectors(parsed, input.len(), self.dimension())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.request_chunk(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Generation("endpoint returned no vector".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for (n, chunk) in texts.chunks(MAX_INPUTS_PER_REQUEST).enumerate() {
            tracing::debug!(model = %self.model, chunk = n, inputs = chunk.len(), "Embedding request");
            out.extend(self.request_chunk(chunk).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimensions.unwrap_or_else(|| native_dimension(&self.model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, embedding: Vec<f32>) -> EmbedData {
        EmbedData { index, embedding }
    }

    #[test]
    fn test_blank_key_and_zero_dimensions_rejected() {
        let result = OpenAIEmbeddingProvider::new("  ".into(), "text-embedding-3-small".into(), None);
        assert!(matches!(result, Err(EmbeddingError::NotConfigured(_))));
        let result = OpenAIEmbeddingProvider::new("sk-test".into(), "text-embedding-3-small".into(), Some(0));
        assert!(matches!(result, Err(EmbeddingError::NotConfigured(_))));
    }

    #[test]
    fn test_dimension_follows_request() {
        let p = OpenAIEmbeddingProvider::new("sk-test".into(), "text-embedding-3-large".into(), None).unwrap();
        assert_eq!(p.dimension(), 3072);
        let p = OpenAIEmbeddingProvider::new("sk-test".into(), "text-embedding-3-small".into(), Some(256)).unwrap();
        assert_eq!(p.dimension(), 256);
        assert_eq!(p.resident_bytes(), 0);
    }

    #[test]
    fn test_request_omits_unset_dimensions() {
        let input = vec!["hello".to_string()];
        let body = serde_json::to_value(EmbedRequest { input: &input, model: "m", dimensions: None }).unwrap();
        assert!(body.get("dimensions").is_none());
        assert_eq!(body["input"][0], "hello");
    }

    #[test]
    fn test_rows_reordered_by_index() {
        let response = EmbedResponse { data: vec![row(1, vec![1.0, 1.0]), row(0, vec![0.0, 0.0])] };
        let vectors = into_vectors(response, 2, 2).unwrap();
        assert_eq!(vectors, vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
    }

    #[test]
    fn test_short_or_narrow_responses_rejected() {
        let response = EmbedResponse { data: vec![row(0, vec![0.0; 4])] };
        assert!(matches!(into_vectors(response, 2, 4), Err(EmbeddingError::Generation(_))));

        let response = EmbedResponse { data: vec![row(0, vec![0.0; 4]), row(1, vec![0.0; 3])] };
        let err = into_vectors(response, 2, 4).unwrap_err();
        assert!(err.to_string().contains("vector 1 has 3 values"));
    }
}
