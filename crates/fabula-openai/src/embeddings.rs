//! Embeddings client.

use async_trait::async_trait;
use fabula::{Embeddings, Error, Result, RetryPolicy};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{status_to_error, transport_error, OPENAI_API_BASE, REQUEST_TIMEOUT};

const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// [`Embeddings`] over an OpenAI-compatible embeddings endpoint.
///
/// The API returns unit-norm vectors, so cosine similarity over them is a
/// plain dot product; the index does not rely on that and normalizes
/// nothing itself.
pub struct OpenAiEmbeddings {
    api_key: Option<String>,
    model: String,
    base_url: String,
    batch_size: usize,
    client: Client,
    retry_policy: RetryPolicy,
}

impl OpenAiEmbeddings {
    /// Create a client with default settings.
    ///
    /// Defaults: model `text-embedding-3-small`, batch size 128, API key
    /// from `OPENAI_API_KEY`, one retry with backoff.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENAI_API_BASE.to_string(),
            batch_size: 128,
            client: Client::new(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Set the API key explicitly.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at a different OpenAI-compatible server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the number of texts sent per request.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, 2048);
        self
    }

    /// Set the retry policy for API calls.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::Configuration(
                "OPENAI_API_KEY not set; set the environment variable or use with_api_key()"
                    .to_string(),
            )
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = self.api_key()?;
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
            encoding_format: "float",
        };

        let response: EmbedResponse = fabula::with_retry(&self.retry_policy, || async {
            let http = self
                .client
                .post(&url)
                .bearer_auth(api_key)
                .timeout(REQUEST_TIMEOUT)
                .json(&request)
                .send()
                .await
                .map_err(transport_error)?;
            let status = http.status();
            if !status.is_success() {
                let body = http.text().await.unwrap_or_default();
                return Err(status_to_error(status, &body));
            }
            http.json::<EmbedResponse>().await.map_err(transport_error)
        })
        .await?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(Error::Service(format!(
                "embeddings endpoint returned {} vectors for {} inputs",
                data.len(),
                texts.len()
            )));
        }
        // Restore input order; the API may interleave under batching.
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

impl Default for OpenAiEmbeddings {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embeddings for OpenAiEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            all.extend(self.embed_batch(batch).await?);
        }
        Ok(all)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let texts = vec![text.to_string()];
        self.embed_batch(&texts)
            .await?
            .pop()
            .ok_or_else(|| Error::Service("embeddings endpoint returned no vector".to_string()))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embed_json(vectors: &[(usize, Vec<f32>)]) -> serde_json::Value {
        serde_json::json!({
            "data": vectors
                .iter()
                .map(|(i, v)| serde_json::json!({"index": i, "embedding": v}))
                .collect::<Vec<_>>()
        })
    }

    fn client(server: &MockServer) -> OpenAiEmbeddings {
        OpenAiEmbeddings::new()
            .with_api_key("test-key")
            .with_base_url(server.uri())
            .with_retry_policy(RetryPolicy::fixed(1, Duration::ZERO))
    }

    #[tokio::test]
    async fn test_embed_documents_in_order() {
        let server = MockServer::start().await;
        // Out-of-order reply; the client restores input order by index.
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(embed_json(&[
                (1, vec![0.0, 1.0]),
                (0, vec![1.0, 0.0]),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let vectors = client(&server)
            .embed_documents(&["a".to_string(), "b".to_string()])
            .await
            .expect("embed");
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_query_single_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(embed_json(&[(0, vec![0.5, 0.5])])),
            )
            .mount(&server)
            .await;

        let vector = client(&server).embed_query("query").await.expect("embed");
        assert_eq!(vector, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_batching_splits_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(embed_json(&[(0, vec![1.0])])),
            )
            .expect(3)
            .mount(&server)
            .await;

        let texts: Vec<String> = (0..3).map(|i| format!("text {i}")).collect();
        let vectors = client(&server)
            .with_batch_size(1)
            .embed_documents(&texts)
            .await
            .expect("embed");
        assert_eq!(vectors.len(), 3);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(embed_json(&[(0, vec![1.0])])),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .embed_documents(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable(_) | Error::Service(_)));
    }
}
