//! Chat completions client.

use async_trait::async_trait;
use fabula::{ChatModel, Error, Message, Result, RetryPolicy, Role};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{status_to_error, transport_error, OPENAI_API_BASE, REQUEST_TIMEOUT};

const DEFAULT_MODEL: &str = "gpt-4o";

/// [`ChatModel`] over an OpenAI-compatible chat completions endpoint.
pub struct OpenAiChatModel {
    api_key: Option<String>,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    client: Client,
    retry_policy: RetryPolicy,
}

impl OpenAiChatModel {
    /// Create a client with default settings.
    ///
    /// Defaults: model `gpt-4o`, temperature 0.7, 1000 max tokens, API key
    /// from `OPENAI_API_KEY`, one retry with backoff.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENAI_API_BASE.to_string(),
            temperature: 0.7,
            max_tokens: 1000,
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

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the completion token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
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

    async fn complete(&self, messages: &[Message], json_object: bool) -> Result<String> {
        let api_key = self.api_key()?;
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(ApiMessage::from).collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: json_object.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response: ChatResponse = fabula::with_retry(&self.retry_policy, || async {
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
            http.json::<ChatResponse>().await.map_err(transport_error)
        })
        .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Service("chat completion returned no content".to_string()))
    }
}

impl Default for OpenAiChatModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        self.complete(messages, false).await
    }

    async fn generate_structured(&self, messages: &[Message]) -> Result<String> {
        self.complete(messages, true).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for ApiMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            role: match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &message.content,
        }
    }
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply_json(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    fn client(server: &MockServer) -> OpenAiChatModel {
        OpenAiChatModel::new()
            .with_api_key("test-key")
            .with_base_url(server.uri())
            .with_retry_policy(RetryPolicy::fixed(1, Duration::ZERO))
    }

    #[tokio::test]
    async fn test_generate_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_json("Hello, reader.")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server)
            .generate(&[Message::user("hi")])
            .await
            .expect("generate");
        assert_eq!(reply, "Hello, reader.");
    }

    #[tokio::test]
    async fn test_structured_sets_json_response_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_json("{}")))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .generate_structured(&[Message::user("analyze")])
            .await
            .expect("generate");
    }

    #[tokio::test]
    async fn test_persistent_429_becomes_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .expect(2) // initial attempt + one retry
            .mount(&server)
            .await;

        let err = client(&server)
            .generate(&[Message::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("unknown model"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .generate(&[Message::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_transient_500_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_json("recovered")))
            .mount(&server)
            .await;

        let reply = client(&server)
            .generate(&[Message::user("hi")])
            .await
            .expect("generate");
        assert_eq!(reply, "recovered");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_configuration_error() {
        let model = OpenAiChatModel {
            api_key: None,
            ..OpenAiChatModel::new()
        };
        let err = model.generate(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
