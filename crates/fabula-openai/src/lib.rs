//! OpenAI-compatible collaborators for Fabula.
//!
//! [`OpenAiChatModel`] implements [`fabula::ChatModel`] over the chat
//! completions endpoint (with the `json_object` response format for
//! structured extraction calls), and [`OpenAiEmbeddings`] implements
//! [`fabula::Embeddings`] over the embeddings endpoint.
//!
//! # Authentication
//!
//! The API key comes from the `OPENAI_API_KEY` environment variable or
//! `with_api_key()`. Point `with_base_url()` at any OpenAI-compatible
//! server.
//!
//! ```no_run
//! use fabula_openai::OpenAiChatModel;
//!
//! let model = OpenAiChatModel::new().with_model("gpt-4o");
//! ```

use std::time::Duration;

use fabula::Error;

/// OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Request timeout applied to every API call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

mod chat;
mod embeddings;

pub use chat::OpenAiChatModel;
pub use embeddings::OpenAiEmbeddings;

/// Map an HTTP error status to the engine's error taxonomy.
///
/// 429 is retryable rate limiting, other 4xx are permanent request
/// errors, and 5xx are retryable service failures.
pub(crate) fn status_to_error(status: reqwest::StatusCode, body: &str) -> Error {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Error::RateLimit(detail)
    } else if status.is_client_error() {
        Error::InvalidRequest(detail)
    } else {
        Error::Service(detail)
    }
}

/// Map a transport-level failure.
pub(crate) fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(err.to_string())
    } else {
        Error::Service(err.to_string())
    }
}
