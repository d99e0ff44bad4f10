//! Chat model collaborator trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::Message;

/// A reasoning/chat model behind a narrow seam.
///
/// The engine needs exactly two call shapes: free-form reply generation
/// for chat turns, and JSON-object output for extraction. Providers map
/// their own transport and status errors into [`crate::Error`] before
/// returning.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a free-form reply to the conversation.
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Generate a reply constrained to a single JSON object.
    ///
    /// The default forwards to [`generate`](Self::generate); providers with
    /// a native JSON output mode override it.
    async fn generate_structured(&self, messages: &[Message]) -> Result<String> {
        self.generate(messages).await
    }

    /// The underlying model identifier, for logging and cost estimation.
    fn model_name(&self) -> &str;
}
