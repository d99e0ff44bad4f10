//! Token and cost estimation.
//!
//! A chars-per-token approximation is enough for prompt budgeting and
//! order-of-magnitude cost display; exact tokenizer counts are not worth a
//! tokenizer dependency here.

use crate::messages::Message;

/// Default characters-per-token divisor.
pub const CHARS_PER_TOKEN: usize = 3;

/// Estimated token count for `text`. Non-empty text is at least one token.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.chars().count().div_ceil(CHARS_PER_TOKEN).max(1)
}

/// Estimated token count for a conversation's message contents.
#[must_use]
pub fn estimate_message_tokens(messages: &[Message]) -> usize {
    let total: usize = messages.iter().map(|m| estimate_tokens(&m.content)).sum();
    // Newline joins between messages.
    total + messages.len().saturating_sub(1)
}

/// Per-1K-token USD rates for a chat model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatRates {
    /// Rate applied to prompt tokens.
    pub prompt_per_1k: f64,
    /// Rate applied to completion tokens.
    pub completion_per_1k: f64,
}

/// Estimated USD cost breakdown for one chat call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatCost {
    /// Prompt-side cost.
    pub prompt: f64,
    /// Completion-side cost.
    pub completion: f64,
    /// Total cost.
    pub total: f64,
}

/// Rates for a chat model name, falling back to the gpt-4o rates for
/// unknown models.
#[must_use]
pub fn chat_rates(_model: &str) -> ChatRates {
    // gpt-4o and gpt-5 currently share a rate card, which doubles as the
    // fallback for unknown models.
    ChatRates {
        prompt_per_1k: 0.005,
        completion_per_1k: 0.015,
    }
}

/// Estimate the cost of one chat call.
#[must_use]
pub fn estimate_chat_cost(model: &str, prompt_tokens: usize, completion_tokens: usize) -> ChatCost {
    let rates = chat_rates(model);
    let prompt = (prompt_tokens as f64 / 1000.0) * rates.prompt_per_1k;
    let completion = (completion_tokens as f64 / 1000.0) * rates.completion_per_1k;
    ChatCost {
        prompt,
        completion,
        total: prompt + completion,
    }
}

/// Estimate the cost of embedding `tokens` input tokens. Unknown models
/// cost zero.
#[must_use]
pub fn estimate_embedding_cost(model: &str, tokens: usize) -> f64 {
    let per_1k = match model {
        "text-embedding-3-small" => 0.000_02,
        _ => 0.0,
    };
    (tokens as f64 / 1000.0) * per_1k
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_short_text_is_at_least_one_token() {
        assert_eq!(estimate_tokens("a"), 1);
    }

    #[test]
    fn test_token_estimate_rounds_up() {
        // 7 chars / 3 per token = 3 tokens.
        assert_eq!(estimate_tokens("abcdefg"), 3);
    }

    #[test]
    fn test_message_tokens_include_joins() {
        let msgs = vec![Message::user("abc"), Message::assistant("def")];
        assert_eq!(estimate_message_tokens(&msgs), 3);
    }

    #[test]
    fn test_chat_cost_breakdown() {
        let cost = estimate_chat_cost("gpt-4o", 1000, 1000);
        assert!((cost.prompt - 0.005).abs() < 1e-9);
        assert!((cost.completion - 0.015).abs() < 1e-9);
        assert!((cost.total - 0.020).abs() < 1e-9);
    }

    #[test]
    fn test_embedding_cost_unknown_model_is_free() {
        assert_eq!(estimate_embedding_cost("mystery-model", 10_000), 0.0);
    }
}
