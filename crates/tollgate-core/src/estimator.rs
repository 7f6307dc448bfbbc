//! Token estimation for chat-completion requests.
//!
//! The estimator is the only accounting that happens *before* generation, so
//! it is deliberately conservative: input is counted with a fixed
//! characters-per-token heuristic plus a small per-message overhead, and the
//! output dimension is reserved at its full budget. Accuracy is traded for
//! determinism and speed; the output reservation is trued up against the
//! actual completion afterwards.

use tollgate_shared::chat::ChatMessage;

/// Hard ceiling on the output-token budget of a single completion.
pub const OUTPUT_TOKEN_CEILING: u32 = 512;

const CHARS_PER_TOKEN: u64 = 4;
const MESSAGE_OVERHEAD_TOKENS: u64 = 4;

/// Estimated input tokens across all message content. Monotone in total
/// content length: a longer prompt never estimates fewer tokens.
pub fn estimate_input_tokens(messages: &[ChatMessage]) -> u64 {
    let mut tokens = 0u64;
    for message in messages {
        let chars: u64 = message
            .content_pieces()
            .iter()
            .map(|piece| piece.chars().count() as u64)
            .sum();
        tokens += chars.div_ceil(CHARS_PER_TOKEN) + MESSAGE_OVERHEAD_TOKENS;
    }
    tokens.max(1)
}

/// Output-token budget reserved at admission: the caller-supplied
/// `max_tokens` clamped to `[1, OUTPUT_TOKEN_CEILING]`, or the ceiling when
/// absent.
pub fn output_token_budget(max_tokens: Option<u32>) -> u32 {
    max_tokens
        .unwrap_or(OUTPUT_TOKEN_CEILING)
        .clamp(1, OUTPUT_TOKEN_CEILING)
}

/// Token count of a rendered completion, using the same heuristic as the
/// input estimate.
pub fn estimate_text_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(CHARS_PER_TOKEN).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_shared::chat::MessageContent;

    fn message(content: &str) -> ChatMessage {
        ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Text(content.to_string()),
        }
    }

    #[test]
    fn estimate_is_monotone_in_prompt_length() {
        let short = [message("What is Rust?")];
        let long = [message("What is Rust? Please answer in extensive detail.")];
        assert!(estimate_input_tokens(&long) >= estimate_input_tokens(&short));
    }

    #[test]
    fn empty_messages_estimate_at_least_one_token() {
        assert_eq!(estimate_input_tokens(&[]), 1);
        assert!(estimate_input_tokens(&[message("")]) >= 1);
    }

    #[test]
    fn each_message_carries_overhead() {
        let one = [message("hello")];
        let two = [message("hello"), message("hello")];
        assert_eq!(
            estimate_input_tokens(&two),
            2 * estimate_input_tokens(&one)
        );
    }

    #[test]
    fn multi_part_content_is_flattened() {
        let parts = ChatMessage {
            role: "user".to_string(),
            content: MessageContent::parts(vec!["four", "four"]),
        };
        let joined = message("fourfour");
        assert_eq!(
            estimate_input_tokens(std::slice::from_ref(&parts)),
            estimate_input_tokens(std::slice::from_ref(&joined))
        );
    }

    #[test]
    fn output_budget_defaults_to_ceiling() {
        assert_eq!(output_token_budget(None), OUTPUT_TOKEN_CEILING);
    }

    #[test]
    fn output_budget_clamps_both_ends() {
        assert_eq!(output_token_budget(Some(0)), 1);
        assert_eq!(output_token_budget(Some(64)), 64);
        assert_eq!(output_token_budget(Some(100_000)), OUTPUT_TOKEN_CEILING);
    }

    #[test]
    fn rendered_text_never_estimates_zero() {
        assert_eq!(estimate_text_tokens(""), 1);
        assert_eq!(estimate_text_tokens("abcd"), 1);
        assert_eq!(estimate_text_tokens("abcde"), 2);
    }
}
