//! # Tollgate Shared
//!
//! Wire types for the OpenAI-compatible chat-completions surface: the
//! request and response envelopes and the error body. Pure serde, no
//! behavior beyond boundary validation.

pub mod chat;
pub mod completion;
pub mod error;

pub use chat::{ChatCompletionRequest, ChatMessage, MessageContent};
pub use completion::{AssistantMessage, ChatCompletionResponse, Choice, Usage};
pub use error::ApiError;
