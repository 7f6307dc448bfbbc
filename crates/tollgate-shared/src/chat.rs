//! Chat-completions request types.

use serde::{Deserialize, Serialize};

/// Validated shape of a `POST /v1/chat/completions` body. Unknown extra
/// fields are ignored at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    /// Boundary validation beyond what serde enforces structurally.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.messages.is_empty() {
            return Err("messages must be a non-empty list");
        }
        Ok(())
    }

    /// Plain-string content of the most recent user message, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == "user")
            .and_then(ChatMessage::plain_text)
    }
}

/// One turn of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    /// Every textual piece of the content, in order. Non-text parts are
    /// skipped.
    pub fn content_pieces(&self) -> Vec<&str> {
        match &self.content {
            MessageContent::Text(text) => vec![text.as_str()],
            MessageContent::Parts(parts) => parts.iter().filter_map(ContentPart::text).collect(),
        }
    }

    /// The content when it is a single plain string.
    pub fn plain_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text.as_str()),
            MessageContent::Parts(_) => None,
        }
    }
}

/// Message content is either one string or a list of parts, where each part
/// is a bare string or an object carrying a `text` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn parts(texts: Vec<&str>) -> Self {
        MessageContent::Parts(
            texts
                .into_iter()
                .map(|text| ContentPart::Text(text.to_string()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text(String),
    Block(ContentBlock),
}

impl ContentPart {
    fn text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text.as_str()),
            ContentPart::Block(block) => block.text.as_deref(),
        }
    }
}

/// A structured content part; anything beyond `text` is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(default)]
    pub text: Option<String>,
}
