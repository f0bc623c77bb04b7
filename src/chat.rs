// Request side of the chat-completion exchange.
// The report lookup sends exactly one user message per query and never streams.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body POSTed to the chat-completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool, // We want the full response, not a stream
}

impl ChatRequest {
    /// Build the request for a single user query.
    ///
    /// The query is passed through untouched (no trimming). Callers are
    /// expected to skip empty input before getting here.
    pub fn for_query(model: &str, query: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: query.to_string(),
            }],
            stream: false,
        }
    }

    /// The user's query as it will be sent.
    pub fn query(&self) -> &str {
        self.messages
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}
