//! Wire types for the chat-completion service
//!
//! Request types serialize to exactly the body the service expects
//! (`{"messages":[...],"stream":bool}`); response types are lenient and
//! default every field the service may omit.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Speaker of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Leading instruction; only produced from the instruction argument
    System,
    /// Text attributed to the player or a colonist speaking to the model
    User,
    /// Earlier model output replayed as history
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in the outbound conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of a `POST /chat/completions` request
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    pub messages: Vec<Message>,
    pub stream: bool,
}

impl RequestEnvelope {
    pub fn new(messages: Vec<Message>, stream: bool) -> Self {
        Self { messages, stream }
    }

    /// Serialize to the JSON body sent on the wire
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Aggregate result of a completed request, identical in shape for the
/// buffered and streamed paths
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    /// JSON body that was sent
    pub request_body: String,
    /// Full assistant text
    pub response_text: String,
    /// `usage.total_tokens` reported by the service, 0 when absent
    pub token_count: u32,
}

impl Payload {
    pub fn new(request_body: String, response_text: String, token_count: u32) -> Self {
        Self {
            request_body,
            response_text,
            token_count,
        }
    }
}

/// Treat an explicit `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Token usage block shared by buffered responses and stream chunks
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_tokens: u32,
}

/// Buffered `chat/completions` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionResponse {
    /// Content of the first choice, if any
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
    }

    /// `usage.total_tokens`, or 0 when the service omitted usage
    pub fn total_tokens(&self) -> u32 {
        self.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0)
    }
}

/// One `data:` event of a streamed response, as sent on the wire
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Option<StreamDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Flattened view of a [`StreamEvent`]: only the first choice matters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    pub id: Option<String>,
    pub delta_content: Option<String>,
    pub finish_reason: Option<String>,
    pub usage_tokens: Option<u32>,
}

impl From<StreamEvent> for StreamChunk {
    fn from(event: StreamEvent) -> Self {
        let (delta_content, finish_reason) = match event.choices.into_iter().next() {
            Some(choice) => (choice.delta.and_then(|d| d.content), choice.finish_reason),
            None => (None, None),
        };

        Self {
            id: event.id,
            delta_content,
            finish_reason,
            usage_tokens: event.usage.map(|u| u.total_tokens),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_format() {
        let envelope = RequestEnvelope::new(
            vec![Message::system("Be brief."), Message::user("Hello")],
            true,
        );
        let json = envelope.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"messages":[{"role":"system","content":"Be brief."},{"role":"user","content":"Hello"}],"stream":true}"#
        );
    }

    #[test]
    fn test_completion_response_extraction() {
        let body = r#"{"id":"c1","choices":[{"message":{"role":"assistant","content":"Hi"},"finish_reason":"stop"}],"usage":{"total_tokens":12}}"#;
        let response: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.first_content(), Some("Hi"));
        assert_eq!(response.total_tokens(), 12);
    }

    #[test]
    fn test_completion_response_without_choices() {
        let response: CompletionResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.first_content(), None);
        assert_eq!(response.total_tokens(), 0);
    }

    #[test]
    fn test_completion_response_with_null_fields() {
        let body = r#"{"choices":null,"usage":{"total_tokens":3}}"#;
        let response: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.first_content(), None);
        assert_eq!(response.total_tokens(), 3);

        let body = r#"{"choices":[],"usage":{"total_tokens":null}}"#;
        let response: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.total_tokens(), 0);
    }

    #[test]
    fn test_stream_event_flattening() {
        let data = r#"{"id":"x","choices":[{"delta":{"content":"a"},"finish_reason":null}],"usage":null}"#;
        let event: StreamEvent = serde_json::from_str(data).unwrap();
        let chunk = StreamChunk::from(event);
        assert_eq!(chunk.id.as_deref(), Some("x"));
        assert_eq!(chunk.delta_content.as_deref(), Some("a"));
        assert_eq!(chunk.finish_reason, None);
        assert_eq!(chunk.usage_tokens, None);
    }
}
