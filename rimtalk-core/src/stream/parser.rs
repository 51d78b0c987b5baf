//! Server-sent event line classification

use crate::protocol::{StreamChunk, StreamEvent};
use thiserror::Error;

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// What a single complete line of the stream turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Comment, keep-alive, or any non-`data:` field
    Ignored,
    /// The `data: [DONE]` terminator
    Done,
    /// A decoded event
    Chunk(StreamChunk),
}

/// A `data:` line whose payload was not a valid event object
#[derive(Debug, Error)]
#[error("Failed to parse stream chunk: {source}")]
pub struct ChunkDecodeError {
    /// The payload after the `data: ` prefix
    pub data: String,
    #[source]
    pub source: serde_json::Error,
}

/// Classify one line and decode its payload when it carries an event.
pub fn parse_line(line: &str) -> Result<LineEvent, ChunkDecodeError> {
    let Some(data) = line.trim().strip_prefix(DATA_PREFIX) else {
        return Ok(LineEvent::Ignored);
    };

    if data.trim() == DONE_MARKER {
        return Ok(LineEvent::Done);
    }

    serde_json::from_str::<StreamEvent>(data)
        .map(|event| LineEvent::Chunk(event.into()))
        .map_err(|source| ChunkDecodeError {
            data: data.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_data_lines_are_ignored() {
        assert_eq!(parse_line(": keep-alive").unwrap(), LineEvent::Ignored);
        assert_eq!(parse_line("event: message").unwrap(), LineEvent::Ignored);
        assert_eq!(parse_line("data:{\"id\":\"x\"}").unwrap(), LineEvent::Ignored);
    }

    #[test]
    fn test_done_marker() {
        assert_eq!(parse_line("data: [DONE]").unwrap(), LineEvent::Done);
        assert_eq!(parse_line("  data: [DONE]  \r").unwrap(), LineEvent::Done);
    }

    #[test]
    fn test_chunk_is_decoded() {
        let line = r#"data: {"id":"a","choices":[{"delta":{"content":"hi"},"finish_reason":"stop"}],"usage":{"total_tokens":7}}"#;
        match parse_line(line).unwrap() {
            LineEvent::Chunk(chunk) => {
                assert_eq!(chunk.id.as_deref(), Some("a"));
                assert_eq!(chunk.delta_content.as_deref(), Some("hi"));
                assert_eq!(chunk.finish_reason.as_deref(), Some("stop"));
                assert_eq!(chunk.usage_tokens, Some(7));
            }
            other => panic!("Expected chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_usage_only_event_with_null_choices() {
        let line = r#"data: {"id":"x","choices":null,"usage":{"total_tokens":5}}"#;
        match parse_line(line).unwrap() {
            LineEvent::Chunk(chunk) => {
                assert_eq!(chunk.id.as_deref(), Some("x"));
                assert_eq!(chunk.delta_content, None);
                assert_eq!(chunk.usage_tokens, Some(5));
            }
            other => panic!("Expected chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_payload_reports_data() {
        let err = parse_line("data: {bad json").unwrap_err();
        assert_eq!(err.data, "{bad json");
    }
}
