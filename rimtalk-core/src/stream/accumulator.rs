//! Folds decoded chunks into the aggregate response

use crate::protocol::StreamChunk;

/// Final state of a stream once the transport has settled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub full_text: String,
    pub total_tokens: u32,
    pub id: Option<String>,
    pub finish_reason: Option<String>,
}

/// Running aggregate of one streamed response.
///
/// Every non-empty delta is appended to the full text and handed to
/// `on_delta` exactly once; id, finish reason and usage are last-wins.
pub struct StreamAccumulator<F> {
    summary: StreamSummary,
    on_delta: F,
}

impl<F> StreamAccumulator<F>
where
    F: FnMut(&str),
{
    pub fn new(on_delta: F) -> Self {
        Self {
            summary: StreamSummary::default(),
            on_delta,
        }
    }

    pub fn apply(&mut self, chunk: StreamChunk) {
        if let Some(id) = chunk.id.filter(|id| !id.is_empty()) {
            self.summary.id = Some(id);
        }

        if let Some(delta) = chunk.delta_content.filter(|d| !d.is_empty()) {
            self.summary.full_text.push_str(&delta);
            (self.on_delta)(&delta);
        }

        if let Some(reason) = chunk.finish_reason.filter(|r| !r.is_empty()) {
            self.summary.finish_reason = Some(reason);
        }

        if let Some(tokens) = chunk.usage_tokens {
            self.summary.total_tokens = tokens;
        }
    }

    pub fn full_text(&self) -> &str {
        &self.summary.full_text
    }

    pub fn total_tokens(&self) -> u32 {
        self.summary.total_tokens
    }

    pub fn id(&self) -> Option<&str> {
        self.summary.id.as_deref()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.summary.finish_reason.as_deref()
    }

    pub fn into_summary(self) -> StreamSummary {
        self.summary
    }
}
