//! Streaming response decoding
//!
//! A live response arrives as arbitrarily sized byte deliveries. They flow
//! through three stages, each owned by a single request:
//! - [`LineBuffer`] frames bytes into complete lines
//! - [`parse_line`] turns `data:` lines into [`StreamChunk`]s
//! - [`StreamAccumulator`] folds chunks into the final text and usage
//!
//! [`StreamChunk`]: crate::protocol::StreamChunk

pub mod accumulator;
pub mod buffer;
pub mod json;
pub mod parser;

pub use accumulator::{StreamAccumulator, StreamSummary};
pub use buffer::LineBuffer;
pub use json::JsonObjectStream;
pub use parser::{parse_line, ChunkDecodeError, LineEvent};

use crate::protocol::StreamChunk;
use tracing::{trace, warn};

/// Bytes-to-chunks decoder for one server-sent event stream
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: LineBuffer,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every chunk completed by this delivery, in arrival order
    pub fn decode(&mut self, data: &[u8]) -> Vec<StreamChunk> {
        let lines = self.lines.push(data);
        self.decode_lines(lines)
    }

    /// Decode a final unterminated line, if the stream ended without one
    pub fn finish(&mut self) -> Vec<StreamChunk> {
        let rest = self.lines.finish();
        self.decode_lines(rest)
    }

    /// Whether a `data: [DONE]` marker has been seen
    pub fn saw_done(&self) -> bool {
        self.done
    }

    fn decode_lines(&mut self, lines: impl IntoIterator<Item = String>) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();

        for line in lines {
            match parse_line(&line) {
                Ok(LineEvent::Chunk(chunk)) => chunks.push(chunk),
                Ok(LineEvent::Done) => {
                    trace!("Stream end marker received");
                    self.done = true;
                }
                Ok(LineEvent::Ignored) => {}
                Err(e) => warn!("{}\nJSON: {}", e, e.data),
            }
        }

        chunks
    }
}

/// Full per-request pipeline: decoder plus accumulator
pub struct StreamPipeline<F> {
    decoder: SseDecoder,
    accumulator: StreamAccumulator<F>,
}

impl<F> StreamPipeline<F>
where
    F: FnMut(&str),
{
    pub fn new(on_delta: F) -> Self {
        Self {
            decoder: SseDecoder::new(),
            accumulator: StreamAccumulator::new(on_delta),
        }
    }

    /// Process one delivery.
    ///
    /// Returns `true` while data is flowing and `false` for an empty
    /// delivery, which changes nothing.
    pub fn receive(&mut self, data: &[u8]) -> bool {
        if data.is_empty() {
            return false;
        }

        for chunk in self.decoder.decode(data) {
            self.accumulator.apply(chunk);
        }
        true
    }

    pub fn accumulator(&self) -> &StreamAccumulator<F> {
        &self.accumulator
    }

    /// Flush any trailing line and return the aggregate
    pub fn finish(mut self) -> StreamSummary {
        for chunk in self.decoder.finish() {
            self.accumulator.apply(chunk);
        }
        self.accumulator.into_summary()
    }
}
