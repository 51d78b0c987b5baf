//! Chat-completion protocol types
//!
//! This module defines the request envelope, the buffered and streamed
//! response shapes, and the builder that turns an instruction plus history
//! into the outbound message list.

pub mod builder;
pub mod types;

pub use builder::{build_messages, Turn};
pub use types::{
    CompletionResponse, Message, Payload, RequestEnvelope, Role, StreamChunk, StreamEvent, Usage,
};
