//! RimTalk Core Library
//!
//! Client plumbing for the Player2 chat-completion service: request
//! building, buffered and streamed completions, per-client health
//! monitoring, and a dispatcher that marshals work onto the game thread.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod http;
pub mod protocol;
pub mod stream;

pub use config::ClientConfig;
pub use dispatch::{DispatchError, DispatchHandle, Dispatcher, DrainOutcome};
pub use error::{ClientError, ClientResult};
pub use http::{ChatClient, ChatExecutor};
pub use protocol::{Payload, Role, Turn};

/// Session token that bounds requests and the health loop
pub use tokio_util::sync::CancellationToken;

/// Returns the version of the RimTalk Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
