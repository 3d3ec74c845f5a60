//! Streaming chat-completion client for OpenAI-compatible APIs.
//!
//! The core is [`stream::StreamDecoder`], which turns the `data:` lines of a
//! server-sent-event body into [`stream::CompletionEvent`]s and assembles
//! fragmented tool calls into complete records on the terminal event.

pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod stream;
pub mod transport;

pub use client::{ChatClient, EventStream};
pub use config::{load_config, ClientConfig, ConfigError};
pub use error::{ErrorCategory, StreamError};
pub use protocol::chat::{
    ChatCompletion, ChatCompletionRequest, ChatMessage, ToolCall, ToolCallDelta,
};
pub use stream::{CompletionEvent, StreamDecoder, ToolCallAccumulator};
