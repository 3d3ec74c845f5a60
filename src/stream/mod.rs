pub mod accumulator;
pub mod decoder;
pub mod sse;

pub use accumulator::ToolCallAccumulator;
pub use decoder::{
    decode, decode_line_stream, decode_reader, decode_stream, spawn_decoder, spawn_decoder_with,
    Step, StreamDecoder,
};
pub use sse::{classify_line, sse_line_stream, LineSplitter, StreamFrame};

use crate::error::StreamError;
use crate::protocol::chat::ChatCompletion;

/// One decoded unit of a streamed chat completion.
///
/// A stream yields any number of [`Delta`](Self::Delta) events followed by
/// exactly one terminal event, [`Done`](Self::Done) or [`Failed`](Self::Failed).
#[derive(Debug, Clone)]
pub enum CompletionEvent {
    /// An intermediate chunk. Tool-call arguments seen here may be incomplete.
    Delta(ChatCompletion),
    /// Normal end of stream. When the model called tools, the first choice's
    /// `message.tool_calls` holds the assembled calls.
    Done(ChatCompletion),
    /// Abnormal end of stream. Deltas delivered earlier remain valid.
    Failed(StreamError),
}

impl CompletionEvent {
    #[must_use]
    pub fn is_done(&self) -> bool {
        !matches!(self, CompletionEvent::Delta(_))
    }

    #[must_use]
    pub fn error(&self) -> Option<&StreamError> {
        match self {
            CompletionEvent::Failed(err) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn completion(&self) -> Option<&ChatCompletion> {
        match self {
            CompletionEvent::Delta(completion) | CompletionEvent::Done(completion) => {
                Some(completion)
            }
            CompletionEvent::Failed(_) => None,
        }
    }

    /// Split into the `(completion, is_done, error)` triple.
    #[must_use]
    pub fn into_parts(self) -> (Option<ChatCompletion>, bool, Option<StreamError>) {
        match self {
            CompletionEvent::Delta(completion) => (Some(completion), false, None),
            CompletionEvent::Done(completion) => (Some(completion), true, None),
            CompletionEvent::Failed(err) => (None, true, Some(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_parts() {
        let (completion, done, err) = CompletionEvent::Delta(ChatCompletion::default()).into_parts();
        assert!(completion.is_some() && !done && err.is_none());

        let (completion, done, err) = CompletionEvent::Done(ChatCompletion::default()).into_parts();
        assert!(completion.is_some() && done && err.is_none());

        let (completion, done, err) =
            CompletionEvent::Failed(StreamError::Transport("closed".into())).into_parts();
        assert!(completion.is_none() && done && err.is_some());
    }

    #[test]
    fn test_accessors() {
        let failed = CompletionEvent::Failed(StreamError::Transport("closed".into()));
        assert!(failed.is_done());
        assert!(failed.completion().is_none());
        assert!(failed.error().is_some());

        let delta = CompletionEvent::Delta(ChatCompletion::default());
        assert!(!delta.is_done());
        assert!(delta.error().is_none());
    }
}
