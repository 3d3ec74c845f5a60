use std::io::BufRead;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use smallvec::SmallVec;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::accumulator::ToolCallAccumulator;
use super::sse::{classify_line, sse_line_stream, StreamFrame};
use super::CompletionEvent;
use crate::error::StreamError;
use crate::protocol::chat::{
    ChatCompletion, ChatCompletionChoice, ChatMessage, ToolCall, Usage,
};

/// Events produced by one input line: none, one, or (for a `tool_calls`
/// finish) the assembled delta followed by the terminal event.
pub type Step = SmallVec<[CompletionEvent; 2]>;

/// Identity fields remembered from the most recent chunk, so that a
/// synthesized terminal completion still says which completion it ends.
#[derive(Debug, Default)]
struct ChunkMeta {
    id: String,
    object: Option<String>,
    created: Option<u64>,
    model: String,
    system_fingerprint: Option<String>,
    usage: Option<Usage>,
    finish_reason: Option<String>,
}

impl ChunkMeta {
    fn observe(&mut self, chunk: &ChatCompletion) {
        if !chunk.id.is_empty() {
            chunk.id.clone_into(&mut self.id);
        }
        if !chunk.model.is_empty() {
            chunk.model.clone_into(&mut self.model);
        }
        if chunk.object.is_some() {
            self.object.clone_from(&chunk.object);
        }
        if chunk.created.is_some() {
            self.created = chunk.created;
        }
        if chunk.system_fingerprint.is_some() {
            self.system_fingerprint.clone_from(&chunk.system_fingerprint);
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }
        if let Some(reason) = chunk.choices.first().and_then(|c| c.finish_reason.as_ref()) {
            self.finish_reason = Some(reason.clone());
        }
    }
}

/// Incremental chat-completion stream decoder.
///
/// One instance per streamed call. Feed it lines in wire order with
/// [`Self::push_line`]; report EOF with [`Self::finish`] and body failures with
/// [`Self::fail`]. Exactly one terminal event ([`CompletionEvent::Done`] or
/// [`CompletionEvent::Failed`]) is ever produced; every call after it returns
/// nothing.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    tool_calls: ToolCallAccumulator,
    meta: ChunkMeta,
    frames: u64,
    terminated: bool,
}

impl StreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal event has been produced.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Process one wire line.
    pub fn push_line(&mut self, line: &str) -> Step {
        let mut out = Step::new();
        if self.terminated {
            return out;
        }
        match classify_line(line) {
            StreamFrame::Ignored => {}
            StreamFrame::Done => {
                tracing::debug!(frames = self.frames, "stream done marker received");
                out.push(self.terminate_done());
            }
            StreamFrame::Data(payload) => self.push_data(payload, line, &mut out),
        }
        out
    }

    /// The source is exhausted without a `[DONE]` marker; ends the stream normally.
    pub fn finish(&mut self) -> Option<CompletionEvent> {
        if self.terminated {
            return None;
        }
        tracing::debug!(frames = self.frames, "stream closed without done marker");
        Some(self.terminate_done())
    }

    /// The source failed (connection dropped, body error); ends the stream abnormally.
    pub fn fail(&mut self, err: StreamError) -> Option<CompletionEvent> {
        if self.terminated {
            return None;
        }
        tracing::debug!(frames = self.frames, error = %err, "stream failed");
        self.terminated = true;
        Some(CompletionEvent::Failed(err))
    }

    fn push_data(&mut self, payload: &str, line: &str, out: &mut Step) {
        let mut completion: ChatCompletion = match serde_json::from_str(payload) {
            Ok(completion) => completion,
            Err(err) => {
                tracing::debug!(error = %err, "stream frame failed to decode");
                self.terminated = true;
                out.push(CompletionEvent::Failed(StreamError::decode(&err, line)));
                return;
            }
        };
        self.frames += 1;

        if let Some(error) = completion.error.take() {
            tracing::debug!(message = %error.message, "stream frame carried an error object");
            self.terminated = true;
            out.push(CompletionEvent::Failed(StreamError::Api(error)));
            return;
        }
        self.meta.observe(&completion);

        if completion.choices.is_empty() {
            out.push(CompletionEvent::Delta(completion));
            return;
        }
        let first = &mut completion.choices[0];
        if let Some(fragments) = first
            .delta
            .as_ref()
            .and_then(|delta| delta.tool_calls.as_deref())
        {
            for fragment in fragments {
                self.tool_calls.apply(fragment);
            }
        }
        if !first.finished_with_tool_calls() {
            out.push(CompletionEvent::Delta(completion));
            return;
        }

        let tool_calls = self.tool_calls.finish();
        tracing::debug!(
            frames = self.frames,
            tool_calls = tool_calls.len(),
            "stream finished with tool calls"
        );
        first.message = Some(ChatMessage::assistant_tool_calls(tool_calls));
        self.terminated = true;
        out.push(CompletionEvent::Delta(completion.clone()));
        out.push(CompletionEvent::Done(completion));
    }

    fn terminate_done(&mut self) -> CompletionEvent {
        self.terminated = true;
        let tool_calls: Vec<ToolCall> = self.tool_calls.finish();
        let meta = std::mem::take(&mut self.meta);
        CompletionEvent::Done(ChatCompletion {
            id: meta.id,
            object: meta.object,
            created: meta.created,
            model: meta.model,
            choices: vec![ChatCompletionChoice {
                index: 0,
                delta: None,
                message: Some(ChatMessage::assistant_tool_calls(tool_calls)),
                finish_reason: meta.finish_reason,
            }],
            usage: meta.usage,
            system_fingerprint: meta.system_fingerprint,
            error: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Delivery forms
// ---------------------------------------------------------------------------

/// Decode a line source, invoking `on_event` for every event in wire order.
///
/// Stops reading at the terminal event; lines left in the source are not
/// consumed. A source error becomes the terminal [`CompletionEvent::Failed`].
pub fn decode<I, E, F>(lines: I, mut on_event: F)
where
    I: IntoIterator<Item = Result<String, E>>,
    E: Into<StreamError>,
    F: FnMut(CompletionEvent),
{
    let mut decoder = StreamDecoder::new();
    for line in lines {
        let step: Step = match line {
            Ok(line) => decoder.push_line(&line),
            Err(err) => decoder.fail(err.into()).into_iter().collect(),
        };
        for event in step {
            on_event(event);
        }
        if decoder.is_terminated() {
            return;
        }
    }
    if let Some(event) = decoder.finish() {
        on_event(event);
    }
}

/// [`decode`] over a buffered reader, e.g. a captured transcript on disk.
pub fn decode_reader<R, F>(reader: R, on_event: F)
where
    R: BufRead,
    F: FnMut(CompletionEvent),
{
    decode(reader.lines(), on_event);
}

/// Decode an HTTP body byte stream into an async stream of events.
///
/// The returned stream ends right after the terminal event. Dropping it
/// abandons the body.
pub fn decode_stream<S, E>(byte_stream: S) -> impl Stream<Item = CompletionEvent> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<StreamError> + Send + 'static,
{
    decode_line_stream(sse_line_stream(byte_stream))
}

/// Decode an async stream of already-split lines.
pub fn decode_line_stream<L>(lines: L) -> impl Stream<Item = CompletionEvent> + Send
where
    L: Stream<Item = Result<String, StreamError>> + Send + 'static,
{
    futures_util::stream::unfold(
        (Box::pin(lines), StreamDecoder::new(), Step::new().into_iter()),
        |(mut lines, mut decoder, mut pending)| async move {
            loop {
                if let Some(event) = pending.next() {
                    return Some((event, (lines, decoder, pending)));
                }
                if decoder.is_terminated() {
                    return None;
                }
                let step: Step = match lines.as_mut().next().await {
                    Some(Ok(line)) => decoder.push_line(&line),
                    Some(Err(err)) => decoder.fail(err).into_iter().collect(),
                    None => decoder.finish().into_iter().collect(),
                };
                pending = step.into_iter();
            }
        },
    )
}

/// Run the decoder on a dedicated task and deliver events through a bounded channel.
///
/// Dropping the receiver cancels the task and releases the body.
pub fn spawn_decoder<S, E>(byte_stream: S, buffer: usize) -> mpsc::Receiver<CompletionEvent>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<StreamError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));
    tokio::spawn(async move {
        let mut events = Box::pin(decode_stream(byte_stream));
        loop {
            let next = tokio::select! {
                () = tx.closed() => {
                    tracing::debug!("event receiver dropped, abandoning stream");
                    return;
                }
                next = events.next() => next,
            };
            let Some(event) = next else {
                return;
            };
            if tx.send(event).await.is_err() {
                tracing::debug!("event receiver dropped, abandoning stream");
                return;
            }
        }
    });
    rx
}

/// Run the decoder on a dedicated task, invoking `on_event` for every event.
pub fn spawn_decoder_with<S, E, F>(byte_stream: S, mut on_event: F) -> JoinHandle<()>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<StreamError> + Send + 'static,
    F: FnMut(CompletionEvent) + Send + 'static,
{
    tokio::spawn(async move {
        let mut events = Box::pin(decode_stream(byte_stream));
        while let Some(event) = events.next().await {
            on_event(event);
        }
    })
}
