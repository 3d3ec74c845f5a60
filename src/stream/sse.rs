//! SSE line splitting and frame classification.
//!
//! Turns a chunked HTTP body into complete text lines, buffering partial lines
//! across chunk boundaries, and classifies each line as a data frame, the
//! `[DONE]` terminator or something the decoder ignores.
use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use memchr::memchr;
use smallvec::SmallVec;

use crate::error::StreamError;

/// Literal payload marking the end of a chat-completion stream.
pub const DONE_PAYLOAD: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// One classified line of the wire stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFrame<'a> {
    /// A `data:` line; the payload has the prefix and one leading space removed.
    Data(&'a str),
    /// `data: [DONE]`.
    Done,
    /// Blank lines, comments, `event:`/`id:`/`retry:` fields and anything else.
    Ignored,
}

/// Classify a single line (with or without its trailing `\r`).
#[must_use]
pub fn classify_line(line: &str) -> StreamFrame<'_> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return StreamFrame::Ignored;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return StreamFrame::Ignored;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim() == DONE_PAYLOAD {
        StreamFrame::Done
    } else if payload.trim().is_empty() {
        StreamFrame::Ignored
    } else {
        StreamFrame::Data(payload)
    }
}

// ---------------------------------------------------------------------------
// Line splitting
// ---------------------------------------------------------------------------

/// Incremental line splitter.
///
/// Feed it raw body chunks split at arbitrary byte boundaries; it yields each
/// complete line without its terminator. Lines are only decoded once complete,
/// so multi-byte UTF-8 sequences split across chunks come out intact.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: BytesMut,
    scan_from: usize,
}

impl LineSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            scan_from: 0,
        }
    }

    /// Feed a chunk and return every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed a chunk and append completed lines into a caller-provided buffer.
    pub fn feed_into<C>(&mut self, chunk: &[u8], out: &mut C)
    where
        C: Extend<String>,
    {
        self.buffer.extend_from_slice(chunk);
        while let Some(rel_pos) = memchr(b'\n', &self.buffer[self.scan_from..]) {
            let line_end = self.scan_from + rel_pos;
            let mut line = self.buffer.split_to(line_end + 1);
            line.truncate(line_end);
            if line.last().copied() == Some(b'\r') {
                line.truncate(line.len() - 1);
            }
            out.extend(std::iter::once(decode_line(&line)));
            self.scan_from = 0;
        }
        self.scan_from = self.buffer.len();
    }

    /// Flush a trailing line that never got its newline (EOF).
    pub fn finish(&mut self) -> Option<String> {
        self.scan_from = 0;
        if self.buffer.is_empty() {
            return None;
        }
        let mut rest = self.buffer.split();
        if rest.last().copied() == Some(b'\r') {
            rest.truncate(rest.len() - 1);
        }
        Some(decode_line(&rest))
    }

    /// Bytes currently held back waiting for a newline.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(err) => {
            tracing::warn!(
                valid_up_to = err.valid_up_to(),
                "stream line is not valid UTF-8, replacing invalid sequences"
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

// ---------------------------------------------------------------------------
// Stream utility
// ---------------------------------------------------------------------------

struct PendingLines {
    lines: SmallVec<[String; 8]>,
    head: usize,
}

impl PendingLines {
    fn new() -> Self {
        Self {
            lines: SmallVec::new(),
            head: 0,
        }
    }

    fn pop_front(&mut self) -> Option<String> {
        if self.head >= self.lines.len() {
            return None;
        }
        let line = std::mem::take(&mut self.lines[self.head]);
        self.head += 1;
        if self.head == self.lines.len() {
            self.lines.clear();
            self.head = 0;
        }
        Some(line)
    }
}

impl Extend<String> for PendingLines {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        self.lines.extend(iter);
    }
}

/// Split an HTTP body byte stream into text lines.
///
/// A body error is yielded once as `Err` and ends the stream. At EOF a trailing
/// unterminated line is flushed.
pub fn sse_line_stream<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<String, StreamError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<StreamError> + Send + 'static,
{
    use futures_util::StreamExt;

    futures_util::stream::unfold(
        (
            Box::pin(byte_stream),
            LineSplitter::new(),
            PendingLines::new(),
            false,
        ),
        |(mut stream, mut splitter, mut pending, mut finished)| async move {
            loop {
                if let Some(line) = pending.pop_front() {
                    return Some((Ok(line), (stream, splitter, pending, finished)));
                }
                if finished {
                    return None;
                }

                match stream.as_mut().next().await {
                    Some(Ok(bytes)) => splitter.feed_into(&bytes, &mut pending),
                    Some(Err(err)) => {
                        finished = true;
                        return Some((Err(err.into()), (stream, splitter, pending, finished)));
                    }
                    None => {
                        finished = true;
                        if let Some(tail) = splitter.finish() {
                            return Some((Ok(tail), (stream, splitter, pending, finished)));
                        }
                        return None;
                    }
                }
            }
        },
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn test_classify_data_line() {
        assert_eq!(classify_line("data: {\"a\":1}"), StreamFrame::Data("{\"a\":1}"));
        assert_eq!(classify_line("data:{\"a\":1}"), StreamFrame::Data("{\"a\":1}"));
        assert_eq!(classify_line("data: {\"a\":1}\r"), StreamFrame::Data("{\"a\":1}"));
    }

    #[test]
    fn test_classify_done_line() {
        assert_eq!(classify_line("data: [DONE]"), StreamFrame::Done);
        assert_eq!(classify_line("data:[DONE]"), StreamFrame::Done);
        assert_eq!(classify_line("data: [DONE] \r"), StreamFrame::Done);
    }

    #[test]
    fn test_classify_ignored_lines() {
        assert_eq!(classify_line(""), StreamFrame::Ignored);
        assert_eq!(classify_line("\r"), StreamFrame::Ignored);
        assert_eq!(classify_line(": keep-alive"), StreamFrame::Ignored);
        assert_eq!(classify_line("event: message"), StreamFrame::Ignored);
        assert_eq!(classify_line("id: 7"), StreamFrame::Ignored);
        assert_eq!(classify_line("data:"), StreamFrame::Ignored);
        assert_eq!(classify_line("[DONE]"), StreamFrame::Ignored);
    }

    #[test]
    fn test_split_complete_lines() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.feed(b"data: a\n\ndata: b\n\n");
        assert_eq!(lines, vec!["data: a", "", "data: b", ""]);
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn test_split_partial_lines() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.feed(b"data: hel").is_empty());
        assert!(splitter.feed(b"lo").is_empty());
        assert_eq!(splitter.feed(b"\r\n"), vec!["data: hello"]);
    }

    #[test]
    fn test_split_multibyte_across_chunks() {
        let text = "data: {\"content\":\"héllo\"}\n".as_bytes();
        let cut = text.iter().position(|&b| b == 0xc3).unwrap() + 1;
        let mut splitter = LineSplitter::new();
        assert!(splitter.feed(&text[..cut]).is_empty());
        assert_eq!(splitter.feed(&text[cut..]), vec!["data: {\"content\":\"héllo\"}"]);
    }

    #[test]
    fn test_finish_flushes_tail() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.feed(b"data: [DONE]").is_empty());
        assert_eq!(splitter.finish().as_deref(), Some("data: [DONE]"));
        assert!(splitter.finish().is_none());
    }

    #[tokio::test]
    async fn test_line_stream_orders_lines() {
        let source = futures_util::stream::iter(vec![
            Ok::<Bytes, StreamError>(Bytes::from_static(b"data: first\n\nda")),
            Ok(Bytes::from_static(b"ta: second\n\ndata: [DONE]")),
        ]);
        let lines: Vec<String> = sse_line_stream(source)
            .map(|line| line.unwrap())
            .collect()
            .await;
        assert_eq!(
            lines,
            vec!["data: first", "", "data: second", "", "data: [DONE]"]
        );
    }

    #[tokio::test]
    async fn test_line_stream_surfaces_body_error_once() {
        let source = futures_util::stream::iter(vec![
            Ok::<Bytes, StreamError>(Bytes::from_static(b"data: a\n")),
            Err(StreamError::Transport("connection reset".into())),
            Ok(Bytes::from_static(b"data: never\n")),
        ]);
        let items: Vec<Result<String, StreamError>> = sse_line_stream(source).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().ok(), Some("data: a"));
        assert!(matches!(items[1], Err(StreamError::Transport(_))));
    }
}
