//! Server-sent-event decoding for chat-completion streams.
//!
//! Only `data:` lines matter; the `[DONE]` sentinel ends the sequence.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::StreamExt as _;
use futures::stream::{self, Stream};
use tracing::trace;

/// Prefix marking an event line.
pub const DATA_PREFIX: &str = "data:";

/// Payload that terminates the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Raw payload of a `data:` line, trimmed.
    Data(String),
    /// The terminal marker.
    Done,
}

impl SseEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Classifies a single line of the response body.
///
/// Returns `None` for blank lines, non-`data:` lines (comments, keep-alives)
/// and `data:` lines with an empty payload.
pub fn decode_line(line: &str) -> Option<SseEvent> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return None;
    }
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == DONE_SENTINEL {
        return Some(SseEvent::Done);
    }
    Some(SseEvent::Data(payload.to_string()))
}

/// Reassembles newline-terminated lines from arbitrary byte chunks.
#[derive(Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    /// Buffers `chunk` and returns every line it completed.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=idx).collect();
            lines.push(bytes_to_line(&line[..idx]));
        }
        lines
    }

    /// Returns the unterminated remainder, if any, at end of body.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(bytes_to_line(&rest))
    }
}

fn bytes_to_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}

struct DecodeState<S> {
    bytes: S,
    lines: LineDecoder,
    pending: VecDeque<SseEvent>,
    finished: bool,
}

impl<S> DecodeState<S> {
    fn absorb(&mut self, lines: impl IntoIterator<Item = String>) {
        if self.finished {
            return;
        }
        for line in lines {
            match decode_line(&line) {
                Some(SseEvent::Done) => {
                    self.pending.push_back(SseEvent::Done);
                    self.finished = true;
                    return;
                }
                Some(event) => self.pending.push_back(event),
                None => trace!(line = %line, "skipping non-event line"),
            }
        }
    }
}

/// Turns a response body into a lazy sequence of events.
///
/// The sequence yields [`SseEvent::Done`] at most once and ends right after
/// it; lines received after the sentinel are never decoded. Read errors are
/// passed through untouched so the caller decides how to classify them.
pub fn event_stream<S, E>(bytes: S) -> impl Stream<Item = Result<SseEvent, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Unpin + Send + 'static,
    E: Send + 'static,
{
    stream::try_unfold(
        DecodeState {
            bytes,
            lines: LineDecoder::default(),
            pending: VecDeque::new(),
            finished: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.finished {
                    return Ok(None);
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        let lines = state.lines.push_chunk(&chunk);
                        state.absorb(lines);
                    }
                    Some(Err(err)) => return Err(err),
                    None => {
                        let tail = state.lines.finish();
                        state.absorb(tail);
                        state.finished = true;
                    }
                }
            }
        },
    )
}
