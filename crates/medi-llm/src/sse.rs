//! # Incremental event-stream parser
//!
//! Turns the chunked `text/event-stream` body of a chat-completion response
//! into text fragments, one per `data:` record carrying
//! `choices[0].delta.content`.
//!
//! - Bytes are buffered and split on `\n` before decoding, so a multi-byte
//!   character split across chunks is reassembled first
//! - Blank lines, `:` comments and non-`data: ` fields are discarded
//! - `data: [DONE]` ends parsing; later lines and chunks are ignored
//! - A `data:` record whose JSON does not parse is held back as a partial
//!   record and scanning stops until more bytes arrive. The next line is
//!   appended to it and the joined record parsed again. A following `data:`
//!   line, blank line or comment drops the partial instead.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::{Buf, BytesMut};
use futures::Stream;
use serde_json::Value;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::ByteStream;

/// Prefix of a data field line.
const DATA_PREFIX: &str = "data: ";

/// Payload marking the end of the stream.
const DONE_MARKER: &str = "[DONE]";

/// Partial records larger than this are dropped instead of joined further.
pub const MAX_PARTIAL_RECORD_BYTES: usize = 1024 * 1024;

/// Boxed stream of text fragments produced by [`fragment_stream`].
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Parser lifecycle. There is no transition out of `Done`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParserState {
    /// Accepting bytes.
    Streaming,
    /// `[DONE]` was seen or [`EventParser::finish`] ran.
    Done,
}

/// What a single line contributes.
enum LineOutcome {
    Skip,
    Fragment(String),
    Done,
    Incomplete,
}

/// Incremental parser state: pending bytes plus an optional partial record.
#[derive(Debug)]
pub struct EventParser {
    buffer: BytesMut,
    partial: Option<String>,
    state: ParserState,
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EventParser {
    /// Create a parser in the `Streaming` state.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            partial: None,
            state: ParserState::Streaming,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Whether `[DONE]` was seen or the stream was finished.
    pub fn is_done(&self) -> bool {
        self.state == ParserState::Done
    }

    /// Append a chunk and return the fragments completed by it, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut fragments = Vec::new();
        if self.is_done() {
            return fragments;
        }
        self.buffer.extend_from_slice(chunk);
        self.scan(false, &mut fragments);
        fragments
    }

    /// Run a final pass over whatever is still buffered and move to `Done`.
    ///
    /// An unterminated last line is treated as complete. Records that still
    /// fail to parse are dropped.
    pub fn finish(&mut self) -> Vec<String> {
        let mut fragments = Vec::new();
        if self.is_done() {
            return fragments;
        }
        if !self.buffer.is_empty() && !self.buffer.ends_with(b"\n") {
            self.buffer.extend_from_slice(b"\n");
        }
        self.scan(true, &mut fragments);
        if let Some(partial) = self.partial.take() {
            debug!(
                bytes = partial.len(),
                preview = medi_core::text::truncate_str(&partial, 100),
                "dropping unparseable record at end of stream"
            );
        }
        self.buffer.clear();
        self.state = ParserState::Done;
        fragments
    }

    fn scan(&mut self, final_pass: bool, fragments: &mut Vec<String>) {
        while !self.is_done() {
            let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line = decode_line(&self.buffer[..newline]);

            let record = match self.partial.take() {
                Some(partial) if is_record_boundary(&line) => {
                    debug!(
                        bytes = partial.len(),
                        preview = medi_core::text::truncate_str(&partial, 100),
                        "dropping partial record"
                    );
                    // Rescan the same line with no partial pending.
                    continue;
                }
                Some(mut partial) => {
                    partial.push_str(&line);
                    partial
                }
                None => line,
            };
            self.buffer.advance(newline + 1);

            match classify_line(&record) {
                LineOutcome::Skip => {}
                LineOutcome::Fragment(text) => fragments.push(text),
                LineOutcome::Done => self.state = ParserState::Done,
                LineOutcome::Incomplete => {
                    if record.len() > MAX_PARTIAL_RECORD_BYTES {
                        warn!(bytes = record.len(), "partial record too large, dropping");
                        continue;
                    }
                    self.partial = Some(record);
                    if !final_pass {
                        break;
                    }
                }
            }
        }
    }
}

/// Decode one line (without its `\n`), stripping a trailing `\r`.
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Lines that start a new record and so cannot continue a partial one.
fn is_record_boundary(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with(':') || line.starts_with(DATA_PREFIX)
}

fn classify_line(line: &str) -> LineOutcome {
    if line.trim().is_empty() || line.starts_with(':') {
        return LineOutcome::Skip;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return LineOutcome::Skip;
    };
    let payload = payload.trim();
    if payload == DONE_MARKER {
        return LineOutcome::Done;
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => match value
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
        {
            Some(text) if !text.is_empty() => LineOutcome::Fragment(text.to_string()),
            _ => LineOutcome::Skip,
        },
        Err(e) => {
            debug!(
                error = %e,
                data_preview = medi_core::text::truncate_str(payload, 100),
                "incomplete event record, waiting for more bytes"
            );
            LineOutcome::Incomplete
        }
    }
}

/// Drive an [`EventParser`] over a byte stream.
///
/// A chunk is read only after every line of the previous chunk has been
/// classified. Reading stops at `[DONE]`. A byte-stream error is yielded once
/// after the fragments parsed so far, and ends the stream.
pub fn fragment_stream(bytes: ByteStream) -> FragmentStream {
    let state = (bytes, EventParser::new(), VecDeque::<String>::new(), false);

    Box::pin(futures::stream::unfold(
        state,
        |(mut bytes, mut parser, mut pending, mut ended)| async move {
            loop {
                if let Some(fragment) = pending.pop_front() {
                    return Some((Ok(fragment), (bytes, parser, pending, ended)));
                }
                if ended || parser.is_done() {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => pending.extend(parser.feed(&chunk)),
                    Some(Err(e)) => {
                        warn!(error = %e, "event stream read failed");
                        ended = true;
                        return Some((Err(e), (bytes, parser, pending, ended)));
                    }
                    None => {
                        ended = true;
                        pending.extend(parser.finish());
                    }
                }
            }
        },
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
