// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// Incremental SSE decoder
//
// Bytes are buffered until a full `\n`-terminated line is present, so a
// frame (or a multi-byte UTF-8 sequence) split across network reads is
// only decoded once complete. Malformed payloads are counted and skipped.

use super::types::{ChunkEnvelope, StreamEvent, DONE_SENTINEL};

/// Turns raw response bytes into ordered `StreamEvent`s.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    /// Bytes received since the last complete line.
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    /// Frames whose payload failed to parse.
    decode_errors: u64,
    /// Set once the terminal sentinel has been seen.
    done: bool,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read. Returns the events completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut line_start = 0;
        let mut scan_from = self.scanned;
        while let Some(offset) = self.buffer[scan_from..].iter().position(|b| *b == b'\n') {
            let newline = scan_from + offset;
            let line = self.buffer[line_start..newline].to_vec();
            if let Some(event) = self.decode_line(&line) {
                events.push(event);
            }
            line_start = newline + 1;
            scan_from = line_start;
        }

        self.buffer.drain(..line_start);
        self.scanned = self.buffer.len();
        events
    }

    /// Flush a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        self.decode_line(&line).into_iter().collect()
    }

    /// Number of frames skipped because their payload was unparseable.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    /// Whether the terminal sentinel has been decoded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<StreamEvent> {
        if self.done {
            return None;
        }

        let line = match std::str::from_utf8(raw) {
            Ok(l) => l.trim(),
            Err(e) => {
                self.record_error(&format!("invalid utf-8: {e}"));
                return None;
            }
        };

        // Blank separators, comments and non-data fields (event:, id:, retry:)
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        let data = line
            .strip_prefix("data: ")
            .or_else(|| line.strip_prefix("data:"))?
            .trim();

        if data == DONE_SENTINEL {
            self.done = true;
            return Some(StreamEvent::Done);
        }

        match serde_json::from_str::<ChunkEnvelope>(data) {
            Ok(envelope) => envelope.into_delta_text().map(StreamEvent::Delta),
            Err(e) => {
                self.record_error(&e.to_string());
                None
            }
        }
    }

    fn record_error(&mut self, reason: &str) {
        self.decode_errors += 1;
        tracing::warn!(
            decode_errors = self.decode_errors,
            reason = %reason,
            "skipping undecodable stream frame"
        );
    }
}
