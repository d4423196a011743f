// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// Streaming primitives
//
// Responsibilities:
// - Decode SSE byte streams from an OpenAI-compatible completions API
// - Tolerate frames split across arbitrary network reads
// - Count and skip malformed frames without aborting the stream
// - Segment accumulated delta text into sentences, carrying the remainder

mod decoder;
mod segmenter;
mod types;

pub use decoder::EventStreamDecoder;
pub use segmenter::{segment, Segmented, SentenceSegmenter, MIN_SENTENCE_CHARS, TERMINATORS};
pub use types::{SentenceChunk, StreamEvent, TrailingFragmentPolicy, DONE_SENTINEL};

#[cfg(test)]
mod tests;
