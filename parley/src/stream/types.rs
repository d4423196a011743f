// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// Stream types
//
// Events produced by the decoder, the envelope shape of an upstream
// chunk, and the sentence chunks handed to the client sink.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Decoded events
// ---------------------------------------------------------------------------

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental model text from `choices[0].delta.content`.
    Delta(String),
    /// Terminal sentinel (`data: [DONE]`).
    Done,
}

/// Terminal sentinel payload.
pub const DONE_SENTINEL: &str = "[DONE]";

// ---------------------------------------------------------------------------
// Upstream chunk envelope
// ---------------------------------------------------------------------------

/// JSON carried on a `data:` line. Only the fields the decoder reads are
/// modelled; everything else in the envelope is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct ChunkEnvelope {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChunkEnvelope {
    /// Non-empty delta text of the first choice, if any.
    pub fn into_delta_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()?
            .delta?
            .content
            .filter(|c| !c.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Sentence output
// ---------------------------------------------------------------------------

/// A completed sentence delivered to the client, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceChunk {
    pub content: String,
    pub sequence_number: u64,
    /// Set only on the trailing fragment flushed at end of stream.
    pub is_final: bool,
}

/// What to do with unterminated text left in the segmenter when the
/// upstream stream ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingFragmentPolicy {
    /// Deliver it as the last chunk, flagged `is_final`.
    #[default]
    Emit,
    /// Discard it. It still reaches history as part of the full reply.
    Drop,
}
