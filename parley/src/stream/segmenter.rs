// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// Incremental sentence segmentation
//
// Scans for the earliest of ". ", "! ", "? " (by position, not by
// terminator priority), cuts through the punctuation mark, and carries the
// unterminated remainder into the next feed.

/// Two-character terminators: punctuation followed by a space.
pub const TERMINATORS: [&str; 3] = [". ", "! ", "? "];

/// Cut sentences shorter than this (in chars, after trimming) are noise.
pub const MIN_SENTENCE_CHARS: usize = 3;

/// Result of one segmentation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmented {
    pub complete: Vec<String>,
    pub remaining: String,
}

/// Segment `buffer` in one pass.
pub fn segment(buffer: &str) -> Segmented {
    let mut complete = Vec::new();
    let mut rest = buffer;

    while let Some(pos) = earliest_terminator(rest) {
        // Punctuation is one byte; the cut keeps it and drops the space.
        let sentence = rest[..=pos].trim();
        if sentence.chars().count() >= MIN_SENTENCE_CHARS {
            complete.push(sentence.to_string());
        }
        rest = &rest[pos + 2..];
    }

    Segmented {
        complete,
        remaining: rest.to_string(),
    }
}

fn earliest_terminator(text: &str) -> Option<usize> {
    TERMINATORS.iter().filter_map(|t| text.find(t)).min()
}

/// Stateful segmenter that carries the remainder across feeds.
///
/// Feeding `A` then `B` yields the same sentences as feeding `A + B` once.
#[derive(Debug, Default)]
pub struct SentenceSegmenter {
    remaining: String,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and return every sentence it completes.
    pub fn feed(&mut self, text: &str) -> Vec<String> {
        self.remaining.push_str(text);
        let Segmented {
            complete,
            remaining,
        } = segment(&self.remaining);
        self.remaining = remaining;
        complete
    }

    /// Text not yet closed by a terminator.
    pub fn remaining(&self) -> &str {
        &self.remaining
    }

    /// Consume the segmenter, returning the trimmed remainder if it is long
    /// enough to count as a sentence.
    pub fn finish(self) -> Option<String> {
        let tail = self.remaining.trim();
        (tail.chars().count() >= MIN_SENTENCE_CHARS).then(|| tail.to_string())
    }
}
