// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// Stream-level tests: decoder + segmenter working together.
//
// Tests cover:
//  1. Multi-frame payload decoded identically at every byte split
//  2. Arbitrary three-way splits produce the same deltas
//  3. One read carrying many frames
//  4. Deltas piped through the segmenter yield sentences in order
//  5. Malformed frames between good ones do not disturb ordering
//  6. Stream ending without [DONE] still flushes a trailing frame

use super::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn frame(text: &str) -> String {
    let payload = serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]
    });
    format!("data: {payload}\n\n")
}

fn payload(deltas: &[&str], done: bool) -> String {
    let mut out = String::from(
        "data: {\"id\":\"chatcmpl-1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    );
    for d in deltas {
        out.push_str(&frame(d));
    }
    if done {
        out.push_str("data: [DONE]\n\n");
    }
    out
}

/// Decode `chunks` in order and return every event, including the flush.
fn decode_all(chunks: &[&[u8]]) -> Vec<StreamEvent> {
    let mut decoder = EventStreamDecoder::new();
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(decoder.push(chunk));
    }
    events.extend(decoder.finish());
    events
}

fn deltas_of(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Delta(t) => Some(t.clone()),
            StreamEvent::Done => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Test 1: every two-way byte split decodes identically
// ---------------------------------------------------------------------------

#[test]
fn fragmentation_at_every_byte_boundary() {
    let body = payload(&["Hi", "! How", " are you", " today?", " \u{2014} caf\u{e9}"], true);
    let bytes = body.as_bytes();
    let expected = decode_all(&[bytes]);

    assert_eq!(
        deltas_of(&expected),
        vec!["Hi", "! How", " are you", " today?", " \u{2014} caf\u{e9}"]
    );
    assert_eq!(expected.last(), Some(&StreamEvent::Done));

    for split in 0..=bytes.len() {
        let (a, b) = bytes.split_at(split);
        assert_eq!(decode_all(&[a, b]), expected, "split at byte {split}");
    }
}

// ---------------------------------------------------------------------------
// Test 2: three-way splits
// ---------------------------------------------------------------------------

#[test]
fn fragmentation_across_three_reads() {
    let body = payload(&["alpha", "beta", "gamma"], true);
    let bytes = body.as_bytes();
    let expected = decode_all(&[bytes]);

    for i in (0..bytes.len()).step_by(7) {
        for j in (i..bytes.len()).step_by(11) {
            let events = decode_all(&[&bytes[..i], &bytes[i..j], &bytes[j..]]);
            assert_eq!(events, expected, "splits at {i} and {j}");
        }
    }
}

#[test]
fn byte_at_a_time_delivery() {
    let body = payload(&["one", "two"], true);
    let chunks: Vec<&[u8]> = body.as_bytes().chunks(1).collect();
    let events = decode_all(&chunks);
    assert_eq!(
        events,
        vec![
            StreamEvent::Delta("one".into()),
            StreamEvent::Delta("two".into()),
            StreamEvent::Done,
        ]
    );
}

// ---------------------------------------------------------------------------
// Test 3: single read with many frames
// ---------------------------------------------------------------------------

#[test]
fn many_frames_in_one_read_keep_order() {
    let deltas: Vec<String> = (0..100).map(|i| format!("chunk{i} ")).collect();
    let refs: Vec<&str> = deltas.iter().map(String::as_str).collect();
    let body = payload(&refs, false);

    let mut decoder = EventStreamDecoder::new();
    let events = decoder.push(body.as_bytes());
    assert_eq!(deltas_of(&events), deltas);
    assert!(!decoder.is_done());
}

// ---------------------------------------------------------------------------
// Test 4: decoder -> segmenter pipeline
// ---------------------------------------------------------------------------

#[test]
fn decoded_deltas_segment_into_sentences() {
    let body = payload(&["Hi", "! How", " are you", " today?"], true);
    let mut decoder = EventStreamDecoder::new();
    let mut segmenter = SentenceSegmenter::new();
    let mut sentences = Vec::new();

    for chunk in body.as_bytes().chunks(13) {
        for event in decoder.push(chunk) {
            if let StreamEvent::Delta(text) = event {
                sentences.extend(segmenter.feed(&text));
            }
        }
    }

    assert_eq!(sentences, vec!["Hi!"]);
    assert_eq!(segmenter.finish().as_deref(), Some("How are you today?"));
}

// ---------------------------------------------------------------------------
// Test 5: malformed frames interleaved
// ---------------------------------------------------------------------------

#[test]
fn malformed_frames_do_not_reorder_deltas() {
    let body = format!(
        "{}data: {{\"choices\": [oops\n\n{}data: 42\n\n{}",
        frame("first"),
        frame("second"),
        frame("third"),
    );

    let mut decoder = EventStreamDecoder::new();
    let events = decoder.push(body.as_bytes());
    assert_eq!(deltas_of(&events), vec!["first", "second", "third"]);
    assert_eq!(decoder.decode_errors(), 2);
}

// ---------------------------------------------------------------------------
// Test 6: natural end without sentinel
// ---------------------------------------------------------------------------

#[test]
fn stream_end_without_sentinel_flushes_partial_frame() {
    let body = payload(&["last words"], false);
    let trimmed = body.trim_end();

    let events = decode_all(&[trimmed.as_bytes()]);
    assert_eq!(events, vec![StreamEvent::Delta("last words".into())]);
}
