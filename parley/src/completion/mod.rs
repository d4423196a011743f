// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// Streaming completion turn
//
// Responsibilities:
// - Gate the turn on an initialized, idle session
// - Record the user message and snapshot the request payload
// - Read the upstream byte stream under a deadline, decode deltas and
//   segment them into numbered sentences for the sink
// - Flush the trailing fragment per policy, marked final
// - Commit the full assistant reply to history only on success
//
// The session mutex is never held across an await on the network or the
// sink; the pending guard keeps the turn exclusive instead.

use crate::config::{Config, StreamConfig};
use crate::message::ChatMessage;
use crate::session::Session;
use crate::stream::{
    EventStreamDecoder, SentenceChunk, SentenceSegmenter, StreamEvent, TrailingFragmentPolicy,
};
use crate::upstream::{UpstreamClient, UpstreamError};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Duration, Instant};


// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Receives sentences in order as they complete.
#[async_trait]
pub trait SentenceSink: Send + Sync {
    /// Called once the turn is accepted, before history is touched.
    /// Returns `false` once the consumer is gone.
    async fn started(&self) -> bool {
        true
    }

    /// Deliver one chunk. Returns `false` once the consumer is gone.
    async fn deliver(&self, chunk: SentenceChunk) -> bool;
}

#[async_trait]
impl SentenceSink for mpsc::Sender<SentenceChunk> {
    async fn deliver(&self, chunk: SentenceChunk) -> bool {
        self.send(chunk).await.is_ok()
    }
}

// ---------------------------------------------------------------------------
// Outcome and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// Stream finished; `reply` was appended to history if non-empty.
    Completed {
        reply: String,
        sentences: u64,
        decode_errors: u64,
    },
    /// The sink went away mid-stream. History holds the user turn only.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompletionError {
    #[error("chat is not initialized: send initialize first")]
    Uninitialized,

    #[error("a response is already in progress for this session")]
    Busy,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

// ---------------------------------------------------------------------------
// CompletionSession
// ---------------------------------------------------------------------------

/// Runs completion turns against a shared upstream client. Holds no
/// per-session state; one instance serves every connection.
pub struct CompletionSession {
    upstream: Arc<UpstreamClient>,
    trailing_fragment: TrailingFragmentPolicy,
    stream_timeout: Duration,
}

impl CompletionSession {
    pub fn new(upstream: Arc<UpstreamClient>, stream: &StreamConfig) -> Self {
        let stream_timeout = Duration::from_millis(upstream.config().stream_timeout_ms);
        Self {
            upstream,
            trailing_fragment: stream.trailing_fragment,
            stream_timeout,
        }
    }

    pub fn from_config(upstream: Arc<UpstreamClient>, config: &Config) -> Self {
        Self::new(upstream, &config.stream)
    }

    /// Run one turn for `user_message`, streaming sentences into `sink`.
    ///
    /// Fails fast with `Uninitialized` or `Busy` without touching history
    /// or signalling the sink. `SentenceSink::started` fires only for an
    /// accepted turn. On upstream failure the user message stays in history and no
    /// assistant message is recorded.
    pub async fn run(
        &self,
        session: &Session,
        user_message: &str,
        sink: &dyn SentenceSink,
    ) -> Result<CompletionOutcome, CompletionError> {
        let _pending = session.try_begin().ok_or(CompletionError::Busy)?;

        if !session.state().lock().await.is_initialized() {
            return Err(CompletionError::Uninitialized);
        }
        if !sink.started().await {
            return Ok(CompletionOutcome::Cancelled);
        }

        // The pending guard blocks initialize and clear, so the state
        // checked above still holds.
        let payload = {
            let mut state = session.state().lock().await;
            state.record_user(user_message);
            state.history().to_request_payload()
        };

        let started = std::time::Instant::now();
        tracing::debug!(
            session_id = %session.id(),
            history_len = payload.len(),
            "completion started"
        );

        let streamed = match self.stream_reply(&payload, sink).await {
            Ok(streamed) => streamed,
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id(),
                    error = %e,
                    "completion failed; partial reply discarded"
                );
                return Err(e.into());
            }
        };

        let Streamed::Finished {
            reply,
            sentences,
            decode_errors,
        } = streamed
        else {
            tracing::info!(session_id = %session.id(), "completion cancelled by client");
            return Ok(CompletionOutcome::Cancelled);
        };

        if !reply.is_empty() {
            session.state().lock().await.record_assistant(reply.clone());
        }

        tracing::info!(
            session_id = %session.id(),
            sentences,
            decode_errors,
            reply_chars = reply.chars().count(),
            latency_ms = started.elapsed().as_millis() as u64,
            "completion finished"
        );

        Ok(CompletionOutcome::Completed {
            reply,
            sentences,
            decode_errors,
        })
    }

    /// Open the upstream stream and drive it to `[DONE]` or end of body.
    async fn stream_reply(
        &self,
        payload: &[ChatMessage],
        sink: &dyn SentenceSink,
    ) -> Result<Streamed, UpstreamError> {
        let deadline = Instant::now() + self.stream_timeout;

        let mut body = timeout_at(deadline, self.upstream.open_stream(payload))
            .await
            .map_err(|_| self.deadline_exceeded())??;

        let mut decoder = EventStreamDecoder::new();
        let mut segmenter = SentenceSegmenter::new();
        let mut emitter = Emitter::new(sink);
        let mut reply = String::new();

        loop {
            let read = timeout_at(deadline, body.next())
                .await
                .map_err(|_| self.deadline_exceeded())?;

            let (events, eof) = match read {
                Some(chunk) => (decoder.push(&chunk?), false),
                None => (decoder.finish(), true),
            };

            for event in events {
                let StreamEvent::Delta(text) = event else {
                    continue;
                };
                reply.push_str(&text);
                for sentence in segmenter.feed(&text) {
                    if !emitter.emit(sentence, false).await {
                        return Ok(Streamed::Cancelled);
                    }
                }
            }

            if eof || decoder.is_done() {
                break;
            }
        }
        drop(body);

        if let Some(tail) = segmenter.finish() {
            match self.trailing_fragment {
                TrailingFragmentPolicy::Emit => {
                    if !emitter.emit(tail, true).await {
                        return Ok(Streamed::Cancelled);
                    }
                }
                TrailingFragmentPolicy::Drop => {
                    tracing::debug!(chars = tail.chars().count(), "trailing fragment dropped");
                }
            }
        }

        Ok(Streamed::Finished {
            reply,
            sentences: emitter.next_sequence,
            decode_errors: decoder.decode_errors(),
        })
    }

    fn deadline_exceeded(&self) -> UpstreamError {
        UpstreamError::Timeout(format!(
            "no complete response within {}ms",
            self.stream_timeout.as_millis()
        ))
    }
}

enum Streamed {
    Finished {
        reply: String,
        sentences: u64,
        decode_errors: u64,
    },
    Cancelled,
}

/// Numbers sentences from 0 in emission order.
struct Emitter<'a> {
    sink: &'a dyn SentenceSink,
    next_sequence: u64,
}

impl<'a> Emitter<'a> {
    fn new(sink: &'a dyn SentenceSink) -> Self {
        Self {
            sink,
            next_sequence: 0,
        }
    }

    async fn emit(&mut self, content: String, is_final: bool) -> bool {
        let chunk = SentenceChunk {
            content,
            sequence_number: self.next_sequence,
            is_final,
        };
        self.next_sequence += 1;
        tracing::debug!(sequence = chunk.sequence_number, is_final, "sentence emitted");
        self.sink.deliver(chunk).await
    }
}
