// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// WebSocket gateway
//
// Responsibilities:
// - Liveness endpoint
// - One session per WebSocket connection, registered for its lifetime
// - Client frame parsing and dispatch (initialize, send_message, clear_history)
// - Relaying sentence chunks with exactly one terminal event per turn
// - Rejecting overlapping turns with a non-terminal busy event
// - Aborting in-flight completions when the client goes away
// - 404 for unknown paths

use crate::completion::{CompletionError, CompletionOutcome, CompletionSession, SentenceSink};
use crate::persona::InitChatRequest;
use crate::session::{Session, SessionRegistry};
use crate::stream::SentenceChunk;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;

/// Body of `GET /alive`.
pub const ALIVE_BODY: &str = "Server is alive!";

/// Outbound events buffered per connection before the relay waits on the
/// socket writer.
const EVENT_BUFFER: usize = 64;

/// The address the gateway binds to. Always localhost, never 0.0.0.0.
pub const BIND_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 9800);

// ---------------------------------------------------------------------------
// Wire protocol
// ---------------------------------------------------------------------------

/// Client to server frames, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Initialize(InitChatRequest),
    SendMessage { text: String },
    ClearHistory,
}

/// Server to client frames, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Initialized,
    HistoryCleared,
    ResponseStart,
    ResponseChunk(SentenceChunk),
    ResponseDone { done: bool },
    Error { message: String },
    /// A turn was refused because another is still streaming. Not part of
    /// either turn's event sequence.
    Busy { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerEvent::ResponseDone { .. } | ServerEvent::Error { .. })
    }
}

#[async_trait]
impl SentenceSink for mpsc::Sender<ServerEvent> {
    async fn started(&self) -> bool {
        self.send(ServerEvent::ResponseStart).await.is_ok()
    }

    async fn deliver(&self, chunk: SentenceChunk) -> bool {
        self.send(ServerEvent::ResponseChunk(chunk)).await.is_ok()
    }
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub completion: Arc<CompletionSession>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(completion: CompletionSession) -> Self {
        Self {
            completion: Arc::new(completion),
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Liveness endpoint: GET /alive -> 200 "Server is alive!"
pub async fn alive() -> &'static str {
    ALIVE_BODY
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let session = state.sessions.open();
    let (ws_sender, ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<ServerEvent>(EVENT_BUFFER);
    let writer = tokio::spawn(write_events(ws_sender, rx));

    serve_connection(ws_receiver, state, session, tx).await;
    writer.abort();
}

/// Read client frames for `session` until the client closes or the read
/// fails, then abort its in-flight turn and unregister it.
///
/// Returns only after every spawned turn has stopped, so the pending guard
/// is released and no reply is committed once this resolves.
pub async fn serve_connection<S, E>(
    mut frames: S,
    state: AppState,
    session: Arc<Session>,
    tx: mpsc::Sender<ServerEvent>,
) where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let connection_id = session.id().to_string();
    tracing::info!(connection_id = %connection_id, "client connected");
    let mut turns = JoinSet::new();

    while let Some(frame) = frames.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "websocket read failed");
                break;
            }
        };

        match frame {
            Message::Text(text) => {
                // Reap finished turns so the set stays small.
                while turns.try_join_next().is_some() {}
                dispatch(&text, &state, &session, &tx, &mut turns).await;
            }
            Message::Binary(data) => {
                tracing::debug!(connection_id = %connection_id, len = data.len(), "binary frame ignored");
                let _ = tx.send(ServerEvent::error("binary frames are not supported")).await;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    // Dropping the upstream stream inside the aborted task closes the
    // upstream response; the pending guard releases on drop.
    turns.shutdown().await;
    state.sessions.close(&connection_id);
    tracing::info!(connection_id = %connection_id, "client disconnected");
}

/// Parse one text frame and act on it. Completions run on `turns` so the
/// socket keeps being read while a reply streams.
async fn dispatch(
    text: &str,
    state: &AppState,
    session: &Arc<Session>,
    tx: &mpsc::Sender<ServerEvent>,
    turns: &mut JoinSet<()>,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(connection_id = %session.id(), error = %e, "unparseable client frame");
            let _ = tx.send(ServerEvent::error(format!("invalid message: {e}"))).await;
            return;
        }
    };

    match message {
        ClientMessage::Initialize(request) => {
            let event = match session.initialize(request).await {
                Ok(()) => ServerEvent::Initialized,
                Err(e) => ServerEvent::error(e.to_string()),
            };
            let _ = tx.send(event).await;
        }
        ClientMessage::ClearHistory => {
            let event = match session.clear_history().await {
                Ok(()) => ServerEvent::HistoryCleared,
                Err(e) => ServerEvent::error(e.to_string()),
            };
            let _ = tx.send(event).await;
        }
        ClientMessage::SendMessage { text } => {
            let completion = Arc::clone(&state.completion);
            let session = Arc::clone(session);
            let tx = tx.clone();
            turns.spawn(async move {
                relay_message(&completion, &session, &text, &tx).await;
            });
        }
    }
}

/// Run one turn and relay it as events: `response_start`, zero or more
/// `response_chunk`, then exactly one of `response_done` or `error`.
///
/// A turn refused while another streams gets a lone `busy` event, and an
/// uninitialized session a lone `error`; neither sends `response_start`.
/// Nothing terminal is sent when the client went away mid-turn.
pub async fn relay_message(
    completion: &CompletionSession,
    session: &Session,
    text: &str,
    events: &mpsc::Sender<ServerEvent>,
) {
    let terminal = match completion.run(session, text, events).await {
        Ok(CompletionOutcome::Completed { .. }) => ServerEvent::ResponseDone { done: true },
        Ok(CompletionOutcome::Cancelled) => return,
        Err(e @ CompletionError::Busy) => {
            tracing::debug!(connection_id = %session.id(), "turn refused while another streams");
            ServerEvent::Busy {
                message: e.to_string(),
            }
        }
        Err(e) => {
            tracing::info!(connection_id = %session.id(), error = %e, "turn ended with error");
            ServerEvent::error(e.to_string())
        }
    };
    let _ = events.send(terminal).await;
}

/// Serialize queued events onto the socket until either side closes.
async fn write_events(mut sender: SplitSink<WebSocket, Message>, rx: mpsc::Receiver<ServerEvent>) {
    let mut events = ReceiverStream::new(rx);
    while let Some(event) = events.next().await {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize server event");
                continue;
            }
        };
        if sender.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// Build the axum router with the liveness and WebSocket routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/alive", get(alive))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
