// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// Per-connection session state.
//
// One `Session` per client connection, keyed by connection id in the
// `SessionRegistry`. Sessions share nothing with each other. Within a
// session, history access goes through a mutex held only for short,
// await-free sections, and a pending flag admits at most one operation
// (completion, initialize or clear) at a time.

use crate::history::ConversationHistory;
use crate::message::Role;
use crate::persona::{InitChatRequest, Persona, ValidationError};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("chat is not initialized: send initialize first")]
    Uninitialized,

    #[error("a response is already in progress for this session")]
    Busy,

    #[error("invalid initialize payload: {0}")]
    Invalid(#[from] ValidationError),
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Mutable state behind a session's mutex.
#[derive(Debug, Clone)]
pub struct SessionState {
    initialized: bool,
    persona: Option<Persona>,
    history: ConversationHistory,
    /// When the connection was opened.
    pub created_at: DateTime<Utc>,
    /// When the session last recorded a message.
    pub last_seen: DateTime<Utc>,
    /// Completed user turns.
    pub turn_count: u64,
}

impl SessionState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            initialized: false,
            persona: None,
            history: ConversationHistory::new(),
            created_at: now,
            last_seen: now,
            turn_count: 0,
        }
    }

    /// Capture the persona and replace history with its system prompt.
    pub fn initialize(&mut self, persona: Persona) {
        self.history.reset(persona.system_prompt());
        self.persona = Some(persona);
        self.initialized = true;
        self.last_seen = Utc::now();
    }

    /// Drop every non-system message.
    pub fn clear(&mut self) {
        self.history.clear();
        self.last_seen = Utc::now();
    }

    pub fn record_user(&mut self, content: &str) {
        self.history.append(Role::User, content);
        self.turn_count += 1;
        self.last_seen = Utc::now();
    }

    pub fn record_assistant(&mut self, content: String) {
        self.history.append(Role::Assistant, content);
        self.last_seen = Utc::now();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn persona(&self) -> Option<&Persona> {
        self.persona.as_ref()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Marks an operation as in flight. The flag clears on drop, so an aborted
/// completion task releases the session.
#[derive(Debug)]
pub struct PendingCompletion<'a> {
    flag: &'a AtomicBool,
}

impl Drop for PendingCompletion<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct Session {
    id: String,
    state: Mutex<SessionState>,
    pending: AtomicBool,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(SessionState::new()),
            pending: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &Mutex<SessionState> {
        &self.state
    }

    /// Claim the session for one operation. `None` if one is already running.
    pub fn try_begin(&self) -> Option<PendingCompletion<'_>> {
        self.pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PendingCompletion {
                flag: &self.pending,
            })
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Validate the payload and (re)initialize. Replaces history wholesale.
    pub async fn initialize(&self, request: InitChatRequest) -> Result<(), SessionError> {
        let persona = request.validate()?;
        let _pending = self.try_begin().ok_or(SessionError::Busy)?;
        self.state.lock().await.initialize(persona);
        tracing::info!(session_id = %self.id, "session initialized");
        Ok(())
    }

    /// Remove all non-system messages.
    pub async fn clear_history(&self) -> Result<(), SessionError> {
        let _pending = self.try_begin().ok_or(SessionError::Busy)?;
        self.state.lock().await.clear();
        tracing::info!(session_id = %self.id, "history cleared");
        Ok(())
    }

    /// Copy of the current history.
    pub async fn history(&self) -> ConversationHistory {
        self.state.lock().await.history().clone()
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Connection id -> session map, backed by `DashMap` for concurrent access
/// from connection tasks.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a session under a fresh connection id.
    pub fn open(&self) -> Arc<Session> {
        let session = Arc::new(Session::new(Uuid::new_v4().to_string()));
        self.sessions
            .insert(session.id().to_string(), Arc::clone(&session));
        session
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a session on disconnect.
    pub fn close(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MAX_HISTORY_LENGTH;

    fn init_request() -> InitChatRequest {
        InitChatRequest {
            character_name: "Aria".into(),
            character_personality: "curious".into(),
            character_speech_style: "formal".into(),
            character_behavior: "helpful".into(),
            user_name: "Sam".into(),
            current_situation: "first meeting".into(),
            chat_rules: "be concise".into(),
            ..Default::default()
        }
    }

    // ---------------------------------------------------------------
    // SessionState
    // ---------------------------------------------------------------

    #[test]
    fn new_state_is_uninitialized_and_empty() {
        let state = SessionState::new();
        assert!(!state.is_initialized());
        assert!(state.persona().is_none());
        assert!(state.history().is_empty());
        assert_eq!(state.turn_count, 0);
    }

    #[test]
    fn initialize_sets_system_prompt() {
        let mut state = SessionState::new();
        state.initialize(init_request().validate().unwrap());
        assert!(state.is_initialized());
        assert_eq!(state.history().len(), 1);
        assert_eq!(state.history().messages()[0].role(), Role::System);
        assert!(state.history().messages()[0].content().contains("Aria"));
    }

    #[test]
    fn reinitialize_replaces_history() {
        let mut state = SessionState::new();
        state.initialize(init_request().validate().unwrap());
        state.record_user("hi");
        state.record_assistant("hello".into());

        let mut other = init_request();
        other.character_name = "Bram".into();
        state.initialize(other.validate().unwrap());

        assert_eq!(state.history().len(), 1);
        assert!(state.history().messages()[0].content().contains("Bram"));
        assert_eq!(state.persona().unwrap().character.name, "Bram");
    }

    #[test]
    fn record_user_counts_turns_and_caps_history() {
        let mut state = SessionState::new();
        state.initialize(init_request().validate().unwrap());
        for i in 0..40 {
            state.record_user(&format!("turn {i}"));
        }
        assert_eq!(state.turn_count, 40);
        assert_eq!(state.history().len(), MAX_HISTORY_LENGTH);
        assert_eq!(state.history().messages()[0].role(), Role::System);
    }

    // ---------------------------------------------------------------
    // Session
    // ---------------------------------------------------------------

    #[test]
    fn pending_guard_is_exclusive_and_released_on_drop() {
        let session = Session::new("s1");
        let guard = session.try_begin().expect("first claim succeeds");
        assert!(session.is_pending());
        assert!(session.try_begin().is_none());
        drop(guard);
        assert!(!session.is_pending());
        assert!(session.try_begin().is_some());
    }

    #[tokio::test]
    async fn initialize_validates_payload() {
        let session = Session::new("s1");
        let mut bad = init_request();
        bad.character_name = "".into();
        let err = session.initialize(bad).await.unwrap_err();
        assert_eq!(
            err,
            SessionError::Invalid(ValidationError {
                field: "characterName"
            })
        );
        assert!(!session.state().lock().await.is_initialized());
    }

    #[tokio::test]
    async fn initialize_and_clear_rejected_while_pending() {
        let session = Session::new("s1");
        session.initialize(init_request()).await.unwrap();

        let _pending = session.try_begin().unwrap();
        assert_eq!(
            session.initialize(init_request()).await,
            Err(SessionError::Busy)
        );
        assert_eq!(session.clear_history().await, Err(SessionError::Busy));
    }

    #[tokio::test]
    async fn clear_history_keeps_system_message() {
        let session = Session::new("s1");
        session.initialize(init_request()).await.unwrap();
        {
            let mut state = session.state().lock().await;
            state.record_user("a");
            state.record_assistant("b".into());
        }
        session.clear_history().await.unwrap();

        let history = session.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history.messages()[0].role(), Role::System);
        assert!(!session.is_pending());
    }

    #[tokio::test]
    async fn clear_before_initialize_is_noop() {
        let session = Session::new("s1");
        session.clear_history().await.unwrap();
        assert!(session.history().await.is_empty());
    }

    // ---------------------------------------------------------------
    // SessionRegistry
    // ---------------------------------------------------------------

    #[test]
    fn registry_open_get_close() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty());

        let a = registry.open();
        let b = registry.open();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);

        let fetched = registry.get(a.id()).unwrap();
        assert!(Arc::ptr_eq(&fetched, &a));

        assert!(registry.close(a.id()).is_some());
        assert!(registry.get(a.id()).is_none());
        assert!(registry.close(a.id()).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn sessions_do_not_share_history() {
        let registry = SessionRegistry::new();
        let a = registry.open();
        let b = registry.open();
        a.initialize(init_request()).await.unwrap();
        a.state().lock().await.record_user("only in a");

        assert_eq!(a.history().await.len(), 2);
        assert!(b.history().await.is_empty());
        assert!(!b.state().lock().await.is_initialized());
    }

    #[test]
    fn registry_concurrent_open() {
        let registry = Arc::new(SessionRegistry::new());
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.open().id().to_string())
            })
            .collect();

        for handle in handles {
            let id = handle.join().unwrap();
            assert!(registry.get(&id).is_some());
        }
        assert_eq!(registry.len(), 10);
    }
}
