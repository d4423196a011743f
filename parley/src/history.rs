// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

// Bounded conversation history.
//
// Invariants:
// - If non-empty, element 0 is the sole system message and is never evicted.
// - Length never exceeds MAX_HISTORY_LENGTH after an append.

use crate::message::{ChatMessage, Message, Role};

/// Hard cap on the number of messages retained, system prompt included.
pub const MAX_HISTORY_LENGTH: usize = 30;

/// Ordered, size-bounded log of role-tagged messages.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole history with a single system message.
    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.messages.clear();
        self.messages.push(Message::new(Role::System, system_prompt));
    }

    /// Append a message, then apply the trim policy.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
        self.trim();
    }

    /// Keep message 0 plus the most recent `MAX_HISTORY_LENGTH - 1` messages.
    pub fn trim(&mut self) {
        if self.messages.len() <= MAX_HISTORY_LENGTH {
            return;
        }
        let excess = self.messages.len() - MAX_HISTORY_LENGTH;
        self.messages.drain(1..1 + excess);
    }

    /// Drop everything except system messages.
    pub fn clear(&mut self) {
        self.messages.retain(|m| m.role() == Role::System);
    }

    /// `{role, content}` pairs in original order, for upstream submission.
    pub fn to_request_payload(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(Message::to_chat_message).collect()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
