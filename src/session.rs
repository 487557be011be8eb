//! # Session Store
//!
//! Tracks which multi-turn flow, if any, awaits further input per
//! (user, chat) pair. The store is a plain map owned by value by the update
//! ingestion loop; nothing else can reach it, which enforces the
//! single-writer rule without locks. State is volatile and lost on restart.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use std::collections::HashMap;

/// (user_id, chat_id)
pub type SessionKey = (i64, i64);

/// Active multi-turn flow, tagged by owning controller. Absence of an entry
/// means idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Note(NoteFlow),
    Task(TaskFlow),
    Reminder(ReminderFlow),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteFlow {
    AwaitingAddText,
    AwaitingEditText { note_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFlow {
    AwaitingAddText,
    AwaitingEditText {
        task_id: i64,
    },
    /// Second stage of a task edit. `new_text` is None when the user kept
    /// the current text via the shortcut button.
    AwaitingEditDeadline {
        task_id: i64,
        new_text: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderFlow {
    AwaitingText,
    AwaitingTime { text: String },
}

#[derive(Debug, Default)]
pub struct SessionStore {
    states: HashMap<SessionKey, SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: i64, chat_id: i64) -> Option<&SessionState> {
        self.states.get(&(user_id, chat_id))
    }

    pub fn set(&mut self, user_id: i64, chat_id: i64, state: SessionState) {
        self.states.insert((user_id, chat_id), state);
    }

    /// Remove and return the current state, leaving the pair idle.
    pub fn take(&mut self, user_id: i64, chat_id: i64) -> Option<SessionState> {
        self.states.remove(&(user_id, chat_id))
    }

    pub fn clear(&mut self, user_id: i64, chat_id: i64) {
        self.states.remove(&(user_id, chat_id));
    }
}
