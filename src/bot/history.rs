//! Conversation history kept by a bot participant.

use std::collections::VecDeque;

/// Who produced a history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Another participant (or the relay), by name.
    Participant(String),
    /// This bot.
    Assistant,
}

/// One remembered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub text: String,
}

impl HistoryEntry {
    /// Entry for a message from another participant.
    pub fn participant(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Participant(name.into()),
            text: text.into(),
        }
    }

    /// Entry for one of this bot's own replies.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    /// Text as shown to the model, prefixed with the speaker for participants.
    pub fn prompt_line(&self) -> String {
        match &self.role {
            Role::Participant(name) => format!("{}: {}", name, self.text),
            Role::Assistant => self.text.clone(),
        }
    }
}

/// Insertion-ordered history with a storage cap.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl ConversationHistory {
    /// Create a history keeping at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(256)),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<HistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
