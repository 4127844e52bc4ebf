//! Turn and conversation log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single entry in the conversation log
#[derive(Debug, Clone)]
pub struct Turn {
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            created_at: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Ordered, append-only log of turns.
///
/// Only the reducer mutates it. The single exception to append-only is
/// [`Conversation::replace_content`], which the reducer uses on the open
/// assistant turn while it streams.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// `(role, content)` pairs, mostly useful for assertions and logging.
    pub fn entries(&self) -> Vec<(Role, &str)> {
        self.turns.iter().map(|t| (t.role, t.content.as_str())).collect()
    }

    /// Append a turn and return its index.
    pub(crate) fn push(&mut self, role: Role, content: impl Into<String>) -> usize {
        self.turns.push(Turn::new(role, content.into()));
        self.turns.len() - 1
    }

    /// Replace the content of an assistant turn. Out of range indices and
    /// user turns are left alone.
    pub(crate) fn replace_content(&mut self, index: usize, content: String) {
        match self.turns.get_mut(index) {
            Some(turn) if turn.role == Role::Assistant => turn.content = content,
            _ => tracing::warn!(index, "replace_content ignored: not an assistant turn"),
        }
    }
}
