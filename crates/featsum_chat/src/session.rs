//! Per-user dialogue state.
//!
//! One [`SessionStore`] is created at process start and shared by reference
//! with everything that needs it. State lives in memory only.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Chat-transport user identifier.
pub type UserId = i64;

/// Where a user is in the dialogue.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DialogueStep {
    #[default]
    Topic,
    Categories,
    Generating,
}

/// Dialogue progress for one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub topic: Option<String>,
    /// Selected labels in selection order; no duplicates.
    pub selected_categories: Vec<String>,
    pub step: DialogueStep,
    /// Categories offered once the topic was confirmed.
    pub available_categories: Vec<String>,
    /// Token of the generation in flight, set while `step` is `Generating`.
    #[serde(
        rename = "generationId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub generation_id: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Fresh state waiting for a topic.
    pub fn new() -> Self {
        Self {
            topic: None,
            selected_categories: Vec::new(),
            step: DialogueStep::Topic,
            available_categories: Vec::new(),
            generation_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether `token` names the generation this state is waiting on.
    pub fn is_generating(&self, token: &str) -> bool {
        self.step == DialogueStep::Generating && self.generation_id.as_deref() == Some(token)
    }

    pub fn is_selected(&self, category: &str) -> bool {
        self.selected_categories.iter().any(|c| c == category)
    }

    /// Select or deselect a category. Returns whether it is selected afterwards.
    pub fn toggle_category(&mut self, category: &str) -> bool {
        match self.selected_categories.iter().position(|c| c == category) {
            Some(index) => {
                self.selected_categories.remove(index);
                false
            }
            None => {
                self.selected_categories.push(category.to_string());
                true
            }
        }
    }
}

/// In-memory session store keyed by user.
///
/// `set` replaces the whole state; callers merge by reading first. Use
/// [`SessionStore::update`] when a read-modify-write must not interleave
/// with another writer for the same user.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<UserId, SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a user's state.
    pub fn get(&self, user: UserId) -> Option<SessionState> {
        self.sessions.read().get(&user).cloned()
    }

    /// Replace a user's state.
    pub fn set(&self, user: UserId, mut state: SessionState) {
        state.updated_at = Utc::now();
        self.sessions.write().insert(user, state);
    }

    /// Remove a user's state.
    pub fn clear(&self, user: UserId) {
        self.sessions.write().remove(&user);
    }

    /// Remove a user's state if `predicate` holds for it, under one write lock.
    pub fn clear_if(&self, user: UserId, predicate: impl FnOnce(&SessionState) -> bool) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(&user) {
            Some(state) if predicate(state) => {
                sessions.remove(&user);
                true
            }
            _ => false,
        }
    }

    /// Mutate a user's state in place under the write lock.
    ///
    /// Returns `None` without calling `f` when the user has no state.
    pub fn update<R>(&self, user: UserId, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let mut sessions = self.sessions.write();
        let state = sessions.get_mut(&user)?;
        let result = f(state);
        state.updated_at = Utc::now();
        Some(result)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
