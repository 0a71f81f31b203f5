//! Per-cycle record of what a persona already did, so one cycle never repeats itself.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionAction {
    Watch,
    Comment,
    Like,
    Dislike,
    Subscribe,
}

impl SessionAction {
    pub fn is_engagement(self) -> bool {
        matches!(self, Self::Comment | Self::Like | Self::Dislike)
    }
}

/// Set of `(action, target)` pairs; created at cycle start, dropped at cycle end
#[derive(Debug, Default, Clone)]
pub struct SessionActionSet {
    entries: HashSet<(SessionAction, String)>,
}

impl SessionActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the pair was already present
    pub fn insert(&mut self, action: SessionAction, target: &str) -> bool {
        self.entries.insert((action, target.to_string()))
    }

    pub fn contains(&self, action: SessionAction, target: &str) -> bool {
        self.entries.contains(&(action, target.to_string()))
    }

    /// Any comment, like or dislike so far
    pub fn has_engagement(&self) -> bool {
        self.entries.iter().any(|(action, _)| action.is_engagement())
    }

    pub fn count(&self, action: SessionAction) -> usize {
        self.entries.iter().filter(|(a, _)| *a == action).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
