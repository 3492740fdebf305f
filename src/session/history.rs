use crate::core::PostId;
use serde::{Deserialize, Serialize};

/// Maximum number of posts kept in a session's view history.
pub const HISTORY_CAPACITY: usize = 3;

/// Recently viewed posts, oldest first.
///
/// The first post ever recorded stays pinned at the head: revisiting it does
/// not move it, and trimming drops the entry after it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewHistory {
    entries: Vec<PostId>,
}

impl ViewHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, post_id: PostId) {
        match self.entries.iter().position(|&id| id == post_id) {
            None => self.entries.push(post_id),
            Some(0) => {}
            Some(index) => {
                self.entries.remove(index);
                self.entries.push(post_id);
            }
        }

        if self.entries.len() > HISTORY_CAPACITY {
            self.entries.remove(1);
        }
    }

    /// Oldest first, as stored.
    pub fn entries(&self) -> &[PostId] {
        &self.entries
    }

    /// Newest first.
    pub fn recent(&self) -> impl Iterator<Item = PostId> + '_ {
        self.entries.iter().rev().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
