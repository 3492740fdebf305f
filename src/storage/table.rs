use super::persistence::WalEntry;
use crate::core::{Category, CategoryId, Comment, CommentId, Post, PostId, User, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Highest id handed out per table. Ids are never reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequences {
    pub users: u64,
    pub categories: u64,
    pub posts: u64,
    pub comments: u64,
}

/// All blog rows, keyed by primary key.
///
/// Every mutation goes through [`Tables::apply`], both for live writes and
/// for WAL replay during recovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    pub users: BTreeMap<UserId, User>,
    pub categories: BTreeMap<CategoryId, Category>,
    pub posts: BTreeMap<PostId, Post>,
    pub comments: BTreeMap<CommentId, Comment>,
    pub sequences: Sequences,
}

impl Tables {
    pub fn next_user_id(&self) -> UserId {
        self.sequences.users + 1
    }

    pub fn next_category_id(&self) -> CategoryId {
        self.sequences.categories + 1
    }

    pub fn next_post_id(&self) -> PostId {
        self.sequences.posts + 1
    }

    pub fn next_comment_id(&self) -> CommentId {
        self.sequences.comments + 1
    }

    pub fn apply(&mut self, entry: WalEntry) {
        match entry {
            WalEntry::PutUser(user) => {
                self.sequences.users = self.sequences.users.max(user.id);
                self.users.insert(user.id, user);
            }
            WalEntry::PutCategory(category) => {
                self.sequences.categories = self.sequences.categories.max(category.id);
                self.categories.insert(category.id, category);
            }
            WalEntry::PutPost(post) => {
                self.sequences.posts = self.sequences.posts.max(post.id);
                self.posts.insert(post.id, post);
            }
            WalEntry::DeletePost(post_id) => {
                self.posts.remove(&post_id);
                self.comments.retain(|_, comment| comment.post_id != post_id);
            }
            WalEntry::PutComment(comment) => {
                self.sequences.comments = self.sequences.comments.max(comment.id);
                self.comments.insert(comment.id, comment);
            }
        }
    }

    pub fn find_user_by_username(&self, username: &str) -> Option<&User> {
        let key = fold_case(username);
        self.users
            .values()
            .find(|user| fold_case(&user.username) == key)
    }

    pub fn find_category_by_name(&self, name: &str) -> Option<&Category> {
        let key = fold_case(name);
        self.categories
            .values()
            .find(|category| fold_case(&category.name) == key)
    }

    pub fn row_count(&self) -> usize {
        self.users.len() + self.categories.len() + self.posts.len() + self.comments.len()
    }
}

/// Case-insensitive comparison key for usernames and category names.
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}
