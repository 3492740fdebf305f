use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type CategoryId = u64;
pub type PostId = u64;
pub type CommentId = u64;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular account: writes posts and comments
    #[default]
    Member,
    /// Reviews and publishes posts, manages categories
    Moderator,
}

impl Role {
    #[inline]
    pub fn can_moderate(self) -> bool {
        matches!(self, Role::Moderator)
    }
}

/// User account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_moderator(&self) -> bool {
        self.role.can_moderate()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// The editable part of a post. Edits are diffed over exactly these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFields {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub image: Option<String>,
    pub category_id: CategoryId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub image: Option<String>,
    pub category_id: CategoryId,
    pub author_id: UserId,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn fields(&self) -> PostFields {
        PostFields {
            title: self.title.clone(),
            excerpt: self.excerpt.clone(),
            content: self.content.clone(),
            image: self.image.clone(),
            category_id: self.category_id,
        }
    }

    /// Overwrites the editable fields; returns whether anything changed.
    pub fn apply_fields(&mut self, fields: PostFields) -> bool {
        if self.fields() == fields {
            return false;
        }

        self.title = fields.title;
        self.excerpt = fields.excerpt;
        self.content = fields.content;
        self.image = fields.image;
        self.category_id = fields.category_id;
        true
    }

    pub fn is_authored_by(&self, user_id: UserId) -> bool {
        self.author_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub fields: PostFields,
    pub author_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: PostId,
    pub author_id: UserId,
    pub comment: String,
}
