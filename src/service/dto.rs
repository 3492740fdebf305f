use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pagination::Pagination;
use crate::core::{Category, CategoryId, Comment, CommentId, Post, PostFields, PostId, Role, User, UserId};

#[derive(Debug, Clone, Deserialize)]
pub struct PostForm {
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    pub category: CategoryId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentForm {
    pub post: PostId,
    #[serde(default)]
    pub comment: String,
}

/// `?page=` accepts a number or `last`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorView {
    pub id: UserId,
    pub username: String,
}

impl From<&User> for AuthorView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: PostId,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub image: Option<String>,
    pub category: Option<Category>,
    pub author: Option<AuthorView>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostView {
    pub fn new(post: Post, category: Option<Category>, author: Option<AuthorView>) -> Self {
        Self {
            id: post.id,
            title: post.title,
            excerpt: post.excerpt,
            content: post.content,
            image: post.image,
            category,
            author,
            is_published: post.is_published,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// Compact form used for the recently-viewed list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    pub id: PostId,
    pub title: String,
    pub excerpt: String,
    pub image: Option<String>,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            excerpt: post.excerpt.clone(),
            image: post.image.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: Option<AuthorView>,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl CommentView {
    pub fn new(comment: Comment, author: Option<AuthorView>) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            author,
            comment: comment.comment,
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostListing {
    pub posts: Vec<PostView>,
    pub total: u64,
    pub per_page: u32,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetails {
    pub post: PostView,
    pub comments: Vec<CommentView>,
    pub qty_comments: usize,
    pub is_author: bool,
    /// Newest first.
    pub history: Vec<PostSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostFormContext {
    pub categories: Vec<Category>,
    pub initial: Option<PostFields>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    pub post: PostView,
    /// A tracked field differed, so the post went back to review.
    pub changed: bool,
}
