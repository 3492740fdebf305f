pub mod memory;
pub mod persistence;
pub mod table;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::{
    BlogResult, Category, CategoryId, Comment, NewComment, NewPost, NewUser, Post, PostId, User,
    UserId,
};

pub use memory::MemoryStore;
pub use persistence::{DurabilityMode, PersistenceManager, WalEntry};
pub use table::Tables;

/// Which posts a listing should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    Published,
    Pending,
}

impl PostFilter {
    pub fn matches(self, post: &Post) -> bool {
        match self {
            PostFilter::Published => post.is_published,
            PostFilter::Pending => !post.is_published,
        }
    }
}

/// 1-based page request. `from_end` asks for the last page, whatever its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
    pub from_end: bool,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
            from_end: false,
        }
    }

    pub fn last(per_page: u32) -> Self {
        Self {
            from_end: true,
            ..Self::new(1, per_page)
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.per_page as usize)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Slices an already filtered and ordered list.
    pub fn from_sorted(items: Vec<T>, mut request: PageRequest) -> Self {
        let total = items.len() as u64;
        let total_pages = if total == 0 {
            0
        } else {
            total.div_ceil(u64::from(request.per_page)) as u32
        };
        if request.from_end {
            request.page = total_pages.max(1);
        }

        let items = items
            .into_iter()
            .skip(request.offset())
            .take(request.per_page as usize)
            .collect();

        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
            total_pages,
        }
    }
}

/// In-place edit of a stored post; returns whether anything changed.
pub type PostChange = Box<dyn FnOnce(&mut Post) -> bool + Send>;

#[async_trait]
pub trait BlogRepository: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> BlogResult<User>;
    async fn get_user(&self, id: UserId) -> BlogResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> BlogResult<Option<User>>;

    async fn insert_category(&self, name: String) -> BlogResult<Category>;
    async fn get_category(&self, id: CategoryId) -> BlogResult<Option<Category>>;
    async fn list_categories(&self) -> BlogResult<Vec<Category>>;

    async fn insert_post(&self, post: NewPost) -> BlogResult<Post>;
    async fn get_post(&self, id: PostId) -> BlogResult<Option<Post>>;
    /// Newest first (by id). Totals and items come from the same read.
    async fn list_posts(&self, filter: PostFilter, request: PageRequest) -> BlogResult<Page<Post>>;
    /// Runs `change` on the stored row under the write lock and saves it when
    /// `change` returns true. `None` if the post does not exist.
    async fn modify_post(&self, id: PostId, change: PostChange) -> BlogResult<Option<(Post, bool)>>;
    /// Removes the post and its comments.
    async fn delete_post(&self, id: PostId) -> BlogResult<bool>;

    async fn insert_comment(&self, comment: NewComment) -> BlogResult<Comment>;
    /// Newest first (by id).
    async fn list_comments(&self, post_id: PostId) -> BlogResult<Vec<Comment>>;
}
