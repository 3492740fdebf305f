use super::persistence::{DurabilityMode, PersistenceManager, WalEntry};
use super::table::{Tables, fold_case};
use super::{BlogRepository, Page, PageRequest, PostChange, PostFilter};
use crate::core::{
    BlogError, BlogResult, Category, CategoryId, Comment, NewComment, NewPost, NewUser, Post,
    PostId, User, UserId,
};
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use tokio::sync::{Mutex, RwLock};

/// In-memory blog store with optional WAL + snapshot durability.
///
/// Lock order is always `tables` then `persistence`.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    persistence: Option<Mutex<PersistenceManager>>,
}

impl MemoryStore {
    /// Volatile store, nothing touches the disk.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            persistence: None,
        }
    }

    /// Opens (or creates) a durable store in `data_dir`, recovering previous state.
    pub fn open<P: AsRef<Path>>(
        data_dir: P,
        durability_mode: DurabilityMode,
        checkpoint_every: usize,
    ) -> BlogResult<Self> {
        let mut persistence = PersistenceManager::new(data_dir, durability_mode)?;
        persistence.wal_mut().set_checkpoint_threshold(checkpoint_every);
        let tables = persistence.recover()?.unwrap_or_default();

        Ok(Self {
            tables: RwLock::new(tables),
            persistence: Some(Mutex::new(persistence)),
        })
    }

    pub fn is_durable(&self) -> bool {
        self.persistence.is_some()
    }

    /// Writes a full snapshot and truncates the WAL.
    pub async fn checkpoint(&self) -> BlogResult<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };
        let tables = self.tables.read().await;
        persistence.lock().await.checkpoint(&tables)
    }

    async fn commit(&self, tables: &mut Tables, entry: WalEntry) -> BlogResult<()> {
        match &self.persistence {
            Some(persistence) => {
                let mut persistence = persistence.lock().await;
                persistence.log(&entry)?;
                tables.apply(entry);
                // the entry is durable in the WAL; a failed snapshot is retried later
                if persistence.needs_checkpoint()
                    && let Err(err) = persistence.checkpoint(tables)
                {
                    tracing::error!(error = %err, "automatic checkpoint failed");
                }
            }
            None => tables.apply(entry),
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlogRepository for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> BlogResult<User> {
        let mut tables = self.tables.write().await;
        if tables.find_user_by_username(&user.username).is_some() {
            return Err(BlogError::conflict(format!(
                "username '{}' is already taken",
                user.username
            )));
        }

        let created = User {
            id: tables.next_user_id(),
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        self.commit(&mut tables, WalEntry::PutUser(created.clone()))
            .await?;
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> BlogResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> BlogResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .find_user_by_username(username)
            .cloned())
    }

    async fn insert_category(&self, name: String) -> BlogResult<Category> {
        let mut tables = self.tables.write().await;
        if tables.find_category_by_name(&name).is_some() {
            return Err(BlogError::conflict(format!(
                "category '{name}' already exists"
            )));
        }

        let category = Category {
            id: tables.next_category_id(),
            name,
        };
        self.commit(&mut tables, WalEntry::PutCategory(category.clone()))
            .await?;
        Ok(category)
    }

    async fn get_category(&self, id: CategoryId) -> BlogResult<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> BlogResult<Vec<Category>> {
        let mut categories = self
            .tables
            .read()
            .await
            .categories
            .values()
            .cloned()
            .collect::<Vec<_>>();
        categories.sort_by(|left, right| {
            fold_case(&left.name)
                .cmp(&fold_case(&right.name))
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(categories)
    }

    async fn insert_post(&self, post: NewPost) -> BlogResult<Post> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let fields = post.fields;

        let created = Post {
            id: tables.next_post_id(),
            title: fields.title,
            excerpt: fields.excerpt,
            content: fields.content,
            image: fields.image,
            category_id: fields.category_id,
            author_id: post.author_id,
            is_published: false,
            created_at: now,
            updated_at: now,
        };
        self.commit(&mut tables, WalEntry::PutPost(created.clone()))
            .await?;
        Ok(created)
    }

    async fn get_post(&self, id: PostId) -> BlogResult<Option<Post>> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn list_posts(&self, filter: PostFilter, request: PageRequest) -> BlogResult<Page<Post>> {
        let posts = self
            .tables
            .read()
            .await
            .posts
            .values()
            .rev()
            .filter(|post| filter.matches(post))
            .cloned()
            .collect::<Vec<_>>();
        Ok(Page::from_sorted(posts, request))
    }

    async fn modify_post(&self, id: PostId, change: PostChange) -> BlogResult<Option<(Post, bool)>> {
        let mut tables = self.tables.write().await;
        let Some(mut post) = tables.posts.get(&id).cloned() else {
            return Ok(None);
        };

        if !change(&mut post) {
            return Ok(Some((post, false)));
        }

        post.id = id;
        post.updated_at = Utc::now();
        self.commit(&mut tables, WalEntry::PutPost(post.clone()))
            .await?;
        Ok(Some((post, true)))
    }

    async fn delete_post(&self, id: PostId) -> BlogResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&id) {
            return Ok(false);
        }

        self.commit(&mut tables, WalEntry::DeletePost(id)).await?;
        Ok(true)
    }

    async fn insert_comment(&self, comment: NewComment) -> BlogResult<Comment> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(BlogError::not_found(format!(
                "post {} not found",
                comment.post_id
            )));
        }

        let created = Comment {
            id: tables.next_comment_id(),
            post_id: comment.post_id,
            author_id: comment.author_id,
            comment: comment.comment,
            created_at: Utc::now(),
        };
        self.commit(&mut tables, WalEntry::PutComment(created.clone()))
            .await?;
        Ok(created)
    }

    async fn list_comments(&self, post_id: PostId) -> BlogResult<Vec<Comment>> {
        Ok(self
            .tables
            .read()
            .await
            .comments
            .values()
            .rev()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }
}
