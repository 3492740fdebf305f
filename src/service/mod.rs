//! Post, comment and moderation workflows.

pub mod dto;
pub mod pagination;

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{
    BlogError, BlogResult, Category, CategoryId, NewComment, NewPost, Post, PostFields, PostId,
    User, UserId,
};
use crate::notifications;
use crate::session::ViewHistory;
use crate::storage::{BlogRepository, PageRequest, PostFilter};

use dto::{
    AuthorView, CommentForm, CommentView, EditOutcome, PostDetails, PostForm, PostFormContext,
    PostListing, PostSummary, PostView,
};
use pagination::{DEFAULT_QTY_PAGES, make_pagination};

const MAX_TITLE_LEN: usize = 150;
const MAX_EXCERPT_LEN: usize = 300;
const MAX_IMAGE_LEN: usize = 255;
const MAX_CATEGORY_LEN: usize = 60;

#[derive(Clone)]
pub struct BlogService {
    repository: Arc<dyn BlogRepository>,
    per_page: u32,
}

impl BlogService {
    pub fn new(repository: Arc<dyn BlogRepository>, per_page: u32) -> Self {
        Self {
            repository,
            per_page: per_page.max(1),
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Published posts, newest first.
    pub async fn list_posts(&self, page: Option<&str>) -> BlogResult<PostListing> {
        self.listing(PostFilter::Published, page).await
    }

    /// Looks up a post for display and records it in the viewer's history.
    ///
    /// History is only recorded for logged-in viewers.
    pub async fn post_details(
        &self,
        post_id: PostId,
        viewer: Option<&User>,
        history: &mut ViewHistory,
    ) -> BlogResult<PostDetails> {
        let post = self.require_post(post_id).await?;

        if viewer.is_some() {
            history.record(post.id);
        }

        let comments = self.repository.list_comments(post.id).await?;
        let mut authors = AuthorCache::default();
        let mut comment_views = Vec::with_capacity(comments.len());
        for comment in comments {
            let author = authors.get(self.repository.as_ref(), comment.author_id).await?;
            comment_views.push(CommentView::new(comment, author));
        }

        let recent_ids = history.recent().collect::<Vec<_>>();
        let mut recent = Vec::with_capacity(recent_ids.len());
        for id in recent_ids {
            // deleted posts drop out silently
            if let Some(viewed) = self.repository.get_post(id).await? {
                recent.push(PostSummary::from(&viewed));
            }
        }

        let is_author = viewer.is_some_and(|user| post.is_authored_by(user.id));
        let post = self.post_view(post, &mut authors).await?;

        Ok(PostDetails {
            post,
            qty_comments: comment_views.len(),
            comments: comment_views,
            is_author,
            history: recent,
        })
    }

    pub async fn add_comment(&self, author: &User, form: CommentForm) -> BlogResult<CommentView> {
        let comment = form.comment.trim();
        if comment.is_empty() {
            return Err(BlogError::validation(notifications::error::COMMENT_EMPTY));
        }

        let post = self.require_post(form.post).await?;
        let created = self
            .repository
            .insert_comment(NewComment {
                post_id: post.id,
                author_id: author.id,
                comment: comment.to_string(),
            })
            .await?;

        tracing::info!(post_id = post.id, comment_id = created.id, user_id = author.id, "comment created");
        Ok(CommentView::new(created, Some(AuthorView::from(author))))
    }

    /// Categories for an empty post form.
    pub async fn create_form(&self) -> BlogResult<PostFormContext> {
        Ok(PostFormContext {
            categories: self.repository.list_categories().await?,
            initial: None,
        })
    }

    /// New posts wait for moderation before they are listed.
    pub async fn create_post(&self, author: &User, form: PostForm) -> BlogResult<PostView> {
        let fields = self.validate_form(form).await?;
        let post = self
            .repository
            .insert_post(NewPost {
                fields,
                author_id: author.id,
            })
            .await?;

        tracing::info!(post_id = post.id, user_id = author.id, "post created");
        self.post_view(post, &mut AuthorCache::default()).await
    }

    pub async fn edit_form(&self, user: &User, post_id: PostId) -> BlogResult<PostFormContext> {
        let post = self.require_post(post_id).await?;
        ensure_author(&post, user)?;

        Ok(PostFormContext {
            categories: self.repository.list_categories().await?,
            initial: Some(post.fields()),
        })
    }

    /// Saves an edit. Changing any tracked field unpublishes the post so it
    /// goes through review again; an unchanged submission is a no-op.
    pub async fn edit_post(
        &self,
        user: &User,
        post_id: PostId,
        form: PostForm,
    ) -> BlogResult<EditOutcome> {
        let post = self.require_post(post_id).await?;
        ensure_author(&post, user)?;
        let fields = self.validate_form(form).await?;

        let (updated, changed) = self
            .repository
            .modify_post(
                post_id,
                Box::new(move |post: &mut Post| {
                    if !post.apply_fields(fields) {
                        return false;
                    }
                    post.is_published = false;
                    true
                }),
            )
            .await?
            .ok_or_else(|| post_not_found(post_id))?;

        if changed {
            tracing::info!(post_id, user_id = user.id, "post edited, back to review");
        }
        let post = self.post_view(updated, &mut AuthorCache::default()).await?;
        Ok(EditOutcome { post, changed })
    }

    /// The post as shown on the delete confirmation.
    pub async fn delete_confirmation(&self, post_id: PostId) -> BlogResult<PostView> {
        let post = self.require_post(post_id).await?;
        self.post_view(post, &mut AuthorCache::default()).await
    }

    pub async fn delete_post(&self, user: &User, post_id: PostId) -> BlogResult<()> {
        let post = self.require_post(post_id).await?;
        ensure_author(&post, user)?;

        if !self.repository.delete_post(post_id).await? {
            return Err(post_not_found(post_id));
        }

        tracing::info!(post_id, user_id = user.id, "post deleted");
        Ok(())
    }

    pub async fn list_categories(&self) -> BlogResult<Vec<Category>> {
        self.repository.list_categories().await
    }

    pub async fn pending_posts(&self, moderator: &User, page: Option<&str>) -> BlogResult<PostListing> {
        ensure_moderator(moderator)?;
        self.listing(PostFilter::Pending, page).await
    }

    pub async fn publish_post(&self, moderator: &User, post_id: PostId) -> BlogResult<PostView> {
        ensure_moderator(moderator)?;

        let (post, changed) = self
            .repository
            .modify_post(
                post_id,
                Box::new(|post: &mut Post| {
                    if post.is_published {
                        return false;
                    }
                    post.is_published = true;
                    true
                }),
            )
            .await?
            .ok_or_else(|| post_not_found(post_id))?;

        if changed {
            tracing::info!(post_id, moderator_id = moderator.id, "post published");
        }
        self.post_view(post, &mut AuthorCache::default()).await
    }

    pub async fn create_category(&self, moderator: &User, name: &str) -> BlogResult<Category> {
        ensure_moderator(moderator)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(BlogError::validation("category name cannot be empty"));
        }
        if name.chars().count() > MAX_CATEGORY_LEN {
            return Err(BlogError::validation(format!(
                "category name must be at most {MAX_CATEGORY_LEN} characters"
            )));
        }

        let category = self.repository.insert_category(name.to_string()).await?;
        tracing::info!(category_id = category.id, name = %category.name, "category created");
        Ok(category)
    }

    async fn listing(&self, filter: PostFilter, page: Option<&str>) -> BlogResult<PostListing> {
        let request = page_request(page, self.per_page)?;
        let page = self.repository.list_posts(filter, request).await?;

        // an empty listing still has one page
        let total_pages = page.total_pages.max(1);
        let current_page = page.page;
        if current_page > total_pages {
            return Err(BlogError::not_found(format!(
                "page {current_page} does not exist"
            )));
        }

        let mut authors = AuthorCache::default();
        let mut posts = Vec::with_capacity(page.items.len());
        for post in page.items {
            posts.push(self.post_view(post, &mut authors).await?);
        }

        Ok(PostListing {
            posts,
            total: page.total,
            per_page: self.per_page,
            pagination: make_pagination(total_pages, current_page, DEFAULT_QTY_PAGES),
        })
    }

    async fn require_post(&self, post_id: PostId) -> BlogResult<Post> {
        self.repository
            .get_post(post_id)
            .await?
            .ok_or_else(|| post_not_found(post_id))
    }

    async fn post_view(&self, post: Post, authors: &mut AuthorCache) -> BlogResult<PostView> {
        let category = self.repository.get_category(post.category_id).await?;
        let author = authors.get(self.repository.as_ref(), post.author_id).await?;
        Ok(PostView::new(post, category, author))
    }

    async fn validate_form(&self, form: PostForm) -> BlogResult<PostFields> {
        let title = form.title.trim();
        if title.is_empty() {
            return Err(BlogError::validation("title cannot be empty"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(BlogError::validation(format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )));
        }

        let excerpt = form.excerpt.trim();
        if excerpt.chars().count() > MAX_EXCERPT_LEN {
            return Err(BlogError::validation(format!(
                "excerpt must be at most {MAX_EXCERPT_LEN} characters"
            )));
        }

        let content = form.content.trim();
        if content.is_empty() {
            return Err(BlogError::validation("content cannot be empty"));
        }

        let image = form
            .image
            .as_deref()
            .map(str::trim)
            .filter(|image| !image.is_empty());
        if let Some(image) = image
            && image.chars().count() > MAX_IMAGE_LEN
        {
            return Err(BlogError::validation(format!(
                "image must be at most {MAX_IMAGE_LEN} characters"
            )));
        }

        self.require_category(form.category).await?;

        Ok(PostFields {
            title: title.to_string(),
            excerpt: excerpt.to_string(),
            content: content.to_string(),
            image: image.map(str::to_string),
            category_id: form.category,
        })
    }

    async fn require_category(&self, category_id: CategoryId) -> BlogResult<Category> {
        self.repository
            .get_category(category_id)
            .await?
            .ok_or_else(|| BlogError::validation(format!("category {category_id} does not exist")))
    }
}

/// Memoizes author lookups within one response.
#[derive(Default)]
struct AuthorCache {
    authors: HashMap<UserId, Option<AuthorView>>,
}

impl AuthorCache {
    async fn get(
        &mut self,
        repository: &dyn BlogRepository,
        user_id: UserId,
    ) -> BlogResult<Option<AuthorView>> {
        if let Some(author) = self.authors.get(&user_id) {
            return Ok(author.clone());
        }

        let author = repository
            .get_user(user_id)
            .await?
            .map(|user| AuthorView::from(&user));
        self.authors.insert(user_id, author.clone());
        Ok(author)
    }
}

fn post_not_found(post_id: PostId) -> BlogError {
    BlogError::not_found(format!("post {post_id} not found"))
}

fn ensure_author(post: &Post, user: &User) -> BlogResult<()> {
    if !post.is_authored_by(user.id) {
        return Err(BlogError::forbidden(notifications::error::NOT_POST_AUTHOR));
    }
    Ok(())
}

fn ensure_moderator(user: &User) -> BlogResult<()> {
    if !user.is_moderator() {
        return Err(BlogError::forbidden(notifications::error::MODERATOR_REQUIRED));
    }
    Ok(())
}

/// Parses `?page=`: missing means 1, `last` means the final page.
fn page_request(raw: Option<&str>, per_page: u32) -> BlogResult<PageRequest> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(PageRequest::new(1, per_page));
    };

    if raw == "last" {
        return Ok(PageRequest::last(per_page));
    }

    let page = raw
        .parse::<u32>()
        .map_err(|_| BlogError::not_found(format!("invalid page '{raw}'")))?;

    if page == 0 {
        return Err(BlogError::not_found("page 0 does not exist"));
    }

    Ok(PageRequest::new(page, per_page))
}
