//! User-facing notification messages.

pub mod success {
    pub const POST_CREATED: &str = "Post created! It will be visible once a moderator publishes it.";
    pub const POST_EDITED: &str = "Post updated! It was sent back for review and is hidden until published again.";
    pub const POST_DELETED: &str = "Post deleted.";
    pub const POST_PUBLISHED: &str = "Post published.";
    pub const COMMENT_CREATED: &str = "Comment added.";
    pub const CATEGORY_CREATED: &str = "Category created.";
    pub const SIGNED_UP: &str = "Account created. You are now logged in.";
    pub const LOGGED_IN: &str = "Logged in.";
    pub const LOGGED_OUT: &str = "Logged out.";
}

pub mod error {
    pub const COMMENT_EMPTY: &str = "Your comment cannot be empty.";
    pub const NOT_POST_AUTHOR: &str = "Only the author of this post can change it.";
    pub const LOGIN_REQUIRED: &str = "You need to log in first.";
    pub const MODERATOR_REQUIRED: &str = "Only moderators can do this.";
}
