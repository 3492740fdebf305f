pub mod error;
pub mod types;

pub use error::{BlogError, BlogResult};
pub use types::{
    Category, CategoryId, Comment, CommentId, NewComment, NewPost, NewUser, Post, PostFields,
    PostId, Role, User, UserId,
};
