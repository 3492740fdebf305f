// ============================================================================
// memoblog: moderated blog service
// ============================================================================

pub mod auth;
pub mod config;
pub mod core;
pub mod notifications;
pub mod service;
pub mod session;
pub mod storage;
pub mod web;

pub use auth::AccountManager;
pub use config::{AppConfig, Cli};
pub use core::{BlogError, BlogResult};
pub use service::BlogService;
pub use session::{SessionStore, ViewHistory};
pub use storage::{BlogRepository, MemoryStore};
pub use web::{AppState, build_router};
