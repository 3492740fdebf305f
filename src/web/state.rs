use std::sync::Arc;

use crate::auth::AccountManager;
use crate::service::BlogService;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub service: BlogService,
    pub accounts: AccountManager,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(service: BlogService, accounts: AccountManager, sessions: Arc<SessionStore>) -> Self {
        Self {
            service,
            accounts,
            sessions,
        }
    }
}
