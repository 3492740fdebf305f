//! Server-side sessions
//!
//! Sessions live in an LRU-bounded table keyed by a random uuid carried in a
//! cookie. A handler works on a [`SessionHandle`], a per-request copy that is
//! written back once the response has been produced.

pub mod history;

use crate::core::UserId;
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub use history::{HISTORY_CAPACITY, ViewHistory};

pub const SESSION_COOKIE: &str = "sessionid";

/// Data stored per session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: Option<UserId>,
    pub history: ViewHistory,
}

#[derive(Debug, Clone)]
struct SessionRecord {
    data: SessionData,
    last_seen: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct HandleState {
    data: SessionData,
    cycle_key: bool,
}

/// Per-request view of a session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    is_new: bool,
    state: Arc<Mutex<HandleState>>,
}

impl SessionHandle {
    fn new(id: Uuid, is_new: bool, data: SessionData) -> Self {
        Self {
            id,
            is_new,
            state: Arc::new(Mutex::new(HandleState {
                data,
                cycle_key: false,
            })),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub async fn user_id(&self) -> Option<UserId> {
        self.state.lock().await.data.user_id
    }

    pub async fn data(&self) -> SessionData {
        self.state.lock().await.data.clone()
    }

    /// Runs `f` with mutable access to the session data.
    pub async fn update<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> R {
        let mut state = self.state.lock().await;
        f(&mut state.data)
    }

    /// Attaches the user and issues a fresh session id; data is kept.
    pub async fn login(&self, user_id: UserId) {
        let mut state = self.state.lock().await;
        state.data.user_id = Some(user_id);
        state.cycle_key = true;
    }

    /// Drops all session data and issues a fresh session id.
    pub async fn flush(&self) {
        let mut state = self.state.lock().await;
        state.data = SessionData::default();
        state.cycle_key = true;
    }
}

/// Outcome of writing a handle back to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedSession {
    pub id: Uuid,
    /// The client must be sent a new cookie.
    pub issue_cookie: bool,
}

/// Session table with idle expiry and an LRU bound on live sessions
pub struct SessionStore {
    sessions: Mutex<LruCache<Uuid, SessionRecord>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(max_sessions: usize, ttl: std::time::Duration) -> Self {
        let capacity = NonZeroUsize::new(max_sessions).unwrap_or(NonZeroUsize::MIN);
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::weeks(52 * 100));

        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Loads the session for `id`, or starts a new one if it is missing or expired.
    pub async fn load(&self, id: Option<Uuid>) -> SessionHandle {
        if let Some(id) = id {
            let mut sessions = self.sessions.lock().await;
            let expired = match sessions.get(&id) {
                Some(record) if Utc::now() - record.last_seen <= self.ttl => {
                    return SessionHandle::new(id, false, record.data.clone());
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                sessions.pop(&id);
                tracing::debug!(session_id = %id, "session expired");
            }
        }

        SessionHandle::new(Uuid::new_v4(), true, SessionData::default())
    }

    /// Writes the handle's data back.
    ///
    /// Fresh sessions without any data are not stored, so anonymous one-off
    /// requests do not fill the table.
    pub async fn save(&self, handle: &SessionHandle) -> SavedSession {
        let state = handle.state.lock().await;
        let mut sessions = self.sessions.lock().await;

        let mut id = handle.id;
        let mut issue_cookie = handle.is_new;

        if state.cycle_key {
            sessions.pop(&handle.id);
            id = Uuid::new_v4();
            issue_cookie = true;
        }

        if issue_cookie && state.data == SessionData::default() && !state.cycle_key {
            return SavedSession {
                id,
                issue_cookie: false,
            };
        }

        // cycled, flushed or expired by another request since load
        if !handle.is_new && !state.cycle_key && !sessions.contains(&id) {
            tracing::debug!(session_id = %id, "not restoring a removed session");
            return SavedSession {
                id,
                issue_cookie: false,
            };
        }

        let record = SessionRecord {
            data: state.data.clone(),
            last_seen: Utc::now(),
        };
        if let Some((evicted, _)) = sessions.push(id, record)
            && evicted != id
        {
            tracing::debug!(session_id = %evicted, "session evicted");
        }

        SavedSession { id, issue_cookie }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
