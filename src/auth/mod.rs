use crate::core::{BlogError, BlogResult, NewUser, Role, User, UserId};
use crate::storage::BlogRepository;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

lazy_static! {
    // letters, digits and @ . + - _
    static ref USERNAME_PATTERN: Regex = Regex::new(r"^[\w.@+-]+$").expect("valid username regex");
}

/// Lowest cost bcrypt accepts; only sensible for tests.
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;

/// Account registration and password authentication
///
/// Passwords are stored as bcrypt hashes; the cost factor is configurable so
/// tests can run with the minimum.
#[derive(Clone)]
pub struct AccountManager {
    repository: Arc<dyn BlogRepository>,
    cost: u32,
}

impl AccountManager {
    pub fn new(repository: Arc<dyn BlogRepository>) -> Self {
        Self::with_cost(repository, bcrypt::DEFAULT_COST)
    }

    pub fn with_cost(repository: Arc<dyn BlogRepository>, cost: u32) -> Self {
        Self { repository, cost }
    }

    /// Registers a new member account
    pub async fn signup(&self, username: &str, password: &str) -> BlogResult<User> {
        self.create(username, password, Role::Member).await
    }

    /// Authenticates a user
    ///
    /// Unknown usernames and wrong passwords produce the same error.
    pub async fn authenticate(&self, username: &str, password: &str) -> BlogResult<User> {
        let invalid = || BlogError::unauthorized("invalid username or password");

        let user = self
            .repository
            .find_user_by_username(username.trim())
            .await?
            .ok_or_else(invalid)?;

        if !Self::verify_password(password, &user.password_hash).await {
            return Err(invalid());
        }

        Ok(user)
    }

    /// Creates the moderator account if it does not exist yet.
    pub async fn ensure_moderator(&self, username: &str, password: &str) -> BlogResult<User> {
        if let Some(existing) = self.repository.find_user_by_username(username).await? {
            if !existing.is_moderator() {
                tracing::warn!(username, "seed account exists but is not a moderator");
            }
            return Ok(existing);
        }

        let user = self.create(username, password, Role::Moderator).await?;
        tracing::info!(username, user_id = user.id, "moderator account created");
        Ok(user)
    }

    pub async fn get(&self, id: UserId) -> BlogResult<Option<User>> {
        self.repository.get_user(id).await
    }

    async fn create(&self, username: &str, password: &str, role: Role) -> BlogResult<User> {
        let username = username.trim();
        Self::validate_username(username)?;
        Self::validate_password(password)?; // before hashing

        let password_hash = self.hash_password(password).await?;

        self.repository
            .insert_user(NewUser {
                username: username.to_string(),
                password_hash,
                role,
            })
            .await
    }

    async fn hash_password(&self, password: &str) -> BlogResult<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| BlogError::internal(format!("password hashing task failed: {e}")))?
            .map_err(|e| BlogError::internal(format!("failed to hash password: {e}")))
    }

    async fn verify_password(password: &str, hash: &str) -> bool {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
            .await
            .unwrap_or(false)
    }

    fn validate_username(username: &str) -> BlogResult<()> {
        if username.is_empty() {
            return Err(BlogError::validation("username cannot be empty"));
        }

        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(BlogError::validation(format!(
                "username too long (max {MAX_USERNAME_LEN} characters)"
            )));
        }

        if !USERNAME_PATTERN.is_match(username) {
            return Err(BlogError::validation(
                "username may only contain letters, digits and @/./+/-/_",
            ));
        }

        Ok(())
    }

    fn validate_password(password: &str) -> BlogResult<()> {
        if password.is_empty() {
            return Err(BlogError::validation("password cannot be empty"));
        }

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BlogError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }

        Ok(())
    }
}
