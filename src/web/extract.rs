use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::WebError;
use super::state::AppState;
use crate::core::User;
use crate::notifications;
use crate::session::SessionHandle;

#[async_trait]
impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or_else(|| WebError::Internal("session layer is not installed".to_string()))
    }
}

/// The logged-in user, if any.
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = SessionHandle::from_request_parts(parts, state).await?;
        let Some(user_id) = session.user_id().await else {
            return Ok(MaybeUser(None));
        };

        Ok(MaybeUser(state.accounts.get(user_id).await?))
    }
}

/// Rejects the request with 401 unless a user is logged in.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await?.0 {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(WebError::Unauthorized(
                notifications::error::LOGIN_REQUIRED.to_string(),
            )),
        }
    }
}
