use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use serde::Serialize;

use super::extract::{CurrentUser, MaybeUser};
use super::state::AppState;
use super::{ApiResponse, Result};
use crate::core::{Category, PostId};
use crate::notifications::success;
use crate::service::dto::{
    CategoryRequest, CommentForm, CommentView, CredentialsRequest, EditOutcome, ListQuery, PostDetails,
    PostForm, PostFormContext, PostListing, PostView, UserView,
};
use crate::session::SessionHandle;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DeletedPost {
    pub id: PostId,
}

pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PostListing>>> {
    let listing = state.service.list_posts(query.page.as_deref()).await?;
    Ok(Json(ApiResponse::new(listing)))
}

pub async fn post_details(
    State(state): State<AppState>,
    Path(pk): Path<PostId>,
    MaybeUser(viewer): MaybeUser,
    session: SessionHandle,
) -> Result<Json<ApiResponse<PostDetails>>> {
    let mut history = session.data().await.history;
    let details = state
        .service
        .post_details(pk, viewer.as_ref(), &mut history)
        .await?;

    if viewer.is_some() {
        session.update(|data| data.history = history).await;
    }

    Ok(Json(ApiResponse::new(details)))
}

/// Comments are only accepted by POST; a plain visit goes back home.
pub async fn comment_redirect() -> Redirect {
    Redirect::to("/")
}

pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(form): Json<CommentForm>,
) -> Result<(StatusCode, Json<ApiResponse<CommentView>>)> {
    let comment = state.service.add_comment(&user, form).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(comment, success::COMMENT_CREATED)),
    ))
}

pub async fn create_form(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<ApiResponse<PostFormContext>>> {
    let context = state.service.create_form().await?;
    Ok(Json(ApiResponse::new(context)))
}

pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(form): Json<PostForm>,
) -> Result<(StatusCode, Json<ApiResponse<PostView>>)> {
    let post = state.service.create_post(&user, form).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(post, success::POST_CREATED)),
    ))
}

pub async fn edit_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(pk): Path<PostId>,
) -> Result<Json<ApiResponse<PostFormContext>>> {
    let context = state.service.edit_form(&user, pk).await?;
    Ok(Json(ApiResponse::new(context)))
}

pub async fn edit_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(pk): Path<PostId>,
    Json(form): Json<PostForm>,
) -> Result<Json<ApiResponse<EditOutcome>>> {
    let outcome = state.service.edit_post(&user, pk, form).await?;
    let response = if outcome.changed {
        ApiResponse::with_message(outcome, success::POST_EDITED)
    } else {
        ApiResponse::new(outcome)
    };
    Ok(Json(response))
}

pub async fn delete_confirmation(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(pk): Path<PostId>,
) -> Result<Json<ApiResponse<PostView>>> {
    let post = state.service.delete_confirmation(pk).await?;
    Ok(Json(ApiResponse::new(post)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(pk): Path<PostId>,
) -> Result<Json<ApiResponse<DeletedPost>>> {
    state.service.delete_post(&user, pk).await?;
    Ok(Json(ApiResponse::with_message(
        DeletedPost { id: pk },
        success::POST_DELETED,
    )))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Category>>>> {
    let categories = state.service.list_categories().await?;
    Ok(Json(ApiResponse::new(categories)))
}

pub async fn signup(
    State(state): State<AppState>,
    session: SessionHandle,
    Json(payload): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserView>>)> {
    let user = state
        .accounts
        .signup(&payload.username, &payload.password)
        .await?;
    session.login(user.id).await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(UserView::from(&user), success::SIGNED_UP)),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    session: SessionHandle,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<ApiResponse<UserView>>> {
    let user = state
        .accounts
        .authenticate(&payload.username, &payload.password)
        .await?;
    session.login(user.id).await;

    Ok(Json(ApiResponse::with_message(UserView::from(&user), success::LOGGED_IN)))
}

pub async fn logout(session: SessionHandle) -> Json<ApiResponse<()>> {
    session.flush().await;
    Json(ApiResponse::with_message((), success::LOGGED_OUT))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<ApiResponse<UserView>> {
    Json(ApiResponse::new(UserView::from(&user)))
}

pub async fn pending_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PostListing>>> {
    let listing = state
        .service
        .pending_posts(&user, query.page.as_deref())
        .await?;
    Ok(Json(ApiResponse::new(listing)))
}

pub async fn publish_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(pk): Path<PostId>,
) -> Result<Json<ApiResponse<PostView>>> {
    let post = state.service.publish_post(&user, pk).await?;
    Ok(Json(ApiResponse::with_message(post, success::POST_PUBLISHED)))
}

pub async fn create_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Category>>)> {
    let category = state.service.create_category(&user, &payload.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(category, success::CATEGORY_CREATED)),
    ))
}
