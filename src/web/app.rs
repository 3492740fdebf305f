use axum::{
    Router,
    http::{HeaderName, Method},
    middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::handlers::{
    comment_redirect, create_category, create_comment, create_form, create_post, delete_confirmation,
    delete_post, edit_form, edit_post, healthcheck, list_categories, list_posts, login, logout, me,
    pending_posts, post_details, publish_post, signup,
};
use super::session::session_layer;
use super::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/health", get(healthcheck))
        .route("/", get(list_posts))
        .route("/posts/details/:pk", get(post_details))
        .route("/posts/comment/", get(comment_redirect).post(create_comment))
        .route("/posts/create/", get(create_form).post(create_post))
        .route("/posts/edit/:pk", get(edit_form).post(edit_post))
        .route("/posts/delete/:pk", get(delete_confirmation).post(delete_post))
        .route("/categories/", get(list_categories))
        .route("/accounts/signup/", post(signup))
        .route("/accounts/login/", post(login))
        .route("/accounts/logout/", post(logout))
        .route("/accounts/me/", get(me))
        .route("/moderation/posts/", get(pending_posts))
        .route("/moderation/posts/:pk/publish/", post(publish_post))
        .route("/moderation/categories/", post(create_category))
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS]),
        )
        .with_state(state)
}
