use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use uuid::Uuid;

use super::state::AppState;
use crate::session::SESSION_COOKIE;

/// Loads the caller's session into the request extensions and writes it back
/// after the handler ran.
pub async fn session_layer(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let session_id = session_id_from_headers(request.headers());
    let handle = state.sessions.load(session_id).await;
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let saved = state.sessions.save(&handle).await;
    if saved.issue_cookie {
        let cookie = session_cookie(saved.id, state.sessions.ttl_seconds());
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(err) => tracing::error!(error = %err, "invalid session cookie header"),
        }
    }

    response
}

/// Finds the session id in the `Cookie` headers; malformed values are ignored.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

pub fn session_cookie(id: Uuid, max_age: i64) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}
