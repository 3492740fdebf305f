use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use memoblog::{
    AccountManager, AppState, BlogRepository, BlogService, MemoryStore, SessionStore,
    auth::MIN_BCRYPT_COST, build_router,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const MODERATOR: (&str, &str) = ("moderator", "moderator-pass");

async fn app() -> axum::Router {
    let repository: Arc<dyn BlogRepository> = Arc::new(MemoryStore::new());
    let accounts = AccountManager::with_cost(repository.clone(), MIN_BCRYPT_COST);
    accounts
        .ensure_moderator(MODERATOR.0, MODERATOR.1)
        .await
        .expect("moderator should be seeded");

    let sessions = Arc::new(SessionStore::new(100, Duration::from_secs(3600)));
    let service = BlogService::new(repository, 2);
    build_router(AppState::new(service, accounts, sessions))
}

/// A browser-like client that keeps the session cookie between requests.
struct Client {
    app: axum::Router,
    cookie: Option<String>,
}

impl Client {
    fn new(app: &axum::Router) -> Self {
        Self {
            app: app.clone(),
            cookie: None,
        }
    }

    async fn send(
        &mut self,
        method: Method,
        uri: &str,
        payload: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match payload {
            Some(payload) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(payload.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("request should build");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("response expected");

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let raw = set_cookie.to_str().expect("cookie should be ascii");
            let pair = raw.split(';').next().expect("cookie pair").to_string();
            self.cookie = Some(pair);
        }

        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body should be readable");

        if body.is_empty() {
            return (status, Value::Null);
        }

        let json = serde_json::from_slice::<Value>(&body).expect("body should be valid JSON");
        (status, json)
    }

    async fn get(&mut self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&mut self, uri: &str, payload: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(payload)).await
    }

    async fn signup(&mut self, username: &str) {
        let (status, body) = self
            .post(
                "/accounts/signup/",
                json!({ "username": username, "password": "correct-horse" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    async fn login(&mut self, username: &str, password: &str) {
        let (status, body) = self
            .post(
                "/accounts/login/",
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
}

async fn moderator(app: &axum::Router) -> Client {
    let mut client = Client::new(app);
    client.login(MODERATOR.0, MODERATOR.1).await;
    client
}

async fn create_category(moderator: &mut Client, name: &str) -> u64 {
    let (status, body) = moderator
        .post("/moderation/categories/", json!({ "name": name }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_u64().expect("category id")
}

async fn create_post(author: &mut Client, title: &str, category: u64) -> u64 {
    let (status, body) = author
        .post(
            "/posts/create/",
            json!({
                "title": title,
                "excerpt": format!("{title} in short"),
                "content": format!("All about {title}"),
                "category": category,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_u64().expect("post id")
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let (status, body) = Client::new(&app).get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn signup_logs_the_user_in() {
    let app = app().await;
    let mut client = Client::new(&app);

    let (status, body) = client.get("/accounts/me/").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    client.signup("alice").await;
    assert!(client.cookie.is_some());

    let (status, body) = client.get("/accounts/me/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["role"], "member");
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn signup_and_login_failures() {
    let app = app().await;
    let mut client = Client::new(&app);
    client.signup("alice").await;

    let (status, body) = Client::new(&app)
        .post(
            "/accounts/signup/",
            json!({ "username": "ALICE", "password": "another-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, body) = Client::new(&app)
        .post(
            "/accounts/signup/",
            json!({ "username": "bob", "password": "short" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, wrong_password) = Client::new(&app)
        .post(
            "/accounts/login/",
            json!({ "username": "alice", "password": "not-her-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, unknown_user) = Client::new(&app)
        .post(
            "/accounts/login/",
            json!({ "username": "nobody", "password": "not-her-password" }),
        )
        .await;
    assert_eq!(wrong_password["error"], unknown_user["error"]);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = app().await;
    let mut client = Client::new(&app);
    client.signup("alice").await;
    let logged_in_cookie = client.cookie.clone();

    let (status, body) = client.send(Method::POST, "/accounts/logout/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
    assert_ne!(client.cookie, logged_in_cookie);

    let (status, _) = client.get("/accounts/me/").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    client.cookie = logged_in_cookie;
    let (status, _) = client.get("/accounts/me/").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn posts_are_listed_only_after_publishing() {
    let app = app().await;
    let mut moderator = moderator(&app).await;
    let category = create_category(&mut moderator, "Rust").await;

    let mut author = Client::new(&app);
    author.signup("alice").await;
    let post_id = create_post(&mut author, "Ownership", category).await;

    let (status, body) = Client::new(&app).get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);

    let (status, body) = moderator.get("/moderation/posts/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["posts"][0]["id"], post_id);

    let (status, body) = moderator
        .send(
            Method::POST,
            &format!("/moderation/posts/{post_id}/publish/"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_published"], true);

    let (_, body) = Client::new(&app).get("/").await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["posts"][0]["title"], "Ownership");
    assert_eq!(body["data"]["posts"][0]["author"]["username"], "alice");
    assert_eq!(body["data"]["posts"][0]["category"]["name"], "Rust");
}

#[tokio::test]
async fn editing_sends_the_post_back_to_review() {
    let app = app().await;
    let mut moderator = moderator(&app).await;
    let category = create_category(&mut moderator, "Rust").await;

    let mut author = Client::new(&app);
    author.signup("alice").await;
    let post_id = create_post(&mut author, "Lifetimes", category).await;
    moderator
        .send(
            Method::POST,
            &format!("/moderation/posts/{post_id}/publish/"),
            None,
        )
        .await;

    let (status, body) = author.get(&format!("/posts/edit/{post_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["initial"]["title"], "Lifetimes");

    let unchanged = json!({
        "title": "Lifetimes",
        "excerpt": "Lifetimes in short",
        "content": "All about Lifetimes",
        "category": category,
    });
    let (status, body) = author
        .post(&format!("/posts/edit/{post_id}"), unchanged)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["changed"], false);
    assert!(body.get("message").is_none());

    let changed = json!({
        "title": "Lifetimes, revisited",
        "excerpt": "Lifetimes in short",
        "content": "All about Lifetimes",
        "category": category,
    });
    let (status, body) = author.post(&format!("/posts/edit/{post_id}"), changed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["changed"], true);
    assert_eq!(body["data"]["post"]["is_published"], false);
    assert!(body["message"].is_string());

    let (_, body) = Client::new(&app).get("/").await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn only_the_author_may_change_a_post() {
    let app = app().await;
    let mut moderator = moderator(&app).await;
    let category = create_category(&mut moderator, "Rust").await;

    let mut author = Client::new(&app);
    author.signup("alice").await;
    let post_id = create_post(&mut author, "Traits", category).await;

    let mut intruder = Client::new(&app);
    intruder.signup("mallory").await;

    let (status, _) = intruder.get(&format!("/posts/edit/{post_id}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = intruder
        .post(
            &format!("/posts/edit/{post_id}"),
            json!({ "title": "Hijacked", "content": "x", "category": category }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = intruder
        .send(Method::POST, &format!("/posts/delete/{post_id}"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = Client::new(&app)
        .send(Method::POST, &format!("/posts/delete/{post_id}"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = author.get(&format!("/posts/delete/{post_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Traits");

    let (status, body) = author
        .send(Method::POST, &format!("/posts/delete/{post_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], post_id);

    let (status, body) = author.get(&format!("/posts/details/{post_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn comments_require_login_and_text() {
    let app = app().await;
    let mut moderator = moderator(&app).await;
    let category = create_category(&mut moderator, "Rust").await;

    let mut author = Client::new(&app);
    author.signup("alice").await;
    let post_id = create_post(&mut author, "Macros", category).await;

    let (status, _) = Client::new(&app)
        .post("/posts/comment/", json!({ "post": post_id, "comment": "hi" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = author
        .post("/posts/comment/", json!({ "post": post_id, "comment": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = author
        .post(
            "/posts/comment/",
            json!({ "post": post_id, "comment": "  First!  " }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["comment"], "First!");

    let (status, body) = author.get(&format!("/posts/details/{post_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["qty_comments"], 1);
    assert_eq!(body["data"]["comments"][0]["author"]["username"], "alice");
    assert_eq!(body["data"]["is_author"], true);
}

#[tokio::test]
async fn comment_page_redirects_home() {
    let app = app().await;
    let request = Request::builder()
        .uri("/posts/comment/")
        .body(Body::empty())
        .expect("request should build");

    let response = app.oneshot(request).await.expect("response expected");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
}

#[tokio::test]
async fn details_keep_a_short_view_history() {
    let app = app().await;
    let mut moderator = moderator(&app).await;
    let category = create_category(&mut moderator, "Rust").await;

    let mut author = Client::new(&app);
    author.signup("alice").await;
    let mut ids = Vec::new();
    for title in ["One", "Two", "Three", "Four"] {
        ids.push(create_post(&mut author, title, category).await);
    }

    let mut reader = Client::new(&app);
    reader.signup("reader").await;
    let mut body = Value::Null;
    for id in &ids {
        let (status, response) = reader.get(&format!("/posts/details/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        body = response;
    }

    // the first viewed post stays, the second one was pushed out
    let history: Vec<u64> = body["data"]["history"]
        .as_array()
        .expect("history array")
        .iter()
        .map(|entry| entry["id"].as_u64().expect("history id"))
        .collect();
    assert_eq!(history, vec![ids[3], ids[2], ids[0]]);

    let (_, body) = Client::new(&app)
        .get(&format!("/posts/details/{}", ids[0]))
        .await;
    assert_eq!(body["data"]["history"], json!([]));
}

#[tokio::test]
async fn moderation_needs_a_moderator() {
    let app = app().await;
    let mut member = Client::new(&app);
    member.signup("alice").await;

    let (status, body) = member.get("/moderation/posts/").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = member
        .post("/moderation/categories/", json!({ "name": "Go" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = Client::new(&app).get("/moderation/posts/").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut moderator = moderator(&app).await;
    create_category(&mut moderator, "Rust").await;
    let (status, body) = moderator
        .post("/moderation/categories/", json!({ "name": "rust" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, body) = Client::new(&app).get("/categories/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn listing_pages() {
    let app = app().await;
    let mut moderator = moderator(&app).await;
    let category = create_category(&mut moderator, "Rust").await;

    let mut author = Client::new(&app);
    author.signup("alice").await;
    for title in ["One", "Two", "Three"] {
        let id = create_post(&mut author, title, category).await;
        moderator
            .send(Method::POST, &format!("/moderation/posts/{id}/publish/"), None)
            .await;
    }

    let (status, body) = Client::new(&app).get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["posts"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["data"]["posts"][0]["title"], "Three");
    assert_eq!(body["data"]["pagination"]["total_pages"], 2);
    assert_eq!(body["data"]["pagination"]["has_next"], true);

    let (status, body) = Client::new(&app).get("/?page=last").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["current_page"], 2);
    assert_eq!(body["data"]["posts"][0]["title"], "One");

    let (status, _) = Client::new(&app).get("/?page=9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = Client::new(&app).get("/?page=abc").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = app().await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request should build");

    let response = app.oneshot(request).await.expect("response expected");
    assert!(response.headers().contains_key("x-request-id"));
}
