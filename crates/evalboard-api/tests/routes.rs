use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use evalboard_api::{api_router, middleware::auth::AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "password123";

fn app() -> (Router, AppState) {
    let state = AppState::new(Duration::from_secs(900));
    state
        .accounts
        .create_user("ada", EMAIL, PASSWORD, true)
        .unwrap();
    (api_router(state.clone()), state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(app: &Router) -> (String, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({"email": EMAIL, "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["refresh_token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn register_returns_tokens_and_user() {
    let (app, _) = app();
    let form = json!({
        "username": "grace",
        "email": "grace@example.com",
        "password": "password123",
        "confirm_password": "password123",
        "full_name": "Grace Hopper",
        "organization": "Navy"
    });
    let (status, body) = send(&app, Method::POST, "/api/v1/auth/register", None, Some(form.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user"]["full_name"], "Grace Hopper");
    assert_eq!(body["user"]["is_verified"], false);
    assert!(body["user"].get("password").is_none());

    let (status, body) = send(&app, Method::POST, "/api/v1/auth/register", None, Some(form)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Email already registered");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let (app, _) = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({"email": EMAIL, "password": "wrongpassword"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Incorrect email or password");
}

#[tokio::test]
async fn me_requires_a_valid_bearer() {
    let (app, _) = app();
    let (status, _) = send(&app, Method::GET, "/api/v1/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, Method::GET, "/api/v1/auth/me", Some("invalid_token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (access, _) = login(&app).await;
    let (status, body) = send(&app, Method::GET, "/api/v1/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], EMAIL);
    assert!(body["last_login"].is_string());
}

#[tokio::test]
async fn refresh_rotates_the_pair() {
    let (app, state) = app();
    let (access, refresh) = login(&app).await;
    state.accounts.expire_access_token(&access);

    let (status, _) = send(&app, Method::GET, "/api/v1/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({"refresh_token": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let fresh = body["access_token"].as_str().unwrap().to_string();
    assert_ne!(body["refresh_token"], json!(refresh));

    let (status, _) = send(&app, Method::GET, "/api/v1/auth/me", Some(&fresh), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({"refresh_token": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid refresh token");
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let (app, _) = app();
    let (access, refresh) = login(&app).await;

    let (status, body) = send(&app, Method::POST, "/api/v1/auth/logout", Some(&access), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::GET, "/api/v1/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({"refresh_token": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_and_password_changes() {
    let (app, _) = app();
    let (access, _) = login(&app).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/auth/profile",
        Some(&access),
        Some(json!({"organization": "Analytical Engines"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["organization"], "Analytical Engines");
    assert_eq!(body["username"], "ada");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/change-password",
        Some(&access),
        Some(json!({"current_password": "nope-nope", "new_password": "newpassword1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Current password is incorrect");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/change-password",
        Some(&access),
        Some(json!({"current_password": PASSWORD, "new_password": "newpassword1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn tasks_require_auth() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Not authenticated");
}

#[tokio::test]
async fn task_listing_reads_repeated_keys() {
    let (app, _) = app();
    let (access, _) = login(&app).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/tasks?status=completed&status=in_progress&page_size=2&sort_by=title&sort_order=asc",
        Some(&access),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 6);
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["items"][0]["title"], "Archive raw uploads");
}

#[tokio::test]
async fn invalid_filters_are_unprocessable() {
    let (app, _) = app();
    let (access, _) = login(&app).await;

    for uri in [
        "/api/v1/tasks?page=0",
        "/api/v1/tasks?page_size=101",
        "/api/v1/tasks?due_date_from=2024-07-01&due_date_to=2024-06-01",
        "/api/v1/tasks?priority=critical",
        "/api/v1/tasks?sort_by=colour",
    ] {
        let (status, body) = send(&app, Method::GET, uri, Some(&access), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        assert!(body["detail"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn filter_options_are_listed() {
    let (app, _) = app();
    let (access, _) = login(&app).await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/tasks/filter-options",
        Some(&access),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statuses"].as_array().unwrap().len(), 3);
    assert_eq!(body["priorities"].as_array().unwrap().len(), 4);
}
