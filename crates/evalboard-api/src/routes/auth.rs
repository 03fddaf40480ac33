use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Extension, Router,
};
use evalboard_types::{
    AuthResponse, EmailVerification, LoginRequest, PasswordChange, PasswordReset,
    PasswordResetRequest, ProfileUpdate, RefreshRequest, RefreshResponse, RegisterRequest, User,
};
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiResult;
use crate::middleware::auth::{require_api_auth, AppState, CurrentUser};

pub const TOKEN_TYPE: &str = "bearer";

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/v1/auth/login", post(handle_login))
        .route("/api/v1/auth/register", post(handle_register))
        .route("/api/v1/auth/refresh", post(handle_refresh))
        .route("/api/v1/auth/forgot-password", post(handle_forgot_password))
        .route("/api/v1/auth/reset-password", post(handle_reset_password))
        .route("/api/v1/auth/verify-email", post(handle_verify_email));

    let protected = Router::new()
        .route("/api/v1/auth/logout", post(handle_logout))
        .route("/api/v1/auth/me", get(get_me))
        .route("/api/v1/auth/profile", put(put_profile))
        .route("/api/v1/auth/change-password", post(handle_change_password))
        .route(
            "/api/v1/auth/resend-verification",
            post(handle_resend_verification),
        )
        .route_layer(middleware::from_fn_with_state(state, require_api_auth));

    public.merge(protected)
}

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

fn auth_response(state: &AppState, user: User) -> AuthResponse {
    let tokens = state.accounts.issue_tokens(&user.id);
    AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: TOKEN_TYPE.into(),
        expires_in: state.accounts.access_ttl_secs(),
        user,
    }
}

async fn handle_login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = state.accounts.authenticate(&body.email, &body.password)?;
    info!("login {}", user.email);
    Ok(Json(auth_response(&state, user)))
}

async fn handle_register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<Response> {
    let user = state.accounts.register(&body)?;
    let token = state.accounts.issue_verification(&user.id)?;
    // No mailer in development; the token goes to the log instead.
    info!("verification token for {}: {token}", user.email);
    Ok((StatusCode::CREATED, Json(auth_response(&state, user))).into_response())
}

async fn handle_refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let tokens = state.accounts.rotate(&body.refresh_token)?;
    Ok(Json(RefreshResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: TOKEN_TYPE.into(),
        expires_in: state.accounts.access_ttl_secs(),
    }))
}

async fn handle_logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> StatusCode {
    state.accounts.revoke(&current.access_token);
    info!("logout {}", current.user.email);
    StatusCode::NO_CONTENT
}

async fn get_me(Extension(current): Extension<CurrentUser>) -> Json<User> {
    Json(current.user)
}

async fn put_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    let user = state.accounts.update_profile(&current.user.id, &body)?;
    Ok(Json(user))
}

async fn handle_change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<PasswordChange>,
) -> ApiResult<Json<Value>> {
    state.accounts.change_password(&current.user.id, &body)?;
    Ok(message("Password updated successfully"))
}

async fn handle_forgot_password(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> Json<Value> {
    if let Some(token) = state.accounts.request_password_reset(&body.email) {
        info!("password reset token for {}: {token}", body.email);
    }
    message("If the email is registered, a reset link has been sent")
}

async fn handle_reset_password(
    State(state): State<AppState>,
    Json(body): Json<PasswordReset>,
) -> ApiResult<Json<Value>> {
    state.accounts.reset_password(&body)?;
    Ok(message("Password has been reset"))
}

async fn handle_verify_email(
    State(state): State<AppState>,
    Json(body): Json<EmailVerification>,
) -> ApiResult<Json<Value>> {
    let user = state.accounts.verify_email(&body.token)?;
    info!("verified {}", user.email);
    Ok(message("Email verified successfully"))
}

async fn handle_resend_verification(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let token = state.accounts.issue_verification(&current.user.id)?;
    info!("verification token for {}: {token}", current.user.email);
    Ok(message("Verification email sent"))
}
