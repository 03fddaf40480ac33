use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use evalboard_types::User;

use crate::accounts::Accounts;
use crate::board::TaskBoard;
use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<Accounts>,
    pub board: Arc<TaskBoard>,
}

impl AppState {
    pub fn new(accessTtl: Duration) -> Self {
        Self {
            accounts: Arc::new(Accounts::new(accessTtl)),
            board: Arc::new(TaskBoard::seeded(Utc::now())),
        }
    }
}

/// The authenticated caller, attached to the request by [`require_api_auth`].
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: User,
    pub access_token: String,
}

/// Middleware for API routes: checks Authorization: Bearer <token> header.
pub async fn require_api_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let authHeader = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = match authHeader.and_then(bearer_token) {
        Some(token) => token.to_string(),
        None => return ApiError::Unauthorized("Not authenticated".into()).into_response(),
    };

    match state.accounts.user_for_token(&token) {
        Ok(user) => {
            request.extensions_mut().insert(CurrentUser {
                user,
                access_token: token,
            });
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
