pub mod auth;
pub mod health;
pub mod tasks;

use axum::Router;

use crate::middleware::auth::AppState;

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(health::routes(state.clone()))
        .merge(tasks::routes(state))
}
