#![allow(non_snake_case)]

pub mod accounts;
pub mod board;
pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::middleware::auth::AppState;

pub fn api_router(state: AppState) -> Router {
    let apiRoutes = routes::api_routes(state.clone());
    let authRoutes = routes::auth::routes(state.clone());

    Router::new()
        .merge(apiRoutes)
        .merge(authRoutes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
