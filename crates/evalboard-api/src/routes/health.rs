use axum::{routing::get, Json, Router};
use evalboard_types::HealthStatus;

use crate::middleware::auth::AppState;

pub fn routes(_state: AppState) -> Router<AppState> {
    Router::new().route("/api/v1/health", get(get_health))
}

async fn get_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".into(),
        message: "API is running".into(),
    })
}
