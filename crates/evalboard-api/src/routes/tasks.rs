use axum::{extract::State, middleware, routing::get, Json, Router};
use axum_extra::extract::Query;
use chrono::{NaiveDate, Utc};
use evalboard_types::{
    FilterOptions, Page, Priority, SortField, SortOrder, Task, TaskFilter, DEFAULT_PAGE_SIZE,
};
use serde::Deserialize;

use crate::board;
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{require_api_auth, AppState};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/tasks", get(get_tasks))
        .route("/api/v1/tasks/filter-options", get(get_filter_options))
        .route_layer(middleware::from_fn_with_state(state, require_api_auth))
}

/// Raw listing parameters; list fields arrive as repeated keys.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct TaskQuery {
    search: Option<String>,
    status: Vec<String>,
    priority: Vec<String>,
    tags: Vec<String>,
    due_date_from: Option<NaiveDate>,
    due_date_to: Option<NaiveDate>,
    overdue_only: bool,
    completed_only: bool,
    sort_by: Option<String>,
    sort_order: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
}

impl TaskQuery {
    fn into_filter(self) -> ApiResult<TaskFilter> {
        let priority = self
            .priority
            .iter()
            .map(|p| {
                Priority::parse(p)
                    .ok_or_else(|| ApiError::Unprocessable(format!("Invalid priority: {p}")))
            })
            .collect::<ApiResult<Vec<_>>>()?;

        let sortBy = match self.sort_by.as_deref() {
            Some(raw) => SortField::parse(raw)
                .ok_or_else(|| ApiError::Unprocessable(format!("Invalid sort_by: {raw}")))?,
            None => SortField::default(),
        };
        let sortOrder = match self.sort_order.as_deref() {
            Some(raw) => SortOrder::parse(raw)
                .ok_or_else(|| ApiError::Unprocessable(format!("Invalid sort_order: {raw}")))?,
            None => SortOrder::default(),
        };

        let filter = TaskFilter {
            search: self.search.unwrap_or_default().trim().to_string(),
            status: self.status,
            priority,
            tags: self.tags,
            due_date_from: self.due_date_from,
            due_date_to: self.due_date_to,
            overdue_only: self.overdue_only,
            completed_only: self.completed_only,
            sort_by: sortBy,
            sort_order: sortOrder,
            page: clamp_u32(self.page.unwrap_or(1)),
            page_size: clamp_u32(self.page_size.unwrap_or(DEFAULT_PAGE_SIZE as i64)),
        };
        board::validate(&filter)?;
        Ok(filter)
    }
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

async fn get_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> ApiResult<Json<Page<Task>>> {
    let filter = query.into_filter()?;
    let page = state.board.query(&filter, Utc::now());
    tracing::debug!("task listing matched {} of {}", page.total, state.board.len());
    Ok(Json(page))
}

async fn get_filter_options(State(state): State<AppState>) -> Json<FilterOptions> {
    Json(state.board.filter_options())
}
