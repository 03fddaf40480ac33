//! Filtered, paginated task listing.

use std::sync::Arc;

use evalboard_types::{FilterOptions, FilterUpdate, Page, Task, TaskFilter};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::error::ClientError;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskListState {
    pub tasks: Vec<Task>,
    pub total_count: u64,
    pub total_pages: u32,
    pub loading: bool,
    pub error: Option<String>,
    pub filters: TaskFilter,
}

#[derive(Clone)]
pub struct TaskStore {
    api: ApiClient,
    state: Arc<RwLock<TaskListState>>,
}

impl TaskStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Arc::new(RwLock::new(TaskListState::default())),
        }
    }

    pub fn snapshot(&self) -> TaskListState {
        self.state.read().clone()
    }

    pub fn filters(&self) -> TaskFilter {
        self.state.read().filters.clone()
    }

    pub fn has_active_filters(&self) -> bool {
        self.state.read().filters.has_active_filters()
    }

    pub fn active_filter_count(&self) -> usize {
        self.state.read().filters.active_filter_count()
    }

    /// Fetches the page described by the current filters. Overlapping calls
    /// are not cancelled; whichever response lands last wins.
    pub async fn fetch_tasks(&self) -> Result<(), ClientError> {
        let query = {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
            state.filters.to_query()
        };

        let result = self
            .api
            .get_with_query::<Page<Task>>("/tasks", query)
            .await;

        let mut state = self.state.write();
        let outcome = match result {
            Ok(page) => {
                debug!("fetched {} of {} tasks", page.items.len(), page.total);
                state.tasks = page.items;
                state.total_count = page.total;
                state.total_pages = page.total_pages;
                Ok(())
            }
            Err(e) => {
                warn!("task fetch failed: {e}");
                state.error = Some(e.to_string());
                Err(e)
            }
        };
        state.loading = false;
        outcome
    }

    pub async fn set_filter(&self, update: FilterUpdate) -> Result<(), ClientError> {
        self.update_filters([update]).await
    }

    pub async fn update_filters(
        &self,
        updates: impl IntoIterator<Item = FilterUpdate>,
    ) -> Result<(), ClientError> {
        self.update_filters_at(updates, 1).await
    }

    /// Applies `updates` and lands on `page` with a single fetch.
    pub async fn update_filters_at(
        &self,
        updates: impl IntoIterator<Item = FilterUpdate>,
        page: u32,
    ) -> Result<(), ClientError> {
        {
            let mut state = self.state.write();
            for update in updates {
                state.filters.apply(update);
            }
            state.filters.page = page.max(1);
        }
        self.fetch_tasks().await
    }

    pub async fn set_page(&self, page: u32) -> Result<(), ClientError> {
        self.state.write().filters.page = page.max(1);
        self.fetch_tasks().await
    }

    pub async fn reset_filters(&self) -> Result<(), ClientError> {
        self.state.write().filters = TaskFilter::default();
        self.fetch_tasks().await
    }

    pub async fn get_filter_options(&self) -> Result<FilterOptions, ClientError> {
        self.api.get("/tasks/filter-options").await
    }
}
