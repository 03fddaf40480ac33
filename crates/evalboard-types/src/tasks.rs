use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SortField {
    #[serde(rename = "createdDate")]
    CreatedDate,
    #[serde(rename = "dueDate")]
    DueDate,
    #[serde(rename = "priority")]
    Priority,
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "status")]
    Status,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedDate => "createdDate",
            SortField::DueDate => "dueDate",
            SortField::Priority => "priority",
            SortField::Title => "title",
            SortField::Status => "status",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "createdDate" => Some(SortField::CreatedDate),
            "dueDate" => Some(SortField::DueDate),
            "priority" => Some(SortField::Priority),
            "title" => Some(SortField::Title),
            "status" => Some(SortField::Status),
            _ => None,
        }
    }
}

impl Default for SortField {
    fn default() -> Self {
        SortField::CreatedDate
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_overdue: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_until_due: Option<i64>,
}

/// Client-held query state for the paginated task listing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaskFilter {
    pub search: String,
    pub status: Vec<String>,
    pub priority: Vec<Priority>,
    pub tags: Vec<String>,
    pub due_date_from: Option<NaiveDate>,
    pub due_date_to: Option<NaiveDate>,
    pub overdue_only: bool,
    pub completed_only: bool,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub page: u32,
    pub page_size: u32,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: Vec::new(),
            priority: Vec::new(),
            tags: Vec::new(),
            due_date_from: None,
            due_date_to: None,
            overdue_only: false,
            completed_only: false,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A single field assignment on a [`TaskFilter`].
#[derive(Clone, Debug, PartialEq)]
pub enum FilterUpdate {
    Search(String),
    Status(Vec<String>),
    Priority(Vec<Priority>),
    Tags(Vec<String>),
    DueDateFrom(Option<NaiveDate>),
    DueDateTo(Option<NaiveDate>),
    OverdueOnly(bool),
    CompletedOnly(bool),
    SortBy(SortField),
    SortOrder(SortOrder),
    PageSize(u32),
}

impl TaskFilter {
    /// Assigns one field. Pagination is left to the caller.
    pub fn apply(&mut self, update: FilterUpdate) {
        match update {
            FilterUpdate::Search(v) => self.search = v,
            FilterUpdate::Status(v) => self.status = v,
            FilterUpdate::Priority(v) => self.priority = v,
            FilterUpdate::Tags(v) => self.tags = v,
            FilterUpdate::DueDateFrom(v) => self.due_date_from = v,
            FilterUpdate::DueDateTo(v) => self.due_date_to = v,
            FilterUpdate::OverdueOnly(v) => self.overdue_only = v,
            FilterUpdate::CompletedOnly(v) => self.completed_only = v,
            FilterUpdate::SortBy(v) => self.sort_by = v,
            FilterUpdate::SortOrder(v) => self.sort_order = v,
            FilterUpdate::PageSize(v) => self.page_size = v,
        }
    }

    pub fn has_active_filters(&self) -> bool {
        self.active_filter_count() > 0
    }

    pub fn active_filter_count(&self) -> usize {
        [
            !self.search.is_empty(),
            !self.status.is_empty(),
            !self.priority.is_empty(),
            !self.tags.is_empty(),
            self.due_date_from.is_some(),
            self.due_date_to.is_some(),
            self.overdue_only,
            self.completed_only,
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }

    /// Query-string pairs; list fields repeat their key.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if !self.search.is_empty() {
            pairs.push(("search".to_string(), self.search.clone()));
        }
        for status in &self.status {
            pairs.push(("status".to_string(), status.clone()));
        }
        for priority in &self.priority {
            pairs.push(("priority".to_string(), priority.as_str().to_string()));
        }
        for tag in &self.tags {
            pairs.push(("tags".to_string(), tag.clone()));
        }
        if let Some(from) = self.due_date_from {
            pairs.push(("due_date_from".to_string(), from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.due_date_to {
            pairs.push(("due_date_to".to_string(), to.format("%Y-%m-%d").to_string()));
        }
        if self.overdue_only {
            pairs.push(("overdue_only".to_string(), "true".to_string()));
        }
        if self.completed_only {
            pairs.push(("completed_only".to_string(), "true".to_string()));
        }
        pairs.push(("sort_by".to_string(), self.sort_by.as_str().to_string()));
        pairs.push(("sort_order".to_string(), self.sort_order.as_str().to_string()));
        pairs.push(("page".to_string(), self.page.to_string()));
        pairs.push(("page_size".to_string(), self.page_size.to_string()));
        pairs
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    #[serde(alias = "tasks")]
    pub items: Vec<T>,
    #[serde(alias = "totalCount")]
    pub total: u64,
    pub page: u32,
    #[serde(default, alias = "pageSize")]
    pub page_size: u32,
    #[serde(alias = "totalPages")]
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size as u64) as u32
        };
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
    pub count: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterOptions {
    pub statuses: Vec<FilterOption>,
    pub priorities: Vec<FilterOption>,
    pub tags: Vec<FilterOption>,
}
