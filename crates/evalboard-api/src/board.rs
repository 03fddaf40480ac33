//! Seeded task list with the listing filter semantics.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use evalboard_types::{
    FilterOption, FilterOptions, Page, Priority, SortField, SortOrder, Task, TaskFilter,
    MAX_PAGE_SIZE,
};
use parking_lot::RwLock;

use crate::error::{ApiError, ApiResult};

pub const COMPLETED_STATUS: &str = "completed";

pub struct TaskBoard {
    tasks: RwLock<Vec<Task>>,
}

impl TaskBoard {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: RwLock::new(tasks),
        }
    }

    /// A fixed set of tasks with due dates relative to `now`.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let rows: [(&str, &str, Priority, &[&str], i64, Option<i64>); 12] = [
            ("Collect sentiment tweets", "completed", Priority::High, &["data", "sentiment"], -30, Some(-20)),
            ("Label irony subset", "in_progress", Priority::Urgent, &["annotation", "irony"], -21, Some(-2)),
            ("Train emoji classifier", "pending", Priority::Medium, &["model", "emoji"], -14, Some(5)),
            ("Evaluate hate speech baseline", "pending", Priority::High, &["model", "hate"], -12, Some(-1)),
            ("Write offensive-language report", "in_progress", Priority::Low, &["report"], -10, Some(12)),
            ("Deduplicate stance dataset", "completed", Priority::Medium, &["data", "stance"], -9, Some(-3)),
            ("Tune emotion thresholds", "pending", Priority::Low, &["model", "emotion"], -7, None),
            ("Review annotation guidelines", "pending", Priority::Urgent, &["annotation"], -5, Some(1)),
            ("Export analytics snapshot", "in_progress", Priority::Medium, &["report", "analytics"], -4, Some(3)),
            ("Archive raw uploads", "completed", Priority::Low, &["data"], -3, Some(2)),
            ("Benchmark search latency", "pending", Priority::High, &["search"], -2, Some(20)),
            ("Plan topic modelling spike", "pending", Priority::Medium, &["analytics"], -1, None),
        ];

        let tasks = rows
            .iter()
            .enumerate()
            .map(|(idx, (title, status, priority, tags, createdOffset, dueOffset))| Task {
                id: idx as i64 + 1,
                title: title.to_string(),
                description: Some(format!("{title} for the TweetEval benchmark")),
                status: status.to_string(),
                priority: *priority,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                created_date: now + Duration::days(*createdOffset),
                due_date: dueOffset.map(|d| now + Duration::days(d)),
                completed_date: (*status == COMPLETED_STATUS)
                    .then(|| now + Duration::days(createdOffset + 1)),
                is_overdue: false,
                days_until_due: None,
            })
            .collect();
        Self::new(tasks)
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    pub fn query(&self, filter: &TaskFilter, now: DateTime<Utc>) -> Page<Task> {
        let mut matched: Vec<Task> = self
            .tasks
            .read()
            .iter()
            .filter(|task| matches(task, filter, now))
            .cloned()
            .map(|task| annotate(task, now))
            .collect();

        matched.sort_by(|a, b| {
            let ordering = match filter.sort_order {
                SortOrder::Asc => compare(a, b, filter.sort_by),
                SortOrder::Desc => compare(a, b, filter.sort_by).reverse(),
            };
            ordering.then(a.id.cmp(&b.id))
        });

        let total = matched.len() as u64;
        let offset = (filter.page.saturating_sub(1) as usize).saturating_mul(filter.page_size as usize);
        let items = matched
            .into_iter()
            .skip(offset)
            .take(filter.page_size as usize)
            .collect();
        Page::new(items, total, filter.page, filter.page_size)
    }

    pub fn filter_options(&self) -> FilterOptions {
        let tasks = self.tasks.read();

        let mut statuses: BTreeMap<&str, u64> = BTreeMap::new();
        let mut priorities: BTreeMap<Priority, u64> = BTreeMap::new();
        let mut tags: BTreeMap<&str, u64> = BTreeMap::new();
        for task in tasks.iter() {
            *statuses.entry(task.status.as_str()).or_default() += 1;
            *priorities.entry(task.priority).or_default() += 1;
            for tag in &task.tags {
                *tags.entry(tag.as_str()).or_default() += 1;
            }
        }

        FilterOptions {
            statuses: statuses.into_iter().map(|(v, c)| option(v, c)).collect(),
            priorities: priorities
                .into_iter()
                .map(|(p, c)| option(p.as_str(), c))
                .collect(),
            tags: tags.into_iter().map(|(v, c)| option(v, c)).collect(),
        }
    }
}

pub fn validate(filter: &TaskFilter) -> ApiResult<()> {
    if filter.page < 1 {
        return Err(ApiError::Unprocessable("page must be at least 1".into()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&filter.page_size) {
        return Err(ApiError::Unprocessable(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    if let (Some(from), Some(to)) = (filter.due_date_from, filter.due_date_to) {
        if from > to {
            return Err(ApiError::Unprocessable(
                "due_date_from must not be after due_date_to".into(),
            ));
        }
    }
    Ok(())
}

fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    task.status != COMPLETED_STATUS && task.due_date.is_some_and(|due| due < now)
}

fn matches(task: &Task, filter: &TaskFilter, now: DateTime<Utc>) -> bool {
    if !filter.search.is_empty() {
        let needle = filter.search.to_lowercase();
        let inTitle = task.title.to_lowercase().contains(&needle);
        let inDescription = task
            .description
            .as_ref()
            .is_some_and(|d| d.to_lowercase().contains(&needle));
        if !inTitle && !inDescription {
            return false;
        }
    }
    if !filter.status.is_empty() && !filter.status.contains(&task.status) {
        return false;
    }
    if !filter.priority.is_empty() && !filter.priority.contains(&task.priority) {
        return false;
    }
    if !filter.tags.is_empty() && !task.tags.iter().any(|t| filter.tags.contains(t)) {
        return false;
    }

    let dueDay = task.due_date.map(|d| d.date_naive());
    if let Some(from) = filter.due_date_from {
        if !dueDay.is_some_and(|day| day >= from) {
            return false;
        }
    }
    if let Some(to) = filter.due_date_to {
        if !dueDay.is_some_and(|day| day <= to) {
            return false;
        }
    }

    if filter.overdue_only && !is_overdue(task, now) {
        return false;
    }
    if filter.completed_only && task.status != COMPLETED_STATUS {
        return false;
    }
    true
}

fn annotate(mut task: Task, now: DateTime<Utc>) -> Task {
    task.is_overdue = is_overdue(&task, now);
    task.days_until_due = task
        .due_date
        .map(|due| (due.date_naive() - now.date_naive()).num_days());
    task
}

fn compare(a: &Task, b: &Task, field: SortField) -> Ordering {
    match field {
        SortField::CreatedDate => a.created_date.cmp(&b.created_date),
        // Tasks without a due date sort after dated ones.
        SortField::DueDate => match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortField::Priority => a.priority.cmp(&b.priority),
        SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortField::Status => a.status.cmp(&b.status),
    }
}

fn option(value: &str, count: u64) -> FilterOption {
    FilterOption {
        value: value.to_string(),
        label: label(value),
        count,
    }
}

/// `in_progress` becomes `In Progress`.
fn label(value: &str) -> String {
    value
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use evalboard_types::FilterUpdate;

    fn now() -> DateTime<Utc> {
        "2024-06-15T12:00:00Z".parse().unwrap()
    }

    fn board() -> TaskBoard {
        TaskBoard::seeded(now())
    }

    fn filter(updates: Vec<FilterUpdate>) -> TaskFilter {
        let mut filter = TaskFilter::default();
        for update in updates {
            filter.apply(update);
        }
        filter
    }

    #[test]
    fn default_listing_is_newest_first() {
        let page = board().query(&TaskFilter::default(), now());
        assert_eq!(page.total, 12);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.items[0].title, "Plan topic modelling spike");
    }

    #[test]
    fn status_filter_keeps_only_listed_statuses() {
        let page = board().query(
            &filter(vec![FilterUpdate::Status(vec!["completed".into()])]),
            now(),
        );
        assert_eq!(page.total, 3);
        assert!(page.items.iter().all(|t| t.status == "completed"));
        assert!(page.items.iter().all(|t| !t.is_overdue));
    }

    #[test]
    fn overdue_excludes_completed_and_undated_tasks() {
        let page = board().query(&filter(vec![FilterUpdate::OverdueOnly(true)]), now());
        let titles: Vec<&str> = page.items.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Evaluate hate speech baseline", "Label irony subset"]
        );
        assert!(page.items.iter().all(|t| t.is_overdue));
        assert_eq!(page.items[1].days_until_due, Some(-2));
    }

    #[test]
    fn search_matches_title_case_insensitively() {
        let page = board().query(&filter(vec![FilterUpdate::Search("EMOJI".into())]), now());
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "Train emoji classifier");
    }

    #[test]
    fn tags_overlap_and_priority_sort() {
        let page = board().query(
            &filter(vec![
                FilterUpdate::Tags(vec!["model".into()]),
                FilterUpdate::SortBy(SortField::Priority),
                FilterUpdate::SortOrder(SortOrder::Asc),
            ]),
            now(),
        );
        let priorities: Vec<Priority> = page.items.iter().map(|t| t.priority).collect();
        assert_eq!(
            priorities,
            vec![Priority::Low, Priority::Medium, Priority::High]
        );
    }

    #[test]
    fn due_date_range_is_inclusive() {
        let page = board().query(
            &filter(vec![
                FilterUpdate::DueDateFrom(NaiveDate::from_ymd_opt(2024, 6, 16)),
                FilterUpdate::DueDateTo(NaiveDate::from_ymd_opt(2024, 6, 18)),
            ]),
            now(),
        );
        let mut ids: Vec<i64> = page.items.iter().map(|t| t.id).collect();
        ids.sort();
        assert_eq!(ids, vec![8, 9, 10]);
    }

    #[test]
    fn pagination_slices_after_filtering() {
        let page = board().query(&filter(vec![FilterUpdate::PageSize(5)]), now());
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total_pages, 3);

        let mut last = filter(vec![FilterUpdate::PageSize(5)]);
        last.page = 3;
        assert_eq!(board().query(&last, now()).items.len(), 2);

        last.page = 9;
        assert!(board().query(&last, now()).items.is_empty());
    }

    #[test]
    fn validation_rejects_bad_paging_and_inverted_ranges() {
        let mut bad = TaskFilter::default();
        bad.page = 0;
        assert!(validate(&bad).is_err());

        let bad = filter(vec![FilterUpdate::PageSize(101)]);
        assert!(validate(&bad).is_err());

        let bad = filter(vec![
            FilterUpdate::DueDateFrom(NaiveDate::from_ymd_opt(2024, 7, 1)),
            FilterUpdate::DueDateTo(NaiveDate::from_ymd_opt(2024, 6, 1)),
        ]);
        assert!(matches!(validate(&bad), Err(ApiError::Unprocessable(_))));

        assert!(validate(&TaskFilter::default()).is_ok());
    }

    #[test]
    fn filter_options_count_each_value() {
        let options = board().filter_options();
        let progress = options
            .statuses
            .iter()
            .find(|o| o.value == "in_progress")
            .unwrap();
        assert_eq!(progress.label, "In Progress");
        assert_eq!(progress.count, 3);
        assert_eq!(options.priorities[0].value, "low");
        let data = options.tags.iter().find(|o| o.value == "data").unwrap();
        assert_eq!(data.count, 3);
    }
}
