//! The view pipeline: a pure transformation from the full task sequence and
//! the current filter state to the ordered sequence of tasks to display.
//!
//! Nothing here mutates the store. Sorting is stable, so tasks that compare
//! equal keep their store order; only an explicit reorder ever rewrites the
//! order indices themselves.

use crate::fields::{PriorityFilter, SortKey};
use crate::task::Task;

/// Filter and sort state for the task list.
#[derive(Debug, Clone, Default)]
pub struct ViewQuery {
    /// Case-insensitive substring matched against title, description and
    /// joined tags.
    pub search: String,
    pub priority: PriorityFilter,
    pub sort: SortKey,
}

/// Compute the display sequence for the given tasks and query.
pub fn visible<'a>(tasks: &'a [Task], query: &ViewQuery) -> Vec<&'a Task> {
    let needle = query.search.trim().to_lowercase();

    let mut shown: Vec<&Task> = tasks
        .iter()
        .filter(|t| {
            if !query.priority.matches(t.priority) {
                return false;
            }
            if needle.is_empty() {
                return true;
            }
            haystack(t).contains(&needle)
        })
        .collect();

    match query.sort {
        SortKey::Created => {
            // Newest first; stable, so equal stamps keep store order.
            shown.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        SortKey::Due => {
            // Ascending; an absent date compares lowest, so undated tasks
            // lead the list.
            shown.sort_by_key(|t| t.due_date);
        }
        SortKey::Priority => {
            shown.sort_by(|a, b| b.priority.score().cmp(&a.priority.score()));
        }
    }

    shown
}

/// The searchable text of a task: title, description and tags joined with
/// spaces, lowercased.
fn haystack(t: &Task) -> String {
    let mut s = String::with_capacity(t.title.len() + 16);
    s.push_str(&t.title);
    s.push(' ');
    if let Some(desc) = &t.description {
        s.push_str(desc);
    }
    s.push(' ');
    s.push_str(&t.tags.join(" "));
    s.to_lowercase()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::fields::Priority;

    fn task(id: &str, title: &str, priority: Priority) -> Task {
        let mut t = Task::new(title, priority, 0);
        t.id = id.to_string();
        t
    }

    #[test]
    fn test_priority_filter_returns_only_matching() {
        let tasks = vec![
            task("1", "alpha", Priority::High),
            task("2", "beta", Priority::Low),
            task("3", "gamma", Priority::High),
            task("4", "delta", Priority::Medium),
        ];
        let query = ViewQuery {
            priority: PriorityFilter::High,
            ..ViewQuery::default()
        };
        let shown = visible(&tasks, &query);
        assert_eq!(shown.len(), 2);
        assert!(shown.iter().all(|t| t.priority == Priority::High));
    }

    #[test]
    fn test_imported_high_task_shown_under_high_filter() {
        let tasks: Vec<Task> =
            serde_json::from_str(r#"[{"id":"x","title":"A","priority":"high"}]"#).unwrap();
        let query = ViewQuery {
            priority: PriorityFilter::High,
            sort: SortKey::Priority,
            ..ViewQuery::default()
        };
        let shown = visible(&tasks, &query);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "A");
    }

    #[test]
    fn test_search_matches_title_description_and_tags() {
        let mut a = task("1", "Water the plants", Priority::Low);
        a.description = Some("front garden".into());
        let mut b = task("2", "Taxes", Priority::Low);
        b.tags = vec!["paperwork".into(), "urgent".into()];
        let c = task("3", "Laundry", Priority::Low);
        let tasks = vec![a, b, c];

        let query = |s: &str| ViewQuery {
            search: s.to_string(),
            ..ViewQuery::default()
        };
        assert_eq!(visible(&tasks, &query("GARDEN")).len(), 1);
        assert_eq!(visible(&tasks, &query("paperwork"))[0].id, "2");
        assert_eq!(visible(&tasks, &query("laun")).len(), 1);
        assert!(visible(&tasks, &query("nowhere")).is_empty());
    }

    #[test]
    fn test_priority_sort_is_stable() {
        let tasks = vec![
            task("1", "first-low", Priority::Low),
            task("2", "first-high", Priority::High),
            task("3", "second-low", Priority::Low),
            task("4", "second-high", Priority::High),
        ];
        let query = ViewQuery {
            sort: SortKey::Priority,
            ..ViewQuery::default()
        };
        let ids: Vec<&str> = visible(&tasks, &query).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "4", "1", "3"]);
    }

    #[test]
    fn test_due_sort_puts_undated_first() {
        let mut a = task("1", "later", Priority::Low);
        a.due_date = NaiveDate::from_ymd_opt(2026, 9, 20);
        let mut b = task("2", "sooner", Priority::Low);
        b.due_date = NaiveDate::from_ymd_opt(2026, 9, 1);
        let c = task("3", "someday", Priority::Low);
        let tasks = vec![a, b, c];

        let query = ViewQuery {
            sort: SortKey::Due,
            ..ViewQuery::default()
        };
        let ids: Vec<&str> = visible(&tasks, &query).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_created_sort_is_newest_first() {
        let mut a = task("1", "old", Priority::Low);
        a.created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut b = task("2", "new", Priority::Low);
        b.created_at = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        // Imported without a timestamp: epoch, sorts last.
        let mut c = task("3", "undated", Priority::Low);
        c.created_at = chrono::DateTime::UNIX_EPOCH;
        let tasks = vec![a, b, c];

        let query = ViewQuery::default();
        let ids: Vec<&str> = visible(&tasks, &query).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
    }

    #[test]
    fn test_view_does_not_touch_order_indices() {
        let mut tasks = vec![task("1", "a", Priority::Low), task("2", "b", Priority::High)];
        tasks[0].order = 0;
        tasks[1].order = 1;
        let query = ViewQuery {
            sort: SortKey::Priority,
            ..ViewQuery::default()
        };
        let _ = visible(&tasks, &query);
        assert_eq!(tasks[0].order, 0);
        assert_eq!(tasks[1].order, 1);
    }
}
