//! Enumerations for task metadata and list presentation.
//!
//! These cover the priority scale on stored tasks plus the filter and sort
//! selectors the view pipeline understands.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Priority level of a task.
///
/// Records imported without a priority fall back to `Low`, which keeps the
/// sort score of such tasks at the bottom of the scale.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    /// Numeric weight used for priority sorting: high=3, medium=2, low=1.
    pub fn score(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

/// Priority filter applied by the view pipeline.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum PriorityFilter {
    #[default]
    All,
    Low,
    Medium,
    High,
}

impl PriorityFilter {
    /// Whether a task with the given priority passes this filter.
    pub fn matches(self, p: Priority) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::Low => p == Priority::Low,
            PriorityFilter::Medium => p == Priority::Medium,
            PriorityFilter::High => p == Priority::High,
        }
    }

    /// Cycle to the next filter value (used by the TUI `p` key).
    pub fn next(self) -> Self {
        match self {
            PriorityFilter::All => PriorityFilter::Low,
            PriorityFilter::Low => PriorityFilter::Medium,
            PriorityFilter::Medium => PriorityFilter::High,
            PriorityFilter::High => PriorityFilter::All,
        }
    }

    /// Short label for the TUI status line.
    pub fn label(self) -> &'static str {
        match self {
            PriorityFilter::All => "all",
            PriorityFilter::Low => "low",
            PriorityFilter::Medium => "medium",
            PriorityFilter::High => "high",
        }
    }
}

/// Available sort keys for the task list.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum SortKey {
    /// Newest first by creation timestamp.
    #[default]
    Created,
    /// Due date ascending; tasks without a due date come first.
    Due,
    /// Priority descending (high before low).
    Priority,
}

impl SortKey {
    /// Cycle to the next sort key (used by the TUI `s` key).
    pub fn next(self) -> Self {
        match self {
            SortKey::Created => SortKey::Due,
            SortKey::Due => SortKey::Priority,
            SortKey::Priority => SortKey::Created,
        }
    }

    /// Short label for the TUI status line.
    pub fn label(self) -> &'static str {
        match self {
            SortKey::Created => "created",
            SortKey::Due => "due",
            SortKey::Priority => "priority",
        }
    }
}

/// Format a priority for table display.
pub fn format_priority(p: Priority) -> &'static str {
    match p {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
    }
}
