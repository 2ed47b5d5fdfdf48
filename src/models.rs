// Data models for the journal and the task tree

use crate::record::Record;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One day's productivity and mood record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayEntry {
    pub id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub productive_activities: Vec<String>,
    #[serde(default)]
    pub unproductive_activities: Vec<String>,
    #[serde(default)]
    pub feel_good_about_day: Option<bool>,
    #[serde(default)]
    pub feel_good_reason: String,
    /// Older documents predate submission and read as drafts
    #[serde(default)]
    pub is_submitted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DayEntry {
    /// Empty draft for a date
    pub fn new(date: NaiveDate) -> Self {
        let now = now_ms();
        Self {
            id: new_id(),
            date,
            productive_activities: Vec::new(),
            unproductive_activities: Vec::new(),
            feel_good_about_day: None,
            feel_good_reason: String::new(),
            is_submitted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_activities(&self) -> bool {
        !self.productive_activities.is_empty() || !self.unproductive_activities.is_empty()
    }

    /// Submitted with a mood answer; these dates get highlighted on the calendar
    pub fn is_complete(&self) -> bool {
        self.is_submitted && self.feel_good_about_day.is_some()
    }
}

impl Record for DayEntry {
    fn key(&self) -> String {
        self.date.to_string()
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_key() -> &'static str {
        "entries"
    }
}

/// Node of the task forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Depth at creation time; 0 for roots
    #[serde(default)]
    pub level: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn new(title: impl Into<String>, parent_id: Option<String>, level: u32) -> Self {
        let now = now_ms();
        Self {
            id: new_id(),
            title: title.into(),
            completed: false,
            parent_id,
            level,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Task {
    fn key(&self) -> String {
        self.id.clone()
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_key() -> &'static str {
        "tasks"
    }
}

/// Fields of a task that can be changed after creation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub(crate) fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}

/// Time-ordered unique id
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System time before Unix epoch")
        .as_millis() as i64
}

/// Timestamp for a rewrite of a record last stamped at `previous`.
/// Never goes backwards and never repeats.
pub(crate) fn next_stamp(previous: i64) -> i64 {
    now_ms().max(previous + 1)
}
