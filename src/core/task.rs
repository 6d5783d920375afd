use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_ESTIMATE_MINUTES: i64 = 30;

fn default_estimate() -> i64 {
    DEFAULT_ESTIMATE_MINUTES
}

/// A single task as persisted by the store.
///
/// `real_deadline` is derived from `official_deadline` and `estimate`; it is
/// never edited directly and is rewritten by the engine whenever either input
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_deadline: Option<DateTime<Utc>>,
    /// Estimated work duration in minutes.
    #[serde(default = "default_estimate")]
    pub estimate: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            done: false,
            official_deadline: None,
            real_deadline: None,
            estimate: DEFAULT_ESTIMATE_MINUTES,
            done_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.done
    }

    /// Flip the done flag. Returns true when the task was re-opened.
    pub fn toggle(&mut self, now: DateTime<Utc>) -> bool {
        if self.done {
            self.done = false;
            self.done_at = None;
            true
        } else {
            self.done = true;
            self.done_at = Some(now);
            false
        }
    }
}

/// Fields accepted when creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub official_deadline: Option<DateTime<Utc>>,
    pub estimate: Option<i64>,
    /// Caller-chosen id; a fresh UUID is generated when absent.
    pub id: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.official_deadline = Some(deadline);
        self
    }

    pub fn estimate(mut self, minutes: i64) -> Self {
        self.estimate = Some(minutes);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Partial update. `official_deadline: Some(None)` clears the deadline.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub official_deadline: Option<Option<DateTime<Utc>>>,
    pub estimate: Option<i64>,
}

impl TaskPatch {
    /// Whether applying this patch changes an input of the real deadline.
    pub fn touches_deadline(&self) -> bool {
        self.official_deadline.is_some() || self.estimate.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && !self.touches_deadline()
    }
}
