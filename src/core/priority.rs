use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::task::Task;

/// Urgency assigned to tasks without an official deadline.
pub const NO_DEADLINE_HOURS: f64 = 99_999.0;

/// Hours until the official deadline, floored at one hour.
pub fn urgency_hours(task: &Task, now: DateTime<Utc>) -> f64 {
    match task.official_deadline {
        None => NO_DEADLINE_HOURS,
        Some(deadline) => {
            let hours = (deadline - now).num_milliseconds() as f64 / 3_600_000.0;
            hours.max(1.0)
        }
    }
}

pub fn score(task: &Task, now: DateTime<Utc>, postpone_count: u32) -> f64 {
    (1.0 / urgency_hours(task, now)) * 100.0 + f64::from(postpone_count) * 10.0
}

/// Sort tasks by descending score. Equal scores keep their input order.
pub fn rank<'a>(
    tasks: &'a [Task],
    now: DateTime<Utc>,
    postpones: &HashMap<String, u32>,
) -> Vec<&'a Task> {
    let mut scored: Vec<(f64, &Task)> = tasks
        .iter()
        .map(|t| (score(t, now, postpones.get(&t.id).copied().unwrap_or(0)), t))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, t)| t).collect()
}
