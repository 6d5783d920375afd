use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeZone, Timelike};

use super::task::Task;

/// Aggregated completion statistics over the whole task list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub completed: usize,
    pub pending: usize,
    /// Number of tasks per official-deadline date.
    pub by_deadline: BTreeMap<NaiveDate, usize>,
    /// Number of completions per date.
    pub completed_by_day: BTreeMap<NaiveDate, usize>,
    /// Completions per hour of day, index 0..24.
    pub completed_by_hour: [usize; 24],
}

impl Stats {
    /// Dates and hours are taken in `tz`.
    pub fn build<Tz: TimeZone>(tasks: &[Task], tz: &Tz) -> Self {
        let mut stats = Self::default();

        for task in tasks {
            if task.done {
                stats.completed += 1;
            } else {
                stats.pending += 1;
            }

            if let Some(deadline) = task.official_deadline {
                let day = deadline.with_timezone(tz).date_naive();
                *stats.by_deadline.entry(day).or_default() += 1;
            }

            if let Some(done_at) = task.done_at {
                let local = done_at.with_timezone(tz);
                *stats.completed_by_day.entry(local.date_naive()).or_default() += 1;
                stats.completed_by_hour[local.hour() as usize] += 1;
            }
        }

        stats
    }

    pub fn total(&self) -> usize {
        self.completed + self.pending
    }

    /// Hour with the most completions, if anything was completed.
    pub fn best_hour(&self) -> Option<u32> {
        let (hour, count) = self
            .completed_by_hour
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;
        (*count > 0).then_some(hour as u32)
    }
}
