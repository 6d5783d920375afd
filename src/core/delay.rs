use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::task::Task;

pub const DEFAULT_DELAY_MINUTES: i64 = 15;

/// Timing observed for one task during this session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelaySample {
    pub started_at: Option<DateTime<Utc>>,
    /// Elapsed minutes between start and completion.
    pub actual_minutes: Option<f64>,
}

/// Learns how much longer than estimated the user's tasks take.
///
/// Samples live for the session only. The average is pulled on demand from
/// the current samples and task estimates; nothing is cached.
#[derive(Debug, Clone)]
pub struct DelayLearner {
    samples: HashMap<String, DelaySample>,
    default_delay: i64,
}

impl Default for DelayLearner {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_MINUTES)
    }
}

impl DelayLearner {
    pub fn new(default_delay: i64) -> Self {
        Self {
            samples: HashMap::new(),
            default_delay: default_delay.max(0),
        }
    }

    /// Record that work on a task began. A repeated start moves the start time.
    pub fn start(&mut self, task_id: &str, now: DateTime<Utc>) {
        let sample = self.samples.entry(task_id.to_string()).or_default();
        sample.started_at = Some(now);
        sample.actual_minutes = None;
    }

    /// Record completion; only meaningful when the task was started.
    pub fn complete(&mut self, task_id: &str, now: DateTime<Utc>) -> Option<f64> {
        let sample = self.samples.get_mut(task_id)?;
        let started = sample.started_at?;
        let elapsed = (now - started).num_seconds().max(0) as f64 / 60.0;
        sample.actual_minutes = Some(elapsed);
        Some(elapsed)
    }

    /// Undo: the completion no longer counts, the start time stays.
    pub fn reopen(&mut self, task_id: &str) {
        if let Some(sample) = self.samples.get_mut(task_id) {
            sample.actual_minutes = None;
        }
    }

    pub fn forget(&mut self, task_id: &str) {
        self.samples.remove(task_id);
    }

    pub fn sample(&self, task_id: &str) -> Option<&DelaySample> {
        self.samples.get(task_id)
    }

    /// Average overrun in whole minutes across completed, started tasks.
    pub fn average_delay(&self, tasks: &[Task]) -> i64 {
        let pairs = tasks.iter().filter_map(|task| {
            let sample = self.samples.get(&task.id)?;
            sample.started_at?;
            Some((task.estimate, sample.actual_minutes?))
        });
        average_positive_delay(pairs).unwrap_or(self.default_delay)
    }
}

/// Mean of the positive `actual - estimate` overruns, rounded to the minute.
/// Early finishes are dropped rather than counted as zero. `None` when no
/// overrun was observed.
pub fn average_positive_delay(pairs: impl IntoIterator<Item = (i64, f64)>) -> Option<i64> {
    let (sum, count) = pairs
        .into_iter()
        .map(|(estimate, actual)| actual - estimate as f64)
        .filter(|delay| *delay > 0.0)
        .fold((0.0, 0usize), |(sum, count), delay| (sum + delay, count + 1));

    if count == 0 {
        None
    } else {
        Some((sum / count as f64).round() as i64)
    }
}
