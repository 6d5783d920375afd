//! Session-scoped scheduling engine.
//!
//! One `SchedulingEngine` owns the task store together with everything learned
//! during the session: delay samples, postpone counters, reminder markers and
//! the advisory cache. None of that session state is persisted; a new engine
//! starts clean.

pub mod reconcile;
pub mod reminder;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::advisor::{Advisory, AdvisoryRequest};
use crate::config::EngineConfig;
use crate::core::deadline;
use crate::core::delay::DelayLearner;
use crate::core::mood::Mood;
use crate::core::priority;
use crate::core::task::{NewTask, Task, TaskPatch};
use crate::error::{EngineError, Result};
use crate::notify::Notifier;
use crate::store::TaskStore;

use reconcile::Recommendations;
use reminder::ReminderTrigger;

/// Engine shared between the reminder loop, advisory refreshes and callers.
pub type SharedEngine = Arc<Mutex<SchedulingEngine>>;

pub struct SchedulingEngine {
    store: TaskStore,
    delays: DelayLearner,
    postpones: HashMap<String, u32>,
    reminders: ReminderTrigger,
    recommendations: Recommendations,
    default_estimate: i64,
    /// Priority order as of the last mutation.
    ordered_ids: Vec<String>,
    notifications_available: Option<bool>,
}

impl SchedulingEngine {
    pub fn new(store: TaskStore, config: &EngineConfig) -> Self {
        let mut engine = Self {
            store,
            delays: DelayLearner::new(config.default_delay_minutes),
            postpones: HashMap::new(),
            reminders: ReminderTrigger::default(),
            recommendations: Recommendations::default(),
            default_estimate: config.default_estimate_minutes,
            ordered_ids: Vec::new(),
            notifications_available: None,
        };
        engine.refresh(Utc::now());
        engine
    }

    pub fn shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    /// Ask the host once whether notifications can be shown.
    pub fn probe_notifications(&mut self, notifier: &dyn Notifier) -> bool {
        let available = notifier.available();
        if !available {
            log::warn!("Notifications unavailable; reminders will be attempted best-effort");
        }
        self.notifications_available = Some(available);
        available
    }

    pub fn notifications_available(&self) -> Option<bool> {
        self.notifications_available
    }

    pub fn tasks(&self) -> &[Task] {
        self.store.list()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.store.get(id)
    }

    pub fn add_task(&mut self, new: NewTask, now: DateTime<Utc>) -> Result<Task> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(EngineError::InvalidTitle);
        }

        let mut task = Task::new(title);
        if let Some(id) = new.id {
            if self.store.get(&id).is_some() {
                return Err(EngineError::DuplicateId(id));
            }
            task.id = id;
        }
        task.official_deadline = new.official_deadline;
        task.estimate = new.estimate.unwrap_or(self.default_estimate);
        task.real_deadline = deadline::real_deadline(
            task.official_deadline,
            task.estimate,
            self.average_delay(),
        );

        let task = self.store.create(task);
        log::info!("Added task {} '{}'", task.id, task.title);
        self.refresh(now);
        Ok(task)
    }

    pub fn update_task(
        &mut self,
        id: &str,
        mut patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        if let Some(title) = patch.title.as_mut() {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(EngineError::InvalidTitle);
            }
            *title = trimmed.to_string();
        }

        let average_delay = self.average_delay();
        let recompute = patch.touches_deadline();
        let task = self.store.update(id, &patch, |task| {
            if recompute {
                task.real_deadline =
                    deadline::real_deadline(task.official_deadline, task.estimate, average_delay);
            }
        })?;
        log::debug!("Updated task {}", task.id);
        self.refresh(now);
        Ok(task)
    }

    pub fn remove_task(&mut self, id: &str, now: DateTime<Utc>) -> Result<Task> {
        let task = self.store.remove(id)?;
        self.delays.forget(id);
        self.postpones.remove(id);
        self.reminders.reset(id);
        log::info!("Removed task {} '{}'", task.id, task.title);
        self.refresh(now);
        Ok(task)
    }

    /// Flip done. Re-opening counts as a postpone and re-arms the reminder.
    pub fn toggle_done(&mut self, id: &str, now: DateTime<Utc>) -> Result<Task> {
        let task = self.store.toggle_done(id, now)?;
        if task.done {
            if let Some(minutes) = self.delays.complete(id, now) {
                log::debug!("Task {} took {:.1} min (estimate {})", id, minutes, task.estimate);
            }
        } else {
            *self.postpones.entry(id.to_string()).or_default() += 1;
            self.delays.reopen(id);
            self.reminders.reset(id);
        }
        self.refresh(now);
        Ok(task)
    }

    /// Record that work on a task began, for delay learning.
    pub fn start_task(&mut self, id: &str, now: DateTime<Utc>) -> Result<()> {
        if self.store.get(id).is_none() {
            return Err(EngineError::NotFound(id.to_string()));
        }
        self.delays.start(id, now);
        Ok(())
    }

    pub fn average_delay(&self) -> i64 {
        self.delays.average_delay(self.store.list())
    }

    pub fn postpone_count(&self, id: &str) -> u32 {
        self.postpones.get(id).copied().unwrap_or(0)
    }

    /// All tasks, highest priority first.
    pub fn ordered(&self, now: DateTime<Utc>) -> Vec<&Task> {
        priority::rank(self.store.list(), now, &self.postpones)
    }

    /// Ids in priority order as computed after the last change.
    pub fn ordered_ids(&self) -> &[String] {
        &self.ordered_ids
    }

    pub fn score(&self, task: &Task, now: DateTime<Utc>) -> f64 {
        priority::score(task, now, self.postpone_count(&task.id))
    }

    pub fn mood(&self) -> &Mood {
        self.recommendations.mood()
    }

    /// Returns true when the mood changed and a new advisory is worth fetching.
    pub fn set_mood(&mut self, mood: Mood) -> bool {
        let changed = self.recommendations.set_mood(mood);
        changed && !self.mood().is_all()
    }

    pub fn advisory(&self) -> Option<&Advisory> {
        self.recommendations.advisory()
    }

    pub fn apply_advisory(&mut self, advisory: Advisory) -> bool {
        self.recommendations.apply(advisory)
    }

    /// Payload for the advisor, or `None` when the mood needs no advice.
    pub fn advisory_request(&self) -> Option<AdvisoryRequest> {
        if self.mood().is_all() {
            return None;
        }
        Some(AdvisoryRequest::new(self.mood(), self.store.list()))
    }

    /// The list to show: priority order, narrowed by mood.
    pub fn displayed(&self, now: DateTime<Utc>) -> Vec<&Task> {
        let ordered = self.ordered(now);
        self.recommendations.reconcile(&ordered, now)
    }

    /// One reminder tick. Returns how many reminders were delivered.
    ///
    /// A failed delivery leaves the task unmarked so a later tick can retry.
    pub fn poll_reminders(&mut self, now: DateTime<Utc>, notifier: &dyn Notifier) -> usize {
        let average_delay = self.average_delay();
        let due = self.reminders.due(self.store.list(), now, average_delay);
        let mut delivered = 0;

        for reminder in due {
            match notifier.notify(reminder.title(), &reminder.body()) {
                Ok(()) => {
                    log::info!("Reminded about task {} '{}'", reminder.task_id, reminder.task_title);
                    self.reminders.mark_notified(&reminder.task_id);
                    delivered += 1;
                }
                Err(e) => {
                    log::debug!("Reminder for {} not delivered: {}", reminder.task_id, e);
                }
            }
        }

        delivered
    }

    fn refresh(&mut self, now: DateTime<Utc>) {
        self.ordered_ids = self.ordered(now).into_iter().map(|t| t.id.clone()).collect();
    }
}
