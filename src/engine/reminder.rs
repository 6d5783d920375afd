//! "Start now" reminders.
//!
//! Each open task with an official deadline gets at most one reminder while
//! it stays open. The window opens `average delay` minutes before the official
//! deadline and closes at the deadline itself; overdue tasks are left alone.
//! Markers live in memory only, so a fresh session starts with none.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::SharedEngine;
use crate::core::deadline::effective_deadline;
use crate::core::task::Task;
use crate::notify::Notifier;

/// A reminder that is due for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub task_id: String,
    pub task_title: String,
    pub official_deadline: DateTime<Utc>,
    pub average_delay: i64,
}

impl Reminder {
    pub fn title(&self) -> &'static str {
        "Start now or you'll be late!"
    }

    pub fn body(&self) -> String {
        format!(
            "Task: {}\nDeadline: {}\nUsual delay: ~{} min",
            self.task_title,
            self.official_deadline
                .with_timezone(&Local)
                .format("%H:%M"),
            self.average_delay
        )
    }
}

/// Per-session notified markers.
#[derive(Debug, Default)]
pub struct ReminderTrigger {
    notified: HashSet<String>,
}

impl ReminderTrigger {
    /// Reminders whose window contains `now` and that have not fired yet.
    pub fn due(&self, tasks: &[Task], now: DateTime<Utc>, average_delay: i64) -> Vec<Reminder> {
        tasks
            .iter()
            .filter(|t| !t.done && !self.notified.contains(&t.id))
            .filter_map(|t| {
                let official = t.official_deadline?;
                let start = effective_deadline(official, average_delay);
                (now >= start && now < official).then(|| Reminder {
                    task_id: t.id.clone(),
                    task_title: t.title.clone(),
                    official_deadline: official,
                    average_delay,
                })
            })
            .collect()
    }

    pub fn mark_notified(&mut self, task_id: &str) {
        self.notified.insert(task_id.to_string());
    }

    pub fn is_notified(&self, task_id: &str) -> bool {
        self.notified.contains(task_id)
    }

    /// Back to dormant: the task was re-opened or removed.
    pub fn reset(&mut self, task_id: &str) {
        self.notified.remove(task_id);
    }
}

/// Running reminder loop. Dropping the handle aborts the loop.
pub struct ReminderHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl ReminderHandle {
    /// Signal the loop to stop and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                if !e.is_cancelled() {
                    log::error!("Reminder loop ended abnormally: {}", e);
                }
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }
}

impl Drop for ReminderHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

/// Poll `engine` every `period` and deliver due reminders through `notifier`.
/// The first evaluation happens immediately.
pub fn spawn_reminder_loop(
    engine: SharedEngine,
    notifier: Arc<dyn Notifier>,
    period: Duration,
) -> ReminderHandle {
    let (tx, mut rx) = oneshot::channel::<()>();

    let join = tokio::spawn(async move {
        log::info!("Reminder loop started, polling every {:?}", period);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut rx => break,
                _ = interval.tick() => {
                    let mut engine = engine.lock().await;
                    engine.poll_reminders(Utc::now(), notifier.as_ref());
                }
            }
        }
        log::info!("Reminder loop stopped");
    });

    ReminderHandle {
        shutdown: Some(tx),
        join: Some(join),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 9, 15, 0, 0).unwrap()
    }

    fn task(id: &str, deadline_in_min: Option<i64>) -> Task {
        let mut t = Task::new(format!("Task {}", id));
        t.id = id.to_string();
        t.official_deadline = deadline_in_min.map(|m| now() + ChronoDuration::minutes(m));
        t
    }

    fn ids(reminders: &[Reminder]) -> Vec<&str> {
        reminders.iter().map(|r| r.task_id.as_str()).collect()
    }

    #[test]
    fn inside_window_fires() {
        let trigger = ReminderTrigger::default();
        let tasks = vec![task("a", Some(10))];
        let due = trigger.due(&tasks, now(), 15);
        assert_eq!(ids(&due), ["a"]);
        assert_eq!(due[0].average_delay, 15);
    }

    #[test]
    fn window_bounds() {
        let trigger = ReminderTrigger::default();
        let tasks = vec![
            task("opens_now", Some(15)),
            task("not_yet", Some(16)),
            task("at_deadline", Some(0)),
            task("overdue", Some(-5)),
            task("no_deadline", None),
        ];
        assert_eq!(ids(&trigger.due(&tasks, now(), 15)), ["opens_now"]);
    }

    #[test]
    fn done_and_notified_tasks_are_skipped() {
        let mut trigger = ReminderTrigger::default();
        let mut done = task("done", Some(5));
        done.done = true;
        let tasks = vec![done, task("seen", Some(5)), task("fresh", Some(5))];
        trigger.mark_notified("seen");
        assert_eq!(ids(&trigger.due(&tasks, now(), 15)), ["fresh"]);

        trigger.reset("seen");
        assert!(!trigger.is_notified("seen"));
        assert_eq!(ids(&trigger.due(&tasks, now(), 15)), ["seen", "fresh"]);
    }

    #[test]
    fn zero_delay_means_empty_window() {
        let trigger = ReminderTrigger::default();
        let tasks = vec![task("a", Some(1))];
        assert!(trigger.due(&tasks, now(), 0).is_empty());
    }

    #[tokio::test]
    async fn loop_delivers_once_and_stops() {
        use crate::config::EngineConfig;
        use crate::core::task::NewTask;
        use crate::engine::SchedulingEngine;
        use crate::notify::testing::RecordingNotifier;
        use crate::store::TaskStore;

        let mut engine = SchedulingEngine::new(TaskStore::in_memory(), &EngineConfig::default());
        let deadline = Utc::now() + ChronoDuration::minutes(10);
        engine
            .add_task(NewTask::new("Catch train").deadline(deadline), Utc::now())
            .unwrap();
        let engine = engine.shared();

        let recorder = Arc::new(RecordingNotifier::default());
        let notifier: Arc<dyn Notifier> = recorder.clone();
        let handle = spawn_reminder_loop(engine.clone(), notifier, Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        tokio::time::timeout(Duration::from_secs(5), handle.stop())
            .await
            .expect("loop stops");

        assert_eq!(recorder.count(), 1);
        assert!(recorder.sent.lock().unwrap()[0].1.contains("Catch train"));
    }

    #[tokio::test]
    async fn dropping_handle_releases_engine() {
        use crate::config::EngineConfig;
        use crate::engine::SchedulingEngine;
        use crate::notify::LogNotifier;
        use crate::store::TaskStore;

        let engine =
            SchedulingEngine::new(TaskStore::in_memory(), &EngineConfig::default()).shared();
        let handle = spawn_reminder_loop(
            engine.clone(),
            Arc::new(LogNotifier),
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(Arc::strong_count(&engine), 1);
    }

    #[test]
    fn body_mentions_title_and_delay() {
        let r = Reminder {
            task_id: "a".into(),
            task_title: "Submit essay".into(),
            official_deadline: now(),
            average_delay: 20,
        };
        let body = r.body();
        assert!(body.contains("Submit essay"));
        assert!(body.contains("~20 min"));
    }
}
