use chrono::{DateTime, TimeZone, Utc};

use super::task::Task;

/// What today looks like, computed from the current task list.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    /// Open tasks whose official deadline falls on today's date.
    pub important: usize,
    pub total_minutes: i64,
    /// `total_minutes` in hours, one decimal.
    pub total_hours: f64,
    pub top_recommendation: Option<String>,
    pub short_summary: String,
}

impl DaySummary {
    /// `ranked` is the priority order; it decides the top recommendation.
    pub fn build<Tz: TimeZone>(ranked: &[&Task], now: DateTime<Utc>, tz: &Tz) -> Self {
        let today = now.with_timezone(tz).date_naive();
        let is_important = |t: &Task| {
            t.is_open()
                && t.official_deadline
                    .is_some_and(|d| d.with_timezone(tz).date_naive() == today)
        };

        let important: Vec<&Task> = ranked.iter().copied().filter(|t| is_important(*t)).collect();
        let total_minutes = important
            .iter()
            .fold(0i64, |acc, t| acc.saturating_add(t.estimate.max(0)));
        let total_hours = (total_minutes as f64 / 60.0 * 10.0).round() / 10.0;

        let top = important
            .first()
            .copied()
            .or_else(|| ranked.iter().copied().find(|t| t.is_open()));
        let top_recommendation = top.map(|t| t.title.clone());

        let short_summary = match (important.len(), &top_recommendation) {
            (0, None) => "Nothing open. Enjoy the free time.".to_string(),
            (0, Some(title)) => format!("No deadlines today; \"{}\" is the best next step.", title),
            (n, Some(title)) => format!(
                "{} task{} due today, about {} h of work; start with \"{}\".",
                n,
                if n == 1 { "" } else { "s" },
                total_hours,
                title
            ),
            (n, None) => format!("{} task{} due today.", n, if n == 1 { "" } else { "s" }),
        };

        Self {
            important: important.len(),
            total_minutes,
            total_hours,
            top_recommendation,
            short_summary,
        }
    }
}
