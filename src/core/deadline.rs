use chrono::{DateTime, Duration, Utc};

/// Latest safe start time for a task.
///
/// The official deadline minus the estimated duration minus the learned
/// start delay. Estimates below one minute are treated as one minute. A
/// result already in the past is returned unchanged, and one beyond the
/// representable range saturates to the earliest instant.
pub fn real_deadline(
    official: Option<DateTime<Utc>>,
    estimate_minutes: i64,
    average_delay_minutes: i64,
) -> Option<DateTime<Utc>> {
    let official = official?;
    let estimate = estimate_minutes.max(1);
    let delay = average_delay_minutes.max(0);
    Some(minus_minutes(official, estimate.saturating_add(delay)))
}

/// Start of the reminder window: the official deadline pulled forward by the
/// learned delay.
pub fn effective_deadline(official: DateTime<Utc>, average_delay_minutes: i64) -> DateTime<Utc> {
    minus_minutes(official, average_delay_minutes.max(0))
}

fn minus_minutes(at: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    Duration::try_minutes(minutes)
        .and_then(|d| at.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
