use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

use super::task::Task;

/// The user's self-reported state, used to pick a subset of open tasks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mood {
    #[default]
    All,
    Lazy,
    Focus,
    Stress,
    /// Any mood the classifier has no rule for. Shows every open task.
    Other(String),
}

impl Mood {
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Lazy => "lazy",
            Self::Focus => "focus",
            Self::Stress => "stress",
            Self::Other(s) => s.as_str(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Local rule used when no advisory ordering is available.
    pub fn accepts(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if task.done {
            return false;
        }
        match self {
            Self::All | Self::Other(_) => true,
            Self::Lazy => task.estimate <= 30,
            Self::Focus => task.estimate > 60,
            Self::Stress => task
                .official_deadline
                .is_some_and(|d| d - now <= Duration::hours(2)),
        }
    }
}

impl FromStr for Mood {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Ok(match s.as_str() {
            "" | "all" => Self::All,
            "lazy" => Self::Lazy,
            "focus" => Self::Focus,
            "stress" => Self::Stress,
            _ => Self::Other(s.clone()),
        })
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open tasks from `ordered` that the mood's local rule accepts, order kept.
pub fn classify<'a>(
    mood: &Mood,
    ordered: impl IntoIterator<Item = &'a Task>,
    now: DateTime<Utc>,
) -> Vec<&'a Task> {
    ordered
        .into_iter()
        .filter(|t| mood.accepts(t, now))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 14, 0, 0).unwrap()
    }

    fn task(id: &str, estimate: i64, deadline_in_min: Option<i64>) -> Task {
        let mut t = Task::new(id);
        t.id = id.to_string();
        t.estimate = estimate;
        t.official_deadline = deadline_in_min.map(|m| now() + Duration::minutes(m));
        t
    }

    fn ids(tasks: Vec<&Task>) -> Vec<&str> {
        tasks.into_iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn parse_known_and_unknown() {
        assert_eq!("Lazy".parse::<Mood>().unwrap(), Mood::Lazy);
        assert_eq!("all".parse::<Mood>().unwrap(), Mood::All);
        assert_eq!(
            "sleepy".parse::<Mood>().unwrap(),
            Mood::Other("sleepy".into())
        );
        assert_eq!(Mood::Stress.to_string(), "stress");
    }

    #[test]
    fn lazy_takes_short_tasks() {
        let tasks = vec![task("a", 30, None), task("b", 31, None), task("c", 5, None)];
        assert_eq!(ids(classify(&Mood::Lazy, &tasks, now())), ["a", "c"]);
    }

    #[test]
    fn focus_takes_long_tasks() {
        let tasks = vec![task("a", 60, None), task("b", 61, None)];
        assert_eq!(ids(classify(&Mood::Focus, &tasks, now())), ["b"]);
    }

    #[test]
    fn stress_takes_deadlines_within_two_hours() {
        let tasks = vec![
            task("soon", 30, Some(90)),
            task("edge", 30, Some(120)),
            task("later", 30, Some(121)),
            task("none", 30, None),
            task("overdue", 30, Some(-30)),
        ];
        assert_eq!(
            ids(classify(&Mood::Stress, &tasks, now())),
            ["soon", "edge", "overdue"]
        );
    }

    #[test]
    fn unknown_mood_keeps_all_open() {
        let mut done = task("d", 10, None);
        done.done = true;
        let tasks = vec![task("a", 90, None), done, task("b", 5, None)];
        let mood = Mood::Other("sleepy".into());
        assert_eq!(ids(classify(&mood, &tasks, now())), ["a", "b"]);
    }
}
