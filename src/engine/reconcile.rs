use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use super::SharedEngine;
use crate::advisor::{Advisory, AdvisorClient};
use crate::core::mood::{self, Mood};
use crate::core::task::Task;

/// Mood selection plus the latest advisory received for it.
#[derive(Debug, Default)]
pub struct Recommendations {
    mood: Mood,
    advisory: Option<Advisory>,
}

impl Recommendations {
    pub fn mood(&self) -> &Mood {
        &self.mood
    }

    pub fn advisory(&self) -> Option<&Advisory> {
        self.advisory.as_ref()
    }

    /// Switch mood. Returns true when the mood actually changed, in which case
    /// the cached advisory is dropped.
    pub fn set_mood(&mut self, mood: Mood) -> bool {
        if self.mood == mood {
            return false;
        }
        self.mood = mood;
        self.advisory = None;
        true
    }

    /// Latest result wins. Results for a mood no longer selected are ignored.
    pub fn apply(&mut self, advisory: Advisory) -> bool {
        if advisory.mood != self.mood {
            log::debug!(
                "Discarding advisory for '{}', current mood is '{}'",
                advisory.mood,
                self.mood
            );
            return false;
        }
        self.advisory = Some(advisory);
        true
    }

    pub fn reconcile<'a>(&self, ordered: &[&'a Task], now: DateTime<Utc>) -> Vec<&'a Task> {
        reconcile(&self.mood, self.advisory.as_ref(), ordered, now)
    }
}

/// Tasks to display for `mood`.
///
/// `ordered` is the priority order. With `Mood::All` it is returned as is.
/// Otherwise a non-empty advisory decides membership and order, ids unknown
/// locally are dropped; without one the mood's local rule filters `ordered`.
pub fn reconcile<'a>(
    mood: &Mood,
    advisory: Option<&Advisory>,
    ordered: &[&'a Task],
    now: DateTime<Utc>,
) -> Vec<&'a Task> {
    if mood.is_all() {
        return ordered.to_vec();
    }

    match advisory {
        Some(a) if !a.recommended_ids.is_empty() => a
            .recommended_ids
            .iter()
            .filter_map(|id| ordered.iter().copied().find(|t| t.is_open() && &t.id == id))
            .collect(),
        _ => mood::classify(mood, ordered.iter().copied(), now),
    }
}

/// Ask the advisor for the current mood in the background and apply the
/// answer when it arrives. Failures leave the local rule in charge.
pub fn spawn_advisory_refresh(engine: SharedEngine, client: AdvisorClient) -> JoinHandle<bool> {
    tokio::spawn(async move {
        let (mood, request) = {
            let engine = engine.lock().await;
            match engine.advisory_request() {
                Some(req) => (engine.mood().clone(), req),
                None => return false,
            }
        };

        log::debug!(
            "Requesting advisory for '{}' with {} tasks from {}",
            mood,
            request.tasks.len(),
            client.endpoint()
        );

        match client.recommend(&mood, &request).await {
            Ok(advisory) => {
                log::info!(
                    "Advisor recommended {} tasks: {}",
                    advisory.recommended_ids.len(),
                    advisory.reason
                );
                engine.lock().await.apply_advisory(advisory)
            }
            Err(e) => {
                log::warn!("Advisory unavailable, using local rules: {}", e);
                false
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
    }

    fn task(id: &str, estimate: i64) -> Task {
        let mut t = Task::new(id);
        t.id = id.to_string();
        t.estimate = estimate;
        t
    }

    fn advisory(mood: Mood, ids: &[&str]) -> Advisory {
        Advisory {
            mood,
            recommended_ids: ids.iter().map(|s| s.to_string()).collect(),
            reason: "because".into(),
        }
    }

    fn ids(tasks: Vec<&Task>) -> Vec<&str> {
        tasks.into_iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn advisory_order_is_kept() {
        let (x, y, z) = (task("x", 90), task("y", 10), task("z", 10));
        let ordered = vec![&x, &y, &z];
        let a = advisory(Mood::Lazy, &["z", "x"]);
        assert_eq!(ids(reconcile(&Mood::Lazy, Some(&a), &ordered, now())), ["z", "x"]);

        let a = advisory(Mood::Lazy, &["x", "z"]);
        assert_eq!(ids(reconcile(&Mood::Lazy, Some(&a), &ordered, now())), ["x", "z"]);
    }

    #[test]
    fn stale_ids_are_dropped() {
        let (x, y) = (task("x", 10), task("y", 10));
        let ordered = vec![&x, &y];
        let a = advisory(Mood::Focus, &["gone", "y"]);
        assert_eq!(ids(reconcile(&Mood::Focus, Some(&a), &ordered, now())), ["y"]);
    }

    #[test]
    fn empty_advisory_falls_back() {
        let (x, y) = (task("x", 10), task("y", 120));
        let ordered = vec![&x, &y];
        let a = advisory(Mood::Focus, &[]);
        assert_eq!(ids(reconcile(&Mood::Focus, Some(&a), &ordered, now())), ["y"]);
        assert_eq!(ids(reconcile(&Mood::Lazy, None, &ordered, now())), ["x"]);
    }

    #[test]
    fn all_bypasses_advisory() {
        let (x, y) = (task("x", 10), task("y", 120));
        let ordered = vec![&y, &x];
        let a = advisory(Mood::All, &["x"]);
        assert_eq!(ids(reconcile(&Mood::All, Some(&a), &ordered, now())), ["y", "x"]);
    }

    #[test]
    fn mood_change_drops_cached_advisory() {
        let mut recs = Recommendations::default();
        assert!(recs.set_mood(Mood::Lazy));
        assert!(recs.apply(advisory(Mood::Lazy, &["x"])));
        assert!(recs.advisory().is_some());

        assert!(!recs.set_mood(Mood::Lazy));
        assert!(recs.advisory().is_some());

        assert!(recs.set_mood(Mood::Stress));
        assert!(recs.advisory().is_none());
        assert!(!recs.apply(advisory(Mood::Lazy, &["x"])));
        assert!(recs.advisory().is_none());
    }

    #[test]
    fn latest_advisory_wins() {
        let mut recs = Recommendations::default();
        recs.set_mood(Mood::Focus);
        recs.apply(advisory(Mood::Focus, &["a"]));
        recs.apply(advisory(Mood::Focus, &["b"]));
        assert_eq!(recs.advisory().unwrap().recommended_ids, ["b"]);
    }

    /// Serve a single HTTP response with `body` and return the endpoint.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}/api/ai-recommend", addr)
    }

    fn shared_with_tasks() -> SharedEngine {
        use crate::config::EngineConfig;
        use crate::core::task::NewTask;
        use crate::engine::SchedulingEngine;
        use crate::store::TaskStore;

        let mut engine = SchedulingEngine::new(TaskStore::in_memory(), &EngineConfig::default());
        for (id, estimate) in [("x", 10), ("y", 90), ("z", 20)] {
            engine
                .add_task(NewTask::new(id).with_id(id).estimate(estimate), now())
                .unwrap();
        }
        engine.shared()
    }

    #[tokio::test]
    async fn refresh_applies_advisory() {
        let endpoint = serve_once("200 OK", r#"{"recommended":["z","y"],"reason":"mix"}"#).await;
        let engine = shared_with_tasks();
        engine.lock().await.set_mood(Mood::Focus);

        let client = AdvisorClient::new(&endpoint, std::time::Duration::from_secs(5)).unwrap();
        assert!(spawn_advisory_refresh(engine.clone(), client).await.unwrap());

        let engine = engine.lock().await;
        assert_eq!(ids(engine.displayed(now())), ["z", "y"]);
        assert_eq!(engine.advisory().unwrap().reason, "mix");
    }

    #[tokio::test]
    async fn advisor_error_keeps_local_rule() {
        let endpoint = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let engine = shared_with_tasks();
        engine.lock().await.set_mood(Mood::Lazy);

        let client = AdvisorClient::new(&endpoint, std::time::Duration::from_secs(5)).unwrap();
        assert!(!spawn_advisory_refresh(engine.clone(), client).await.unwrap());

        let engine = engine.lock().await;
        assert!(engine.advisory().is_none());
        assert_eq!(ids(engine.displayed(now())), ["x", "z"]);
    }

    #[tokio::test]
    async fn no_request_for_all() {
        let engine = shared_with_tasks();
        let client =
            AdvisorClient::new("http://127.0.0.1:9/unused", std::time::Duration::from_secs(1))
                .unwrap();
        assert!(!spawn_advisory_refresh(engine, client).await.unwrap());
    }
}
