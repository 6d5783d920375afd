use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::mood::Mood;
use crate::core::task::Task;
use crate::error::AdvisorError;

static JSON_OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// One task as sent to the advisor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryTask {
    pub id: String,
    pub title: String,
    pub official_deadline: Option<DateTime<Utc>>,
    pub estimated_minutes: i64,
}

impl From<&Task> for AdvisoryTask {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            official_deadline: task.official_deadline,
            estimated_minutes: task.estimate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisoryRequest {
    pub tasks: Vec<AdvisoryTask>,
    pub mood: String,
}

impl AdvisoryRequest {
    /// Payload for the open tasks under `mood`.
    pub fn new<'a>(mood: &Mood, tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        Self {
            tasks: tasks
                .into_iter()
                .filter(|t| t.is_open())
                .map(AdvisoryTask::from)
                .collect(),
            mood: mood.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AdvisoryResponse {
    #[serde(default)]
    recommended: Vec<String>,
    #[serde(default)]
    reason: String,
}

/// Ordering suggested by the advisor for one mood.
#[derive(Debug, Clone, PartialEq)]
pub struct Advisory {
    pub mood: Mood,
    pub recommended_ids: Vec<String>,
    pub reason: String,
}

/// Pull an advisory out of a response body. Accepts bare JSON, fenced JSON,
/// or JSON embedded in surrounding prose.
pub fn parse_advisory(mood: &Mood, text: &str) -> Result<Advisory, AdvisorError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let unfenced = unfenced.strip_suffix("```").unwrap_or(unfenced).trim();

    let response: AdvisoryResponse = match serde_json::from_str(unfenced) {
        Ok(r) => r,
        Err(first) => {
            let embedded = JSON_OBJECT_RE
                .find(unfenced)
                .ok_or_else(|| AdvisorError::Parse(format!("no JSON object: {}", first)))?;
            serde_json::from_str(embedded.as_str())
                .map_err(|e| AdvisorError::Parse(e.to_string()))?
        }
    };

    Ok(Advisory {
        mood: mood.clone(),
        recommended_ids: response.recommended,
        reason: response.reason,
    })
}

/// HTTP client for the mood advisor.
#[derive(Debug, Clone)]
pub struct AdvisorClient {
    endpoint: String,
    http: reqwest::Client,
}

impl AdvisorClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, AdvisorError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.trim().to_string(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn recommend(
        &self,
        mood: &Mood,
        request: &AdvisoryRequest,
    ) -> Result<Advisory, AdvisorError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AdvisorError::Status { status, body });
        }

        let text = resp.text().await?;
        parse_advisory(mood, &text)
    }
}
