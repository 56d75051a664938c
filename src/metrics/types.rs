use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

/// One dashboard summary card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetric {
    pub title: String,
    pub value: String,
    #[serde(default)]
    pub change: Option<String>,
    #[serde(default)]
    pub trend: Option<Trend>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Query,
    Upload,
    Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub status: ActivityStatus,
}

/// `GET /api/metrics` body, replaced wholesale on every successful poll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default)]
    pub summary_metrics: Vec<SummaryMetric>,
    #[serde(default)]
    pub recent_activity: Vec<ActivityEntry>,
}

impl MetricsSnapshot {
    pub fn metric(&self, title: &str) -> Option<&SummaryMetric> {
        self.summary_metrics.iter().find(|m| m.title == title)
    }
}
