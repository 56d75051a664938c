use crate::metrics::MetricsSnapshot;
use crate::query::{HistoryEntry, QueryPhase};
use crate::session::ConnectionState;
use crate::upload_queue::UploadTask;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sequence number for ordering events
pub type EventSequence = u64;

/// Component that owns the state an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Uploads,
    Query,
    Connection,
    Metrics,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Uploads => "uploads",
            Component::Query => "query",
            Component::Connection => "connection",
            Component::Metrics => "metrics",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// A state change published by one of the owning components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEvent {
    pub sequence: EventSequence,
    pub timestamp: DateTime<Utc>,
    pub component: Component,
    pub payload: StatePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatePayload {
    /// Task added or moved to a new status
    UploadTaskChanged { task: UploadTask },

    /// Task removed by the user
    UploadTaskRemoved { task_id: String },

    QueryStateChanged { phase: QueryPhase },

    HistoryChanged { history: Vec<HistoryEntry> },

    ConnectionChanged {
        state: ConnectionState,
        table_count: usize,
    },

    MetricsUpdated { snapshot: MetricsSnapshot },

    /// User-facing message (toast)
    Notification {
        level: NotificationLevel,
        title: String,
        description: Option<String>,
    },
}

impl StateEvent {
    pub fn payload_type(&self) -> &str {
        match &self.payload {
            StatePayload::UploadTaskChanged { .. } => "upload_task_changed",
            StatePayload::UploadTaskRemoved { .. } => "upload_task_removed",
            StatePayload::QueryStateChanged { .. } => "query_state_changed",
            StatePayload::HistoryChanged { .. } => "history_changed",
            StatePayload::ConnectionChanged { .. } => "connection_changed",
            StatePayload::MetricsUpdated { .. } => "metrics_updated",
            StatePayload::Notification { .. } => "notification",
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self.payload, StatePayload::Notification { .. })
    }
}
