//! Query orchestration: current query lifecycle, result capture and history.

mod history;
mod types;

pub use history::{HistoryEntry, QueryHistory, HISTORY_CAPACITY};
pub use types::*;

use crate::api::{QueryBackend, QueryResponse};
use crate::error::{ClientResult, ValidationError};
use crate::events::{Component, EventBus, NotificationLevel, StatePayload};
use crate::logging::{log_info, log_warn, log_with_details};
use crate::session::SessionView;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const QUERY_SUGGESTIONS: [&str; 4] = [
    "how many employees",
    "average salary",
    "resumes with python",
    "highest paid engineers",
];

/// Lifecycle of the current query. `Pending` is the submission lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum QueryState {
    #[default]
    Idle,
    Pending {
        query_text: String,
        submitted_at: DateTime<Utc>,
    },
    Resolved(QueryRecord),
    Failed {
        message: String,
    },
}

/// Event-facing summary of a `QueryState`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum QueryPhase {
    Idle,
    Pending { query_text: String },
    Resolved { record: QueryRecord },
    Failed { message: String },
}

impl From<&QueryState> for QueryPhase {
    fn from(state: &QueryState) -> Self {
        match state {
            QueryState::Idle => QueryPhase::Idle,
            QueryState::Pending { query_text, .. } => QueryPhase::Pending {
                query_text: query_text.clone(),
            },
            QueryState::Resolved(record) => QueryPhase::Resolved {
                record: record.clone(),
            },
            QueryState::Failed { message } => QueryPhase::Failed {
                message: message.clone(),
            },
        }
    }
}

#[derive(Debug, Default)]
struct QueryInner {
    state: QueryState,
    history: QueryHistory,
}

#[derive(Clone)]
pub struct QueryOrchestrator {
    inner: Arc<Mutex<QueryInner>>,
    backend: Arc<dyn QueryBackend>,
    events: EventBus,
    session: SessionView,
}

impl QueryOrchestrator {
    pub fn new(backend: Arc<dyn QueryBackend>, events: EventBus, session: SessionView) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueryInner::default())),
            backend,
            events,
            session,
        }
    }

    /// Submit a natural-language query.
    ///
    /// Rejected without a request when no database is connected, when the text
    /// is blank, or while another submission is pending. The request carries the
    /// text as given; history records it trimmed.
    pub async fn submit(&self, query_text: &str) -> ClientResult<QueryRecord> {
        if !self.session.is_connected() {
            self.events.notify(
                Component::Query,
                NotificationLevel::Error,
                "Database Not Connected",
                Some(ValidationError::NotConnected.to_string()),
            );
            return Err(ValidationError::NotConnected.into());
        }

        let trimmed = query_text.trim();
        if trimmed.is_empty() {
            self.events
                .notify(Component::Query, NotificationLevel::Error, "Query required", None);
            return Err(ValidationError::EmptyQuery.into());
        }

        let submitted_at = Utc::now();
        let pending = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(inner.state, QueryState::Pending { .. }) {
                return Err(ValidationError::QueryPending.into());
            }
            inner.state = QueryState::Pending {
                query_text: trimmed.to_string(),
                submitted_at,
            };
            QueryPhase::from(&inner.state)
        };
        self.publish_phase(pending);
        let mut guard = PendingGuard {
            orchestrator: self,
            armed: true,
        };

        log_info("query", &format!("🔎 Submitting query: {}", trimmed)).unwrap_or_default();

        let result = self.backend.submit_query(query_text).await;
        guard.armed = false;

        match result {
            Ok(response) => {
                let record = build_record(trimmed, submitted_at, response);
                log_with_details(
                    "query",
                    "INFO",
                    &format!("✓ Query resolved: {}", record.query_text),
                    serde_json::json!({
                        "query_type": record.result_type,
                        "response_time_seconds": record.response_time_seconds,
                        "cache_status": record.cache_status,
                        "result_count": record.results.len(),
                    }),
                )
                .unwrap_or_default();
                let entry = HistoryEntry {
                    id: record.id.clone(),
                    query: record.query_text.clone(),
                    timestamp: submitted_at,
                    query_type: record.result_type,
                };

                let (phase, history) = {
                    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                    inner.state = QueryState::Resolved(record.clone());
                    inner.history.push(entry);
                    (QueryPhase::from(&inner.state), inner.history.entries())
                };

                self.publish_phase(phase);
                let _ = self
                    .events
                    .publish(Component::Query, StatePayload::HistoryChanged { history });
                self.events.notify(
                    Component::Query,
                    NotificationLevel::Success,
                    "Query Executed",
                    Some(format!(
                        "Results retrieved successfully in {}s.",
                        record.response_time_seconds
                    )),
                );

                Ok(record)
            }
            Err(err) => {
                let message = err.user_message();
                log_warn("query", &format!("Query failed: {}", message)).unwrap_or_default();

                let phase = {
                    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                    inner.state = QueryState::Failed {
                        message: message.clone(),
                    };
                    QueryPhase::from(&inner.state)
                };

                self.publish_phase(phase);
                self.events.notify(
                    Component::Query,
                    NotificationLevel::Error,
                    "Query Error",
                    Some(message),
                );

                Err(err)
            }
        }
    }

    /// The current result, if the last submission succeeded
    pub fn current(&self) -> Option<QueryRecord> {
        match &self.inner.lock().unwrap_or_else(|e| e.into_inner()).state {
            QueryState::Resolved(record) => Some(record.clone()),
            _ => None,
        }
    }

    pub fn state(&self) -> QueryState {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state
            .clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state(), QueryState::Pending { .. })
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .history
            .entries()
    }

    pub fn suggestions(&self) -> &'static [&'static str] {
        &QUERY_SUGGESTIONS
    }

    fn publish_phase(&self, phase: QueryPhase) {
        let _ = self
            .events
            .publish(Component::Query, StatePayload::QueryStateChanged { phase });
    }
}

/// Returns a submission to Idle when its future is dropped before a response
struct PendingGuard<'a> {
    orchestrator: &'a QueryOrchestrator,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let phase = {
            let mut inner = self
                .orchestrator
                .inner
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if !matches!(inner.state, QueryState::Pending { .. }) {
                return;
            }
            inner.state = QueryState::Idle;
            QueryPhase::from(&inner.state)
        };

        log_warn("query", "Query abandoned before a response arrived").unwrap_or_default();
        self.orchestrator.publish_phase(phase);
    }
}

fn build_record(query_text: &str, submitted_at: DateTime<Utc>, response: QueryResponse) -> QueryRecord {
    let results = response
        .results
        .iter()
        .filter_map(ResultItem::from_value)
        .collect();

    QueryRecord {
        id: Uuid::new_v4().to_string(),
        query_text: query_text.to_string(),
        submitted_at,
        result_type: response.query_type,
        result_payload: serde_json::Value::Array(response.results),
        results,
        response_time_seconds: response.performance_metrics.response_time_seconds,
        cache_status: response.performance_metrics.cache_status,
    }
}
