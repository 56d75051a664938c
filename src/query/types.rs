//! Query result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which retrieval path the backend used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultType {
    #[serde(rename = "SQL")]
    Sql,
    #[serde(rename = "DOCUMENT")]
    Document,
    #[serde(rename = "HYBRID")]
    Hybrid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    #[default]
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultSource {
    Database,
    Documents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMatch {
    pub filename: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub relevance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultData {
    Rows(Vec<Map<String, Value>>),
    Documents(Vec<DocumentMatch>),
    /// Error embedded by the backend for this source only
    Error(String),
}

/// One entry of a query response's `results`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub source: ResultSource,
    pub query: Option<String>,
    pub data: ResultData,
}

#[derive(Deserialize)]
struct RawResultItem {
    source: ResultSource,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    data: Value,
}

impl ResultItem {
    /// Decode a raw result entry. Entries with an unknown shape yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let raw: RawResultItem = serde_json::from_value(value.clone()).ok()?;

        let data = match raw.data {
            Value::Object(map) => {
                let error = map.get("error")?;
                ResultData::Error(match error {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            }
            Value::Array(items) => match raw.source {
                ResultSource::Database => ResultData::Rows(
                    items
                        .into_iter()
                        .filter_map(|row| match row {
                            Value::Object(map) => Some(map),
                            _ => None,
                        })
                        .collect(),
                ),
                ResultSource::Documents => {
                    ResultData::Documents(serde_json::from_value(Value::Array(items)).ok()?)
                }
            },
            Value::Null => match raw.source {
                ResultSource::Database => ResultData::Rows(Vec::new()),
                ResultSource::Documents => ResultData::Documents(Vec::new()),
            },
            _ => return None,
        };

        Some(Self {
            source: raw.source,
            query: raw.query,
            data,
        })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.data {
            ResultData::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// The current query result, replaced wholesale by each submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: String,
    pub query_text: String,
    pub submitted_at: DateTime<Utc>,
    pub result_type: ResultType,
    /// Raw `results` array as returned by the backend
    pub result_payload: Value,
    pub results: Vec<ResultItem>,
    pub response_time_seconds: f64,
    pub cache_status: CacheStatus,
}
