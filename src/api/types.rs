//! Request and response bodies of the query engine HTTP API.

use crate::query::{CacheStatus, ResultType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ConnectDatabaseRequest<'a> {
    pub connection_string: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest<'a> {
    pub query: &'a str,
}

/// `POST /api/connect-database` success body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSchemaResponse {
    #[serde(default)]
    pub tables: Vec<ApiTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTable {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ApiColumn>,
    #[serde(default)]
    pub foreign_keys: Vec<ApiForeignKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub is_primary_key: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiForeignKey {
    #[serde(default)]
    pub constrained_columns: Vec<String>,
    #[serde(default)]
    pub referred_table: Option<String>,
    #[serde(default)]
    pub referred_columns: Vec<String>,
}

/// `POST /api/upload-documents` success body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadDocumentsResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub results: Vec<FileProcessingResult>,
}

/// Per-file outcome reported by the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileProcessingResult {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub chunks_added: Option<u32>,
}

impl UploadDocumentsResponse {
    /// Uploads are issued one file per request, so only the first result matters
    pub fn first_result(&self) -> Option<&FileProcessingResult> {
        self.results.first()
    }
}

/// `POST /api/query` success body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub user_query: String,
    pub query_type: ResultType,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    pub performance_metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    #[serde(default)]
    pub response_time_seconds: f64,
    #[serde(default)]
    pub cache_status: CacheStatus,
}

/// Non-success body. FastAPI sends a string, or a list for request validation failures.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn detail_message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::String(_) | serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_response_tolerates_missing_lists() {
        let body = r#"{"tables":[{"name":"employees","columns":[{"name":"id","type":"INTEGER","is_primary_key":true}]}]}"#;
        let parsed: DatabaseSchemaResponse = serde_json::from_str(body).unwrap();

        assert_eq!(parsed.tables.len(), 1);
        assert!(parsed.tables[0].foreign_keys.is_empty());
        assert_eq!(parsed.tables[0].columns[0].column_type, "INTEGER");
    }

    #[test]
    fn test_query_response_parses_backend_shape() {
        let body = r#"{
            "user_query": "average salary",
            "query_type": "SQL",
            "results": [{"source": "Database", "query": "SELECT AVG(salary) FROM employees", "data": [{"avg": 50000}]}],
            "performance_metrics": {"response_time_seconds": 0.42, "cache_status": "hit"}
        }"#;
        let parsed: QueryResponse = serde_json::from_str(body).unwrap();

        assert_eq!(parsed.query_type, ResultType::Sql);
        assert_eq!(parsed.performance_metrics.cache_status, CacheStatus::Hit);
        assert_eq!(parsed.results.len(), 1);
    }

    #[test]
    fn test_error_body_detail_forms() {
        let text: ErrorBody = serde_json::from_str(r#"{"detail":"No files were uploaded."}"#).unwrap();
        assert_eq!(text.detail_message().as_deref(), Some("No files were uploaded."));

        let list: ErrorBody =
            serde_json::from_str(r#"{"detail":[{"loc":["body","query"],"msg":"field required"}]}"#)
                .unwrap();
        assert!(list.detail_message().unwrap().contains("field required"));

        let empty: ErrorBody = serde_json::from_str(r#"{}"#).unwrap();
        assert!(empty.detail_message().is_none());
    }
}
