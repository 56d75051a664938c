//! Scripted in-memory backend for component tests.

use super::types::{
    ApiColumn, ApiForeignKey, ApiTable, DatabaseSchemaResponse, FileProcessingResult,
    PerformanceMetrics, QueryResponse, UploadDocumentsResponse,
};
use super::QueryBackend;
use crate::error::{ClientError, ClientResult};
use crate::metrics::MetricsSnapshot;
use crate::query::{CacheStatus, ResultType};
use crate::upload_queue::UploadFile;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub(crate) enum UploadScript {
    FileError(String),
    Backend(u16, String),
}

#[derive(Default)]
pub(crate) struct MockBackend {
    connect: Mutex<VecDeque<ClientResult<DatabaseSchemaResponse>>>,
    queries: Mutex<VecDeque<ClientResult<QueryResponse>>>,
    metrics: Mutex<VecDeque<ClientResult<MetricsSnapshot>>>,
    uploads: Mutex<HashMap<String, UploadScript>>,
    file_gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    calls: Mutex<Vec<(&'static str, String)>>,
    gate: Option<Semaphore>,
    delay: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every request until `release_all`
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_connect(self, result: ClientResult<DatabaseSchemaResponse>) -> Self {
        self.connect.lock().unwrap().push_back(result);
        self
    }

    pub fn with_query(self, result: ClientResult<QueryResponse>) -> Self {
        self.queries.lock().unwrap().push_back(result);
        self
    }

    pub fn with_metrics(self, result: ClientResult<MetricsSnapshot>) -> Self {
        self.metrics.lock().unwrap().push_back(result);
        self
    }

    pub fn with_upload(self, file_name: &str, script: UploadScript) -> Self {
        self.uploads
            .lock()
            .unwrap()
            .insert(file_name.to_string(), script);
        self
    }

    /// Hold uploads of `file_name` until `release_upload`
    pub fn gate_upload(self, file_name: &str) -> Self {
        self.file_gates
            .lock()
            .unwrap()
            .insert(file_name.to_string(), Arc::new(Semaphore::new(0)));
        self
    }

    pub fn release_upload(&self, file_name: &str) {
        if let Some(gate) = self.file_gates.lock().unwrap().get(file_name) {
            gate.close();
        }
    }

    pub fn release_all(&self) {
        if let Some(gate) = &self.gate {
            gate.close();
        }
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == op)
            .count()
    }

    pub fn call_args(&self, op: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == op)
            .map(|(_, arg)| arg.clone())
            .collect()
    }

    pub async fn wait_for_calls(&self, op: &str, count: usize) {
        for _ in 0..1_000 {
            if self.call_count(op) >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {} {} call(s)", count, op);
    }

    async fn enter(&self, op: &'static str, arg: &str) {
        self.calls.lock().unwrap().push((op, arg.to_string()));

        if let Some(gate) = &self.gate {
            // Closed gate means released
            let _ = gate.acquire().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl QueryBackend for MockBackend {
    async fn connect_database(
        &self,
        connection_string: &str,
    ) -> ClientResult<DatabaseSchemaResponse> {
        self.enter("connect", connection_string).await;
        self.connect
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DatabaseSchemaResponse::default()))
    }

    async fn upload_document(&self, file: UploadFile) -> ClientResult<UploadDocumentsResponse> {
        self.enter("upload", &file.name).await;
        let file_gate = self.file_gates.lock().unwrap().get(&file.name).cloned();
        if let Some(gate) = file_gate {
            let _ = gate.acquire().await;
        }

        let script = self.uploads.lock().unwrap().get(&file.name).cloned();
        match script {
            Some(UploadScript::Backend(status, detail)) => Err(ClientError::backend(status, detail)),
            Some(UploadScript::FileError(error)) => Ok(UploadDocumentsResponse {
                message: None,
                results: vec![FileProcessingResult {
                    error: Some(error),
                    filename: Some(file.name),
                    ..Default::default()
                }],
            }),
            None => Ok(UploadDocumentsResponse {
                message: Some("1 files processed.".to_string()),
                results: vec![FileProcessingResult {
                    filename: Some(file.name),
                    status: Some("processed and indexed".to_string()),
                    chunks_added: Some(1),
                    ..Default::default()
                }],
            }),
        }
    }

    async fn submit_query(&self, query: &str) -> ClientResult<QueryResponse> {
        self.enter("query", query).await;
        self.queries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(query_response(query, ResultType::Sql, 0.5)))
    }

    async fn fetch_metrics(&self) -> ClientResult<MetricsSnapshot> {
        self.enter("metrics", "").await;
        self.metrics
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(MetricsSnapshot::default()))
    }
}

pub(crate) fn query_response(query: &str, query_type: ResultType, seconds: f64) -> QueryResponse {
    QueryResponse {
        user_query: query.to_string(),
        query_type,
        results: vec![serde_json::json!({
            "source": "Database",
            "query": "SELECT COUNT(*) FROM employees",
            "data": [{"count": 42}]
        })],
        performance_metrics: PerformanceMetrics {
            response_time_seconds: seconds,
            cache_status: CacheStatus::Miss,
        },
    }
}

/// employees(id PK, dept_id FK) and departments(id PK)
pub(crate) fn schema_with_foreign_key() -> DatabaseSchemaResponse {
    let column = |name: &str, column_type: &str, pk: bool| ApiColumn {
        name: name.to_string(),
        column_type: column_type.to_string(),
        is_primary_key: pk,
    };

    DatabaseSchemaResponse {
        tables: vec![
            ApiTable {
                name: "employees".to_string(),
                columns: vec![column("id", "INT", true), column("dept_id", "INT", false)],
                foreign_keys: vec![ApiForeignKey {
                    constrained_columns: vec!["dept_id".to_string()],
                    referred_table: Some("departments".to_string()),
                    referred_columns: vec!["id".to_string()],
                }],
            },
            ApiTable {
                name: "departments".to_string(),
                columns: vec![column("id", "INT", true)],
                foreign_keys: Vec::new(),
            },
        ],
    }
}
