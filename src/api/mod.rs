//! Remote API client.
//!
//! Every component talks to the backend through [`QueryBackend`], so tests and
//! alternative transports can stand in for [`HttpBackend`].

mod client;
#[cfg(test)]
pub(crate) mod mock;
mod types;

pub use client::HttpBackend;
pub use types::*;

use crate::error::ClientResult;
use crate::metrics::MetricsSnapshot;
use crate::upload_queue::UploadFile;
use async_trait::async_trait;

pub const CONNECT_DATABASE_PATH: &str = "/api/connect-database";
pub const UPLOAD_DOCUMENTS_PATH: &str = "/api/upload-documents";
pub const QUERY_PATH: &str = "/api/query";
pub const METRICS_PATH: &str = "/api/metrics";

/// The four backend operations the client consumes
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn connect_database(&self, connection_string: &str)
        -> ClientResult<DatabaseSchemaResponse>;

    /// Upload a single file; the backend processes it before answering
    async fn upload_document(&self, file: UploadFile) -> ClientResult<UploadDocumentsResponse>;

    async fn submit_query(&self, query: &str) -> ClientResult<QueryResponse>;

    async fn fetch_metrics(&self) -> ClientResult<MetricsSnapshot>;
}
