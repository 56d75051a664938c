use super::types::{
    ConnectDatabaseRequest, DatabaseSchemaResponse, ErrorBody, QueryRequest, QueryResponse,
    UploadDocumentsResponse,
};
use super::{
    QueryBackend, CONNECT_DATABASE_PATH, METRICS_PATH, QUERY_PATH, UPLOAD_DOCUMENTS_PATH,
};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::logging::log_debug;
use crate::metrics::MetricsSnapshot;
use crate::upload_queue::UploadFile;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;

const CONNECT_FALLBACK: &str = "An unknown error occurred.";
const UPLOAD_FALLBACK: &str = "File processing failed.";
const QUERY_FALLBACK: &str = "Failed to process query.";
const METRICS_FALLBACK: &str = "Failed to fetch metrics.";

/// reqwest-backed implementation of the query engine API
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Decode a success body, or turn a non-success status into `ClientError::Backend`
/// carrying the backend `detail` (or `fallback` when there is none).
async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
    fallback: &str,
) -> ClientResult<T> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.detail_message())
            .unwrap_or_else(|| fallback.to_string());

        log_debug(
            "api",
            &format!("Request failed with status {}: {}", status, detail),
        )
        .unwrap_or_default();

        return Err(ClientError::backend(status.as_u16(), detail));
    }

    Ok(response.json::<T>().await?)
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn connect_database(
        &self,
        connection_string: &str,
    ) -> ClientResult<DatabaseSchemaResponse> {
        let response = self
            .client
            .post(self.url(CONNECT_DATABASE_PATH))
            .json(&ConnectDatabaseRequest { connection_string })
            .send()
            .await?;

        decode_response(response, CONNECT_FALLBACK).await
    }

    async fn upload_document(&self, file: UploadFile) -> ClientResult<UploadDocumentsResponse> {
        let UploadFile {
            name,
            mime_type,
            content,
        } = file;

        let part = Part::bytes(content)
            .file_name(name)
            .mime_str(&mime_type)?;
        let form = Form::new().part("files", part);

        let response = self
            .client
            .post(self.url(UPLOAD_DOCUMENTS_PATH))
            .multipart(form)
            .send()
            .await?;

        decode_response(response, UPLOAD_FALLBACK).await
    }

    async fn submit_query(&self, query: &str) -> ClientResult<QueryResponse> {
        let response = self
            .client
            .post(self.url(QUERY_PATH))
            .json(&QueryRequest { query })
            .send()
            .await?;

        decode_response(response, QUERY_FALLBACK).await
    }

    async fn fetch_metrics(&self) -> ClientResult<MetricsSnapshot> {
        let response = self.client.get(self.url(METRICS_PATH)).send().await?;

        decode_response(response, METRICS_FALLBACK).await
    }
}
