//! Application context - owns every component and the shared event bus

use crate::api::{HttpBackend, QueryBackend};
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::events::{EventBus, NotificationLogHandler};
use crate::logging::log_info;
use crate::metrics::MetricsPoller;
use crate::query::QueryOrchestrator;
use crate::session::ConnectionManager;
use crate::upload_queue::UploadQueue;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct AppContext {
    pub config: ClientConfig,
    pub events: EventBus,
    pub connection: ConnectionManager,
    pub uploads: UploadQueue,
    pub query: QueryOrchestrator,
    pub metrics: MetricsPoller,
    shutdown: CancellationToken,
}

impl AppContext {
    /// Build the context against the HTTP backend named in `config`
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let backend = Arc::new(HttpBackend::new(&config)?);
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: ClientConfig, backend: Arc<dyn QueryBackend>) -> Self {
        let events = EventBus::default();
        let connection = ConnectionManager::new(backend.clone(), events.clone());
        let uploads = UploadQueue::new(backend.clone(), events.clone(), config.upload_permits());
        let query = QueryOrchestrator::new(backend.clone(), events.clone(), connection.view());
        let metrics = MetricsPoller::new(backend, events.clone(), config.metrics_poll_interval());

        Self {
            config,
            events,
            connection,
            uploads,
            query,
            metrics,
            shutdown: CancellationToken::new(),
        }
    }

    /// Start the background pieces: notification logging and metrics polling
    pub fn start(&self) -> JoinHandle<()> {
        let handler = NotificationLogHandler::new(self.events.clone(), self.shutdown.child_token());
        let handle = handler.start();
        self.metrics.start();

        log_info(
            "app",
            &format!("🚀 NLQ Desk client started (server: {})", self.config.base_url()),
        )
        .unwrap_or_default();

        handle
    }

    /// Stop polling and background handlers. In-flight uploads are left to finish.
    pub fn shutdown(&self) {
        self.metrics.stop();
        self.shutdown.cancel();
        log_info("app", "NLQ Desk client stopped").unwrap_or_default();
    }
}
