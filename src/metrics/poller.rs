//! Periodic dashboard refresh.
//!
//! The poller fetches immediately on `start()`, then once per interval until
//! `stop()`. Fetches never overlap: the loop awaits each fetch inline and skips
//! ticks that fall due meanwhile, and manual `refresh()` calls are refused while
//! a fetch is outstanding.
//!
//! Owners must call `stop()` when the dashboard goes away. Dropping the poller
//! also cancels the loop.

use super::types::MetricsSnapshot;
use crate::api::QueryBackend;
use crate::events::{Component, EventBus, NotificationLevel, StatePayload};
use crate::logging::{log_debug, log_info, log_warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct PollerState {
    snapshot: Option<MetricsSnapshot>,
    last_error: Option<String>,
}

/// Resets the in-flight flag even when the fetch future is dropped mid-request
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct MetricsFetcher {
    backend: Arc<dyn QueryBackend>,
    events: EventBus,
    state: Arc<Mutex<PollerState>>,
    in_flight: Arc<AtomicBool>,
}

impl MetricsFetcher {
    /// Fetch once unless a fetch is already outstanding
    async fn poll_once(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log_debug("metrics", "Skipping metrics fetch (previous fetch still running)")
                .unwrap_or_default();
            return false;
        }
        let _guard = InFlightGuard(&self.in_flight);

        match self.backend.fetch_metrics().await {
            Ok(snapshot) => {
                {
                    let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                    state.snapshot = Some(snapshot.clone());
                    state.last_error = None;
                }
                let _ = self
                    .events
                    .publish(Component::Metrics, StatePayload::MetricsUpdated { snapshot });
            }
            Err(err) => {
                let message = err.user_message();
                {
                    let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                    state.last_error = Some(message.clone());
                }
                log_warn("metrics", &format!("Metrics fetch failed: {}", message))
                    .unwrap_or_default();
                self.events.notify(
                    Component::Metrics,
                    NotificationLevel::Error,
                    "Could not load dashboard",
                    Some(message),
                );
            }
        }

        true
    }
}

pub struct MetricsPoller {
    fetcher: MetricsFetcher,
    interval: Duration,
    cancellation_token: Mutex<CancellationToken>,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsPoller {
    pub fn new(backend: Arc<dyn QueryBackend>, events: EventBus, interval: Duration) -> Self {
        Self {
            fetcher: MetricsFetcher {
                backend,
                events,
                state: Arc::new(Mutex::new(PollerState::default())),
                in_flight: Arc::new(AtomicBool::new(false)),
            },
            interval: interval.max(Duration::from_millis(1)),
            cancellation_token: Mutex::new(CancellationToken::new()),
            task_handle: Mutex::new(None),
        }
    }

    /// Start polling. Returns false if the poller is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut handle_guard = self.task_handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle_guard.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        // Fresh token so a stopped poller can be restarted
        let cancel = CancellationToken::new();
        *self
            .cancellation_token
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = cancel.clone();

        let fetcher = self.fetcher.clone();
        let interval = self.interval;
        *handle_guard = Some(tokio::spawn(async move {
            Self::poll_loop(fetcher, interval, cancel).await;
        }));

        log_info(
            "metrics",
            &format!("📊 Metrics poller started ({}s interval)", interval.as_secs_f64()),
        )
        .unwrap_or_default();

        true
    }

    /// Cancel the outstanding fetch and all future ones. Safe to call repeatedly
    /// or before `start()`.
    pub fn stop(&self) {
        self.cancellation_token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();

        let handle = self
            .task_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(handle) = handle {
            handle.abort();
            log_info("metrics", "📊 Metrics poller stopped").unwrap_or_default();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Fetch now, outside the schedule. Returns false if a fetch was already running.
    pub async fn refresh(&self) -> bool {
        self.fetcher.poll_once().await
    }

    /// Latest successful snapshot; `None` until the first poll succeeds
    pub fn snapshot(&self) -> Option<MetricsSnapshot> {
        self.fetcher
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot
            .clone()
    }

    /// Error of the most recent poll, cleared by the next success
    pub fn last_error(&self) -> Option<String> {
        self.fetcher
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last_error
            .clone()
    }

    async fn poll_loop(fetcher: MetricsFetcher, interval: Duration, cancel: CancellationToken) {
        // First tick completes immediately
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = fetcher.poll_once() => {}
                    }
                }
            }
        }

        log_debug("metrics", "Metrics poll loop cancelled").unwrap_or_default();
    }
}

impl Drop for MetricsPoller {
    fn drop(&mut self) {
        self.cancellation_token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockBackend;
    use crate::error::ClientError;
    use crate::metrics::{SummaryMetric, Trend};
    use tokio::time::sleep;

    fn snapshot(value: &str) -> MetricsSnapshot {
        MetricsSnapshot {
            summary_metrics: vec![SummaryMetric {
                title: "Total Queries".to_string(),
                value: value.to_string(),
                change: Some("+5%".to_string()),
                trend: Some(Trend::Up),
            }],
            recent_activity: Vec::new(),
        }
    }

    fn poller_with(backend: Arc<MockBackend>) -> MetricsPoller {
        MetricsPoller::new(backend, EventBus::default(), Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_immediately_then_every_interval() {
        let backend = Arc::new(MockBackend::new());
        let poller = poller_with(backend.clone());

        assert!(poller.start());
        assert!(!poller.start());

        sleep(Duration::from_millis(10)).await;
        assert_eq!(backend.call_count("metrics"), 1);
        assert!(poller.snapshot().is_some());

        sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.call_count("metrics"), 2);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.call_count("metrics"), 4);

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_twice_schedules_nothing() {
        let backend = Arc::new(MockBackend::new());
        let poller = poller_with(backend.clone());

        // No-op before start
        poller.stop();

        poller.start();
        sleep(Duration::from_millis(10)).await;
        poller.stop();
        poller.stop();
        assert!(!poller.is_running());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(backend.call_count("metrics"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_snapshot() {
        let backend = Arc::new(
            MockBackend::new()
                .with_metrics(Ok(snapshot("1")))
                .with_metrics(Err(ClientError::backend(500, "Failed to fetch metrics.")))
                .with_metrics(Ok(snapshot("2"))),
        );
        let poller = poller_with(backend.clone());
        poller.start();

        sleep(Duration::from_millis(10)).await;
        assert_eq!(poller.snapshot(), Some(snapshot("1")));

        sleep(Duration::from_secs(5)).await;
        assert_eq!(poller.snapshot(), Some(snapshot("1")));
        assert_eq!(poller.last_error().as_deref(), Some("Failed to fetch metrics."));

        sleep(Duration::from_secs(5)).await;
        assert_eq!(poller.snapshot(), Some(snapshot("2")));
        assert!(poller.last_error().is_none());

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_is_never_overlapped() {
        let backend = Arc::new(MockBackend::new().with_delay(Duration::from_secs(12)));
        let poller = poller_with(backend.clone());
        poller.start();

        sleep(Duration::from_secs(11)).await;
        assert_eq!(backend.call_count("metrics"), 1);

        // Manual refresh is refused while the scheduled fetch is running
        assert!(!poller.refresh().await);
        assert_eq!(backend.call_count("metrics"), 1);

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let backend = Arc::new(MockBackend::new());
        let poller = poller_with(backend.clone());

        poller.start();
        sleep(Duration::from_millis(10)).await;
        poller.stop();

        assert!(poller.start());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(backend.call_count("metrics"), 2);

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_loop() {
        let backend = Arc::new(MockBackend::new());
        let poller = poller_with(backend.clone());
        poller.start();
        sleep(Duration::from_millis(10)).await;

        drop(poller);
        sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.call_count("metrics"), 1);
    }

    #[tokio::test]
    async fn test_refresh_without_start() {
        let backend = Arc::new(MockBackend::new().with_metrics(Ok(snapshot("7"))));
        let poller = poller_with(backend);

        assert!(poller.refresh().await);
        assert_eq!(poller.snapshot(), Some(snapshot("7")));
    }
}
