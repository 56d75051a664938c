use super::{EventBus, StateEvent, StatePayload};
use super::types::NotificationLevel;
use crate::logging::{log_error, log_info, log_warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const NOTIFICATIONS_LOG: &str = "notifications";

/// Handler that writes user-facing notifications to the component log
pub struct NotificationLogHandler {
    event_bus: EventBus,
    shutdown: CancellationToken,
}

impl NotificationLogHandler {
    pub fn new(event_bus: EventBus, shutdown: CancellationToken) -> Self {
        Self {
            event_bus,
            shutdown,
        }
    }

    pub fn start(self) -> JoinHandle<()> {
        // Subscribe before spawning so nothing published after start() is missed
        let mut rx = self.event_bus.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = rx.recv() => {
                        match result {
                            Ok(event) => handle_event(&event),
                            Err(broadcast::error::RecvError::Closed) => {
                                log_info("events", "Notification handler stopped (event bus closed)").unwrap_or_default();
                                break;
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                log_warn("events", &format!("Notification handler lagged {} events", n))
                                    .unwrap_or_default();
                            }
                        }
                    }
                    _ = self.shutdown.cancelled() => {
                        log_info("events", "Notification handler gracefully shutting down").unwrap_or_default();
                        break;
                    }
                }
            }
        })
    }
}

fn handle_event(event: &StateEvent) {
    let StatePayload::Notification {
        level,
        title,
        description,
    } = &event.payload
    else {
        return;
    };

    let message = match description {
        Some(description) => format!("[{}] {}: {}", event.component.as_str(), title, description),
        None => format!("[{}] {}", event.component.as_str(), title),
    };

    let logged = match level {
        NotificationLevel::Error => log_error(NOTIFICATIONS_LOG, &message),
        NotificationLevel::Info | NotificationLevel::Success => log_info(NOTIFICATIONS_LOG, &message),
    };
    logged.unwrap_or_default();
}
