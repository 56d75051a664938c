//! Database connection session: the single active connection and its schema.

use crate::api::{ApiTable, QueryBackend};
use crate::error::{ClientResult, ValidationError};
use crate::events::{Component, EventBus, NotificationLevel, StatePayload};
use crate::logging::{log_info, log_warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub column_type: String,
    pub is_primary: bool,
    pub is_foreign: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTable {
    pub name: String,
    pub columns: Vec<SchemaColumn>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSession {
    /// Active connection string; empty while not connected
    pub connection_string: String,
    pub schema: Option<Vec<SchemaTable>>,
    pub state: ConnectionState,
}

impl ConnectionSession {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
            && !self.connection_string.is_empty()
            && self.schema.is_some()
    }

    pub fn table_count(&self) -> usize {
        self.schema.as_ref().map_or(0, |tables| tables.len())
    }
}

/// Flatten the discovered tables, marking primary and foreign-key columns.
///
/// A column is foreign when `table.column` appears among that table's
/// foreign-key constrained columns.
pub fn annotate_schema(tables: Vec<ApiTable>) -> Vec<SchemaTable> {
    let foreign: HashSet<String> = tables
        .iter()
        .flat_map(|table| {
            table.foreign_keys.iter().flat_map(move |fk| {
                fk.constrained_columns
                    .iter()
                    .map(move |column| format!("{}.{}", table.name, column))
            })
        })
        .collect();

    tables
        .into_iter()
        .map(|table| {
            let columns = table
                .columns
                .into_iter()
                .map(|column| SchemaColumn {
                    is_foreign: foreign.contains(&format!("{}.{}", table.name, column.name)),
                    is_primary: column.is_primary_key,
                    column_type: column.column_type,
                    name: column.name,
                })
                .collect();

            SchemaTable {
                name: table.name,
                columns,
            }
        })
        .collect()
}

/// Read-only handle other components use to gate on the connection
#[derive(Debug, Clone)]
pub struct SessionView {
    session: Arc<Mutex<ConnectionSession>>,
}

impl SessionView {
    pub fn is_connected(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_connected()
    }

    pub fn snapshot(&self) -> ConnectionSession {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Sole writer of the `ConnectionSession`
#[derive(Clone)]
pub struct ConnectionManager {
    session: Arc<Mutex<ConnectionSession>>,
    /// Id of the latest attempt; bumped by every connect and disconnect
    attempt: Arc<AtomicU64>,
    backend: Arc<dyn QueryBackend>,
    events: EventBus,
}

impl ConnectionManager {
    pub fn new(backend: Arc<dyn QueryBackend>, events: EventBus) -> Self {
        Self {
            session: Arc::new(Mutex::new(ConnectionSession::default())),
            attempt: Arc::new(AtomicU64::new(0)),
            backend,
            events,
        }
    }

    /// Test the connection string and discover its schema.
    ///
    /// The previous connection is dropped as soon as the attempt starts, whatever
    /// the outcome. Returns the annotated schema on success.
    pub async fn connect(&self, connection_string: &str) -> ClientResult<Vec<SchemaTable>> {
        if connection_string.trim().is_empty() {
            self.events.notify(
                Component::Connection,
                NotificationLevel::Error,
                "Connection string required",
                None,
            );
            return Err(ValidationError::EmptyConnectionString.into());
        }

        let attempt = {
            let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            if session.state == ConnectionState::Connecting {
                return Err(ValidationError::ConnectionPending.into());
            }
            *session = ConnectionSession {
                state: ConnectionState::Connecting,
                ..Default::default()
            };
            self.attempt.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.publish_state(ConnectionState::Connecting, 0);
        let mut guard = AttemptGuard {
            manager: self,
            attempt,
            armed: true,
        };

        log_info("connection", "🔌 Testing database connection").unwrap_or_default();

        let result = self.backend.connect_database(connection_string).await;
        guard.armed = false;

        match result {
            Ok(response) => {
                let schema = annotate_schema(response.tables);
                let table_count = schema.len();

                let current = {
                    let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
                    let current = self.attempt.load(Ordering::SeqCst) == attempt;
                    if current {
                        *session = ConnectionSession {
                            connection_string: connection_string.to_string(),
                            schema: Some(schema.clone()),
                            state: ConnectionState::Connected,
                        };
                    }
                    current
                };
                if !current {
                    log_info("connection", "Discarding schema from a cancelled attempt")
                        .unwrap_or_default();
                    return Err(ValidationError::ConnectionCancelled.into());
                }

                log_info(
                    "connection",
                    &format!("✓ Connected, discovered {} tables", table_count),
                )
                .unwrap_or_default();
                self.publish_state(ConnectionState::Connected, table_count);
                self.events.notify(
                    Component::Connection,
                    NotificationLevel::Success,
                    "Connection Successful",
                    Some(format!("Discovered {} tables.", table_count)),
                );

                Ok(schema)
            }
            Err(err) => {
                let current = {
                    let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
                    let current = self.attempt.load(Ordering::SeqCst) == attempt;
                    if current {
                        *session = ConnectionSession::default();
                    }
                    current
                };

                let message = err.user_message();
                log_warn("connection", &format!("✗ Connection failed: {}", message))
                    .unwrap_or_default();
                if current {
                    self.publish_state(ConnectionState::Disconnected, 0);
                    self.events.notify(
                        Component::Connection,
                        NotificationLevel::Error,
                        "Connection Failed",
                        Some(message),
                    );
                }

                Err(err)
            }
        }
    }

    /// Forget the active connection. An attempt in flight is cancelled and
    /// its response discarded.
    pub fn disconnect(&self) {
        {
            let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            if session.state == ConnectionState::Disconnected {
                return;
            }
            self.attempt.fetch_add(1, Ordering::SeqCst);
            *session = ConnectionSession::default();
        }

        log_info("connection", "Disconnected").unwrap_or_default();
        self.publish_state(ConnectionState::Disconnected, 0);
    }

    pub fn snapshot(&self) -> ConnectionSession {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot().is_connected()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session: self.session.clone(),
        }
    }

    fn publish_state(&self, state: ConnectionState, table_count: usize) {
        let _ = self.events.publish(
            Component::Connection,
            StatePayload::ConnectionChanged { state, table_count },
        );
    }
}

/// Clears the `Connecting` state of an attempt whose future was dropped
struct AttemptGuard<'a> {
    manager: &'a ConnectionManager,
    attempt: u64,
    armed: bool,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        {
            let mut session = self
                .manager
                .session
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if self.manager.attempt.load(Ordering::SeqCst) != self.attempt
                || session.state != ConnectionState::Connecting
            {
                return;
            }
            *session = ConnectionSession::default();
        }

        log_warn("connection", "Connection attempt abandoned before a response")
            .unwrap_or_default();
        self.manager.publish_state(ConnectionState::Disconnected, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{schema_with_foreign_key, MockBackend};
    use crate::error::ClientError;

    #[test]
    fn test_annotate_schema_marks_keys() {
        let schema = annotate_schema(schema_with_foreign_key().tables);

        assert_eq!(schema.len(), 2);
        let employees = &schema[0];
        assert_eq!(employees.name, "employees");
        assert!(employees.columns[0].is_primary);
        assert!(!employees.columns[0].is_foreign);
        assert!(employees.columns[1].is_foreign);
        assert!(!employees.columns[1].is_primary);

        // Same column name on another table is not foreign
        let departments = &schema[1];
        assert!(departments.columns[0].is_primary);
        assert!(!departments.columns[0].is_foreign);
    }

    #[tokio::test]
    async fn test_connect_success() {
        let backend = Arc::new(MockBackend::new().with_connect(Ok(schema_with_foreign_key())));
        let manager = ConnectionManager::new(backend, EventBus::default());

        let schema = manager.connect("postgresql://u:p@h:5432/hr").await.unwrap();
        assert_eq!(schema.len(), 2);

        let session = manager.snapshot();
        assert!(session.is_connected());
        assert_eq!(session.connection_string, "postgresql://u:p@h:5432/hr");
        assert_eq!(session.table_count(), 2);
        assert!(manager.view().is_connected());
    }

    #[tokio::test]
    async fn test_blank_connection_string_sends_nothing() {
        let backend = Arc::new(MockBackend::new());
        let manager = ConnectionManager::new(backend.clone(), EventBus::default());

        let err = manager.connect("   ").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EmptyConnectionString)
        ));
        assert_eq!(backend.call_count("connect"), 0);
    }

    #[tokio::test]
    async fn test_failed_reconnect_drops_previous_connection() {
        let backend = Arc::new(
            MockBackend::new()
                .with_connect(Ok(schema_with_foreign_key()))
                .with_connect(Err(ClientError::backend(400, "could not translate host name"))),
        );
        let manager = ConnectionManager::new(backend, EventBus::default());

        manager.connect("postgresql://localhost/hr").await.unwrap();
        let err = manager.connect("postgresql://nowhere/hr").await.unwrap_err();

        assert_eq!(err.user_message(), "could not translate host name");
        let session = manager.snapshot();
        assert!(!session.is_connected());
        assert!(session.connection_string.is_empty());
        assert!(session.schema.is_none());
        assert_eq!(session.state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_attempt_resets_state_before_response() {
        let backend = Arc::new(MockBackend::new().gated());
        let manager = ConnectionManager::new(backend.clone(), EventBus::default());

        let attempt = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect("postgresql://localhost/hr").await }
        });
        backend.wait_for_calls("connect", 1).await;

        let session = manager.snapshot();
        assert_eq!(session.state, ConnectionState::Connecting);
        assert!(session.connection_string.is_empty());
        assert!(session.schema.is_none());

        let err = manager.connect("postgresql://localhost/other").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::ConnectionPending)
        ));

        backend.release_all();
        attempt.await.unwrap().unwrap();
        assert!(manager.is_connected());
        assert_eq!(backend.call_count("connect"), 1);
    }

    #[tokio::test]
    async fn test_dropped_connect_releases_lock() {
        let backend = Arc::new(MockBackend::new().gated());
        let manager = ConnectionManager::new(backend.clone(), EventBus::default());

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            manager.connect("postgresql://localhost/hr"),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(manager.snapshot(), ConnectionSession::default());

        backend.release_all();
        manager.connect("postgresql://localhost/hr").await.unwrap();
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_cancels_attempt_in_flight() {
        let backend = Arc::new(MockBackend::new().gated());
        let manager = ConnectionManager::new(backend.clone(), EventBus::default());

        let attempt = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect("postgresql://localhost/hr").await }
        });
        backend.wait_for_calls("connect", 1).await;
        assert_eq!(manager.snapshot().state, ConnectionState::Connecting);

        manager.disconnect();
        assert_eq!(manager.snapshot(), ConnectionSession::default());

        backend.release_all();
        let err = attempt.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::ConnectionCancelled)
        ));
        assert!(!manager.is_connected());

        manager.connect("postgresql://localhost/other").await.unwrap();
        assert_eq!(
            manager.snapshot().connection_string,
            "postgresql://localhost/other"
        );
    }

    #[tokio::test]
    async fn test_disconnect() {
        let manager = ConnectionManager::new(Arc::new(MockBackend::new()), EventBus::default());
        manager.disconnect();

        manager.connect("postgresql://localhost/hr").await.unwrap();
        assert!(manager.is_connected());

        manager.disconnect();
        assert_eq!(manager.snapshot(), ConnectionSession::default());
    }
}
