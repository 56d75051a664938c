use thiserror::Error;

/// Input rejected before any request is issued
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please connect to a database before querying.")]
    NotConnected,

    #[error("Query required")]
    EmptyQuery,

    #[error("A query is already being processed")]
    QueryPending,

    #[error("Connection string required")]
    EmptyConnectionString,

    #[error("A connection attempt is already in progress")]
    ConnectionPending,

    #[error("The connection attempt was cancelled")]
    ConnectionCancelled,
}

/// NLQ Desk client errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Blank input or a busy component
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Non-success response from the backend
    #[error("{detail}")]
    Backend { status: u16, detail: String },

    /// HTTP request errors (connection, timeout, undecodable body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl ClientError {
    pub fn backend(status: u16, detail: impl Into<String>) -> Self {
        ClientError::Backend {
            status,
            detail: detail.into(),
        }
    }

    /// Message shown to the user: backend detail verbatim, otherwise the error text
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(v) => v.to_string(),
            ClientError::Backend { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}

/// Convert ClientError to String for UI consumers
impl From<ClientError> for String {
    fn from(err: ClientError) -> String {
        err.to_string()
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> Result<T, ClientError>;
}

impl<T, E: Into<ClientError>> ErrorContext<T> for Result<T, E> {
    fn context(self, msg: &str) -> Result<T, ClientError> {
        self.map_err(|e| match e.into() {
            ClientError::Other(s) => ClientError::Other(format!("{}: {}", msg, s)),
            ClientError::Config(s) => ClientError::Config(format!("{}: {}", msg, s)),
            ClientError::Backend { status, detail } => ClientError::Backend {
                status,
                detail: format!("{}: {}", msg, detail),
            },
            other => other,
        })
    }
}
