// Library exports for the binary and integration tests

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod query;
pub mod session;
pub mod upload_queue;

pub use context::AppContext;
pub use error::{ClientError, ClientResult, ValidationError};
