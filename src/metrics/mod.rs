//! Dashboard metrics: wire types and the periodic poller.

mod poller;
mod types;

pub use poller::MetricsPoller;
pub use types::*;
