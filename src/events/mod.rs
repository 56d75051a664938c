mod bus;
mod handlers;
mod types;

pub use bus::{EventBus, EventReceiver, DEFAULT_EVENT_CAPACITY};
pub use handlers::NotificationLogHandler;
pub use types::{Component, EventSequence, NotificationLevel, StateEvent, StatePayload};
