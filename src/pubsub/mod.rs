//! Publish/subscribe event bus for decoupled components.

mod bus;
mod event;

pub use bus::{EventHandler, PubSub, Publisher, SubscriptionId};
pub use event::{Event, EventType};
