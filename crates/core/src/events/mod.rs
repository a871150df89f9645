//! Event bus for loading-state, error and token lifecycle signals

mod bus;
pub mod ports;

pub use bus::{EventBus, SubscriptionId};
pub use ports::AuthEventListener;
