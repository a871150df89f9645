//! Single-flight access token refresh

mod coordinator;
mod turn;

pub use coordinator::{RefreshCoordinator, RefreshOutcome};
pub use turn::ReplayTurn;
