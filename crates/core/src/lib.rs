//! # Authwire Core
//!
//! Session-aware HTTP transport logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the network, session storage, cookies and
//!   the response cache
//! - The credential store, error normalizer and event bus
//! - The single-flight refresh coordinator and the transport built on it
//! - The login/logout session service
//!
//! ## Architecture Principles
//! - Only depends on `authwire-common` and `authwire-domain`
//! - No HTTP client, file system or environment access
//! - All external effects go through traits
//! - Every collaborator is constructed once and shared by `Arc`

pub mod errors;
pub mod events;
pub mod refresh;
pub mod session;
pub mod transport;

// Re-export specific items to avoid ambiguity
pub use errors::{classify, ErrorNormalizer, FailureContext};
pub use events::{AuthEventListener, EventBus, SubscriptionId};
pub use refresh::{RefreshCoordinator, RefreshOutcome, ReplayTurn};
pub use session::ports::{CookieSource, SessionStorage};
pub use session::{AuthService, CredentialStore};
pub use transport::ports::{HttpExecutor, ResponseCache};
pub use transport::HttpTransport;
