//! Domain types and models

pub mod auth;
pub mod credentials;
pub mod events;
pub mod failure;
pub mod request;
pub mod response;

pub use auth::{AuthPayload, AuthSession, LoginCredentials};
pub use credentials::CredentialBundle;
pub use events::AuthEvent;
pub use failure::{ErrorCode, NormalizedError, TransportFailure};
pub use request::{Headers, HttpMethod, OutboundRequest, RequestDescriptor, RequestFlags};
pub use response::TransportResponse;
