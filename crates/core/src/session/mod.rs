//! Session credentials and the login/logout lifecycle

pub mod ports;
mod service;
mod store;

pub use ports::{CookieSource, SessionStorage};
pub use service::AuthService;
pub use store::CredentialStore;
