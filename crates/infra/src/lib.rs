//! # Authwire Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The reqwest-backed HTTP executor and its CSRF cookie jar
//! - Session storage in memory or in per-session JSON files
//! - The moka response cache
//! - Configuration loading and tracing setup
//! - [`ClientContext`], which wires one session's services together
//!
//! ## Architecture
//! - Implements traits defined in `authwire-core`
//! - Contains all "impure" code (network, file system, environment)

pub mod cache;
pub mod config;
pub mod context;
pub mod errors;
pub mod http;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use cache::{MokaResponseCache, ResponseCacheConfig};
pub use context::{ClientContext, ClientContextBuilder};
pub use errors::InfraError;
pub use http::{CsrfCookieJar, ReqwestExecutor, ReqwestExecutorBuilder};
pub use observability::{init_tracing, LogFormat};
pub use storage::{FileSessionStorage, MemorySessionStorage};
