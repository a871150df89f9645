//! Authenticated HTTP transport

mod cached;
pub mod ports;
mod service;

pub use cached::cache_key;
pub use ports::{HttpExecutor, ResponseCache};
pub use service::HttpTransport;
