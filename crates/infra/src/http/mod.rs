//! HTTP adapters: the reqwest executor and its cookie jar

pub mod client;
pub mod cookies;

pub use client::{ReqwestExecutor, ReqwestExecutorBuilder};
pub use cookies::CsrfCookieJar;
