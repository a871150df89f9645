//! # Authwire Domain
//!
//! Pure types shared by every authwire layer.
//!
//! This crate contains:
//! - Credential bundle, request descriptors and raw responses
//! - The normalized error taxonomy and transport failures
//! - Typed events broadcast by the transport
//! - Client configuration and wire constants
//!
//! ## Architecture
//! - Depends only on `authwire-common` for error classification
//! - No I/O, no async runtime

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
