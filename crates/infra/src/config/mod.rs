//! Configuration loading
//!
//! This module provides utilities for loading the client configuration
//! from `.env`, environment variables and files.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
