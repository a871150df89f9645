//! Error classification shared by every authwire error type.
//!
//! Each crate owns its concrete error enums. What they share is the
//! [`ErrorClassification`] interface, which lets callers decide whether a
//! failure is worth retrying and how loudly to report it without matching on
//! crate-specific variants.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use authwire_common::error::{ErrorClassification, ErrorSeverity};
//!
//! #[derive(Debug)]
//! struct Throttled;
//!
//! impl ErrorClassification for Throttled {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//!
//!     fn severity(&self) -> ErrorSeverity {
//!         ErrorSeverity::Warning
//!     }
//!
//!     fn retry_after(&self) -> Option<Duration> {
//!         Some(Duration::from_secs(2))
//!     }
//! }
//!
//! assert!(!Throttled.is_critical());
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Standard interface for classifying errors by their characteristics.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: connectivity loss, rate limiting,
    /// server-side failures, or a request cancelled before it completed.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for logging and alerting decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when the failure carried a specific delay
    /// (for example a `Retry-After` value).
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl ErrorSeverity {
    /// Returns `true` when the failure should reach error-level logs.
    pub const fn is_error_or_worse(self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Corrupted;

    impl ErrorClassification for Corrupted {
        fn is_retryable(&self) -> bool {
            false
        }

        fn severity(&self) -> ErrorSeverity {
            ErrorSeverity::Critical
        }
    }

    #[test]
    fn severity_orders_from_info_to_critical() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert!(ErrorSeverity::Error.is_error_or_worse());
        assert!(!ErrorSeverity::Warning.is_error_or_worse());
    }

    #[test]
    fn severity_display_and_serde_use_stable_names() {
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
        let json = serde_json::to_string(&ErrorSeverity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }

    #[test]
    fn default_methods_derive_from_severity() {
        assert!(Corrupted.is_critical());
        assert_eq!(Corrupted.retry_after(), None);
    }
}
