//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the crate.
//!
//! The first three variants are the per-domain failures the reconciliation
//! driver records. They are never escalated past the domain boundary.

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Zone/site lookup returned zero or ambiguous matches
    #[error("zone resolution failed for {domain}: {reason}")]
    ZoneResolution {
        /// Root domain that was looked up
        domain: String,
        /// Provider error text
        reason: String,
    },

    /// Transport or decode failure while listing records
    #[error("record listing failed for {domain}: {reason}")]
    RecordList {
        /// Full domain name
        domain: String,
        /// Provider error text
        reason: String,
    },

    /// Create or update call rejected or failed
    #[error("record write failed for {domain}: {reason}")]
    RecordWrite {
        /// Full domain name
        domain: String,
        /// Provider error text
        reason: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (config file loading)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Zone or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// More than one candidate matched where exactly one was required
    #[error("Ambiguous match: {0}")]
    Ambiguous(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a zone resolution error
    pub fn zone_resolution(domain: impl Into<String>, reason: impl ToString) -> Self {
        Self::ZoneResolution {
            domain: domain.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a record listing error
    pub fn record_list(domain: impl Into<String>, reason: impl ToString) -> Self {
        Self::RecordList {
            domain: domain.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a record write error
    pub fn record_write(domain: impl Into<String>, reason: impl ToString) -> Self {
        Self::RecordWrite {
            domain: domain.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an ambiguous-match error
    pub fn ambiguous(msg: impl Into<String>) -> Self {
        Self::Ambiguous(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this is one of the per-domain reconciliation failures
    pub fn is_domain_scoped(&self) -> bool {
        matches!(
            self,
            Self::ZoneResolution { .. } | Self::RecordList { .. } | Self::RecordWrite { .. }
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
