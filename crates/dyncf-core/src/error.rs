//! Error types for the reconciler
//!
//! The variants follow the failure taxonomy of the engine: only
//! [`Error::Config`] (and an empty registry after the startup build) stop
//! the process. Everything else is logged and retried on the next cycle.

use thiserror::Error;

/// Result type alias for reconciler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the reconciler
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration (fatal before the loop starts)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Zone or record lookup failed for a single host
    #[error("Resolution error for {host}: {message}")]
    Resolution {
        /// Host being resolved
        host: String,
        /// What went wrong
        message: String,
    },

    /// The provider has no record for the name
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// The public IP could not be determined
    #[error("IP lookup failed: {0}")]
    IpLookup(String),

    /// A single record update was rejected or never reached the provider
    #[error("Update failed for {host}: {message}")]
    Update {
        /// Host whose record failed to update
        host: String,
        /// What went wrong
        message: String,
    },

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Credentials rejected by the provider
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Provider rate limit hit
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Durable state could not be read or written
    #[error("State store error: {0}")]
    StateStore(String),

    /// Heartbeat file could not be written or parsed
    #[error("Heartbeat error: {0}")]
    Heartbeat(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem and socket errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a per-host resolution error
    pub fn resolution(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create a "record not found" error
    pub fn record_not_found(msg: impl Into<String>) -> Self {
        Self::RecordNotFound(msg.into())
    }

    /// Create an IP lookup error
    pub fn ip_lookup(msg: impl Into<String>) -> Self {
        Self::IpLookup(msg.into())
    }

    /// Create a per-record update error
    pub fn update(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Update {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a heartbeat error
    pub fn heartbeat(msg: impl Into<String>) -> Self {
        Self::Heartbeat(msg.into())
    }

    /// Whether the error means the record no longer exists at the provider
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound(_))
    }

    /// Whether the error is fatal for the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_config_errors_are_fatal() {
        assert!(Error::config("HOST_LIST is empty").is_fatal());
        assert!(!Error::ip_lookup("timeout").is_fatal());
        assert!(!Error::update("a.example.com", "500").is_fatal());
        assert!(!Error::record_not_found("a.example.com").is_fatal());
    }

    #[test]
    fn not_found_is_detectable() {
        assert!(Error::record_not_found("a.example.com").is_not_found());
        assert!(!Error::provider("cloudflare", "boom").is_not_found());
    }

    #[test]
    fn messages_name_the_host() {
        let err = Error::update("b.example.com", "HTTP 502");
        assert_eq!(err.to_string(), "Update failed for b.example.com: HTTP 502");
    }

    #[test]
    fn anyhow_errors_keep_their_message() {
        let err: Error = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, Error::Other(ref msg) if msg == "disk full"));
    }
}
