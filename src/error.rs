//! Error types for hn-pull
//!
//! One error enum covers the whole library. The important distinction is not
//! carried by the enum itself but by where an error is handled: per-request
//! failures (network, HTTP status, malformed payload) are swallowed at the
//! batch boundary by the puller, while sink I/O failures propagate out of the
//! run because no further progress is possible without a writable sink.

use thiserror::Error;

/// Result type alias for hn-pull operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hn-pull
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch_size")
        key: Option<String>,
    },

    /// Network or transport error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream returned a non-success HTTP status
    #[error("HTTP {status} from {endpoint}")]
    Http {
        /// The HTTP status code
        status: u16,
        /// The endpoint that returned the status (relative to the base URL)
        endpoint: String,
    },

    /// Upstream returned a JSON body of unexpected shape
    #[error("malformed payload from {endpoint}: {reason}")]
    MalformedPayload {
        /// The endpoint that returned the payload
        endpoint: String,
        /// Why the payload could not be interpreted
        reason: String,
    },

    /// I/O error from the durable sink or resume scan
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - the client is no longer admitting requests
    #[error("shutdown in progress: not admitting new requests")]
    ShuttingDown,
}
