use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Custom error type for outbound webhook delivery
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WebhookError {
    /// Error when the callback URL cannot be used
    #[error("Invalid callback URL '{0}'")]
    InvalidUrl(String),

    /// Error when connection to the receiver fails
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error when the receiver does not answer in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Error when the receiver answers with a non-success status
    #[error("Receiver returned status {status}, url: {url}")]
    Rejected {
        /// The URL that was called
        url: String,
        /// The status code returned by the receiver
        status: u16,
    },
}

/// Result type alias for webhook delivery
pub type WebhookResult<T> = Result<T, WebhookError>;

/// WebhookClient defines the port (interface) for delivering signed callbacks
#[async_trait]
pub trait WebhookClient: Send + Sync + 'static {
    /// POST a JSON body with its signature
    ///
    /// # Arguments
    /// * `url` - Callback URL supplied by the caller
    /// * `body` - Exact bytes that were signed
    /// * `signature` - Hex HMAC-SHA256 of `body`, sent as `X-Signature`
    ///
    /// # Returns
    /// The receiver's success status code, or an error for transport failures and
    /// non-2xx answers
    async fn post_signed(&self, url: &str, body: Vec<u8>, signature: &str)
    -> WebhookResult<u16>;
}
