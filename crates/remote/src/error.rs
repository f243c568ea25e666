//! Error types for the remote document store.

use thiserror::Error;

/// Result type alias for remote store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Retry policy class for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Errors that can occur while talking to the remote document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error response from the document service
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Authentication error (sign-in failed or token rejected)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Invalid request (bad path, empty field map, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The realtime subscription ended and will not recover on its own.
    #[error("Subscription lost: {0}")]
    SubscriptionLost(String),
}

impl StoreError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a subscription-lost error
    pub fn subscription_lost(message: impl Into<String>) -> Self {
        Self::SubscriptionLost(message.into())
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => RetryClass::ReauthRequired,
                408 | 409 | 423 | 425 | 429 => RetryClass::Retryable,
                500..=599 => RetryClass::Retryable,
                _ => RetryClass::Permanent,
            },
            Self::Http(_) => RetryClass::Retryable,
            Self::Json(_) => RetryClass::Permanent,
            Self::Auth(_) => RetryClass::ReauthRequired,
            Self::InvalidRequest(_) => RetryClass::Permanent,
            Self::SubscriptionLost(_) => RetryClass::Retryable,
        }
    }
}
