//! Error types shared by the dispatcher, the transports and the session strategies.

use std::sync::Arc;

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

/// An application-level failure reported inside a response envelope.
///
/// This is the only kind of failure a session strategy is asked to classify:
/// it either means "the session is gone" or "this call failed on its own".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("API error (code={code}): {}", message.as_deref().unwrap_or("no message"))]
pub struct ApiError {
    pub code: i64,
    pub message: Option<String>,
}

impl ApiError {
    pub fn new(code: i64, message: impl Into<Option<String>>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the client.
///
/// The type is `Clone` because a single acquisition failure is delivered to
/// every call that was queued behind it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The platform answered with a non-success envelope.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("Decode error: {0}")]
    Decode(String),

    /// Marker for a transport attempt aborted by an invalidation cascade.
    /// Never delivered to callers.
    #[error("request cancelled")]
    Cancelled,

    /// Session acquisition failed; every queued call receives the cause.
    #[error("session acquisition failed: {0}")]
    Acquisition(Arc<Error>),

    /// The strategy's acquire hook panicked.
    #[error("session acquisition panicked: {0}")]
    Panicked(String),

    /// A call was decorated while the strategy held no credential.
    #[error("no session credential held")]
    NoSession,

    /// The gate was dropped before the call reached a terminal outcome.
    #[error("session gate closed")]
    Closed,

    /// Every trace identifier is held by a live call.
    #[error("too many pending calls")]
    Saturated,

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Application error code, looking through acquisition wrappers.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Self::Api(e) => Some(e.code),
            Self::Acquisition(inner) => inner.api_code(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_code_through_acquisition() {
        let err = Error::Acquisition(Arc::new(Error::Api(ApiError::new(410, None))));
        assert_eq!(err.api_code(), Some(410));
        assert!(!err.is_cancelled());
        assert_eq!(Error::Cancelled.api_code(), None);
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::new(300330, Some("session expired".to_string()));
        assert_eq!(err.to_string(), "API error (code=300330): session expired");
        assert_eq!(
            ApiError::new(-330, None).to_string(),
            "API error (code=-330): no message"
        );
    }
}
