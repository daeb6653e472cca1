use std::time::Duration;

use thiserror::Error;

/// Aggregates every failure mode exposed by the gateway.
///
/// Callers match on the variant (or on [`GatewayError::kind`]) to decide whether to
/// back off, fall back to another provider, or surface the message to a user.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Signals a malformed configuration or request.
    #[error("validation failed: {message}")]
    Validation { message: String },
    /// Raised when no provider, factory, or candidate matches the lookup.
    #[error("not found: {message}")]
    NotFound { message: String },
    /// Generic backend failure that could not be classified further.
    #[error("provider {provider} error{}: {message}", status_suffix(.status))]
    Provider {
        /// Name of the provider config that produced the failure.
        provider: String,
        /// HTTP status when the failure came from a response.
        status: Option<u16>,
        /// Human-readable error message.
        message: String,
    },
    /// Reports invalid or missing credentials.
    #[error("auth failure for {provider}: {message}")]
    Auth { provider: String, message: String },
    /// Indicates that the backend throttled the request.
    #[error("rate limited by {provider}: {message}")]
    RateLimit {
        provider: String,
        message: String,
        /// Wait hint taken from the `Retry-After` header.
        retry_after: Option<Duration>,
    },
    /// Payment required or access to the resource forbidden.
    #[error("quota exceeded for {provider}: {message}")]
    Quota { provider: String, message: String },
    /// The backend answered with a payload the gateway cannot interpret.
    #[error("invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },
    /// The request did not complete within the configured timeout.
    #[error("request to {provider} timed out after {timeout_ms} ms")]
    Timeout { provider: String, timeout_ms: u64 },
    /// The caller cancelled the operation.
    #[error("operation cancelled: {message}")]
    Cancelled { message: String },
    /// The provider is not initialized, disabled, disposed, or every backend failed.
    #[error("provider unavailable: {message}")]
    Unavailable { message: String },
}

/// Machine-checkable classification of a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Provider,
    Auth,
    RateLimit,
    Quota,
    InvalidResponse,
    Timeout,
    Cancelled,
    Unavailable,
}

impl GatewayError {
    /// Returns the kind of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_gateway::error::{ErrorKind, GatewayError};
    ///
    /// let err = GatewayError::cancelled("stopped by user");
    /// assert_eq!(err.kind(), ErrorKind::Cancelled);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Quota { .. } => ErrorKind::Quota,
            Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
        }
    }

    /// Creates a [`GatewayError::Validation`].
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a [`GatewayError::NotFound`].
    pub fn not_found<T: Into<String>>(message: T) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a [`GatewayError::Provider`] without an HTTP status.
    ///
    /// Used for connection-level failures where no response was received.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_gateway::error::GatewayError;
    ///
    /// let err = GatewayError::provider("qwen", "connection refused");
    /// assert!(matches!(err, GatewayError::Provider { status: None, .. }));
    /// ```
    pub fn provider<P: Into<String>, T: Into<String>>(provider: P, message: T) -> Self {
        Self::Provider {
            provider: provider.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Creates a [`GatewayError::InvalidResponse`].
    pub fn invalid_response<P: Into<String>, T: Into<String>>(provider: P, message: T) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a [`GatewayError::Cancelled`].
    pub fn cancelled<T: Into<String>>(message: T) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Creates a [`GatewayError::Unavailable`].
    pub fn unavailable<T: Into<String>>(message: T) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Structured retry hint carried by rate-limit errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Configured timeout carried by timeout errors.
    pub fn timeout_ms(&self) -> Option<u64> {
        match self {
            Self::Timeout { timeout_ms, .. } => Some(*timeout_ms),
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}
