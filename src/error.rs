//! Error taxonomy shared across the bus.
//!
//! Mirrors the closed error-code enum carried on the wire (§4.1/§7 of the
//! design doc) so a terminal `TaskResponse` can always report an
//! `ErrorCode` that traces back to the `McpError` that produced it.

use std::error::Error;
use std::fmt;

/// Closed set of error codes exchanged on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidMessageFormat,
    InvalidTaskType,
    InvalidParameters,
    InsufficientBudget,
    ResourceLimitExceeded,
    AgentUnavailable,
    QueueFull,
    TaskTimeout,
    TaskCancelled,
    AgentError,
    NetworkError,
    AuthenticationFailed,
    AuthorizationFailed,
    RateLimitExceeded,
    InternalError,
    ServiceUnavailable,
    ConfigurationError,
}

/// Error type returned by bus components.
///
/// Follows the same shape as a hand-rolled protocol error: a plain enum
/// with a `Display` impl, not a `thiserror` derive. Each variant carries a
/// message suitable for surfacing to operators (never secret material).
#[derive(Debug, Clone)]
pub enum McpError {
    InvalidMessageFormat(String),
    InvalidTaskType(String),
    InvalidParameters(String),
    InsufficientBudget(String),
    ResourceLimitExceeded(String),
    AgentUnavailable(String),
    QueueFull(String),
    TaskTimeout(String),
    TaskCancelled(String),
    AgentError(String),
    NetworkError(String),
    AuthenticationFailed(String),
    AuthorizationFailed(String),
    RateLimitExceeded(String),
    InternalError(String),
    ServiceUnavailable(String),
    ConfigurationError(String),
}

impl McpError {
    /// The closed error code this variant corresponds to on the wire.
    pub fn code(&self) -> ErrorCode {
        match self {
            McpError::InvalidMessageFormat(_) => ErrorCode::InvalidMessageFormat,
            McpError::InvalidTaskType(_) => ErrorCode::InvalidTaskType,
            McpError::InvalidParameters(_) => ErrorCode::InvalidParameters,
            McpError::InsufficientBudget(_) => ErrorCode::InsufficientBudget,
            McpError::ResourceLimitExceeded(_) => ErrorCode::ResourceLimitExceeded,
            McpError::AgentUnavailable(_) => ErrorCode::AgentUnavailable,
            McpError::QueueFull(_) => ErrorCode::QueueFull,
            McpError::TaskTimeout(_) => ErrorCode::TaskTimeout,
            McpError::TaskCancelled(_) => ErrorCode::TaskCancelled,
            McpError::AgentError(_) => ErrorCode::AgentError,
            McpError::NetworkError(_) => ErrorCode::NetworkError,
            McpError::AuthenticationFailed(_) => ErrorCode::AuthenticationFailed,
            McpError::AuthorizationFailed(_) => ErrorCode::AuthorizationFailed,
            McpError::RateLimitExceeded(_) => ErrorCode::RateLimitExceeded,
            McpError::InternalError(_) => ErrorCode::InternalError,
            McpError::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            McpError::ConfigurationError(_) => ErrorCode::ConfigurationError,
        }
    }

    /// The human-readable message carried by this error.
    pub fn message(&self) -> &str {
        match self {
            McpError::InvalidMessageFormat(m)
            | McpError::InvalidTaskType(m)
            | McpError::InvalidParameters(m)
            | McpError::InsufficientBudget(m)
            | McpError::ResourceLimitExceeded(m)
            | McpError::AgentUnavailable(m)
            | McpError::QueueFull(m)
            | McpError::TaskTimeout(m)
            | McpError::TaskCancelled(m)
            | McpError::AgentError(m)
            | McpError::NetworkError(m)
            | McpError::AuthenticationFailed(m)
            | McpError::AuthorizationFailed(m)
            | McpError::RateLimitExceeded(m)
            | McpError::InternalError(m)
            | McpError::ServiceUnavailable(m)
            | McpError::ConfigurationError(m) => m,
        }
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code(), self.message())
    }
}

impl Error for McpError {}

pub type McpResult<T> = Result<T, McpError>;
