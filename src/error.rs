//! Error types: the weather-domain taxonomy and the JSON-RPC boundary.
//!
//! ## Domain error codes
//!
//! Every tool failure is one of a closed set of codes. Retryability is a
//! pure function of the code; clients decide whether to retry.
//!
//! | Code                 | Typical cause                         | Retryable |
//! |----------------------|---------------------------------------|-----------|
//! | INVALID_INPUT        | Validation failure, upstream 400/404  | no        |
//! | OUT_OF_COVERAGE      | Coordinate outside a product fence    | no        |
//! | RATE_LIMITED         | Upstream 429 or 503                   | yes       |
//! | UPSTREAM_UNAVAILABLE | Connection failure, timeout, 5xx      | yes       |
//! | INTERNAL_ERROR       | Programmer error, unexpected 403      | no        |
//!
//! ## JSON-RPC error codes
//!
//! Standard JSON-RPC 2.0 codes are used at the protocol boundary:
//! −32700 parse, −32600 invalid request, −32601 method not found,
//! −32602 invalid params, −32603 internal error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of tool error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    OutOfCoverage,
    RateLimited,
    UpstreamUnavailable,
    InternalError,
}

impl ErrorCode {
    /// Whether a client may retry an identical request later.
    pub fn retryable(self) -> bool {
        matches!(self, ErrorCode::RateLimited | ErrorCode::UpstreamUnavailable)
    }

    /// The wire name of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::OutOfCoverage => "OUT_OF_COVERAGE",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Map an upstream HTTP status to a code.
    ///
    /// 403 is a configuration problem on our side of the proxy, not the
    /// caller's, so it maps to `InternalError`. 503 carries `Retry-After`
    /// from the proxy's rate limiter and is treated like 429.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 404 => ErrorCode::InvalidInput,
            403 => ErrorCode::InternalError,
            429 | 503 => ErrorCode::RateLimited,
            s if (500..600).contains(&s) => ErrorCode::UpstreamUnavailable,
            _ => ErrorCode::InternalError,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional context attached to a [`ToolError`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// The offending coordinate for coverage failures, as `"lat,lon"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ErrorDetails {
    fn is_empty(&self) -> bool {
        self.upstream_status.is_none()
            && self.retry_after_seconds.is_none()
            && self.request_id.is_none()
            && self.location.is_none()
    }
}

/// A typed tool failure.
///
/// Functions that receive an already-typed `ToolError` re-raise it
/// unchanged; only raw I/O failures get wrapped into one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "ErrorDetails::is_empty")]
    pub details: ErrorDetails,
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ToolError {}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: ErrorDetails::default(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn out_of_coverage(message: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self::new(ErrorCode::OutOfCoverage, message).with_location(lat, lon)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Build from an upstream HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::from_status(status), message).with_upstream_status(status)
    }

    pub fn with_upstream_status(mut self, status: u16) -> Self {
        self.details.upstream_status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.details.retry_after_seconds = Some(seconds);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.details.request_id = Some(request_id.into());
        self
    }

    pub fn with_location(mut self, lat: f64, lon: f64) -> Self {
        self.details.location = Some(format!("{},{}", lat, lon));
        self
    }

    /// Whether a client may retry. Derived from the code only.
    pub fn retryable(&self) -> bool {
        self.code.retryable()
    }
}

// =============================================================================
// JSON-RPC boundary
// =============================================================================

/// Standard JSON-RPC error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum RpcErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
}

impl RpcErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ParseError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            RpcErrorCode::MethodNotFound,
            format!("Method not found: {}", method),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidParams, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InternalError, message)
    }
}

// =============================================================================
// Crate error
// =============================================================================

/// Top-level error for server plumbing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("JSON-RPC error: {0:?}")]
    JsonRpc(JsonRpcError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Tool(#[from] ToolError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRpcError> for Error {
    fn from(err: JsonRpcError) -> Self {
        Error::JsonRpc(err)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_is_a_function_of_code() {
        assert!(ErrorCode::RateLimited.retryable());
        assert!(ErrorCode::UpstreamUnavailable.retryable());
        assert!(!ErrorCode::InvalidInput.retryable());
        assert!(!ErrorCode::OutOfCoverage.retryable());
        assert!(!ErrorCode::InternalError.retryable());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ErrorCode::from_status(400), ErrorCode::InvalidInput);
        assert_eq!(ErrorCode::from_status(404), ErrorCode::InvalidInput);
        assert_eq!(ErrorCode::from_status(403), ErrorCode::InternalError);
        assert_eq!(ErrorCode::from_status(429), ErrorCode::RateLimited);
        assert_eq!(ErrorCode::from_status(503), ErrorCode::RateLimited);
        assert_eq!(ErrorCode::from_status(500), ErrorCode::UpstreamUnavailable);
        assert_eq!(ErrorCode::from_status(502), ErrorCode::UpstreamUnavailable);
        assert_eq!(ErrorCode::from_status(302), ErrorCode::InternalError);
    }

    #[test]
    fn details_are_omitted_when_empty() {
        let err = ToolError::invalid_input("bad latitude");
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("details").is_none());

        let err = ToolError::from_status(429, "slow down").with_retry_after(30);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["details"]["upstreamStatus"], 429);
        assert_eq!(json["details"]["retryAfterSeconds"], 30);
    }

    #[test]
    fn codes_serialize_screaming_snake() {
        let json = serde_json::to_value(ErrorCode::OutOfCoverage).unwrap();
        assert_eq!(json, "OUT_OF_COVERAGE");
        let json = serde_json::to_value(ErrorCode::UpstreamUnavailable).unwrap();
        assert_eq!(json, "UPSTREAM_UNAVAILABLE");
    }

    #[test]
    fn location_detail_format() {
        let err = ToolError::out_of_coverage("outside nowcast coverage", 40.71, -74.01);
        assert_eq!(err.details.location.as_deref(), Some("40.71,-74.01"));
    }
}
