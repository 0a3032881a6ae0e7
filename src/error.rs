//! # Error Types
//!
//! This module defines the error taxonomy used throughout `wayfarer`. All
//! public operations return `Result<T, WayfarerError>`; the variants map
//! directly onto the error kinds a caller needs to branch on: transport
//! failures, phase-tagged timeouts, HTTP status errors, size limits,
//! cancellation, misconfiguration, and plugin-raised errors.

use std::time::Duration;

use crate::response::Response;

/// Which phase of a request a [`WayfarerError::Timeout`] expired in.
///
/// Mirrors the structured timeout fields a caller may configure
/// (`lookup`/`connect`/`secureConnect` collapse into `Connect`, `response`
/// maps to `Response`, `send` maps to `Send`, and `request` is the overall
/// wall-clock deadline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Response,
    Send,
    Request,
}

impl std::fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimeoutPhase::Connect => "connect",
            TimeoutPhase::Response => "response",
            TimeoutPhase::Send => "send",
            TimeoutPhase::Request => "request",
        };
        f.write_str(s)
    }
}

/// HTTP-specific error raised when `throw_on_http_error` is set and the
/// final (non-redirect) response carries a 4xx/5xx status.
///
/// Carries the full [`Response`] so callers can inspect headers and body
/// after the fact, plus the method/URL of the request that produced it.
#[derive(Debug)]
pub struct HttpError {
    pub method: http::Method,
    pub url: String,
    pub response: Response,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "http error: {} {} -> status={}",
            self.method,
            self.url,
            self.response.status()
        )
    }
}

impl std::error::Error for HttpError {}

/// The main error type for all `wayfarer` operations.
///
/// # Variants
/// * `Network` - transport-level failure (DNS, connect, reset, ...)
/// * `Timeout` - a phase-tagged timeout expired
/// * `Http` - the response carried a 4xx/5xx status and `throw_on_http_error`
///   was set (304 is never an `Http` error, matching spec.md §7)
/// * `MaxSize` - a response exceeded the configured size limit
/// * `Validation` - bad URL, params, or options supplied by the caller
/// * `Cancellation` - the caller's signal was aborted before completion
/// * `Config` - misuse detected at client construction time
/// * `Plugin` - a plugin raised its own error (e.g. HAR strict-mode miss)
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WayfarerError {
    #[error("network error: {message} (code={code:?})")]
    Network {
        code: Option<String>,
        message: String,
    },

    #[error("timeout in phase {phase}: {timeout:?}")]
    Timeout {
        phase: TimeoutPhase,
        timeout: Duration,
    },

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("response exceeded max size: limit={limit}, observed={observed}")]
    MaxSize { limit: u64, observed: u64 },

    #[error("validation error: field={field}, value={value}")]
    Validation { field: String, value: String },

    #[error("request was cancelled")]
    Cancellation,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("plugin error: {0}")]
    Plugin(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl WayfarerError {
    pub fn network(message: impl Into<String>) -> Self {
        WayfarerError::Network {
            code: None,
            message: message.into(),
        }
    }

    pub fn network_with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        WayfarerError::Network {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn timeout(phase: TimeoutPhase, timeout: Duration) -> Self {
        WayfarerError::Timeout { phase, timeout }
    }

    pub fn validation(field: impl Into<String>, value: impl Into<String>) -> Self {
        WayfarerError::Validation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `true` for errors generally worth retrying (network failures and
    /// non-request-phase timeouts); used by the retry plugin's default
    /// predicate.
    pub fn is_retryable_by_default(&self) -> bool {
        matches!(
            self,
            WayfarerError::Network { .. }
                | WayfarerError::Timeout {
                    phase: TimeoutPhase::Connect | TimeoutPhase::Response | TimeoutPhase::Send,
                    ..
                }
        )
    }
}

/// Translates a `ureq` transport-level error into the `wayfarer` taxonomy.
///
/// `ureq::Error::StatusCode` never reaches here: the transport inspects
/// status itself and routes 4xx/5xx through the HTTP-error-raiser
/// middleware instead (spec.md §4.2.5).
impl From<ureq::Error> for WayfarerError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Timeout(_) => {
                WayfarerError::timeout(TimeoutPhase::Request, Duration::ZERO)
            }
            other => WayfarerError::network_with_code(error_code(&other), other.to_string()),
        }
    }
}

fn error_code(err: &ureq::Error) -> String {
    format!("{err:?}")
        .split(['(', ' '])
        .next()
        .unwrap_or("Unknown")
        .to_owned()
}

impl From<url::ParseError> for WayfarerError {
    fn from(err: url::ParseError) -> Self {
        WayfarerError::validation("url", err.to_string())
    }
}

impl From<serde_json::Error> for WayfarerError {
    fn from(err: serde_json::Error) -> Self {
        WayfarerError::validation("body", err.to_string())
    }
}
