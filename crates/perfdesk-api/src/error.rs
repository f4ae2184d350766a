use perfdesk_core::CoreError;
use thiserror::Error;

/// Top-level error type for the `perfdesk-api` crate.
///
/// Covers transport, authentication, server-reported, and decoding
/// failures. `perfdesk-core` state only ever sees these as [`CoreError`].
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The server rejected the request as unauthorized.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The bearer token was missing, malformed, or expired.
    #[error("Invalid or expired API token")]
    InvalidToken,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Server ──────────────────────────────────────────────────────
    /// Structured error reported by the server.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: u16,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl From<Error> for CoreError {
    fn from(err: Error) -> Self {
        match err {
            Error::Authentication { message } => CoreError::AuthenticationFailed { message },
            Error::InvalidToken => CoreError::AuthenticationFailed {
                message: "Invalid or expired API token".into(),
            },
            Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e.url().map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Error::Api {
                message,
                code,
                status: 404,
            } => CoreError::NotFound {
                entity_type: code.unwrap_or_else(|| "resource".into()),
                identifier: message,
            },
            Error::Api {
                message,
                code,
                status,
            } => CoreError::Api {
                message,
                code,
                status: Some(status),
            },
            Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
