// ── Core error types ──
//
// Everything a controller surfaces through `error` / `is_error` state.
// Transport crates translate their own errors into these variants via
// `From` impls, so consumers never match on HTTP or JSON failures.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Submit errors ────────────────────────────────────────────────
    #[error("Submission failed: {message}")]
    Submit { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("A submission is already in flight")]
    MutationInFlight,

    #[error("Cached value for {key} is not of the requested type")]
    KeyTypeMismatch { key: String },

    // ── Transport-derived errors ─────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// Server-side error code, when the response carried one.
        code: Option<String>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            Self::NotFound { .. } => Some(404),
            Self::AuthenticationFailed { .. } => Some(401),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_variant() {
        let api = CoreError::Api {
            message: "bad gateway".into(),
            code: None,
            status: Some(502),
        };
        assert_eq!(api.status(), Some(502));
        assert_eq!(
            CoreError::AuthenticationFailed {
                message: "expired".into()
            }
            .status(),
            Some(401)
        );
        assert_eq!(CoreError::MutationInFlight.status(), None);
    }
}
