//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError`, API, and config failures into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use perfdesk_config::ConfigError;
use perfdesk_core::{CoreError, FieldErrors};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(perfdesk::connection_failed),
        help(
            "Check that the server is reachable: {reason}\n\
             For self-signed staging servers try --insecure, or set ca_cert in your profile."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(perfdesk::auth_failed),
        help("Refresh your token with: perfdesk config set-token --profile {profile}")
    )]
    AuthFailed { profile: String, message: String },

    #[error("No API token configured for profile '{profile}'")]
    #[diagnostic(
        code(perfdesk::no_credentials),
        help(
            "Store one with: perfdesk config set-token --profile {profile}\n\
             Or set the PERFDESK_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(perfdesk::not_found))]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(perfdesk::api_error))]
    ApiError {
        code: String,
        message: String,
        status: Option<u16>,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(perfdesk::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid input:\n{details}")]
    #[diagnostic(
        code(perfdesk::invalid_form),
        help("Fix the fields listed above and run the command again.")
    )]
    InvalidForm { details: String },

    #[error("Another submission is still in progress")]
    #[diagnostic(code(perfdesk::busy))]
    Busy,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(perfdesk::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: perfdesk config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(perfdesk::no_config),
        help(
            "Create a profile with: perfdesk config init\n\
             Or pass --api-url / set PERFDESK_API_URL.\n\
             Config file: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(perfdesk::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(perfdesk::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Prompt failed: {0}")]
    #[diagnostic(code(perfdesk::interactive))]
    Prompt(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(perfdesk::serialize))]
    Serialize(String),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(perfdesk::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// One `field: message` line per validation error.
    pub fn invalid_form(errors: &FieldErrors) -> Self {
        let details = errors
            .iter()
            .map(|(field, message)| format!("  {field}: {message}"))
            .collect::<Vec<_>>()
            .join("\n");
        Self::InvalidForm { details }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::ApiError {
                status: Some(409), ..
            }
            | Self::Busy => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::InvalidForm { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Convert a shared error held in loader or mutation state.
    pub fn from_core(err: &CoreError, profile: &str) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed {
                profile: profile.into(),
                message: message.clone(),
            },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: *timeout_secs,
            },
            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                resource_type: entity_type.clone(),
                identifier: identifier.clone(),
            },
            CoreError::Validation { message } => Self::Validation {
                field: "input".into(),
                reason: message.clone(),
            },
            CoreError::MutationInFlight => Self::Busy,
            CoreError::Api {
                message,
                code,
                status,
            } => Self::ApiError {
                code: code
                    .clone()
                    .or_else(|| status.map(|s| s.to_string()))
                    .unwrap_or_else(|| "unknown".into()),
                message: message.clone(),
                status: *status,
            },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message.clone(),
            },
            other => Self::ApiError {
                code: "internal".into(),
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        Self::from_core(&err, "current")
    }
}

impl From<perfdesk_api::Error> for CliError {
    fn from(err: perfdesk_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        let auth: CliError = CoreError::AuthenticationFailed {
            message: "expired".into(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let conflict = CliError::from(CoreError::Api {
            message: "period closed".into(),
            code: None,
            status: Some(409),
        });
        assert_eq!(conflict.exit_code(), exit_code::CONFLICT);

        let mut errors = FieldErrors::new();
        errors.insert("name".into(), "required".into());
        let form = CliError::invalid_form(&errors);
        assert_eq!(form.exit_code(), exit_code::USAGE);
        assert!(form.to_string().contains("name: required"));
    }

    #[test]
    fn api_code_falls_back_to_status() {
        let err = CliError::from(CoreError::Api {
            message: "boom".into(),
            code: None,
            status: Some(500),
        });
        assert!(matches!(err, CliError::ApiError { ref code, .. } if code == "500"));
    }

    #[test]
    fn missing_token_maps_to_no_credentials() {
        let err = CliError::from(ConfigError::NoCredentials {
            profile: "staging".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
