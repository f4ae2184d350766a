//! Shared helpers for command handlers.

use std::path::Path;

use perfdesk_core::{KeyPart, SortDirection};

use crate::error::CliError;

/// Split `key=value`, rejecting empty keys.
pub fn parse_key_value<'a>(field: &str, raw: &'a str) -> Result<(&'a str, &'a str), CliError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(CliError::Validation {
            field: field.into(),
            reason: format!("expected KEY=VALUE, got '{raw}'"),
        }),
    }
}

/// Filter values keep their natural type so the query key and the query
/// string agree: `true`/`false` become booleans, integers stay integers.
pub fn filter_value(raw: &str) -> KeyPart {
    match raw {
        "true" => KeyPart::from(true),
        "false" => KeyPart::from(false),
        _ => raw
            .parse::<i64>()
            .map_or_else(|_| KeyPart::from(raw), KeyPart::from),
    }
}

/// Parse `field[:asc|desc]`. A bare field sorts descending.
pub fn parse_sort(raw: &str) -> Result<(String, SortDirection), CliError> {
    let (field, direction) = match raw.split_once(':') {
        Some((field, dir)) => {
            let direction = dir.parse::<SortDirection>().map_err(|_| CliError::Validation {
                field: "sort".into(),
                reason: format!("direction must be 'asc' or 'desc', got '{dir}'"),
            })?;
            (field, direction)
        }
        None => (raw, SortDirection::Desc),
    };
    if field.trim().is_empty() {
        return Err(CliError::Validation {
            field: "sort".into(),
            reason: "field name is empty".into(),
        });
    }
    Ok((field.trim().to_owned(), direction))
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// Map a dialoguer failure into `CliError`.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Prompt(e.to_string())
}

/// Read a JSON object for `--from-file` flags.
pub fn read_json_object(
    path: &Path,
) -> Result<serde_json::Map<String, serde_json::Value>, CliError> {
    let contents = std::fs::read_to_string(path)?;
    match serde_json::from_str(&contents)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(CliError::Validation {
            field: "from-file".into(),
            reason: "expected a JSON object".into(),
        }),
    }
}
