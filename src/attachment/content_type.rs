//! MIME type inference for attachments.

use crate::errors::{ConnectorError, ConnectorResult};

/// Fallback when nothing better is known.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Guesses a MIME type from a filename's extension.
pub fn guess_mime_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}

/// Checks that an explicit MIME type is well formed (`type/subtype`).
pub fn validate_mime_type(value: &str) -> ConnectorResult<String> {
    let trimmed = value.trim();
    trimmed
        .parse::<mime::Mime>()
        .map(|_| trimmed.to_string())
        .map_err(|e| {
            ConnectorError::validation(format!("Invalid MIME type {:?}: {}", value, e)).with_cause(e)
        })
}

/// Picks the explicit type when it is a well-formed `type/subtype`,
/// else guesses from the filename.
pub fn effective_mime_type(filename: &str, explicit: Option<&str>) -> String {
    match explicit.map(str::trim).filter(|v| !v.is_empty()) {
        Some(explicit) => validate_mime_type(explicit).unwrap_or_else(|_e| {
            #[cfg(feature = "tracing")]
            tracing::debug!(attachment = %filename, error = %_e, "Ignoring malformed content type");
            guess_mime_type(filename)
        }),
        None => guess_mime_type(filename),
    }
}
