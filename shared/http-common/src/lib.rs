//! Shared HTTP utilities for the voting service workspace.
//!
//! Provides the common JSON error body builders and time helpers used by
//! api-server.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::SystemTime;

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create an error JSON with a default message based on the code.
///
/// Returns: `{"error": "<default message>"}` — the flat shape the voting
/// frontend expects.
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "unauthorized" => "Please log in",
        "not_found" => "Resource not found",
        "already_voted" => "Already voted",
        "bad_request" => "Bad request",
        "internal" | "error" => "Server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({ "error": message })
}

/// Create an error JSON with an explicit message.
///
/// Returns: `{"error": "<message>"}`
pub fn json_error_with_message(message: &str) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

// ============================================================================
// Time Utilities
// ============================================================================

/// Convert SystemTime to RFC3339 string (seconds precision, UTC).
pub fn system_time_to_rfc3339(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC3339 string to SystemTime.
pub fn parse_rfc3339(s: &str) -> Result<SystemTime, chrono::ParseError> {
    let dt = DateTime::parse_from_rfc3339(s)?;
    Ok(dt.with_timezone(&Utc).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_err() {
        assert_eq!(
            json_err("unauthorized"),
            serde_json::json!({"error": "Please log in"})
        );
        assert_eq!(
            json_err("already_voted"),
            serde_json::json!({"error": "Already voted"})
        );
        // Unknown code falls back to code as message
        assert_eq!(
            json_err("custom_error"),
            serde_json::json!({"error": "custom_error"})
        );
    }

    #[test]
    fn test_json_error_with_message() {
        assert_eq!(
            json_error_with_message("Invalid input"),
            serde_json::json!({"error": "Invalid input"})
        );
    }

    #[test]
    fn test_rfc3339_round_trip() {
        let t = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        let s = system_time_to_rfc3339(t);
        assert_eq!(parse_rfc3339(&s).expect("parses"), t);
    }
}
