//! Shared HTTP utilities for the redirect engine workspace.
//!
//! Provides framework-agnostic JSON error envelopes and time formatting used
//! by the api-server (and any future boundary crates).

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::SystemTime;

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Resource not found",
        "bad_request" | "invalid_request" => "Bad request",
        "conflict" => "Resource already exists",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Wrap a list of validation findings in the list envelope.
///
/// Returns: `{"errors": [ ... ]}`
pub fn json_validation_errors<T: serde::Serialize>(errors: &[T]) -> serde_json::Value {
    serde_json::json!({ "errors": errors })
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
///
/// Returns an error if the string is not a valid RFC3339 timestamp.
pub fn parse_rfc3339(s: &str) -> Result<SystemTime, chrono::ParseError> {
    let dt = DateTime::parse_from_rfc3339(s)?;
    Ok(dt.with_timezone(&Utc).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_err_fills_known_messages() {
        let v = json_err("not_found");
        assert_eq!(v["error"]["code"], "not_found");
        assert_eq!(v["error"]["message"], "Resource not found");

        let v = json_err("some_custom_code");
        assert_eq!(v["error"]["message"], "some_custom_code");
    }

    #[test]
    fn validation_envelope_holds_the_list() {
        #[derive(serde::Serialize)]
        struct Finding {
            code: &'static str,
        }
        let v = json_validation_errors(&[Finding { code: "redirect_loop" }]);
        assert_eq!(v["errors"][0]["code"], "redirect_loop");
    }

    #[test]
    fn rfc3339_roundtrip() {
        let t = SystemTime::UNIX_EPOCH;
        let s = system_time_to_rfc3339(t);
        assert_eq!(s, "1970-01-01T00:00:00Z");
        assert_eq!(parse_rfc3339(&s).expect("parse"), t);
    }
}
