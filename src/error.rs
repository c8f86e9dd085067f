//! Error taxonomy for the synchronization layer.
//!
//! Every failure a fetch can surface is normalized into [`ApiError`] by the
//! request executor; the cache stores errors verbatim, so the type is `Clone`.

use thiserror::Error;

use rivolo_api_types::{ErrorDetail, ErrorResponse, FieldError};

/// Normalized failure of an API request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Network-level failure: connect, timeout, or body read. Always
    /// retryable; never cached as a permanent outcome.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected the request with structured field errors.
    #[error("{message}")]
    Validation { message: String },

    /// The server reported a domain-level failure.
    #[error("{0}")]
    Application(String),

    /// A payload could not be parsed as the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// True when retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

/// Turns a non-2xx response body into an [`ApiError`].
///
/// Structured validation bodies are collapsed into a single human-readable
/// message; string details pass through verbatim.
pub(crate) fn from_error_body(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse {
            detail: ErrorDetail::Fields(fields),
        }) => ApiError::Validation {
            message: compose_validation_message(&fields),
        },
        Ok(ErrorResponse {
            detail: ErrorDetail::Message(message),
        }) => ApiError::Application(message),
        Err(_) => ApiError::Application(format!("HTTP {status}: {body}")),
    }
}

/// First field error wins; the field name from the innermost `loc` segment
/// replaces the word "value" in the message, and the result is capitalized.
fn compose_validation_message(fields: &[FieldError]) -> String {
    let Some(first) = fields.first() else {
        return "Validation failed".to_string();
    };
    let message = match first.loc.last() {
        Some(field) => first.msg.replace("value", field),
        None => first.msg.clone(),
    };
    capitalize(&message)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_substitutes_field_name() {
        let body = r#"{"detail":[{"loc":["body","email"],"msg":"value is not a valid email","type":"value_error.email"}]}"#;
        let err = from_error_body(422, body);
        assert_eq!(
            err,
            ApiError::Validation {
                message: "Email is not a valid email".to_string()
            }
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn string_detail_maps_to_application() {
        let err = from_error_body(404, r#"{"detail":"job not found"}"#);
        assert_eq!(err, ApiError::Application("job not found".to_string()));
    }

    #[test]
    fn unparseable_body_keeps_status_and_text() {
        let err = from_error_body(502, "<html>bad gateway</html>");
        assert_eq!(
            err,
            ApiError::Application("HTTP 502: <html>bad gateway</html>".to_string())
        );
    }

    #[test]
    fn transport_is_the_only_retryable_variant() {
        assert!(ApiError::Transport("timed out".into()).is_retryable());
        assert!(!ApiError::Application("nope".into()).is_retryable());
        assert!(!ApiError::Decode("bad json".into()).is_retryable());
    }
}
