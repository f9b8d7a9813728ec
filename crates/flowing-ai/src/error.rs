//! Error types for flowing-ai

use thiserror::Error;

/// Result type alias using flowing-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to an LLM provider
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (type: {error_type})")]
    Api { error_type: String, message: String },

    /// Rate limit exceeded
    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Create an API error from type and message
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }
}

/// Map a non-success HTTP response to an [`Error`].
///
/// Providers call this after checking `status().is_success()`. The body is
/// expected to be a JSON error envelope but arbitrary text is tolerated.
pub(crate) fn from_http_failure(status: reqwest::StatusCode, body: &str) -> Error {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Error::Auth(extract_error_message(body).unwrap_or_else(|| status.to_string()));
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Error::RateLimited { retry_after: None };
    }

    match parse_error_body(body) {
        Some((error_type, message)) => Error::Api {
            error_type,
            message,
        },
        None => Error::api(status.as_str(), body.to_string()),
    }
}

/// Parse `{"error": {"type": ..., "message": ...}}` style bodies.
fn parse_error_body(body: &str) -> Option<(String, String)> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    let message = error.get("message")?.as_str()?.to_string();
    let error_type = error
        .get("type")
        .or_else(|| error.get("code"))
        .and_then(|t| t.as_str())
        .unwrap_or("api_error")
        .to_string();
    Some((error_type, message))
}

fn extract_error_message(body: &str) -> Option<String> {
    parse_error_body(body).map(|(_, message)| message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_maps_to_auth() {
        let body = r#"{"error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        let err = from_http_failure(reqwest::StatusCode::UNAUTHORIZED, body);
        match err {
            Error::Auth(msg) => assert!(msg.contains("invalid x-api-key")),
            other => panic!("expected Auth, got {:?}", other),
        }
    }

    #[test]
    fn test_too_many_requests_maps_to_rate_limited() {
        let err = from_http_failure(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[test]
    fn test_error_envelope_parsed() {
        let body = r#"{"error":{"type":"overloaded_error","message":"try later"}}"#;
        let err = from_http_failure(reqwest::StatusCode::INTERNAL_SERVER_ERROR, body);
        match err {
            Error::Api {
                error_type,
                message,
            } => {
                assert_eq!(error_type, "overloaded_error");
                assert_eq!(message, "try later");
            }
            other => panic!("expected Api, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_body_kept_verbatim() {
        let err = from_http_failure(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        match err {
            Error::Api { message, .. } => assert_eq!(message, "upstream down"),
            other => panic!("expected Api, got {:?}", other),
        }
    }
}
