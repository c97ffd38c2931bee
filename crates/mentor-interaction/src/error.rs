//! Completion error taxonomy.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised by the completion client.
///
/// The taxonomy is derived from the transport response: 401 maps to
/// `Auth`, 429 to the upstream provider's own rate limit (distinct from
/// the local limiter), 5xx to `Server`, no response at all to `Network`,
/// any other error status to `Api`, and a malformed streaming frame to
/// `Decode`.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// Upstream rejected the credentials (HTTP 401).
    #[error("authentication rejected by the completion endpoint: {0}")]
    Auth(String),

    /// The upstream provider's own rate limit (HTTP 429).
    #[error("upstream rate limit exceeded: {0}")]
    UpstreamRateLimit(String),

    /// Upstream server failure (HTTP 5xx).
    #[error("completion endpoint server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// No response received from the endpoint.
    #[error("network error contacting the completion endpoint: {0}")]
    Network(String),

    /// Any other upstream error status.
    #[error("completion endpoint returned an error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A streaming frame could not be decoded.
    #[error("malformed streaming frame: {0}")]
    Decode(String),

    /// Anything uncategorized.
    #[error("unexpected completion error: {0}")]
    Unknown(String),
}

impl CompletionError {
    /// Classifies a non-success HTTP status and its error body.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        let message = extract_error_message(&body);
        match status {
            StatusCode::UNAUTHORIZED => Self::Auth(message),
            StatusCode::TOO_MANY_REQUESTS => Self::UpstreamRateLimit(message),
            _ if status.is_server_error() => Self::Server {
                status: status.as_u16(),
                message,
            },
            _ => Self::Api {
                status: status.as_u16(),
                message,
            },
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        // errors with a status are classified before a body is read; by the
        // time a reqwest::Error surfaces here no response was received
        Self::Network(err.to_string())
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pulls the upstream error message out of a JSON error body, falling
/// back to the raw body text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            CompletionError::from_status(StatusCode::UNAUTHORIZED, String::new()),
            CompletionError::Auth(_)
        ));
        assert!(matches!(
            CompletionError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            CompletionError::UpstreamRateLimit(_)
        ));
        assert!(matches!(
            CompletionError::from_status(StatusCode::BAD_GATEWAY, String::new()),
            CompletionError::Server { status: 502, .. }
        ));
        assert!(matches!(
            CompletionError::from_status(StatusCode::BAD_REQUEST, String::new()),
            CompletionError::Api { status: 400, .. }
        ));
    }

    #[test]
    fn test_error_message_extracted_from_json_body() {
        let body = r#"{"error":{"message":"model not found"}}"#.to_string();
        let err = CompletionError::from_status(StatusCode::NOT_FOUND, body);
        assert_eq!(err.to_string(), "completion endpoint returned an error (404): model not found");
    }

    #[test]
    fn test_error_message_falls_back_to_raw_body() {
        let err = CompletionError::from_status(StatusCode::BAD_REQUEST, "plain failure".to_string());
        assert!(err.to_string().contains("plain failure"));
    }
}
