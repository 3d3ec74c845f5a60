use crate::protocol::chat::ApiErrorBody;

/// Error type shared by the decoder, the transport and the client.
///
/// Stream-level failures never escape the decode loop as `Err`; they are
/// delivered once, inside the terminal [`crate::stream::CompletionEvent::Failed`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream {
        status: u16,
        message: String,
        body: Option<ApiErrorBody>,
    },
    #[error("API error: {0}")]
    Api(ApiErrorBody),
    #[error("Decode error: {message} (line: {line})")]
    Decode { message: String, line: String },
}

/// Broad error category, mostly useful for deciding whether a caller-side retry
/// makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    Permission,
    RateLimit,
    ServerError,
    Protocol,
    Unknown,
}

/// Map an upstream HTTP status code to an error category.
#[must_use]
pub fn category_from_upstream_status(status: u16) -> ErrorCategory {
    match status {
        400 | 404 | 422 => ErrorCategory::InvalidRequest,
        401 => ErrorCategory::Authentication,
        403 => ErrorCategory::Permission,
        429 => ErrorCategory::RateLimit,
        500..=599 => ErrorCategory::ServerError,
        _ => ErrorCategory::Unknown,
    }
}

impl StreamError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::InvalidRequest(_) | StreamError::Config(_) => {
                ErrorCategory::InvalidRequest
            }
            StreamError::Transport(_) => ErrorCategory::ServerError,
            StreamError::Decode { .. } | StreamError::Api(_) => ErrorCategory::Protocol,
            StreamError::Upstream { status, .. } => category_from_upstream_status(*status),
        }
    }

    /// Build a decode error for a frame whose payload failed to parse.
    pub(crate) fn decode(err: &serde_json::Error, line: &str) -> Self {
        StreamError::Decode {
            message: err.to_string(),
            line: line.to_owned(),
        }
    }

    /// Returns `true` for transport failures and 429/5xx upstream statuses.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit | ErrorCategory::ServerError
        )
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        StreamError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Transport(err.to_string())
    }
}

impl From<crate::config::ConfigError> for StreamError {
    fn from(err: crate::config::ConfigError) -> Self {
        StreamError::Config(err.to_string())
    }
}

impl std::fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.type_, &self.code) {
            (Some(ty), Some(code)) => write!(f, "{} (type={ty}, code={code})", self.message),
            (Some(ty), None) => write!(f, "{} (type={ty})", self.message),
            (None, Some(code)) => write!(f, "{} (code={code})", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_status() {
        assert_eq!(category_from_upstream_status(401), ErrorCategory::Authentication);
        assert_eq!(category_from_upstream_status(429), ErrorCategory::RateLimit);
        assert_eq!(category_from_upstream_status(503), ErrorCategory::ServerError);
        assert_eq!(category_from_upstream_status(302), ErrorCategory::Unknown);
    }

    #[test]
    fn test_retryable() {
        assert!(StreamError::Transport("reset".into()).is_retryable());
        assert!(StreamError::Upstream {
            status: 429,
            message: "slow down".into(),
            body: None,
        }
        .is_retryable());
        assert!(!StreamError::Decode {
            message: "eof".into(),
            line: "data: {".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_api_error_display() {
        let body = ApiErrorBody {
            message: "bad key".into(),
            type_: Some("invalid_request_error".into()),
            param: None,
            code: Some("invalid_api_key".into()),
        };
        assert_eq!(
            StreamError::Api(body).to_string(),
            "API error: bad key (type=invalid_request_error, code=invalid_api_key)"
        );
    }
}
