//! Inference service error types.
//!
//! Errors are classified for reporting only. No component retries: an error
//! from the service ends the execution session.

/// Error from inference API calls.
#[derive(Debug)]
pub struct LlmError {
    /// The kind of error
    pub kind: LlmErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
}

impl LlmError {
    /// Build an error from an HTTP status and response body.
    pub fn from_status(status_code: u16, message: String) -> Self {
        Self {
            kind: classify_http_status(status_code),
            status_code: Some(status_code),
            message,
        }
    }

    /// Create a network error.
    pub fn network_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::NetworkError,
            status_code: None,
            message,
        }
    }

    /// Create a parse error.
    pub fn parse_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::ParseError,
            status_code: None,
            message,
        }
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Classification of inference errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Rate limited or quota exhausted (429)
    RateLimited,
    /// Missing or rejected credentials (401, 403)
    Unauthorized,
    /// Other client error (400, 404, ...)
    ClientError,
    /// Server error (5xx)
    ServerError,
    /// Network error (connection failed, timeout)
    NetworkError,
    /// Response could not be parsed
    ParseError,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::RateLimited => write!(f, "Quota exceeded"),
            LlmErrorKind::Unauthorized => write!(f, "Authentication failed"),
            LlmErrorKind::ClientError => write!(f, "Client error"),
            LlmErrorKind::ServerError => write!(f, "Server error"),
            LlmErrorKind::NetworkError => write!(f, "Network error"),
            LlmErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        401 | 403 => LlmErrorKind::Unauthorized,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(401), LlmErrorKind::Unauthorized);
        assert_eq!(classify_http_status(403), LlmErrorKind::Unauthorized);
        assert_eq!(classify_http_status(400), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(404), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(500), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
    }

    #[test]
    fn test_display_includes_status() {
        let err = LlmError::from_status(429, "RESOURCE_EXHAUSTED".to_string());
        assert_eq!(err.to_string(), "Quota exceeded (HTTP 429): RESOURCE_EXHAUSTED");

        let err = LlmError::network_error("Connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: Connection refused");
    }
}
