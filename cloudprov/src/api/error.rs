use thiserror::Error;
use tfrecon::TfreconError;

/// Error body returned by the control plane: `{"__type": "...", "message": "..."}`
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "__type", default)]
    pub error_type: String,
    #[serde(alias = "Message", default)]
    pub message: String,
}

impl ErrorBody {
    /// Short error code, with any namespace prefix (`ns#Code`) removed
    pub fn code(&self) -> &str {
        self.error_type
            .rsplit_once('#')
            .map(|(_, code)| code)
            .unwrap_or(&self.error_type)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}) {code}: {message}")]
    ApiError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid endpoint: {0}")]
    InvalidUrl(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("{code}: {message}")]
    NotFound { code: String, message: String },

    #[error("Too many requests, rate limited: {0}")]
    RateLimited(String),

    #[error("Service unavailable, retry later: {0}")]
    ServiceUnavailable(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl ApiError {
    /// Classifies an error response by HTTP status and error body
    pub fn from_response(status: u16, body: ErrorBody) -> Self {
        let code = body.code().to_string();
        let message = body.message.clone();

        if code.ends_with("NotFoundException")
            || (code == "ValidationException" && message.contains("Could not find"))
        {
            return ApiError::NotFound { code, message };
        }
        if code == "ThrottlingException" || code == "TooManyRequestsException" || status == 429 {
            return ApiError::RateLimited(message);
        }
        if code == "ConflictException" || code.starts_with("ResourceInUse") {
            return ApiError::Conflict(message);
        }
        if status == 401 || status == 403 {
            return ApiError::AuthError(message);
        }
        if status >= 500 {
            return ApiError::ServiceUnavailable(format!("{}: {}", code, message));
        }

        ApiError::ApiError {
            status,
            code,
            message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

impl From<ApiError> for TfreconError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound { code, message } => TfreconError::NotFound {
                type_name: code,
                id: message,
            },
            ApiError::RateLimited(message) => TfreconError::Throttled(message),
            ApiError::ServiceUnavailable(message) => TfreconError::Transport(message),
            ApiError::Timeout(secs) => {
                TfreconError::Transport(format!("request timed out after {} seconds", secs))
            }
            ApiError::Conflict(message) => TfreconError::Conflict(message),
            other => TfreconError::Custom(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(error_type: &str, message: &str) -> ErrorBody {
        ErrorBody {
            error_type: error_type.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn not_found_exceptions_are_classified() {
        let err = ApiError::from_response(400, body("NotFoundException", "upload missing"));
        assert!(err.is_not_found());

        let err = ApiError::from_response(
            400,
            body(
                "com.amazonaws.sagemaker#ValidationException",
                "Could not find endpoint configuration \"x\".",
            ),
        );
        assert!(err.is_not_found());

        let err = ApiError::from_response(400, body("ValidationException", "bad input"));
        assert!(matches!(err, ApiError::ApiError { status: 400, .. }));
    }

    #[test]
    fn throttling_and_server_errors_become_retryable() {
        let throttled: TfreconError =
            ApiError::from_response(400, body("ThrottlingException", "slow down")).into();
        assert!(throttled.is_retryable());

        let too_many: TfreconError = ApiError::from_response(429, ErrorBody::default()).into();
        assert!(too_many.is_retryable());

        let unavailable: TfreconError =
            ApiError::from_response(503, body("InternalFailure", "oops")).into();
        assert!(unavailable.is_retryable());
    }

    #[test]
    fn conflicts_and_auth_failures() {
        let err = ApiError::from_response(400, body("ResourceInUseException", "busy"));
        assert!(matches!(err, ApiError::Conflict(_)));

        let err = ApiError::from_response(403, body("AccessDeniedException", "no"));
        assert!(matches!(err, ApiError::AuthError(_)));

        let converted: TfreconError = err.into();
        assert!(!converted.is_retryable());
    }
}
