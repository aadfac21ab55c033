use crate::api::{ApiResponse, ErrorBody};
use crate::llm_providers::BackendError;
use crate::quiz_service::PipelineError;
use crate::rate_limiter::WINDOW_SECONDS;
use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info, warn};

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Centralized error types for consistent API error handling
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Validation error: {}", .field_errors.join("; "))]
    ValidationError { message: String, field_errors: Vec<String> },

    #[error("Invalid input type: {0}")]
    InvalidInputType(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64, limit: u32 },

    #[error("Backend rate limited: {0}")]
    BackendRateLimited(String),

    #[error("Backend authentication failed: {0}")]
    BackendAuthError(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend timeout: {0}")]
    BackendTimeout(String),

    #[error("Response parse error: {0}")]
    ResponseParseError(String),
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub request_id: Option<String>,
    pub client_id: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            request_id: None,
            client_id: None,
        }
    }

    pub fn with_request_id(mut self, id: &str) -> Self {
        self.request_id = Some(id.to_string());
        self
    }

    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = Some(id.to_string());
        self
    }
}

impl ApiError {
    /// Stable machine-readable kind placed in the error envelope
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::ValidationError { .. } => "ValidationError",
            ApiError::InvalidInputType(_) => "InvalidInputType",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::RateLimitExceeded { .. } => "RateLimitExceeded",
            ApiError::BackendRateLimited(_) => "BackendRateLimited",
            ApiError::BackendAuthError(_) => "BackendAuthError",
            ApiError::BackendUnavailable(_) => "BackendUnavailable",
            ApiError::BackendTimeout(_) => "BackendTimeout",
            ApiError::ResponseParseError(_) => "ResponseParseError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError { .. } | ApiError::InvalidInputType(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::RateLimitExceeded { .. } | ApiError::BackendRateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BackendAuthError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BackendUnavailable(_) | ApiError::BackendTimeout(_) | ApiError::ResponseParseError(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// The message shown to clients. Backend and parser details stay in logs.
    fn client_message(&self) -> String {
        match self {
            ApiError::ValidationError { message, .. } => message.clone(),
            ApiError::InvalidInputType(detail) | ApiError::BadRequest(detail) => detail.clone(),
            ApiError::RateLimitExceeded { retry_after_seconds, .. } => format!(
                "Too many requests. Please retry in {} seconds.",
                retry_after_seconds
            ),
            ApiError::BackendRateLimited(_) => {
                "AI service is receiving too many requests. Please try again shortly.".to_string()
            }
            ApiError::BackendAuthError(_) | ApiError::BackendUnavailable(_) => {
                "AI service temporarily unavailable. Please try again.".to_string()
            }
            ApiError::BackendTimeout(_) => "AI service took too long to respond. Please try again.".to_string(),
            ApiError::ResponseParseError(_) => {
                "AI service returned an unusable quiz. Please try again.".to_string()
            }
        }
    }

    fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            ApiError::RateLimitExceeded { retry_after_seconds, .. } => Some(*retry_after_seconds),
            ApiError::BackendRateLimited(_) => Some(WINDOW_SECONDS as u64),
            _ => None,
        }
    }

    fn log(&self, context: &ErrorContext) {
        match self {
            ApiError::ValidationError { .. } | ApiError::InvalidInputType(_) | ApiError::BadRequest(_) => {
                warn!(
                    operation = %context.operation,
                    request_id = ?context.request_id,
                    client_id = ?context.client_id,
                    kind = self.kind(),
                    error = %self,
                    "Rejected invalid request"
                );
            }
            ApiError::RateLimitExceeded { .. } => {
                info!(
                    operation = %context.operation,
                    request_id = ?context.request_id,
                    client_id = ?context.client_id,
                    kind = self.kind(),
                    error = %self,
                    "Request denied by rate limiter"
                );
            }
            _ => {
                error!(
                    operation = %context.operation,
                    request_id = ?context.request_id,
                    client_id = ?context.client_id,
                    kind = self.kind(),
                    error = %self,
                    "Quiz generation failed"
                );
            }
        }
    }

    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(self, context: ErrorContext) -> Response {
        self.log(&context);

        let status = self.status_code();
        let retry_after = self.retry_after_seconds();
        let field_errors = match &self {
            ApiError::ValidationError { field_errors, .. } => Some(field_errors.clone()),
            _ => None,
        };

        let body = ErrorBody {
            kind: self.kind().to_string(),
            message: self.client_message(),
            field_errors,
            retry_after_seconds: retry_after,
        };

        let mut response = (status, Json(ApiResponse::<()>::error(body))).into_response();

        if let Some(seconds) = retry_after {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(seconds));
            if let ApiError::RateLimitExceeded { limit, .. } = self {
                headers.insert(HeaderName::from_static(RATE_LIMIT_LIMIT_HEADER), HeaderValue::from(limit));
                headers.insert(HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER), HeaderValue::from(0u32));
            }
        }

        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.to_response_with_context(ErrorContext::new("unknown"))
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::RateLimited(detail) => ApiError::BackendRateLimited(detail),
            BackendError::AuthenticationFailed(detail) => ApiError::BackendAuthError(detail),
            BackendError::Backend(detail) => ApiError::BackendUnavailable(detail),
            BackendError::Timeout(detail) => ApiError::BackendTimeout(detail),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidInput(e) => ApiError::InvalidInputType(e.to_string()),
            PipelineError::Validation(field_errors) => ApiError::ValidationError {
                message: "Request validation failed".to_string(),
                field_errors,
            },
            PipelineError::RateLimited(admission) => ApiError::RateLimitExceeded {
                retry_after_seconds: admission.retry_after_seconds,
                limit: admission.limit,
            },
            PipelineError::Backend(e) => e.into(),
            PipelineError::Parse(e) => ApiError::ResponseParseError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::Admission;
    use crate::response_parser::ParseError;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("generate_quiz")
            .with_request_id("123")
            .with_client_id("10.0.0.1");

        assert_eq!(context.operation, "generate_quiz");
        assert_eq!(context.request_id, Some("123".to_string()));
        assert_eq!(context.client_id, Some("10.0.0.1".to_string()));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::ValidationError { message: "m".into(), field_errors: vec![] }, StatusCode::BAD_REQUEST),
            (ApiError::InvalidInputType("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::RateLimitExceeded { retry_after_seconds: 5, limit: 60 }, StatusCode::TOO_MANY_REQUESTS),
            (ApiError::BackendRateLimited("x".into()), StatusCode::TOO_MANY_REQUESTS),
            (ApiError::BackendAuthError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::BackendUnavailable("x".into()), StatusCode::BAD_GATEWAY),
            (ApiError::BackendTimeout("x".into()), StatusCode::BAD_GATEWAY),
            (ApiError::ResponseParseError("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{:?}", error);
        }
    }

    #[test]
    fn test_pipeline_errors_convert() {
        let admission = Admission { allowed: false, retry_after_seconds: 17, remaining: 0, limit: 3 };
        assert_eq!(
            ApiError::from(PipelineError::RateLimited(admission)),
            ApiError::RateLimitExceeded { retry_after_seconds: 17, limit: 3 }
        );
        assert_eq!(
            ApiError::from(PipelineError::Backend(BackendError::Timeout("slow".into()))).kind(),
            "BackendTimeout"
        );
        assert_eq!(
            ApiError::from(PipelineError::Parse(ParseError::NoJsonFound)).kind(),
            "ResponseParseError"
        );
    }

    #[test]
    fn test_rate_limit_response_headers() {
        let response = ApiError::RateLimitExceeded { retry_after_seconds: 42, limit: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
        assert_eq!(response.headers()[RATE_LIMIT_LIMIT_HEADER], "60");
        assert_eq!(response.headers()[RATE_LIMIT_REMAINING_HEADER], "0");
    }

    #[test]
    fn test_backend_details_are_not_exposed() {
        let error = ApiError::BackendUnavailable("502 from upstream at 10.1.2.3".into());
        assert!(!error.client_message().contains("10.1.2.3"));
    }
}
