use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::{
    errors::{ApiError, ErrorContext, RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER},
    models::ParsedQuizResult,
    quiz_service::{QuizService, ServiceStats},
};

// Import logging macros
use crate::{log_api_start, log_api_success, log_api_warn};

pub const SERVICE_NAME: &str = "learning-generator";

#[derive(Clone)]
pub struct AppState {
    pub quiz_service: QuizService,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub from_cache: bool,
    pub prompt_hash: String,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            metadata: None,
            error: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn error(body: ErrorBody) -> Self {
        Self {
            success: false,
            data: None,
            metadata: None,
            error: Some(body),
        }
    }
}

/// Best-effort client identity for rate limiting: first `X-Forwarded-For`
/// hop, then `X-Real-IP`, then the socket peer.
pub fn client_identifier(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn generate_quiz(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    log_api_start!("generate_quiz");
    let client_id = client_identifier(&headers, connect_info.map(|ConnectInfo(addr)| addr));

    let Json(raw_request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            log_api_warn!("generate_quiz", client_id = client_id, rejection.body_text());
            return ApiError::BadRequest("Request body must be a valid JSON object".to_string())
                .to_response_with_context(ErrorContext::new("generate_quiz").with_client_id(&client_id));
        }
    };

    let request_id = Uuid::new_v4();
    match state.quiz_service.generate_with_id(request_id, &client_id, &raw_request).await {
        Ok(outcome) => {
            let request_id = outcome.request_id.to_string();
            let message = if outcome.from_cache {
                "quiz served from cache"
            } else {
                "quiz generated"
            };
            log_api_success!("generate_quiz", request_id = request_id, message);

            let body: ApiResponse<ParsedQuizResult> = ApiResponse::success(outcome.quiz).with_metadata(ResponseMetadata {
                from_cache: outcome.from_cache,
                prompt_hash: outcome.prompt_hash,
                request_id,
            });

            let mut response = Json(body).into_response();
            let response_headers = response.headers_mut();
            response_headers.insert(
                HeaderName::from_static(RATE_LIMIT_LIMIT_HEADER),
                HeaderValue::from(outcome.admission.limit),
            );
            response_headers.insert(
                HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
                HeaderValue::from(outcome.admission.remaining),
            );
            response
        }
        Err(e) => ApiError::from(e).to_response_with_context(
            ErrorContext::new("generate_quiz")
                .with_request_id(&request_id.to_string())
                .with_client_id(&client_id),
        ),
    }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.quiz_service.backend_name(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn stats(State(state): State<AppState>) -> Json<ApiResponse<ServiceStats>> {
    let stats = state.quiz_service.stats().await;
    log_api_success!("stats", count = stats.total_requests, "statistics collected");
    Json(ApiResponse::success(stats))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(generate_quiz))
        .route("/health", get(health))
        .route("/stats", get(stats))
        // Prefixed aliases used by the web client
        .route("/api/generate", post(generate_quiz))
        .route("/api/health", get(health))
        .route("/api/stats", get(stats))
        .with_state(state)
}
