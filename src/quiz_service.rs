use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::clock::{SharedClock, SystemClock};
use crate::config::QuizConfig;
use crate::llm_providers::{BackendError, GenerationBackend, DEFAULT_IMAGE_URL};
use crate::models::{Language, ParsedQuizResult, ValidationOutcome};
use crate::prompt_builder::{prompt_hash, PromptBuilder};
use crate::quiz_cache::{CacheEntrySummary, QuizCache};
use crate::rate_limiter::{Admission, RateLimiter};
use crate::response_parser::{ParseError, ResponseParser};
use crate::validation::{InvalidInputType, RequestValidator, ValidationLimits};

// Import logging macros
use crate::{log_performance, log_service_error, log_service_start, log_service_success, log_service_warn};

const SERVICE: &str = "quiz_service";

/// Terminal failure of one pipeline run, tagged by the stage that failed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputType),

    #[error("ValidationError: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("RateLimitExceeded: retry after {} seconds", .0.retry_after_seconds)]
    RateLimited(Admission),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidInput(_) => "InvalidInputType",
            PipelineError::Validation(_) => "ValidationError",
            PipelineError::RateLimited(_) => "RateLimitExceeded",
            PipelineError::Backend(e) => e.kind(),
            PipelineError::Parse(e) => e.kind(),
        }
    }
}

/// Successful pipeline run
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub quiz: ParsedQuizResult,
    pub from_cache: bool,
    pub prompt_hash: String,
    pub request_id: Uuid,
    pub admission: Admission,
}

#[derive(Debug, Default)]
struct PipelineCounters {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    backend_calls: AtomicU64,
    cache_hits: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub total_requests: u64,
    pub total_errors: u64,
    pub backend_calls: u64,
    pub cache_hits: u64,
    pub success_rate: f64,
    pub cache_size: usize,
    pub expired_entries: usize,
    pub cache_ttl_seconds: i64,
    pub cache_max_entries: Option<usize>,
    pub rate_limit_per_minute: u32,
    pub entries: Vec<CacheEntrySummary>,
}

/// Composes validation, admission, prompt rendering, caching, generation and
/// parsing into one request pipeline.
///
/// The rate limiter and cache are the only shared mutable state; clones of
/// the service share them. No lock is held while the backend is called, so
/// two concurrent identical requests may both miss and both generate.
#[derive(Clone)]
pub struct QuizService {
    validator: RequestValidator,
    prompt_builder: PromptBuilder,
    rate_limiter: RateLimiter,
    cache: QuizCache,
    backend: Arc<dyn GenerationBackend>,
    counters: Arc<PipelineCounters>,
}

impl QuizService {
    pub fn new(config: &QuizConfig, backend: Arc<dyn GenerationBackend>) -> Self {
        Self::with_clock(config, backend, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &QuizConfig, backend: Arc<dyn GenerationBackend>, clock: SharedClock) -> Self {
        let default_language = config.default_language().unwrap_or(Language::English);
        let limits = ValidationLimits {
            max_questions: config.max_questions,
            max_answers: config.max_answers,
        };

        Self {
            validator: RequestValidator::new(limits),
            prompt_builder: PromptBuilder::new(default_language),
            rate_limiter: RateLimiter::with_clock(config.rate_limit_per_minute, clock.clone()),
            cache: QuizCache::with_clock(config.cache_ttl(), config.cache_max_entries, clock),
            backend,
            counters: Arc::new(PipelineCounters::default()),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn cache(&self) -> &QuizCache {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Run one request through the pipeline. Nothing is retried; the first
    /// failing stage ends the run.
    pub async fn generate(&self, client_id: &str, raw_request: &Value) -> Result<GenerationOutcome, PipelineError> {
        self.generate_with_id(Uuid::new_v4(), client_id, raw_request).await
    }

    /// [`QuizService::generate`] under a caller-chosen request id, so the
    /// caller can tag its own error logs with it
    pub async fn generate_with_id(
        &self,
        request_id: Uuid,
        client_id: &str,
        raw_request: &Value,
    ) -> Result<GenerationOutcome, PipelineError> {
        let started = Instant::now();
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);
        log_service_start!(SERVICE, "generate", request_id = request_id, client_id = client_id);

        match self.run(request_id, client_id, raw_request).await {
            Ok(outcome) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                log_service_success!(
                    SERVICE,
                    "generate",
                    request_id = request_id,
                    from_cache = outcome.from_cache,
                    duration_ms = duration_ms
                );
                log_performance!("generate_quiz", duration_ms = duration_ms, from_cache = outcome.from_cache);
                Ok(outcome)
            }
            Err(e) => {
                self.counters.total_errors.fetch_add(1, Ordering::Relaxed);
                log_service_error!(SERVICE, "generate", request_id = request_id, error = e);
                Err(e)
            }
        }
    }

    async fn run(&self, request_id: Uuid, client_id: &str, raw_request: &Value) -> Result<GenerationOutcome, PipelineError> {
        let request = match self.validator.validate(raw_request)? {
            ValidationOutcome::Valid(request) => request,
            ValidationOutcome::Invalid(errors) => return Err(PipelineError::Validation(errors)),
        };

        let admission = self.rate_limiter.admit(client_id).await;
        if !admission.allowed {
            return Err(PipelineError::RateLimited(admission));
        }

        let prompt = self.prompt_builder.build(&request);
        let key = prompt_hash(&prompt);

        if let Some(quiz) = self.cache.get(&key).await {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(GenerationOutcome {
                quiz,
                from_cache: true,
                prompt_hash: key,
                request_id,
                admission,
            });
        }

        self.counters.backend_calls.fetch_add(1, Ordering::Relaxed);
        let raw_text = self.backend.generate(&prompt).await?;

        let mut quiz = ResponseParser::parse(&raw_text).inspect_err(|e| {
            tracing::debug!(request_id = %request_id, raw_response = %raw_text, "Unparseable backend response");
            log_service_warn!(SERVICE, "parse_response", request_id = request_id, e.kind());
        })?;

        if quiz.questions.len() != request.question_count as usize {
            log_service_warn!(
                SERVICE,
                "parse_response",
                request_id = request_id,
                format!("requested {} questions, backend returned {}", request.question_count, quiz.questions.len())
            );
        }

        quiz.image_url = Some(self.illustration(request_id, &request.topic).await);

        self.cache.put(&key, quiz.clone()).await;

        Ok(GenerationOutcome {
            quiz,
            from_cache: false,
            prompt_hash: key,
            request_id,
            admission,
        })
    }

    /// Image failures never fail the request
    async fn illustration(&self, request_id: Uuid, topic: &str) -> String {
        match self.backend.illustrate(topic).await {
            Ok(url) => url,
            Err(e) => {
                log_service_warn!(
                    SERVICE,
                    "illustrate",
                    request_id = request_id,
                    format!("using default image: {}", e)
                );
                DEFAULT_IMAGE_URL.to_string()
            }
        }
    }

    pub async fn stats(&self) -> ServiceStats {
        let total_requests = self.counters.total_requests.load(Ordering::Relaxed);
        let total_errors = self.counters.total_errors.load(Ordering::Relaxed);
        let success_rate = if total_requests == 0 {
            0.0
        } else {
            (total_requests.saturating_sub(total_errors)) as f64 / total_requests as f64 * 100.0
        };
        let cache = self.cache.stats().await;

        ServiceStats {
            total_requests,
            total_errors,
            backend_calls: self.counters.backend_calls.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            success_rate,
            cache_size: cache.size,
            expired_entries: cache.expired_entries,
            cache_ttl_seconds: cache.ttl_seconds,
            cache_max_entries: cache.max_entries,
            rate_limit_per_minute: self.rate_limiter.ceiling(),
            entries: cache.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_providers::{LLMProvider, MockProvider};
    use serde_json::json;

    fn service() -> QuizService {
        QuizService::new(&QuizConfig::default(), Arc::new(LLMProvider::Mock(MockProvider)))
    }

    #[tokio::test]
    async fn test_mock_backend_round_trip() {
        let service = service();
        let request = json!({
            "topic": "Artificial Intelligence",
            "difficulty": "beginner",
            "questionCount": 2,
            "language": "english"
        });

        let first = service.generate("127.0.0.1", &request).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.prompt_hash.len(), 16);

        let second = service.generate("127.0.0.1", &request).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.quiz, first.quiz);
        assert_ne!(second.request_id, first.request_id);

        let stats = service.stats().await;
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.backend_calls, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_size, 1);
        assert_eq!(stats.success_rate, 100.0);
    }

    #[tokio::test]
    async fn test_generated_quiz_carries_default_image() {
        let service = service();
        let request = json!({
            "topic": "Artificial Intelligence",
            "difficulty": "beginner",
            "questionCount": 2,
            "language": "english"
        });

        let first = service.generate("c", &request).await.unwrap();
        assert_eq!(first.quiz.image_url.as_deref(), Some(DEFAULT_IMAGE_URL));
        let cached = service.generate("c", &request).await.unwrap();
        assert_eq!(cached.quiz.image_url, first.quiz.image_url);
    }

    #[tokio::test]
    async fn test_caller_chosen_request_id_is_kept() {
        let service = service();
        let request_id = Uuid::new_v4();
        let outcome = service
            .generate_with_id(
                request_id,
                "c",
                &json!({"topic": "Tides", "difficulty": "expert", "questionCount": 1, "language": "german"}),
            )
            .await
            .unwrap();
        assert_eq!(outcome.request_id, request_id);
    }

    #[test]
    fn test_huge_ttl_does_not_panic() {
        let config = QuizConfig {
            cache_ttl_secs: u64::MAX / 2,
            ..QuizConfig::default()
        };
        let service = QuizService::new(&config, Arc::new(LLMProvider::Mock(MockProvider)));
        assert_eq!(service.backend_name(), "Mock");
    }

    #[tokio::test]
    async fn test_errors_are_counted() {
        let service = service();
        let err = service.generate("c", &json!({"topic": ""})).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        let err = service.generate("c", &json!("just a string")).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidInputType");

        let stats = service.stats().await;
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.total_errors, 2);
        assert_eq!(stats.success_rate, 0.0);
    }
}
