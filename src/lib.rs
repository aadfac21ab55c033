pub mod api;
pub mod clock;
pub mod config;
pub mod errors;
pub mod llm_providers;
pub mod logging;
pub mod models;
pub mod prompt_builder;
pub mod quiz_cache;
pub mod quiz_service;
pub mod rate_limiter;
pub mod response_parser;
pub mod validation;

pub use api::{create_router, AppState};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::Config;
pub use errors::*;
pub use llm_providers::{BackendError, GenerationBackend, LLMProvider, LLMProviderFactory, LLMProviderType};
pub use models::*;
pub use prompt_builder::{prompt_hash, PromptBuilder};
pub use quiz_cache::QuizCache;
pub use quiz_service::{GenerationOutcome, PipelineError, QuizService};
pub use rate_limiter::{Admission, RateLimiter};
pub use response_parser::{ParseError, ResponseParser};
pub use validation::{InvalidInputType, RequestValidator, ValidationLimits};
