use anyhow::{anyhow, Context, Result};
use axum::http::{HeaderValue, Method};
use serde::Deserialize;
use std::env;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::llm_providers::LLMProviderType;
use crate::models::Language;

/// Longest accepted `CACHE_TTL_SECS`: thirty days
pub const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LLMConfig,
    pub server: ServerConfig,
    pub quiz: QuizConfig,
    pub logging: LoggingConfig,
}

/// Large Language Model backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub provider: LLMProviderType,
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the provider for a topic illustration alongside each quiz
    pub generate_images: bool,
    pub image_size: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
}

/// Pipeline tuning: admission ceiling, cache lifetime and request bounds
#[derive(Debug, Clone, Deserialize)]
pub struct QuizConfig {
    pub rate_limit_per_minute: u32,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: Option<usize>,
    pub default_language: String,
    pub max_questions: u32,
    pub max_answers: u32,
}

/// Logging system configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: 60,
            cache_ttl_secs: 3600,
            cache_max_entries: None,
            default_language: "english".to_string(),
            max_questions: 50,
            max_answers: 10,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            llm: LLMConfig::from_lookup(&lookup)?,
            server: ServerConfig::from_lookup(&lookup)?,
            quiz: QuizConfig::from_lookup(&lookup)?,
            logging: LoggingConfig::from_lookup(&lookup),
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            llm_provider = ?self.llm.provider,
            llm_model = ?self.llm.model,
            llm_api_key_masked = %mask_sensitive_data(&self.llm.api_key),
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            cors_origins = ?self.server.cors_origins,
            rate_limit_per_minute = self.quiz.rate_limit_per_minute,
            cache_ttl_secs = self.quiz.cache_ttl_secs,
            cache_max_entries = ?self.quiz.cache_max_entries,
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.quiz.rate_limit_per_minute == 0 {
            return Err(anyhow!("RATE_LIMIT_PER_MINUTE must be greater than 0"));
        }

        if !(1..=MAX_CACHE_TTL_SECS).contains(&self.quiz.cache_ttl_secs) {
            return Err(anyhow!(
                "CACHE_TTL_SECS must be between 1 and {}, got {}",
                MAX_CACHE_TTL_SECS,
                self.quiz.cache_ttl_secs
            ));
        }

        if !(1..=50).contains(&self.quiz.max_questions) {
            return Err(anyhow!("MAX_QUESTIONS must be between 1 and 50, got {}", self.quiz.max_questions));
        }

        if !(2..=26).contains(&self.quiz.max_answers) {
            return Err(anyhow!("MAX_ANSWERS must be between 2 and 26, got {}", self.quiz.max_answers));
        }

        if self.quiz.default_language().is_none() {
            return Err(anyhow!(
                "DEFAULT_LANGUAGE '{}' is not supported; use one of: {}",
                self.quiz.default_language,
                Language::ALL.map(|l| l.as_str()).join(", ")
            ));
        }

        if self.llm.provider != LLMProviderType::Mock && self.llm.api_key.trim().is_empty() {
            return Err(anyhow!("LLM_API_KEY is required for the {:?} provider", self.llm.provider));
        }

        if self.quiz.cache_max_entries == Some(0) {
            warn!("CACHE_MAX_ENTRIES is 0, every generated quiz will evict the previous one");
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl LLMConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("LLM_API_KEY")
            .or_else(|| lookup("OPENAI_API_KEY"))
            .unwrap_or_default();

        let base_url = lookup("LLM_BASE_URL").filter(|s| !s.trim().is_empty());

        let provider_str = lookup("LLM_PROVIDER").unwrap_or_else(|| "openai".to_string());
        let (provider, known) = LLMProviderType::parse_lenient(&provider_str);
        if !known {
            info!("Unknown LLM provider '{}', defaulting to OpenAI", provider_str);
        }

        let model = lookup("LLM_MODEL").filter(|s| !s.trim().is_empty());

        Ok(LLMConfig {
            api_key,
            base_url,
            provider,
            model,
            timeout_secs: parse_var(lookup, "LLM_TIMEOUT_SECS", 30)?,
            max_tokens: parse_var(lookup, "LLM_MAX_TOKENS", 2000)?,
            temperature: parse_var(lookup, "LLM_TEMPERATURE", 0.7)?,
            generate_images: parse_var(lookup, "LLM_GENERATE_IMAGES", true)?,
            image_size: lookup("LLM_IMAGE_SIZE")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "512x512".to_string()),
        })
    }
}

impl ServerConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port_str = lookup("PORT").unwrap_or_else(|| "8080".to_string());

        let port = port_str
            .parse::<u16>()
            .map_err(|_| anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str))?;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://127.0.0.1:5500".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(ServerConfig { port, host, cors_origins })
    }

    /// CORS policy for the router; `*` anywhere in the list allows any origin
    pub fn cors_layer(&self) -> Result<CorsLayer> {
        if self.cors_origins.iter().any(|origin| origin == "*") {
            return Ok(CorsLayer::permissive());
        }

        let origins = self
            .cors_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin '{}'", origin))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any))
    }
}

impl QuizConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = QuizConfig::default();

        let cache_max_entries = match lookup("CACHE_MAX_ENTRIES").filter(|s| !s.trim().is_empty()) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<usize>()
                    .map_err(|_| anyhow!("Invalid CACHE_MAX_ENTRIES value: '{}'", raw))?,
            ),
            None => None,
        };

        Ok(QuizConfig {
            rate_limit_per_minute: parse_var(lookup, "RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute)?,
            cache_ttl_secs: parse_var(lookup, "CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
            cache_max_entries,
            default_language: lookup("DEFAULT_LANGUAGE").unwrap_or(defaults.default_language),
            max_questions: parse_var(lookup, "MAX_QUESTIONS", defaults.max_questions)?,
            max_answers: parse_var(lookup, "MAX_ANSWERS", defaults.max_answers)?,
        })
    }

    pub fn default_language(&self) -> Option<Language> {
        self.default_language.parse().ok()
    }

    /// Cache lifetime, clamped so an unchecked config can never overflow
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs.min(MAX_CACHE_TTL_SECS) as i64)
    }
}

impl LoggingConfig {
    /// Logging is configured before anything else logs, so it can be loaded on its own
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let level = lookup("RUST_LOG").unwrap_or_else(|| "info,learning_generator=debug".to_string());

        let file_enabled = lookup("LOG_FILE_ENABLED")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);

        let console_enabled = lookup("LOG_CONSOLE_ENABLED")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);

        let log_directory = lookup("LOG_DIRECTORY").unwrap_or_else(|| "logs".to_string());

        LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'", key, raw)),
        _ => Ok(default),
    }
}

/// Mask sensitive data in configuration for safe logging
pub fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
