use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::LLMConfig;
use crate::prompt_builder::SYSTEM_MESSAGE;
use crate::log_llm_operation;

/// Failure modes of a generation backend call. None of them are retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("RateLimited: {0}")]
    RateLimited(String),

    #[error("AuthenticationFailed: {0}")]
    AuthenticationFailed(String),

    #[error("BackendError: {0}")]
    Backend(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl BackendError {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::RateLimited(_) => "RateLimited",
            BackendError::AuthenticationFailed(_) => "AuthenticationFailed",
            BackendError::Backend(_) => "BackendError",
            BackendError::Timeout(_) => "Timeout",
        }
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::AuthenticationFailed(body),
            _ => BackendError::Backend(format!("{}: {}", status, body)),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            BackendError::from_status(status, err.to_string())
        } else {
            BackendError::Backend(err.to_string())
        }
    }
}

/// Picture served when no illustration can be generated
pub const DEFAULT_IMAGE_URL: &str = "images/about_img.jpg";

/// Anything that turns a prompt into raw model text
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;

    /// URL of an illustration for `topic`. Backends without image support
    /// hand back the bundled default picture.
    async fn illustrate(&self, _topic: &str) -> Result<String, BackendError> {
        Ok(DEFAULT_IMAGE_URL.to_string())
    }

    fn name(&self) -> &str;
}

/// Common message structure for LLM requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LLMProviderType {
    OpenAI,
    Gemini,
    Mock,
}

impl LLMProviderType {
    /// Unknown names fall back to OpenAI
    pub fn parse_lenient(name: &str) -> (Self, bool) {
        match name.trim().to_lowercase().as_str() {
            "openai" | "chatgpt" | "gpt" => (LLMProviderType::OpenAI, true),
            "gemini" | "google" => (LLMProviderType::Gemini, true),
            "mock" | "fake" => (LLMProviderType::Mock, true),
            _ => (LLMProviderType::OpenAI, false),
        }
    }
}

/// Enum-based provider so the service can hold one concrete type
#[derive(Debug, Clone)]
pub enum LLMProvider {
    OpenAI(OpenAIProvider),
    Gemini(GeminiProvider),
    Mock(MockProvider),
}

impl LLMProvider {
    pub async fn make_request(&self, system_message: Option<&str>, prompt: &str) -> Result<String, BackendError> {
        match self {
            LLMProvider::OpenAI(provider) => provider.make_request(system_message, prompt).await,
            LLMProvider::Gemini(provider) => provider.make_request(system_message, prompt).await,
            LLMProvider::Mock(provider) => provider.make_request(system_message, prompt).await,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            LLMProvider::OpenAI(_) => "OpenAI",
            LLMProvider::Gemini(_) => "Gemini",
            LLMProvider::Mock(_) => "Mock",
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            LLMProvider::OpenAI(provider) => &provider.model,
            LLMProvider::Gemini(provider) => &provider.model,
            LLMProvider::Mock(_) => "canned",
        }
    }
}

#[async_trait]
impl GenerationBackend for LLMProvider {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let started = Instant::now();
        log_llm_operation!(start, "generate", provider = self.provider_name(), prompt_length = prompt.len());

        match self.make_request(Some(SYSTEM_MESSAGE), prompt).await {
            Ok(text) => {
                log_llm_operation!(
                    success,
                    "generate",
                    provider = self.provider_name(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    response_length = text.len()
                );
                Ok(text)
            }
            Err(e) => {
                log_llm_operation!(error, "generate", provider = self.provider_name(), error = e);
                Err(e)
            }
        }
    }

    async fn illustrate(&self, topic: &str) -> Result<String, BackendError> {
        let LLMProvider::OpenAI(provider) = self else {
            return Ok(DEFAULT_IMAGE_URL.to_string());
        };
        let Some(size) = provider.image_size.as_deref() else {
            return Ok(DEFAULT_IMAGE_URL.to_string());
        };

        let started = Instant::now();
        log_llm_operation!(start, "illustrate", provider = self.provider_name(), prompt_length = topic.len());

        match provider.generate_image(topic, size).await {
            Ok(url) => {
                log_llm_operation!(
                    success,
                    "illustrate",
                    provider = self.provider_name(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    response_length = url.len()
                );
                Ok(url)
            }
            Err(e) => {
                log_llm_operation!(error, "illustrate", provider = self.provider_name(), error = e);
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        self.provider_name()
    }
}

/// Shared tuning for HTTP-backed providers
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    settings: GenerationSettings,
    /// `None` disables illustrations
    image_size: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<LLMMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChoice {
    message: LLMMessage,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIImageRequest {
    prompt: String,
    n: u32,
    size: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIImageResponse {
    #[serde(default)]
    data: Vec<OpenAIImage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIImage {
    url: Option<String>,
}

impl OpenAIProvider {
    pub fn new(client: Client, api_key: String, base_url: Option<String>, model: Option<String>, settings: GenerationSettings) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            settings,
            image_size: None,
        }
    }

    pub fn with_image_size(mut self, size: Option<String>) -> Self {
        self.image_size = size;
        self
    }

    pub async fn generate_image(&self, topic: &str, size: &str) -> Result<String, BackendError> {
        let request_body = OpenAIImageRequest {
            prompt: format!("An educational illustration representing: {}", topic),
            n: 1,
            size: size.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::from_status(status, error_text));
        }

        let image_response: OpenAIImageResponse = response.json().await?;

        image_response
            .data
            .into_iter()
            .find_map(|image| image.url)
            .ok_or_else(|| BackendError::Backend("No image URL in OpenAI response".to_string()))
    }

    pub async fn make_request(&self, system_message: Option<&str>, prompt: &str) -> Result<String, BackendError> {
        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            messages.push(LLMMessage {
                role: "system".to_string(),
                content: sys_msg.to_string(),
            });
        }

        messages.push(LLMMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::from_status(status, error_text));
        }

        let openai_response: OpenAIResponse = response.json().await?;

        openai_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| BackendError::Backend("No choices in OpenAI response".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    settings: GenerationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "topK")]
    top_k: i32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

impl GeminiProvider {
    pub fn new(client: Client, api_key: String, base_url: Option<String>, model: Option<String>, settings: GenerationSettings) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            model: model.unwrap_or_else(|| "gemini-2.0-flash-exp".to_string()),
            settings,
        }
    }

    pub async fn make_request(&self, system_message: Option<&str>, prompt: &str) -> Result<String, BackendError> {
        let full_prompt = match system_message {
            Some(sys_msg) => format!("{}\n\n{}", sys_msg, prompt),
            None => prompt.to_string(),
        };

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: full_prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.settings.temperature,
                top_k: 40,
                top_p: 0.9,
                max_output_tokens: self.settings.max_tokens,
            },
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::from_status(status, error_text));
        }

        let gemini_response: GeminiResponse = response.json().await?;

        gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| BackendError::Backend("No candidates in Gemini response".to_string()))
    }
}

/// Offline provider serving a fixed, well-formed quiz
#[derive(Debug, Clone, Default)]
pub struct MockProvider;

pub const MOCK_RESPONSE: &str = r#"{
  "topic": "Artificial Intelligence",
  "summary": "Artificial Intelligence (AI) is a branch of computer science that aims to create machines capable of performing tasks that typically require human intelligence, such as understanding language, recognising images and making decisions.",
  "questions": [
    {
      "question": "What is the primary goal of Artificial Intelligence?",
      "options": {
        "A": "To replace human workers completely",
        "B": "To create machines that can perform tasks requiring human intelligence",
        "C": "To make computers faster",
        "D": "To reduce electricity consumption"
      },
      "correct": "B",
      "explanation": "AI focuses on building systems that reproduce capabilities such as reasoning and perception."
    },
    {
      "question": "Which of these is a subfield of AI?",
      "options": {
        "A": "Machine learning",
        "B": "Spreadsheet design",
        "C": "Cable management",
        "D": "Typography"
      },
      "correct": "A",
      "explanation": "Machine learning studies algorithms that improve through experience."
    }
  ]
}"#;

impl MockProvider {
    pub async fn make_request(&self, _system_message: Option<&str>, _prompt: &str) -> Result<String, BackendError> {
        Ok(MOCK_RESPONSE.to_string())
    }
}

/// Factory for creating LLM providers based on provider type
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    pub fn create_provider(config: &LLMConfig) -> Result<LLMProvider> {
        let settings = GenerationSettings {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        let provider = match config.provider {
            LLMProviderType::OpenAI => LLMProvider::OpenAI(
                OpenAIProvider::new(
                    Self::http_client(config.timeout_secs)?,
                    config.api_key.clone(),
                    config.base_url.clone(),
                    config.model.clone(),
                    settings,
                )
                .with_image_size(config.generate_images.then(|| config.image_size.clone())),
            ),
            LLMProviderType::Gemini => LLMProvider::Gemini(GeminiProvider::new(
                Self::http_client(config.timeout_secs)?,
                config.api_key.clone(),
                config.base_url.clone(),
                config.model.clone(),
                settings,
            )),
            LLMProviderType::Mock => LLMProvider::Mock(MockProvider),
        };

        Ok(provider)
    }

    fn http_client(timeout_secs: u64) -> Result<Client> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response_parser::ResponseParser;

    fn llm_config(provider: LLMProviderType) -> LLMConfig {
        LLMConfig {
            api_key: "sk-test".to_string(),
            base_url: None,
            provider,
            model: None,
            timeout_secs: 5,
            max_tokens: 500,
            temperature: 0.2,
            generate_images: true,
            image_size: "512x512".to_string(),
        }
    }

    #[test]
    fn test_provider_name_parsing() {
        let cases = [
            ("openai", LLMProviderType::OpenAI, true),
            ("ChatGPT", LLMProviderType::OpenAI, true),
            ("GOOGLE", LLMProviderType::Gemini, true),
            ("mock", LLMProviderType::Mock, true),
            ("claude", LLMProviderType::OpenAI, false),
        ];
        for (input, expected, known) in cases {
            assert_eq!(LLMProviderType::parse_lenient(input), (expected, known), "input {}", input);
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            BackendError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into()).kind(),
            "RateLimited"
        );
        assert_eq!(
            BackendError::from_status(StatusCode::UNAUTHORIZED, "bad key".into()).kind(),
            "AuthenticationFailed"
        );
        assert_eq!(
            BackendError::from_status(StatusCode::FORBIDDEN, "no".into()).kind(),
            "AuthenticationFailed"
        );
        assert_eq!(
            BackendError::from_status(StatusCode::BAD_GATEWAY, "down".into()).kind(),
            "BackendError"
        );
    }

    #[test]
    fn test_factory_defaults() {
        let provider = LLMProviderFactory::create_provider(&llm_config(LLMProviderType::OpenAI)).unwrap();
        assert_eq!(provider.provider_name(), "OpenAI");
        assert_eq!(provider.model_name(), "gpt-4o-mini");

        let provider = LLMProviderFactory::create_provider(&llm_config(LLMProviderType::Gemini)).unwrap();
        assert_eq!(provider.model_name(), "gemini-2.0-flash-exp");
    }

    #[tokio::test]
    async fn test_mock_provider_output_parses() {
        let provider = LLMProviderFactory::create_provider(&llm_config(LLMProviderType::Mock)).unwrap();
        let raw = provider.generate("anything").await.unwrap();
        let quiz = ResponseParser::parse(&raw).unwrap();
        assert_eq!(quiz.questions.len(), 2);
        assert_eq!(provider.name(), "Mock");
    }

    #[tokio::test]
    async fn test_illustrations_fall_back_to_default_image() {
        let mock = LLMProviderFactory::create_provider(&llm_config(LLMProviderType::Mock)).unwrap();
        assert_eq!(mock.illustrate("Tides").await.unwrap(), DEFAULT_IMAGE_URL);

        let gemini = LLMProviderFactory::create_provider(&llm_config(LLMProviderType::Gemini)).unwrap();
        assert_eq!(gemini.illustrate("Tides").await.unwrap(), DEFAULT_IMAGE_URL);

        // disabled images never touch the network
        let mut config = llm_config(LLMProviderType::OpenAI);
        config.generate_images = false;
        config.base_url = Some("http://127.0.0.1:9".to_string());
        let openai = LLMProviderFactory::create_provider(&config).unwrap();
        assert_eq!(openai.illustrate("Tides").await.unwrap(), DEFAULT_IMAGE_URL);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_backend_error() {
        let mut config = llm_config(LLMProviderType::OpenAI);
        // reserved port, nothing listens here
        config.base_url = Some("http://127.0.0.1:9".to_string());
        let provider = LLMProviderFactory::create_provider(&config).unwrap();
        let err = provider.generate("prompt").await.unwrap_err();
        assert!(matches!(err, BackendError::Backend(_) | BackendError::Timeout(_)), "{:?}", err);
    }
}
