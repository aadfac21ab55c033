use learning_generator::{config::Config, LLMProviderType, Language};
use std::collections::HashMap;

fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|key: &str| vars.get(key).cloned())
}

#[test]
fn test_defaults() {
    let config = config_from(&[("LLM_API_KEY", "sk-test-1234567890")]).unwrap();

    assert_eq!(config.llm.provider, LLMProviderType::OpenAI);
    assert_eq!(config.llm.timeout_secs, 30);
    assert_eq!(config.llm.max_tokens, 2000);
    assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.quiz.rate_limit_per_minute, 60);
    assert_eq!(config.quiz.cache_ttl_secs, 3600);
    assert_eq!(config.quiz.cache_max_entries, None);
    assert_eq!(config.quiz.default_language(), Some(Language::English));
    assert_eq!(config.quiz.max_questions, 50);
    assert_eq!(config.quiz.max_answers, 10);
    assert_eq!(config.logging.level, "info,learning_generator=debug");
    assert!(config.logging.file_enabled);
    assert!(config.logging.console_enabled);
    assert_eq!(config.logging.log_directory, "logs");

    assert!(config.validate().is_ok());
}

#[test]
fn test_unknown_provider_defaults_to_openai() {
    for provider in ["claude", "anthropic", "llama", "", "123"] {
        let config = config_from(&[("LLM_PROVIDER", provider), ("LLM_API_KEY", "k")]).unwrap();
        assert_eq!(config.llm.provider, LLMProviderType::OpenAI, "provider '{}'", provider);
    }
}

#[test]
fn test_missing_api_key_fails_validation_except_for_mock() {
    let config = config_from(&[]).unwrap();
    assert!(config.validate().is_err());

    let config = config_from(&[("LLM_PROVIDER", "gemini")]).unwrap();
    assert!(config.validate().is_err());

    let config = config_from(&[("LLM_PROVIDER", "mock")]).unwrap();
    assert!(config.validate().is_ok());
}

#[test]
fn test_out_of_range_values_fail_validation() {
    let invalid = [
        ("PORT", "0"),
        ("RATE_LIMIT_PER_MINUTE", "0"),
        ("CACHE_TTL_SECS", "0"),
        ("CACHE_TTL_SECS", "2592001"),
        ("CACHE_TTL_SECS", "9223372036854775807"),
        ("MAX_QUESTIONS", "0"),
        ("MAX_QUESTIONS", "51"),
        ("MAX_ANSWERS", "1"),
        ("MAX_ANSWERS", "27"),
        ("DEFAULT_LANGUAGE", "latin"),
    ];

    for (key, value) in invalid {
        let config = config_from(&[("LLM_PROVIDER", "mock"), (key, value)]).unwrap();
        assert!(config.validate().is_err(), "{}={} should be rejected", key, value);
    }
}

#[test]
fn test_unparseable_values_abort_loading() {
    for (key, value) in [("PORT", "http"), ("LLM_TIMEOUT_SECS", "soon"), ("MAX_ANSWERS", "four")] {
        assert!(config_from(&[(key, value)]).is_err(), "{}={} should not load", key, value);
    }
}

#[test]
fn test_overrides() {
    let config = config_from(&[
        ("LLM_PROVIDER", "Google"),
        ("LLM_API_KEY", "g-key-abcdefgh"),
        ("LLM_MODEL", "gemini-1.5-pro"),
        ("PORT", "9000"),
        ("CORS_ORIGINS", "*"),
        ("RATE_LIMIT_PER_MINUTE", "5"),
        ("CACHE_MAX_ENTRIES", "100"),
        ("DEFAULT_LANGUAGE", "german"),
        ("LOG_FILE_ENABLED", "false"),
    ])
    .unwrap();

    assert_eq!(config.llm.provider, LLMProviderType::Gemini);
    assert_eq!(config.llm.model.as_deref(), Some("gemini-1.5-pro"));
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.cors_origins, vec!["*"]);
    assert!(config.server.cors_layer().is_ok());
    assert_eq!(config.quiz.rate_limit_per_minute, 5);
    assert_eq!(config.quiz.cache_max_entries, Some(100));
    assert_eq!(config.quiz.default_language(), Some(Language::German));
    assert!(!config.logging.file_enabled);
    assert!(config.validate().is_ok());
}
