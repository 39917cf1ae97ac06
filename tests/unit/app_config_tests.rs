/*!
 * Tests for app configuration functionality
 */

use subtide::app_config::{
    Config, ContextPolicy, LogLevel, ProviderConfig, SpeedMode, TranslationProvider,
};
use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_shouldHaveExpectedValues() {
    let config = Config::default();

    assert_eq!(config.target_language, "es");
    assert_eq!(config.speed_mode, SpeedMode::Fast);
    assert_eq!(config.translation.provider, TranslationProvider::Gemini);
    assert_eq!(config.translation.available_providers.len(), 3);
    assert_eq!(config.translation.common.chunk_max_blocks, 100);
    assert_eq!(config.translation.common.retry_max_attempts, 3);
    assert_eq!(config.translation.common.context_policy, ContextPolicy::Fail);
    assert!(config.output.emit_partial_output);
    assert_eq!(config.output.max_file_size_bytes, 2 * 1024 * 1024);
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Test that a minimal JSON file fills the rest from defaults
#[test]
fn test_config_fromMinimalJson_shouldApplyDefaults() {
    let json = r#"{
        "target_language": "fr",
        "translation": {
            "provider": "openrouter",
            "available_providers": [
                { "type": "openrouter", "api_key": "sk-123", "fast_model": "small", "normal_model": "large" }
            ],
            "common": { "chunk_max_blocks": 25, "context_policy": "empty" }
        }
    }"#;

    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.translation.provider, TranslationProvider::OpenRouter);
    assert_eq!(config.translation.get_api_key(), "sk-123");
    assert_eq!(config.translation.common.chunk_max_blocks, 25);
    assert_eq!(config.translation.common.context_policy, ContextPolicy::Empty);
    assert_eq!(config.translation.common.max_concurrent_translations, 4);
    assert_eq!(config.speed_mode, SpeedMode::Fast);
    assert!(config.validate().is_ok());

    let provider = config.translation.get_active_provider_config().unwrap();
    assert_eq!(provider.model_for(SpeedMode::Normal), "large");
    assert_eq!(provider.timeout_secs, 60);
}

/// Test that a serialized config reads back the same
#[test]
fn test_config_serialization_shouldRoundTrip() {
    let mut config = common::mock_config();
    config.speed_mode = SpeedMode::Normal;

    let json = serde_json::to_string_pretty(&config).unwrap();
    let parsed: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.translation.provider, TranslationProvider::Mock);
    assert_eq!(parsed.speed_mode, SpeedMode::Normal);
    assert!(json.contains("\"type\": \"mock\""));
}

#[test]
fn test_validate_withUnknownLanguage_shouldFail() {
    let mut config = common::mock_config();
    config.target_language = "notalanguage".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withBackoffCapBelowBase_shouldFail() {
    let mut config = common::mock_config();
    config.translation.common.retry_backoff_ms = 500;
    config.translation.common.retry_backoff_max_ms = 100;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withZeroFileLimit_shouldFail() {
    let mut config = common::mock_config();
    config.output.max_file_size_bytes = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_providerConfig_new_shouldFillDefaults() {
    let gemini = ProviderConfig::new(TranslationProvider::Gemini);
    assert_eq!(gemini.provider_type, "gemini");
    assert!(gemini.endpoint.starts_with("https://"));
    assert_ne!(gemini.fast_model, gemini.normal_model);

    let mock = ProviderConfig::new(TranslationProvider::Mock);
    assert!(mock.api_key.is_empty());
    assert_eq!(mock.fail_every, None);
}

#[test]
fn test_provider_fromStr_shouldAcceptKnownNames() {
    assert_eq!("Gemini".parse::<TranslationProvider>().unwrap(), TranslationProvider::Gemini);
    assert_eq!("openrouter".parse::<TranslationProvider>().unwrap(), TranslationProvider::OpenRouter);
    assert!("ollama".parse::<TranslationProvider>().is_err());
    assert_eq!(TranslationProvider::OpenRouter.to_string(), "openrouter");
    assert_eq!(TranslationProvider::Gemini.api_key_env_var(), Some("GEMINI_API_KEY"));
    assert_eq!(TranslationProvider::Mock.api_key_env_var(), None);
}

#[test]
fn test_activeProviderOrDefault_withMissingEntry_shouldUseBuiltInDefaults() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::OpenRouter;
    config.translation.available_providers.clear();

    let provider = config.translation.active_provider_or_default();
    assert_eq!(provider.provider_type, "openrouter");
    assert!(!provider.fast_model.is_empty());
}
