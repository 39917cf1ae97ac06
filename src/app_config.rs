use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Target language (ISO code or English name)
    pub target_language: String,

    /// Backend routing hint
    #[serde(default)]
    pub speed_mode: SpeedMode,

    /// Translation config
    pub translation: TranslationConfig,

    /// Output handling
    #[serde(default)]
    pub output: OutputConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Google Gemini
    #[default]
    Gemini,
    // @provider: OpenRouter (OpenAI-compatible)
    OpenRouter,
    // @provider: Deterministic local test double
    Mock,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Gemini => "Gemini",
            Self::OpenRouter => "OpenRouter",
            Self::Mock => "Mock",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Gemini => "gemini".to_string(),
            Self::OpenRouter => "openrouter".to_string(),
            Self::Mock => "mock".to_string(),
        }
    }

    // @returns: Environment variable holding the API key, if the provider needs one
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::Mock => None,
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openrouter" => Ok(Self::OpenRouter),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Speed mode picks between a faster, cheaper model and a higher-quality one.
/// It never changes pipeline logic.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeedMode {
    #[default]
    Fast,
    Normal,
}

impl std::fmt::Display for SpeedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

impl std::str::FromStr for SpeedMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "normal" => Ok(Self::Normal),
            _ => Err(anyhow!("Invalid speed mode: {}", s)),
        }
    }
}

/// What to do when the backend cannot produce the shared run context
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContextPolicy {
    /// Abort the run
    #[default]
    Fail,
    /// Continue with an empty context
    Empty,
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model used in fast mode
    #[serde(default = "String::new")]
    pub fast_model: String,

    // @field: Model used in normal mode
    #[serde(default = "String::new")]
    pub normal_model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Artificial latency (mock only)
    #[serde(default)]
    pub delay_ms: u64,

    // @field: Fail every Nth chunk request (mock only)
    #[serde(default)]
    pub fail_every: Option<usize>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        match provider_type {
            TranslationProvider::Gemini => Self {
                provider_type: "gemini".to_string(),
                fast_model: default_gemini_fast_model(),
                normal_model: default_gemini_normal_model(),
                api_key: String::new(),
                endpoint: default_gemini_endpoint(),
                timeout_secs: default_timeout_secs(),
                delay_ms: 0,
                fail_every: None,
            },
            TranslationProvider::OpenRouter => Self {
                provider_type: "openrouter".to_string(),
                fast_model: default_openrouter_fast_model(),
                normal_model: default_openrouter_normal_model(),
                api_key: String::new(),
                endpoint: default_openrouter_endpoint(),
                timeout_secs: default_timeout_secs(),
                delay_ms: 0,
                fail_every: None,
            },
            TranslationProvider::Mock => Self {
                provider_type: "mock".to_string(),
                fast_model: "mock".to_string(),
                normal_model: "mock".to_string(),
                api_key: String::new(),
                endpoint: String::new(),
                timeout_secs: default_timeout_secs(),
                delay_ms: default_mock_delay_ms(),
                fail_every: None,
            },
        }
    }

    /// Model for the given speed mode
    pub fn model_for(&self, speed_mode: SpeedMode) -> &str {
        match speed_mode {
            SpeedMode::Fast => &self.fast_model,
            SpeedMode::Normal => &self.normal_model,
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Pipeline settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Maximum number of subtitle blocks sent in one chunk
    #[serde(default = "default_chunk_max_blocks")]
    pub chunk_max_blocks: usize,

    /// Retries per chunk after the first attempt
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Process-wide cap on in-flight chunk translations
    #[serde(default = "default_max_concurrent_translations")]
    pub max_concurrent_translations: usize,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for a single backoff delay
    #[serde(default = "default_retry_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,

    /// Behaviour when context detection fails
    #[serde(default)]
    pub context_policy: ContextPolicy,

    /// Number of leading blocks shown to the backend for context detection
    #[serde(default = "default_context_sample_blocks")]
    pub context_sample_blocks: usize,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Abort a run that takes longer than this
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            chunk_max_blocks: default_chunk_max_blocks(),
            retry_max_attempts: default_retry_max_attempts(),
            max_concurrent_translations: default_max_concurrent_translations(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_backoff_max_ms: default_retry_backoff_max_ms(),
            context_policy: ContextPolicy::default(),
            context_sample_blocks: default_context_sample_blocks(),
            temperature: default_temperature(),
            run_timeout_secs: None,
        }
    }
}

/// Configuration for what the calling layer writes
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    /// Write a partially translated file when some chunks failed
    #[serde(default = "default_true")]
    pub emit_partial_output: bool,

    /// Reject input files larger than this
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            emit_partial_output: true,
            max_file_size_bytes: default_max_file_size_bytes(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_chunk_max_blocks() -> usize {
    100
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_max_concurrent_translations() -> usize {
    4
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_retry_backoff_max_ms() -> u64 {
    30_000
}

fn default_context_sample_blocks() -> usize {
    50
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_max_file_size_bytes() -> u64 {
    2 * 1024 * 1024
}

fn default_mock_delay_ms() -> u64 {
    50
}

fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_openrouter_endpoint() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_gemini_fast_model() -> String {
    "gemini-2.0-flash-lite".to_string()
}

fn default_gemini_normal_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_openrouter_fast_model() -> String {
    "google/gemini-2.0-flash-lite-001".to_string()
}

fn default_openrouter_normal_model() -> String {
    "google/gemini-2.0-flash-001".to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::resolve_language_name(&self.target_language)?;

        let common = &self.translation.common;
        if common.chunk_max_blocks == 0 {
            return Err(anyhow!("chunk_max_blocks must be a positive integer"));
        }
        if common.max_concurrent_translations == 0 {
            return Err(anyhow!("max_concurrent_translations must be a positive integer"));
        }
        if common.retry_backoff_max_ms < common.retry_backoff_ms {
            return Err(anyhow!("retry_backoff_max_ms must not be lower than retry_backoff_ms"));
        }
        if self.output.max_file_size_bytes == 0 {
            return Err(anyhow!("max_file_size_bytes must be a positive integer"));
        }

        match self.translation.provider {
            TranslationProvider::Gemini | TranslationProvider::OpenRouter => {
                if self.translation.get_api_key().is_empty() {
                    return Err(anyhow!(
                        "Translation API key is required for {} provider",
                        self.translation.provider.display_name()
                    ));
                }
            }
            TranslationProvider::Mock => {}
        }

        Ok(())
    }

    /// Fill empty API keys from the provider's environment variable
    pub fn apply_env_api_key(&mut self) {
        let provider = self.translation.provider;
        let Some(var) = provider.api_key_env_var() else {
            return;
        };
        if let Ok(key) = std::env::var(var) {
            if key.is_empty() {
                return;
            }
            self.translation.set_api_key_if_empty(&key);
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: "es".to_string(),
            speed_mode: SpeedMode::default(),
            translation: TranslationConfig::default(),
            output: OutputConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Active provider configuration, falling back to built-in defaults
    pub fn active_provider_or_default(&self) -> ProviderConfig {
        self.get_active_provider_config()
            .cloned()
            .unwrap_or_else(|| ProviderConfig::new(self.provider))
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Set the API key of the active provider, adding its config entry if needed
    pub fn set_api_key(&mut self, key: &str) {
        let provider_str = self.provider.to_lowercase_string();
        if let Some(provider_config) = self
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            provider_config.api_key = key.to_string();
            return;
        }

        let mut provider_config = ProviderConfig::new(self.provider);
        provider_config.api_key = key.to_string();
        self.available_providers.push(provider_config);
    }

    fn set_api_key_if_empty(&mut self, key: &str) {
        if self.get_api_key().is_empty() {
            self.set_api_key(key);
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Gemini),
                ProviderConfig::new(TranslationProvider::OpenRouter),
                ProviderConfig::new(TranslationProvider::Mock),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
