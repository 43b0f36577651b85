use serde::{Deserialize, Serialize};
use std::default::Default;

use crate::errors::ConfigurationError;
use crate::guard::GuardOptions;
use crate::sot::SotSettings;
use crate::translation::{TranslatorConfig, UnitFailurePolicy};

/// Application configuration module
/// This module holds the provider registry and the explicit configuration
/// struct handed to the optimizer. API keys are resolved from the environment
/// once, here, and never read again inside the pipeline.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Completion provider
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name as listed by the provider (unprefixed or prefixed)
    #[serde(default)]
    pub model: String,

    /// API key for the completion provider
    #[serde(default, skip_serializing)]
    pub api_key: String,

    /// Optional base URL override for the completion provider
    #[serde(default)]
    pub endpoint: String,

    /// Translation leg settings
    #[serde(default)]
    pub translation: TranslatorConfig,

    /// Completion leg settings
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Default guard options applied when a request does not override them
    #[serde(default)]
    pub guard: GuardOptions,

    /// Translate the model response back to the source language
    #[serde(default = "default_true")]
    pub translate_response: bool,

    /// Route completions through Skeleton-of-Thought
    #[serde(default)]
    pub sot: Option<SotSettings>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Completion provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    // @provider: OpenAI
    ChatGpt,
    // @provider: Anthropic
    Claude,
    // @provider: Google AI Studio
    #[default]
    Gemini,
}

/// Static descriptor of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderInfo {
    /// Short identifier
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Environment variable holding the API key
    pub env_var: &'static str,
    /// Recommended model
    pub default_model: &'static str,
    /// Prefix used in routed model names
    pub completion_prefix: &'static str,
    /// Known models, recommended first
    pub models: &'static [&'static str],
}

const CHATGPT: ProviderInfo = ProviderInfo {
    id: "chatgpt",
    name: "ChatGPT (OpenAI)",
    env_var: "OPENAI_API_KEY",
    default_model: "gpt-4o",
    completion_prefix: "",
    models: &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"],
};

const CLAUDE: ProviderInfo = ProviderInfo {
    id: "claude",
    name: "Claude (Anthropic)",
    env_var: "ANTHROPIC_API_KEY",
    default_model: "claude-3-5-sonnet-20241022",
    completion_prefix: "anthropic/",
    models: &[
        "claude-3-5-sonnet-20241022",
        "claude-3-5-haiku-20241022",
        "claude-3-opus-20240229",
    ],
};

const GEMINI: ProviderInfo = ProviderInfo {
    id: "gemini",
    name: "Gemini (Google AI Studio)",
    env_var: "GEMINI_API_KEY",
    default_model: "gemini-2.0-flash",
    completion_prefix: "gemini/",
    models: &["gemini-2.0-flash", "gemini-1.5-pro", "gemini-1.5-flash"],
};

impl ProviderKind {
    /// All providers in registry order
    pub const ALL: [ProviderKind; 3] = [Self::ChatGpt, Self::Claude, Self::Gemini];

    // @returns: Registry record for this provider
    pub fn info(&self) -> &'static ProviderInfo {
        match self {
            Self::ChatGpt => &CHATGPT,
            Self::Claude => &CLAUDE,
            Self::Gemini => &GEMINI,
        }
    }

    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &'static str {
        self.info().name
    }

    /// Full routed model name, never double-prefixed
    pub fn completion_model(&self, model: &str) -> String {
        let prefix = self.info().completion_prefix;
        if !prefix.is_empty() && !model.starts_with(prefix) {
            format!("{}{}", prefix, model)
        } else {
            model.to_string()
        }
    }

    /// Model name as the provider's own API expects it
    pub fn bare_model<'a>(&self, model: &'a str) -> &'a str {
        let prefix = self.info().completion_prefix;
        model.strip_prefix(prefix).unwrap_or(model)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.info().id)
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chatgpt" | "openai" => Ok(Self::ChatGpt),
            "claude" | "anthropic" => Ok(Self::Claude),
            "gemini" | "google" => Ok(Self::Gemini),
            _ => Err(ConfigurationError::UnknownProvider(s.to_string())),
        }
    }
}

/// Completion call settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CompletionConfig {
    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Timeout for a single completion call
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_completion_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_completion_timeout_secs() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_true() -> bool {
    true
}

/// Check that a BCP-47-ish tag ("zh-CN", "en") starts with an ISO 639-1 code
pub fn validate_language_code(code: &str) -> Result<(), ConfigurationError> {
    let primary = code.trim().split(['-', '_']).next().unwrap_or_default().to_lowercase();
    if primary.len() == 2 && isolang::Language::from_639_1(&primary).is_some() {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidLanguage(code.to_string()))
    }
}

impl Config {
    /// Create a configuration for a provider with its recommended model
    pub fn for_provider(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: provider.info().default_model.to_string(),
            ..Self::default()
        }
    }

    /// Resolve the API key once at the boundary.
    ///
    /// An explicit key wins; otherwise the provider's environment variable
    /// is read. The result is stored on the config and never looked up again.
    pub fn resolve_api_key(&mut self, explicit: Option<String>) -> Result<(), ConfigurationError> {
        let info = self.provider.info();
        let key = explicit
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(info.env_var).ok().filter(|k| !k.trim().is_empty()));

        match key {
            Some(key) => {
                self.api_key = key;
                Ok(())
            }
            None => Err(ConfigurationError::MissingApiKey {
                provider: info.name.to_string(),
                env_var: info.env_var.to_string(),
            }),
        }
    }

    /// Routed model name for the configured provider
    pub fn completion_model(&self) -> String {
        let model = if self.model.trim().is_empty() {
            self.provider.info().default_model
        } else {
            self.model.trim()
        };
        self.provider.completion_model(model)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_language_code(&self.translation.source_language)?;
        validate_language_code(&self.translation.target_language)?;

        if self.api_key.trim().is_empty() {
            let info = self.provider.info();
            return Err(ConfigurationError::MissingApiKey {
                provider: info.name.to_string(),
                env_var: info.env_var.to_string(),
            });
        }

        // A completion must never run on a partially translated prompt
        if self.translation.on_unit_failure != UnitFailurePolicy::Fail {
            return Err(ConfigurationError::Invalid(
                "Completions require on_unit_failure = fail".to_string(),
            ));
        }

        self.guard.validate()?;

        if let Some(sot) = &self.sot {
            if sot.max_concurrency == 0 {
                return Err(ConfigurationError::Invalid(
                    "SoT max_concurrency must be at least 1".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            provider: ProviderKind::default(),
            model: String::new(),
            api_key: String::new(),
            endpoint: String::new(),
            translation: TranslatorConfig::default(),
            completion: CompletionConfig::default(),
            guard: GuardOptions::default(),
            translate_response: true,
            sot: None,
            log_level: LogLevel::default(),
        }
    }
}
