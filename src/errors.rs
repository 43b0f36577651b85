/*!
 * Error types for the sinoprompt library.
 *
 * Each pipeline stage has its own error enum, defined with the thiserror
 * crate. `OptimizerError` wraps them so a caller of `complete()` always gets
 * a single typed error naming the stage that failed.
 */

use thiserror::Error;

/// Errors that can occur when talking to an external service (NMT or LLM)
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The call did not finish within its time budget
    #[error("Request timed out: {0}")]
    Timeout(String),
}

impl ProviderError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_)
            | Self::ConnectionError(_)
            | Self::RateLimitExceeded(_)
            | Self::Timeout(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::ParseError(_) | Self::AuthenticationError(_) => false,
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            408 => Self::Timeout(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else if let Some(status) = error.status() {
            Self::from_status(status.as_u16(), error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Malformed glossary input, rejected before any network call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GlossaryError {
    /// A key was empty or whitespace-only
    #[error("Glossary keys must not be empty")]
    EmptyKey,

    /// The same key was supplied twice
    #[error("Duplicate glossary key: '{0}'")]
    DuplicateKey(String),

    /// Two keys only differ by whitespace
    #[error("Glossary keys '{first}' and '{second}' differ only by whitespace")]
    AmbiguousKeys {
        /// Key seen first
        first: String,
        /// Key that collided with it
        second: String,
    },
}

/// Errors raised by the translation leg of the pipeline
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// A sentence unit could not be translated within the retry budget
    #[error("Failed to translate unit {index} after {attempts} attempt(s): {source}")]
    UnitFailed {
        /// Position of the unit in the split text
        index: usize,
        /// Number of attempts made
        attempts: u32,
        /// Last transport error
        #[source]
        source: ProviderError,
    },

    /// The glossary supplied for the call is malformed
    #[error("Glossary error: {0}")]
    Glossary(#[from] GlossaryError),
}

impl TranslationError {
    /// Index of the failing sentence unit, when known
    pub fn unit_index(&self) -> Option<usize> {
        match self {
            Self::UnitFailed { index, .. } => Some(*index),
            Self::Glossary(_) => None,
        }
    }
}

/// Backend classification of a completion failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Invalid or missing credentials
    Authentication,
    /// Provider rate limit hit
    RateLimit,
    /// Call exceeded its time budget
    Timeout,
    /// Connectivity problem
    Network,
    /// Any other error status returned by the API
    Api,
    /// Response could not be interpreted
    InvalidResponse,
}

impl std::fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Authentication => "authentication",
            Self::RateLimit => "rate limit",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Api => "api",
            Self::InvalidResponse => "invalid response",
        };
        write!(f, "{}", name)
    }
}

/// Completion backend failure
#[derive(Error, Debug, Clone)]
#[error("Completion gateway {kind} error after {attempts} attempt(s): {message}")]
pub struct GatewayError {
    /// Classification reported by the backend
    pub kind: GatewayErrorKind,
    /// Backend message
    pub message: String,
    /// Number of attempts made
    pub attempts: u32,
}

impl GatewayError {
    /// Build a gateway error from the last transport error
    pub fn from_provider(error: &ProviderError, attempts: u32) -> Self {
        let kind = match error {
            ProviderError::AuthenticationError(_) => GatewayErrorKind::Authentication,
            ProviderError::RateLimitExceeded(_) => GatewayErrorKind::RateLimit,
            ProviderError::Timeout(_) => GatewayErrorKind::Timeout,
            ProviderError::ConnectionError(_) | ProviderError::RequestFailed(_) => {
                GatewayErrorKind::Network
            }
            ProviderError::ApiError { .. } => GatewayErrorKind::Api,
            ProviderError::ParseError(_) => GatewayErrorKind::InvalidResponse,
        };
        Self {
            kind,
            message: error.to_string(),
            attempts,
        }
    }
}

/// Invalid option values or input combinations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Minimum overlap ratio outside [0, 1]
    #[error("Minimum overlap ratio must be within [0, 1], got {0}")]
    InvalidOverlapRatio(f64),

    /// A required input was empty
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),

    /// A language code is not a known ISO 639-1 code
    #[error("Invalid language code: {0}")]
    InvalidLanguage(String),

    /// No API key was provided or found in the environment
    #[error("No API key for {provider}; set {env_var} or pass one explicitly")]
    MissingApiKey {
        /// Provider display name
        provider: String,
        /// Environment variable consulted
        env_var: String,
    },

    /// Unknown provider identifier
    #[error("Unknown provider '{0}'. Valid options: chatgpt, claude, gemini")]
    UnknownProvider(String),

    /// Any other invalid setting
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Top-level error returned by the orchestrator
#[derive(Error, Debug)]
pub enum OptimizerError {
    /// Glossary rejected before any network call
    #[error("Glossary error: {0}")]
    Glossary(#[from] GlossaryError),

    /// Translation leg failed
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Completion backend failed
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Invalid options or inputs
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl OptimizerError {
    /// Short name of the pipeline stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Glossary(_) => "glossary",
            Self::Translation(_) => "translation",
            Self::Gateway(_) => "completion",
            Self::Configuration(_) => "configuration",
        }
    }
}
