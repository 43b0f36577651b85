/*!
 * Provider implementations for the external services the pipeline calls.
 *
 * Two seams are defined here:
 * - `MachineTranslator`: the NMT backend translating one sentence unit at a time
 * - `CompletionGateway`: the LLM chat completion backend
 *
 * Concrete clients:
 * - Google Translate: NMT backend
 * - OpenAI, Anthropic, Gemini: completion backends, dispatched by `ProviderGateway`
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message of a chat completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender role
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Machine translation backend
///
/// Implementations translate a single unit of text and report transport
/// failures as `ProviderError`. Retries and timeouts are applied by the caller.
#[async_trait]
pub trait MachineTranslator: Send + Sync + Debug {
    /// Translate `text` from `source_language` to `target_language`
    async fn translate_unit(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError>;
}

/// Chat completion backend
#[async_trait]
pub trait CompletionGateway: Send + Sync + Debug {
    /// Send `messages` to `model` and return the first choice's text
    ///
    /// # Arguments
    /// * `messages` - Ordered conversation, system message first
    /// * `model` - Routed model name, e.g. `gemini/gemini-2.0-flash`
    /// * `temperature` - Sampling temperature
    /// * `api_key` - Credential resolved by the caller
    async fn send(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
        api_key: &str,
    ) -> Result<String, ProviderError>;
}

#[async_trait]
impl<T: MachineTranslator + ?Sized> MachineTranslator for std::sync::Arc<T> {
    async fn translate_unit(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        (**self).translate_unit(text, source_language, target_language).await
    }
}

#[async_trait]
impl<G: CompletionGateway + ?Sized> CompletionGateway for std::sync::Arc<G> {
    async fn send(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
        api_key: &str,
    ) -> Result<String, ProviderError> {
        (**self).send(messages, model, temperature, api_key).await
    }
}

/// Read a non-success response body and classify the status
pub(crate) async fn error_from_response(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    log::error!("{} API error ({}): {}", provider, status, error_text);
    ProviderError::from_status(status.as_u16(), error_text)
}

pub mod anthropic;
pub mod gateway;
pub mod gemini;
pub mod google_translate;
pub mod mock;
pub mod openai;
pub mod retry;

pub use gateway::ProviderGateway;
pub use google_translate::GoogleTranslate;
pub use retry::{RetryFailure, RetryPolicy};
