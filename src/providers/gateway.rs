use async_trait::async_trait;
use log::debug;
use std::time::Duration;

use crate::app_config::{Config, ProviderKind};
use crate::errors::ProviderError;
use crate::providers::anthropic::{Anthropic, AnthropicRequest};
use crate::providers::gemini::{Gemini, GeminiRequest};
use crate::providers::openai::{OpenAI, OpenAIRequest};
use crate::providers::{ChatMessage, CompletionGateway};

#[derive(Debug, Clone)]
enum Backend {
    OpenAI(OpenAI),
    Anthropic(Anthropic),
    Gemini(Gemini),
}

/// Completion gateway routing a request to the configured provider
#[derive(Debug, Clone)]
pub struct ProviderGateway {
    kind: ProviderKind,
    backend: Backend,
    max_tokens: u32,
}

impl ProviderGateway {
    /// Create a gateway for `kind`
    pub fn new(kind: ProviderKind, endpoint: &str, timeout: Duration, max_tokens: u32) -> Self {
        let backend = match kind {
            ProviderKind::ChatGpt => Backend::OpenAI(OpenAI::new(endpoint, timeout)),
            ProviderKind::Claude => Backend::Anthropic(Anthropic::new(endpoint, timeout)),
            ProviderKind::Gemini => Backend::Gemini(Gemini::new(endpoint, timeout)),
        };
        Self {
            kind,
            backend,
            max_tokens,
        }
    }

    /// Create a gateway from the application configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.provider,
            &config.endpoint,
            Duration::from_secs(config.completion.timeout_secs),
            config.completion.max_tokens,
        )
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }
}

#[async_trait]
impl CompletionGateway for ProviderGateway {
    async fn send(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
        api_key: &str,
    ) -> Result<String, ProviderError> {
        let model = self.kind.bare_model(model);
        debug!(
            "Sending {} message(s) to {} model {}",
            messages.len(),
            self.kind.display_name(),
            model
        );

        match &self.backend {
            Backend::OpenAI(client) => {
                let request = OpenAIRequest {
                    model,
                    messages,
                    temperature,
                    max_tokens: self.max_tokens,
                };
                let response = client.complete(&request, api_key).await?;
                OpenAI::extract_text_from_response(&response)
            }
            Backend::Anthropic(client) => {
                let request = AnthropicRequest::from_messages(model, self.max_tokens, temperature, messages);
                let response = client.complete(&request, api_key).await?;
                Ok(Anthropic::extract_text_from_response(&response))
            }
            Backend::Gemini(client) => {
                let request = GeminiRequest::from_messages(messages, temperature, self.max_tokens);
                let response = client.complete(model, &request, api_key).await?;
                Gemini::extract_text_from_response(&response)
            }
        }
    }
}
