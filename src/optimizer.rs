/*!
 * Prompt optimizer: the end-to-end completion pipeline.
 *
 * A completion runs these steps in order:
 * 1. translate the system prompt to the target language, protecting glossary terms
 * 2. append the guard instructions
 * 3. assemble messages with the evidence block and few-shot turns
 * 4. clamp the temperature
 * 5. call the completion gateway (plain, or Skeleton-of-Thought)
 * 6. translate the response back to the source language
 * 7. check grounding of the response against the original prompt and message
 * 8. compute token savings of the translated system prompt
 *
 * Steps 1 to 6 are fatal on failure. Steps 7 and 8 are diagnostic and
 * degrade to an omitted field with a warning.
 */

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::errors::{ConfigurationError, GatewayError, OptimizerError};
use crate::guard::prompts::with_context;
use crate::guard::{
    build_few_shot_turns, build_guarded_prompt, FewShotExample, GroundingResult, GuardOptions,
    LexicalGroundingChecker, SourceGrounding,
};
use crate::providers::{ChatMessage, CompletionGateway, MachineTranslator, RetryPolicy};
use crate::sot::SkeletonOfThought;
use crate::tokenizer::{approx_tokens, savings_with, SavingsReport, TiktokenCounter, TokenCounter};
use crate::translation::{GlossaryMap, TranslationMetrics, Translator};

/// Inputs of one completion
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// System prompt in the source language
    pub system_prompt: String,
    /// End-user message, sent as is
    pub user_message: String,
    /// Glossary pairs, validated before any external call
    pub glossary: Vec<(String, String)>,
    /// Guard settings; `None` uses the configured defaults
    pub options: Option<GuardOptions>,
    /// Verified evidence prepended to the user message
    pub context_snippets: Vec<String>,
    /// Demonstration turns inserted before the user message
    pub few_shot_examples: Vec<FewShotExample>,
    /// Compute a savings report
    pub return_savings: bool,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            ..Self::default()
        }
    }

    /// Add one glossary term
    pub fn glossary_term(mut self, term: impl Into<String>, rendering: impl Into<String>) -> Self {
        self.glossary.push((term.into(), rendering.into()));
        self
    }

    /// Add several glossary terms
    pub fn glossary<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.glossary
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn options(mut self, options: GuardOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn context<I, S>(mut self, snippets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_snippets.extend(snippets.into_iter().map(Into::into));
        self
    }

    pub fn few_shot(mut self, examples: Vec<FewShotExample>) -> Self {
        self.few_shot_examples.extend(examples);
        self
    }

    pub fn return_savings(mut self, enabled: bool) -> Self {
        self.return_savings = enabled;
        self
    }
}

/// Outcome of one completion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionResult {
    /// Model response, translated back unless disabled
    pub response: String,
    /// Model response in the target language
    pub raw_response: String,
    /// Augmented system prompt actually sent
    pub target_system_prompt: String,
    /// Present when requested and computable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings: Option<SavingsReport>,
    /// Present when grounding is enabled and the check succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding: Option<GroundingResult>,
    /// Translation counters of both legs
    pub metrics: TranslationMetrics,
    /// Outline points when Skeleton-of-Thought was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Vec<String>>,
}

/// End-to-end pipeline over an NMT backend and a completion gateway
pub struct PromptOptimizer<T: MachineTranslator, G: CompletionGateway> {
    translator: Translator<T>,
    gateway: G,
    config: Config,
    token_counter: Arc<dyn TokenCounter>,
    grounding: Box<dyn SourceGrounding>,
}

impl<T: MachineTranslator, G: CompletionGateway> PromptOptimizer<T, G> {
    /// Create an optimizer; the configuration is validated here
    pub fn new(config: Config, translator: T, gateway: G) -> Result<Self, ConfigurationError> {
        config.validate()?;
        info!(
            "Prompt optimizer ready: {} via {}",
            config.completion_model(),
            config.provider.display_name()
        );
        Ok(Self {
            translator: Translator::new(translator, config.translation.clone()),
            gateway,
            config,
            token_counter: Arc::new(TiktokenCounter),
            grounding: Box::new(LexicalGroundingChecker),
        })
    }

    /// Replace the token counting backend
    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = counter;
        self
    }

    /// Replace the grounding checker
    pub fn with_grounding_checker(mut self, checker: Box<dyn SourceGrounding>) -> Self {
        self.grounding = checker;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn translator(&self) -> &Translator<T> {
        &self.translator
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn completion_retry(&self) -> RetryPolicy {
        let completion = &self.config.completion;
        RetryPolicy::new(
            completion.retry_count,
            completion.retry_backoff_ms,
            Duration::from_secs(completion.timeout_secs),
        )
    }

    /// Model name handed to the tokenizer
    fn tokenizer_model(&self) -> String {
        let model = self.config.completion_model();
        self.config.provider.bare_model(&model).to_string()
    }

    fn savings(&self, source_text: &str, target_text: &str) -> Option<SavingsReport> {
        match savings_with(
            self.token_counter.as_ref(),
            source_text,
            target_text,
            &self.tokenizer_model(),
        ) {
            Ok(report) => {
                debug!("{}", report.summary());
                Some(report)
            }
            Err(e) => {
                warn!("Token savings unavailable: {}", e);
                None
            }
        }
    }

    /// Run the full completion pipeline
    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult, OptimizerError> {
        // Reject malformed input before any external call
        if request.system_prompt.trim().is_empty() {
            return Err(ConfigurationError::EmptyInput("System prompt").into());
        }
        if request.user_message.trim().is_empty() {
            return Err(ConfigurationError::EmptyInput("User message").into());
        }
        let options = request.options.clone().unwrap_or_else(|| self.config.guard.clone());
        options.validate()?;
        let glossary = GlossaryMap::new(request.glossary.iter().cloned())?;

        let outbound = self
            .translator
            .to_target(&request.system_prompt, &glossary)
            .await?;
        let mut metrics = outbound.metrics.clone();
        info!(
            "Translated system prompt ({} unit(s), {} protected term(s))",
            metrics.units, metrics.protected_terms
        );

        let target_system_prompt = build_guarded_prompt(&outbound.text, &options);
        let user_content = with_context(&request.user_message, &request.context_snippets);
        let temperature = options.effective_temperature();
        let model = self.config.completion_model();

        let (raw_response, skeleton) = match &self.config.sot {
            Some(settings) => {
                let sot = SkeletonOfThought::new(
                    &self.gateway,
                    &model,
                    &self.config.api_key,
                    temperature,
                    self.completion_retry(),
                    *settings,
                );
                let output = sot.complete(&target_system_prompt, &user_content).await?;
                (output.response, Some(output.skeleton))
            }
            None => {
                let mut messages = Vec::with_capacity(2 + request.few_shot_examples.len() * 2);
                messages.push(ChatMessage::system(target_system_prompt.clone()));
                messages.extend(build_few_shot_turns(&request.few_shot_examples));
                messages.push(ChatMessage::user(user_content));

                let (text, attempts) = self
                    .completion_retry()
                    .run("Completion", || {
                        self.gateway
                            .send(&messages, &model, temperature, &self.config.api_key)
                    })
                    .await
                    .map_err(|failure| GatewayError::from_provider(&failure.error, failure.attempts))?;
                debug!("Completion succeeded after {} attempt(s)", attempts);
                (text, None)
            }
        };

        let response = if self.config.translate_response {
            let inbound = self.translator.to_source(&raw_response).await?;
            metrics.merge(&inbound.metrics);
            inbound.text
        } else {
            raw_response.clone()
        };

        let grounding = if options.use_source_grounding {
            let source = format!("{}\n{}", request.system_prompt, request.user_message);
            match self.grounding.check(&source, &response, options.min_overlap_ratio) {
                Ok(result) => {
                    if let Some(warning) = &result.warning {
                        warn!("{}", warning);
                    }
                    Some(result)
                }
                Err(e) => {
                    warn!("Grounding check failed, omitting result: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let savings = if request.return_savings {
            self.savings(&request.system_prompt, &outbound.text)
        } else {
            None
        };

        Ok(CompletionResult {
            response,
            raw_response,
            target_system_prompt,
            savings,
            grounding,
            metrics,
            skeleton,
        })
    }

    /// Translate a system prompt and report its token counts without
    /// calling the completion gateway.
    pub async fn count_system_prompt_tokens(
        &self,
        system_prompt: &str,
        glossary: &[(String, String)],
    ) -> Result<SavingsReport, OptimizerError> {
        if system_prompt.trim().is_empty() {
            return Err(ConfigurationError::EmptyInput("System prompt").into());
        }
        let glossary = GlossaryMap::new(glossary.iter().cloned())?;
        let translated = self.translator.to_target(system_prompt, &glossary).await?;

        Ok(self.savings(system_prompt, &translated.text).unwrap_or_else(|| {
            SavingsReport::from_counts(approx_tokens(system_prompt), approx_tokens(&translated.text))
        }))
    }
}
