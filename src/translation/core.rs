/*!
 * Core translation pipeline.
 *
 * Text is protected with the glossary, split into sentence units, translated
 * unit by unit in original order, rejoined, and restored. Each unit call is
 * bounded by a timeout and a retry budget.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::TranslationError;
use crate::providers::{MachineTranslator, RetryPolicy};
use super::glossary::{protect, restore_with_report, GlossaryMap, RestoreTable};
use super::sentences::{self, split};

/// What to do when a unit exhausts its retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFailurePolicy {
    /// Abort with `TranslationError`
    #[default]
    Fail,
    /// Keep the untranslated unit and record it as degraded
    KeepSource,
}

/// Translation direction for the standalone utility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Source language to target language
    ToTarget,
    /// Target language back to source language
    ToSource,
}

/// Translation leg settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Language of the caller's prompts (ISO 639-1, optionally with region)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Language sent to the model
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Retries per unit after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Timeout for a single unit call
    #[serde(default = "default_unit_timeout_secs")]
    pub unit_timeout_secs: u64,

    /// Behaviour once a unit exhausts its retries
    #[serde(default)]
    pub on_unit_failure: UnitFailurePolicy,
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "zh-CN".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_unit_timeout_secs() -> u64 {
    30
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            source_language: default_source_language(),
            target_language: default_target_language(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            unit_timeout_secs: default_unit_timeout_secs(),
            on_unit_failure: UnitFailurePolicy::default(),
        }
    }
}

impl TranslatorConfig {
    /// Retry policy applied to each unit call
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            self.backoff_base_ms,
            Duration::from_secs(self.unit_timeout_secs),
        )
    }
}

/// Counters collected while translating one text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslationMetrics {
    /// Sentence units sent to the NMT service
    pub units: usize,
    /// NMT calls made, retries included
    pub attempts: u32,
    /// Calls beyond the first per unit
    pub retries: u32,
    /// Glossary occurrences replaced by placeholders
    pub protected_terms: usize,
    /// Placeholders recovered from a mangled form
    pub recovered_placeholders: usize,
    /// Placeholders lost and reinserted by position
    pub reinserted_placeholders: usize,
    /// Units kept untranslated after exhausting retries
    pub degraded_units: Vec<usize>,
}

impl TranslationMetrics {
    /// Fold the counters of another leg into this one
    pub fn merge(&mut self, other: &TranslationMetrics) {
        self.units += other.units;
        self.attempts += other.attempts;
        self.retries += other.retries;
        self.protected_terms += other.protected_terms;
        self.recovered_placeholders += other.recovered_placeholders;
        self.reinserted_placeholders += other.reinserted_placeholders;
        self.degraded_units.extend(other.degraded_units.iter().copied());
    }
}

/// Output of one translation leg
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslatedText {
    /// Final text with placeholders restored
    pub text: String,
    /// Placeholders used on this leg
    pub restore_table: RestoreTable,
    /// Counters for this leg
    pub metrics: TranslationMetrics,
}

impl TranslatedText {
    fn empty() -> Self {
        Self {
            text: String::new(),
            restore_table: RestoreTable::default(),
            metrics: TranslationMetrics::default(),
        }
    }
}

/// Sentence-chunked translator over an NMT backend
#[derive(Debug, Clone)]
pub struct Translator<T: MachineTranslator> {
    /// NMT backend
    backend: T,
    /// Languages and retry budget
    config: TranslatorConfig,
}

impl<T: MachineTranslator> Translator<T> {
    pub fn new(backend: T, config: TranslatorConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn backend(&self) -> &T {
        &self.backend
    }

    /// Translate into the target language, protecting glossary terms
    pub async fn to_target(&self, text: &str, glossary: &GlossaryMap) -> Result<TranslatedText, TranslationError> {
        self.run(
            text,
            glossary,
            &self.config.source_language,
            &self.config.target_language,
        )
        .await
    }

    /// Translate back into the source language.
    ///
    /// The glossary is directional and only applies on the outbound leg.
    pub async fn to_source(&self, text: &str) -> Result<TranslatedText, TranslationError> {
        self.run(
            text,
            &GlossaryMap::empty(),
            &self.config.target_language,
            &self.config.source_language,
        )
        .await
    }

    /// Translate back into the source language with an explicit glossary
    pub async fn to_source_with_glossary(
        &self,
        text: &str,
        glossary: &GlossaryMap,
    ) -> Result<TranslatedText, TranslationError> {
        self.run(
            text,
            glossary,
            &self.config.target_language,
            &self.config.source_language,
        )
        .await
    }

    /// Translate `text` in `direction`.
    ///
    /// For `Direction::ToSource` the glossary is inverted, so target
    /// renderings are mapped back to their source terms.
    pub async fn translate(
        &self,
        text: &str,
        direction: Direction,
        glossary: &GlossaryMap,
    ) -> Result<String, TranslationError> {
        let translated = match direction {
            Direction::ToTarget => self.to_target(text, glossary).await?,
            Direction::ToSource => self.to_source_with_glossary(text, &glossary.inverted()).await?,
        };
        Ok(translated.text)
    }

    async fn run(
        &self,
        text: &str,
        glossary: &GlossaryMap,
        source_language: &str,
        target_language: &str,
    ) -> Result<TranslatedText, TranslationError> {
        if text.trim().is_empty() {
            return Ok(TranslatedText::empty());
        }

        let (protected, restore_table) = protect(text, glossary);
        let units = split(&protected);
        let policy = self.config.retry_policy();

        let mut metrics = TranslationMetrics {
            units: units.len(),
            protected_terms: restore_table.len(),
            ..TranslationMetrics::default()
        };

        debug!(
            "Translating {} unit(s) {} -> {}",
            units.len(),
            source_language,
            target_language
        );

        let mut translated: Vec<String> = Vec::with_capacity(units.len());
        for unit in &units {
            let label = format!("NMT unit {}", unit.index);
            let outcome = policy
                .run(&label, || {
                    self.backend
                        .translate_unit(&unit.text, source_language, target_language)
                })
                .await;

            match outcome {
                Ok((output, attempts)) => {
                    metrics.attempts += attempts;
                    metrics.retries += attempts - 1;
                    translated.push(output.trim().to_string());
                }
                Err(failure) => {
                    metrics.attempts += failure.attempts;
                    metrics.retries += failure.attempts.saturating_sub(1);
                    match self.config.on_unit_failure {
                        UnitFailurePolicy::Fail => {
                            return Err(TranslationError::UnitFailed {
                                index: unit.index,
                                attempts: failure.attempts,
                                source: failure.error,
                            });
                        }
                        UnitFailurePolicy::KeepSource => {
                            warn!(
                                "Unit {} kept untranslated after {} attempt(s): {}",
                                unit.index, failure.attempts, failure.error
                            );
                            metrics.degraded_units.push(unit.index);
                            translated.push(unit.text.clone());
                        }
                    }
                }
            }
        }

        let joined = sentences::join(&translated);
        let text = if restore_table.is_empty() {
            joined.trim().to_string()
        } else {
            let (restored, report) = restore_with_report(&joined, &restore_table);
            metrics.recovered_placeholders = report.recovered;
            metrics.reinserted_placeholders = report.reinserted;
            restored
        };

        Ok(TranslatedText {
            text,
            restore_table,
            metrics,
        })
    }
}
