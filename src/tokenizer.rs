/*!
 * Token counting and savings accounting.
 *
 * Counts use the model's BPE encoding through tiktoken when the model is
 * known, and a length heuristic of roughly one token per four characters
 * otherwise. Loaded encodings are cached per model.
 */

use anyhow::Result;
use log::debug;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

/// Average characters per token used by the fallback heuristic
const CHARS_PER_TOKEN: usize = 4;

/// Model used when the caller does not name one
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

static BPE_CACHE: Lazy<Mutex<HashMap<String, Option<Arc<CoreBPE>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Token counting backend
pub trait TokenCounter: Send + Sync {
    /// Count the tokens `text` uses for `model`
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize>;
}

/// tiktoken-backed counter with heuristic fallback for unknown models
#[derive(Debug, Default, Clone, Copy)]
pub struct TiktokenCounter;

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize> {
        Ok(count_tokens(text, model))
    }
}

fn bpe_for_model(model: &str) -> Option<Arc<CoreBPE>> {
    let mut cache = BPE_CACHE.lock();
    cache
        .entry(model.to_string())
        .or_insert_with(|| match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Some(Arc::new(bpe)),
            Err(e) => {
                debug!("No BPE encoding for model '{}' ({}); using heuristic", model, e);
                None
            }
        })
        .clone()
}

/// Character-based estimate used when the model's encoding is unknown
pub fn approx_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.chars().count().div_ceil(CHARS_PER_TOKEN).max(1)
}

/// Count the number of tokens `text` uses for `model`
pub fn count_tokens(text: &str, model: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    match bpe_for_model(model) {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => approx_tokens(text),
    }
}

/// Token savings of a target-language text over its source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavingsReport {
    /// Tokens used by the source-language text
    pub source_tokens: usize,
    /// Tokens used by the target-language text
    pub target_tokens: usize,
    /// `source_tokens - target_tokens`, negative when the target is longer
    pub tokens_saved: i64,
    /// Percentage reduction, 0 when the source is empty
    pub saving_pct: f64,
}

impl SavingsReport {
    /// Build a report from two counts
    pub fn from_counts(source_tokens: usize, target_tokens: usize) -> Self {
        let tokens_saved = source_tokens as i64 - target_tokens as i64;
        let saving_pct = if source_tokens > 0 {
            let pct = tokens_saved as f64 / source_tokens as f64 * 100.0;
            (pct * 100.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            source_tokens,
            target_tokens,
            tokens_saved,
            saving_pct,
        }
    }

    /// One-line summary for logs and the CLI
    pub fn summary(&self) -> String {
        format!(
            "Token savings: {} tokens ({}%) [source: {} target: {}]",
            self.tokens_saved, self.saving_pct, self.source_tokens, self.target_tokens
        )
    }
}

/// Savings report for `source_text` vs `target_text` with the default counter
pub fn token_savings_report(source_text: &str, target_text: &str, model: &str) -> SavingsReport {
    SavingsReport::from_counts(count_tokens(source_text, model), count_tokens(target_text, model))
}

/// Savings report using an arbitrary counter
pub fn savings_with(
    counter: &dyn TokenCounter,
    source_text: &str,
    target_text: &str,
    model: &str,
) -> Result<SavingsReport> {
    Ok(SavingsReport::from_counts(
        counter.count_tokens(source_text, model)?,
        counter.count_tokens(target_text, model)?,
    ))
}
