/*!
 * Lexical source-grounding check.
 *
 * Both texts are reduced to sets of normalized content terms and the share
 * of source terms found in the response is reported. This is a lexical
 * overlap signal only; it does not check entailment.
 *
 * Latin-script text is split into lowercase words, dropping stop words and
 * single characters. Runs of CJK ideographs contribute overlapping character
 * bigrams, since they are not whitespace-delimited.
 */

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::ConfigurationError;

/// Default minimum share of source terms the response must contain
pub const DEFAULT_MIN_OVERLAP_RATIO: f64 = 0.3;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
        "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
        "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
        "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
        "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself",
        "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on",
        "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same",
        "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
        "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
        "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
        "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
        "yourselves", "also", "may", "might", "must", "shall", "us",
    ]
    .into_iter()
    .collect()
});

/// Outcome of a grounding check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingResult {
    /// Whether the overlap reached the threshold
    pub grounded: bool,
    /// Share of source terms present in the response, in [0, 1]
    pub overlap_ratio: f64,
    /// Human-readable note, set only when not grounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Grounding backend, replaceable for testing
pub trait SourceGrounding: Send + Sync {
    /// Score `response_text` against `source_text`
    fn check(&self, source_text: &str, response_text: &str, min_overlap_ratio: f64) -> anyhow::Result<GroundingResult>;
}

/// The lexical-overlap checker
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalGroundingChecker;

impl SourceGrounding for LexicalGroundingChecker {
    fn check(&self, source_text: &str, response_text: &str, min_overlap_ratio: f64) -> anyhow::Result<GroundingResult> {
        Ok(check_source_grounding(source_text, response_text, min_overlap_ratio)?)
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

fn push_cjk_run(run: &mut Vec<char>, terms: &mut HashSet<String>) {
    match run.len() {
        0 => {}
        1 => {
            terms.insert(run[0].to_string());
        }
        _ => {
            for pair in run.windows(2) {
                terms.insert(pair.iter().collect());
            }
        }
    }
    run.clear();
}

fn push_word(word: &mut String, terms: &mut HashSet<String>) {
    if word.chars().count() >= 2 && !STOP_WORDS.contains(word.as_str()) {
        terms.insert(std::mem::take(word));
    }
    word.clear();
}

/// Normalized content terms of `text`
pub fn content_terms(text: &str) -> HashSet<String> {
    let mut terms = HashSet::new();
    let mut word = String::new();
    let mut run: Vec<char> = Vec::new();

    for c in text.chars() {
        if is_cjk(c) {
            push_word(&mut word, &mut terms);
            run.push(c);
        } else if c.is_alphanumeric() {
            push_cjk_run(&mut run, &mut terms);
            word.extend(c.to_lowercase());
        } else if c == '\'' || c == '’' {
            // Contractions stay one token; the apostrophe itself is dropped
        } else {
            push_word(&mut word, &mut terms);
            push_cjk_run(&mut run, &mut terms);
        }
    }
    push_word(&mut word, &mut terms);
    push_cjk_run(&mut run, &mut terms);
    terms
}

/// Check whether `response_text` is lexically grounded in `source_text`.
///
/// `overlap_ratio` is |source ∩ response| / |source|. A source with no
/// content terms yields a ratio of 0 and is treated as trivially grounded.
pub fn check_source_grounding(
    source_text: &str,
    response_text: &str,
    min_overlap_ratio: f64,
) -> Result<GroundingResult, ConfigurationError> {
    if !(0.0..=1.0).contains(&min_overlap_ratio) {
        return Err(ConfigurationError::InvalidOverlapRatio(min_overlap_ratio));
    }

    let source_terms = content_terms(source_text);
    if source_terms.is_empty() {
        return Ok(GroundingResult {
            grounded: true,
            overlap_ratio: 0.0,
            warning: None,
        });
    }

    let response_terms = content_terms(response_text);
    let shared = source_terms.intersection(&response_terms).count();
    let overlap_ratio = shared as f64 / source_terms.len() as f64;
    let grounded = overlap_ratio >= min_overlap_ratio;

    let warning = (!grounded).then(|| {
        format!(
            "Potential hallucination detected: response overlaps only {:.0}% of source key terms (threshold: {:.0}%).",
            overlap_ratio * 100.0,
            min_overlap_ratio * 100.0
        )
    });

    Ok(GroundingResult {
        grounded,
        overlap_ratio,
        warning,
    })
}
