/*!
 * Glossary protection for machine translation.
 *
 * Protected terms are swapped for opaque placeholder tokens before the text
 * reaches the NMT service, and the tokens are swapped for the glossary's
 * target rendering afterwards. Longer keys are matched first so a short key
 * never claims part of a longer overlapping one.
 *
 * Restoration is best-effort when the NMT service mangles a token. A single
 * tolerant pass over the translated text replaces tokens whether they came
 * back verbatim or with case changes, inserted spaces or lost underscores.
 * Renderings are never rescanned. Anything still missing is reinserted at
 * its relative position.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::errors::GlossaryError;

/// Default placeholder stem, as in `__PH_0__`
const DEFAULT_STEM: &str = "PH";

/// Matches tokens built from the default stem, mangled or not
static DEFAULT_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| tolerant_token_regex(DEFAULT_STEM).expect("Invalid placeholder regex"));

fn tolerant_token_regex(stem: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)_[\s_]*{}[\s_]*(\d+)(?:\s*_){{0,2}}", regex::escape(stem)))
}

/// A single protected term and its target-language rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlossaryEntry {
    /// Source term, matched case-sensitively
    pub term: String,
    /// Rendering written in its place after translation
    pub rendering: String,
}

/// Validated mapping from source terms to fixed renderings.
///
/// Entries are kept ordered by descending key length so that scanning in
/// order implements longest-match-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlossaryMap {
    entries: Vec<GlossaryEntry>,
}

fn normalize_key(key: &str) -> String {
    key.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl GlossaryMap {
    /// An empty glossary
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a glossary from term/rendering pairs.
    ///
    /// Rejects empty keys, repeated keys, and keys that only differ by
    /// whitespace.
    pub fn new<I, K, V>(pairs: I) -> Result<Self, GlossaryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut entries = Vec::new();

        for (term, rendering) in pairs {
            let term = term.into();
            if term.trim().is_empty() {
                return Err(GlossaryError::EmptyKey);
            }
            let normalized = normalize_key(&term);
            if let Some(previous) = seen.get(&normalized) {
                if *previous == term {
                    return Err(GlossaryError::DuplicateKey(term));
                }
                return Err(GlossaryError::AmbiguousKeys {
                    first: previous.clone(),
                    second: term,
                });
            }
            seen.insert(normalized, term.clone());
            entries.push(GlossaryEntry {
                term,
                rendering: rendering.into(),
            });
        }

        entries.sort_by(|a, b| {
            b.term
                .chars()
                .count()
                .cmp(&a.term.chars().count())
                .then_with(|| a.term.cmp(&b.term))
        });

        Ok(Self { entries })
    }

    /// Entries in match order (longest key first)
    pub fn entries(&self) -> &[GlossaryEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the glossary has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rendering configured for `term`
    pub fn get(&self, term: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.term == term)
            .map(|e| e.rendering.as_str())
    }

    /// Reverse glossary mapping renderings back to source terms.
    ///
    /// Identity entries and empty renderings are skipped, and when two terms
    /// share a rendering the first one in match order wins.
    pub fn inverted(&self) -> Self {
        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for entry in &self.entries {
            if entry.rendering.trim().is_empty() || entry.rendering == entry.term {
                continue;
            }
            if seen.insert(normalize_key(&entry.rendering)) {
                pairs.push((entry.rendering.clone(), entry.term.clone()));
            } else {
                debug!("Skipping duplicate rendering '{}' in inverted glossary", entry.rendering);
            }
        }
        // Pairs are unique by construction
        Self::new(pairs).unwrap_or_default()
    }
}

impl TryFrom<HashMap<String, String>> for GlossaryMap {
    type Error = GlossaryError;

    fn try_from(map: HashMap<String, String>) -> Result<Self, Self::Error> {
        Self::new(map)
    }
}

impl TryFrom<BTreeMap<String, String>> for GlossaryMap {
    type Error = GlossaryError;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        Self::new(map)
    }
}

/// One placeholder issued during protection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceholderEntry {
    /// Token written into the protected text
    pub token: String,
    /// Sequence number embedded in the token
    pub index: usize,
    /// Source term the token replaced
    pub term: String,
    /// Rendering restored in its place
    pub rendering: String,
    /// Relative position (0..=1) of the token in the protected text
    pub anchor: f64,
}

/// Placeholder table for a single protect/restore round-trip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestoreTable {
    stem: String,
    entries: Vec<PlaceholderEntry>,
}

impl Default for RestoreTable {
    fn default() -> Self {
        Self {
            stem: DEFAULT_STEM.to_string(),
            entries: Vec::new(),
        }
    }
}

impl RestoreTable {
    /// Issued placeholders in text order
    pub fn entries(&self) -> &[PlaceholderEntry] {
        &self.entries
    }

    /// Number of placeholders issued
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no placeholder was issued
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Token stem used by this table
    pub fn stem(&self) -> &str {
        &self.stem
    }
}

/// How each placeholder came back from the NMT service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    /// Tokens found verbatim
    pub exact: usize,
    /// Tokens found in mangled form
    pub recovered: usize,
    /// Tokens lost entirely and reinserted by position
    pub reinserted: usize,
}

fn choose_stem<'a>(text: &str, renderings: impl IntoIterator<Item = &'a str>) -> String {
    let squash = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase();
    let haystacks: Vec<String> = std::iter::once(squash(text))
        .chain(renderings.into_iter().map(squash))
        .collect();

    let mut n = 0usize;
    loop {
        let stem = if n == 0 {
            DEFAULT_STEM.to_string()
        } else {
            format!("{}X{}", DEFAULT_STEM, n)
        };
        let marker = format!("_{}", stem);
        if !haystacks.iter().any(|h| h.contains(&marker)) {
            return stem;
        }
        n += 1;
    }
}

fn char_ratio(text: &str, byte_pos: usize) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    text[..byte_pos].chars().count() as f64 / total as f64
}

/// Replace glossary terms in `text` with placeholder tokens.
///
/// Every occurrence gets its own token; the table maps each token to the
/// glossary's target rendering.
pub fn protect(text: &str, glossary: &GlossaryMap) -> (String, RestoreTable) {
    if glossary.is_empty() || text.is_empty() {
        return (text.to_string(), RestoreTable::default());
    }

    // (start, end, entry index)
    let mut claims: Vec<(usize, usize, usize)> = Vec::new();
    for (entry_index, entry) in glossary.entries().iter().enumerate() {
        for (start, matched) in text.match_indices(entry.term.as_str()) {
            let end = start + matched.len();
            if claims.iter().any(|&(s, e, _)| start < e && s < end) {
                continue;
            }
            claims.push((start, end, entry_index));
        }
    }

    if claims.is_empty() {
        return (text.to_string(), RestoreTable::default());
    }
    claims.sort_by_key(|&(start, _, _)| start);

    let stem = choose_stem(
        text,
        claims
            .iter()
            .map(|&(_, _, entry_index)| glossary.entries()[entry_index].rendering.as_str()),
    );
    let mut protected = String::with_capacity(text.len() + claims.len() * 8);
    let mut offsets = Vec::with_capacity(claims.len());
    let mut last = 0;
    for (index, &(start, end, entry_index)) in claims.iter().enumerate() {
        protected.push_str(&text[last..start]);
        offsets.push((protected.len(), index, entry_index));
        protected.push_str(&format!("__{}_{}__", stem, index));
        last = end;
    }
    protected.push_str(&text[last..]);

    let entries = offsets
        .into_iter()
        .map(|(offset, index, entry_index)| {
            let entry = &glossary.entries()[entry_index];
            PlaceholderEntry {
                token: format!("__{}_{}__", stem, index),
                index,
                term: entry.term.clone(),
                rendering: entry.rendering.clone(),
                anchor: char_ratio(&protected, offset),
            }
        })
        .collect::<Vec<_>>();

    debug!("Protected {} glossary occurrence(s)", entries.len());
    (protected, RestoreTable { stem, entries })
}

/// Replace placeholders in `text` with their renderings.
pub fn restore(text: &str, table: &RestoreTable) -> String {
    restore_with_report(text, table).0
}

/// Replace placeholders and report how each one was found.
pub fn restore_with_report(text: &str, table: &RestoreTable) -> (String, RestoreReport) {
    let mut report = RestoreReport::default();
    let mut found = vec![false; table.entries.len()];

    let owned_regex;
    let token_regex: &Regex = if table.stem == DEFAULT_STEM {
        &DEFAULT_TOKEN_REGEX
    } else {
        match tolerant_token_regex(&table.stem) {
            Ok(regex) => {
                owned_regex = regex;
                &owned_regex
            }
            Err(e) => {
                warn!("Could not build placeholder pattern for stem '{}': {}", table.stem, e);
                &DEFAULT_TOKEN_REGEX
            }
        }
    };

    // One pass over the NMT output so renderings are never rescanned
    let mut result = token_regex
        .replace_all(text, |caps: &regex::Captures| {
            let index = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok());
            match index.and_then(|i| table.entries.iter().position(|e| e.index == i)) {
                Some(pos) => {
                    found[pos] = true;
                    table.entries[pos].rendering.clone()
                }
                None => {
                    warn!("Dropping unknown placeholder '{}'", caps.get(0).map_or("", |m| m.as_str()));
                    String::new()
                }
            }
        })
        .into_owned();

    for (entry, &found) in table.entries.iter().zip(found.iter()) {
        if !found {
            continue;
        }
        if text.contains(&entry.token) {
            report.exact += 1;
        } else {
            report.recovered += 1;
        }
    }
    if report.recovered > 0 {
        warn!("Recovered {} mangled placeholder(s) after translation", report.recovered);
    }

    let mut missing: Vec<&PlaceholderEntry> = table
        .entries
        .iter()
        .zip(found.iter())
        .filter(|(_, found)| !**found)
        .map(|(entry, _)| entry)
        .collect();
    // Insert from the end so earlier anchors are unaffected
    missing.sort_by(|a, b| b.anchor.total_cmp(&a.anchor));
    for entry in missing {
        warn!(
            "Placeholder for '{}' was lost in translation; reinserting '{}' by position",
            entry.term, entry.rendering
        );
        result = insert_at_anchor(&result, &entry.rendering, entry.anchor);
        report.reinserted += 1;
    }

    (result.trim().to_string(), report)
}

/// Remove placeholder tokens built from the default stem.
pub fn strip_placeholders(text: &str) -> String {
    DEFAULT_TOKEN_REGEX.replace_all(text, "").trim().to_string()
}

fn needs_space(a: char, b: char) -> bool {
    a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric()
}

fn insert_at_anchor(text: &str, rendering: &str, anchor: f64) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut pos = ((anchor.clamp(0.0, 1.0) * len as f64).round() as usize).min(len);

    // Snap to the nearest word boundary in space-delimited text
    if chars.iter().any(|c| c.is_whitespace()) {
        let is_boundary =
            |p: usize| p == 0 || p == len || chars[p - 1].is_whitespace() || chars[p].is_whitespace();
        if let Some(offset) = (0..=len).find(|d| {
            (pos + d <= len && is_boundary(pos + d)) || (*d <= pos && is_boundary(pos - d))
        }) {
            pos = if pos + offset <= len && is_boundary(pos + offset) {
                pos + offset
            } else {
                pos - offset
            };
        }
    }

    let mut out = String::with_capacity(text.len() + rendering.len() + 2);
    out.extend(&chars[..pos]);
    if let (Some(&prev), Some(first)) = (chars[..pos].last(), rendering.chars().next()) {
        if needs_space(prev, first) {
            out.push(' ');
        }
    }
    out.push_str(rendering);
    if let (Some(&next), Some(last)) = (chars.get(pos), rendering.chars().last()) {
        if needs_space(last, next) {
            out.push(' ');
        }
    }
    out.extend(&chars[pos..]);
    out
}
