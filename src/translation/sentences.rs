/*!
 * Sentence splitting for chunked translation.
 *
 * A best-effort heuristic, not an NLP parser: text is split after `.`, `!`
 * or `?` followed by whitespace, and after the full-width terminators
 * `。！？` with or without whitespace. Common abbreviations, initials and
 * periods followed by a lowercase word are not treated as boundaries.
 * Decimal numbers never split since their period is not followed by
 * whitespace.
 */

use serde::Serialize;

/// Abbreviations whose trailing period does not end a sentence
const ABBREVIATIONS: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "vs.", "e.g.", "i.e.", "inc.",
    "ltd.", "co.", "no.", "fig.", "approx.", "dept.", "est.", "u.s.", "u.k.", "a.m.", "p.m.",
];

/// An ordered segment of the original text, terminal punctuation included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentenceUnit {
    /// Position in the original text
    pub index: usize,
    /// Segment text, trimmed
    pub text: String,
}

fn is_ascii_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_wide_terminal(c: char) -> bool {
    matches!(c, '。' | '！' | '？')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '}' | '”' | '’' | '」' | '』' | '）')
}

/// Whether the period at `dot` (a byte offset into `text`) is part of an
/// abbreviation or initial rather than a sentence end.
fn is_abbreviation(text: &str, dot: usize) -> bool {
    let word_start = text[..dot]
        .rfind(char::is_whitespace)
        .map(|i| i + text[i..].chars().next().map_or(1, |c| c.len_utf8()))
        .unwrap_or(0);
    let word = text[word_start..=dot].trim_start_matches(['(', '"', '\'']);
    let lower = word.to_lowercase();
    if ABBREVIATIONS.contains(&lower.as_str()) {
        return true;
    }
    // Single-letter initial such as "J."
    let mut chars = word.chars();
    matches!((chars.next(), chars.next(), chars.next()), (Some(c), Some('.'), None) if c.is_uppercase())
}

/// Split `text` into translation units.
///
/// Joining the units with single spaces reproduces the text up to
/// whitespace. Non-empty input never yields an empty sequence, and input
/// without terminal punctuation yields a single unit.
pub fn split(text: &str) -> Vec<SentenceUnit> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let chars: Vec<(usize, char)> = trimmed.char_indices().collect();
    let len = chars.len();
    let byte_at = |i: usize| if i < len { chars[i].0 } else { trimmed.len() };

    let mut segments: Vec<&str> = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < len {
        let (pos, c) = chars[i];

        if is_wide_terminal(c) {
            let mut j = i + 1;
            while j < len && (is_wide_terminal(chars[j].1) || is_closer(chars[j].1)) {
                j += 1;
            }
            segments.push(&trimmed[start..byte_at(j)]);
            while j < len && chars[j].1.is_whitespace() {
                j += 1;
            }
            start = byte_at(j);
            i = j;
            continue;
        }

        if is_ascii_terminal(c) {
            let mut j = i + 1;
            while j < len && (is_ascii_terminal(chars[j].1) || is_closer(chars[j].1)) {
                j += 1;
            }
            if j < len && chars[j].1.is_whitespace() {
                let mut next = j;
                while next < len && chars[next].1.is_whitespace() {
                    next += 1;
                }
                let lowercase_follows = next < len && chars[next].1.is_lowercase();
                let non_terminal = c == '.' && (is_abbreviation(trimmed, pos) || lowercase_follows);
                if !non_terminal {
                    segments.push(&trimmed[start..byte_at(j)]);
                    start = byte_at(next);
                }
                i = next;
                continue;
            }
            i = j;
            continue;
        }

        i += 1;
    }

    if start < trimmed.len() {
        segments.push(&trimmed[start..]);
    }

    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(index, s)| SentenceUnit {
            index,
            text: s.to_string(),
        })
        .collect()
}

/// Reassemble units in order, joined by a single space.
///
/// No space follows a unit ending in a full-width terminator, since CJK
/// text is not whitespace-delimited.
pub fn join(units: &[String]) -> String {
    let mut joined = String::new();
    for unit in units.iter().filter(|u| !u.is_empty()) {
        let wide_end = joined
            .chars()
            .rev()
            .find(|c| !is_closer(*c))
            .is_some_and(is_wide_terminal);
        if !joined.is_empty() && !wide_end {
            joined.push(' ');
        }
        joined.push_str(unit);
    }
    joined
}
