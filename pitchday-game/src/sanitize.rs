//! Defensive cleanup of generated text before it reaches the player.
//!
//! These rules are player-visible contracts: titles never echo their
//! descriptor prompts, pitches are capped at two sentences, and narratives
//! never carry numeric claims (numbers come only from the economics engine).

use regex::Regex;
use std::sync::OnceLock;

use crate::constants::{PITCH_MAX_SENTENCES, TITLE_FILTER_MIN_TOKEN_LEN};

fn label_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[A-Za-z][A-Za-z0-9 _-]{0,23}:").unwrap())
}

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[-*•]+\s*").unwrap())
}

fn currency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\$\s*\d[\d,]*(?:\.\d+)?\s*(?:k|m|bn|b|thousand|million|billion)?")
            .unwrap()
    })
}

fn spelled_money_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b\d[\d,]*(?:\.\d+)?\s*(?:dollars?|bucks?)\b").unwrap())
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d[\d,]*(?:\.\d+)?\s*%").unwrap())
}

fn bare_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:\d{4,}|\d{1,3}(?:,\d{3})+)\b").unwrap())
}

fn dangling_punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+([,.;:!?])").unwrap())
}

/// Drop whole lines shaped like `Label: ...` headings.
#[must_use]
pub fn strip_label_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !label_line_re().is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove leading bullet markers from each line.
#[must_use]
pub fn strip_bullets(text: &str) -> String {
    text.lines()
        .map(|line| bullet_re().replace(line, "").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse all whitespace runs (including newlines) to single spaces.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Segment into sentences on `[.!?]` boundaries. A trailing fragment with
/// no terminal punctuation still counts as a sentence.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            // Absorb runs like "?!" into the same sentence.
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let trailing = current.trim();
    if !trailing.is_empty() {
        sentences.push(trailing.to_string());
    }
    sentences
}

/// Full pitch cleanup: drop label headings and bullets, collapse
/// whitespace, then truncate to the first two sentences.
#[must_use]
pub fn clean_pitch(raw: &str) -> String {
    let text = collapse_whitespace(&strip_bullets(&strip_label_lines(raw)));
    split_sentences(&text)
        .into_iter()
        .take(PITCH_MAX_SENTENCES)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase and keep only alphanumerics, the comparison form used for
/// title filtering.
#[must_use]
pub fn normalize_token(token: &str) -> String {
    token
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn token_matches_banned(token: &str, banned: &str) -> bool {
    // Prefix matching either way so "tax" is caught by descriptor "taxes".
    token == banned || token.starts_with(banned) || banned.starts_with(token)
}

/// Remove title tokens echoing either descriptor. Tokens shorter than the
/// filter minimum always survive, so glue words are preserved. Returns
/// `None` when filtering leaves no words or fewer than three characters,
/// signalling the caller to substitute a deterministic fallback name.
#[must_use]
pub fn sanitize_title(raw: &str, descriptors: &[String; 2]) -> Option<String> {
    let banned: Vec<String> = descriptors
        .iter()
        .flat_map(|descriptor| descriptor.split_whitespace())
        .map(normalize_token)
        .filter(|token| token.len() >= TITLE_FILTER_MIN_TOKEN_LEN)
        .collect();

    let collapsed = collapse_whitespace(raw);
    let kept: Vec<&str> = collapsed
        .split_whitespace()
        .filter(|token| {
            let norm = normalize_token(token);
            if norm.len() < TITLE_FILTER_MIN_TOKEN_LEN {
                return true;
            }
            !banned.iter().any(|ban| token_matches_banned(&norm, ban))
        })
        .collect();

    if kept.is_empty() {
        return None;
    }
    let title = kept.join(" ");
    if title.chars().filter(char::is_ascii_alphanumeric).count() < 3 {
        return None;
    }
    Some(title)
}

/// Strip explicit currency amounts, "N dollars/bucks", percentages, and
/// bare 4+ digit numbers from narrative text. Numeric facts must come from
/// the economics engine, never from free text.
#[must_use]
pub fn strip_numeric_claims(raw: &str) -> String {
    let mut text = currency_re().replace_all(raw, "").into_owned();
    text = spelled_money_re().replace_all(&text, "").into_owned();
    text = percent_re().replace_all(&text, "").into_owned();
    text = bare_number_re().replace_all(&text, "").into_owned();
    let collapsed = collapse_whitespace(&text);
    dangling_punct_re().replace_all(&collapsed, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_lines_are_dropped_whole() {
        let raw = "Hook: This is the hook sentence.\nSecond sentence here. Third one too.";
        let cleaned = clean_pitch(raw);
        assert_eq!(cleaned, "Second sentence here. Third one too.");
    }

    #[test]
    fn bullets_and_whitespace_collapse() {
        assert_eq!(strip_bullets("- point one\n* point two"), "point one\npoint two");
        assert_eq!(collapse_whitespace("a\t b\n\n c"), "a b c");
    }

    #[test]
    fn sentences_split_with_trailing_fragment() {
        let parts = split_sentences("One. Two! Three without punctuation");
        assert_eq!(parts, vec!["One.", "Two!", "Three without punctuation"]);
    }

    #[test]
    fn pitch_truncates_to_two_sentences() {
        let cleaned = clean_pitch("First. Second. Third. Fourth.");
        assert_eq!(cleaned, "First. Second.");
    }

    #[test]
    fn title_filter_removes_descriptor_tokens() {
        let descriptors = ["neon armadillo".to_string(), "quarterly taxes".to_string()];
        let title = sanitize_title("Neon Armadillo Tax Tracker", &descriptors).unwrap();
        let lowered = title.to_lowercase();
        for banned in ["neon", "armadillo", "tax", "taxes"] {
            assert!(
                !lowered.split_whitespace().any(|t| normalize_token(t) == banned),
                "{banned} survived in {title}"
            );
        }
        assert_eq!(title, "Tracker");
    }

    #[test]
    fn title_filter_signals_empty_remainder() {
        let descriptors = ["neon armadillo".to_string(), "quarterly taxes".to_string()];
        assert_eq!(sanitize_title("Neon Armadillo Taxes", &descriptors), None);
        assert_eq!(sanitize_title("", &descriptors), None);
    }

    #[test]
    fn short_tokens_survive_filtering() {
        let descriptors = ["an ox".to_string(), "the big idea".to_string()];
        let title = sanitize_title("An Ox Of Note", &descriptors).unwrap();
        assert_eq!(title, "An Ox Of Note");
    }

    #[test]
    fn narratives_lose_numeric_claims() {
        let raw = "Sales hit $1,200,000 fast. Margins rose 40% on 50000 units, netting 900 bucks.";
        let cleaned = strip_numeric_claims(raw);
        assert!(!cleaned.contains('$'));
        assert!(!cleaned.contains('%'));
        assert!(!cleaned.contains("50000"));
        assert!(!cleaned.contains("bucks"));
        assert!(cleaned.contains("Sales hit"));
    }
}
