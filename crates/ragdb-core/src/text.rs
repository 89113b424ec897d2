//! Text utilities shared by chunking, indexing and ranking.
//!
//! Tokenization here is the single definition used for both stored chunks and
//! queries; the ranker relies on the two never diverging.
use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Tokens must be longer than this many characters.
pub const MIN_TOKEN_LEN: usize = 2;

pub const MIN_QUERY_CHARS: usize = 3;
pub const MAX_QUERY_CHARS: usize = 1000;

const ALLOWED_PUNCTUATION: &str = ".,!?;:-()[]{}\"'/&%$#@+=*";

/// Lower-cased, purely alphabetic word tokens longer than two characters.
///
/// A word is a maximal run of alphanumeric characters or `_`; words that
/// contain digits, underscores or non-ASCII letters are dropped whole rather
/// than split.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| word.len() > MIN_TOKEN_LEN && word.chars().all(|c| c.is_ascii_alphabetic()))
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Normalize extracted document text before chunking.
///
/// Typographic quotes become ASCII, characters outside word characters and a
/// small punctuation set become spaces, and whitespace collapses to single
/// spaces. `[PAGE n]` markers survive unchanged.
pub fn normalize(text: &str) -> String {
    let filtered: String = text
        .chars()
        .map(straighten_quote)
        .map(|c| if is_kept_char(c) { c } else { ' ' })
        .collect();
    collapse_whitespace(&filtered)
}

/// Normalization for text shown to a reader or sent as generator context.
/// Like [`normalize`], and additionally collapses runs of `.`, `!`, `?` to
/// their last character.
pub fn clean_for_display(text: &str) -> String {
    let normalized = normalize(text);
    let mut out = String::with_capacity(normalized.len());
    let mut chars = normalized.chars().peekable();
    while let Some(c) = chars.next() {
        if !is_terminal(c) {
            out.push(c);
            continue;
        }
        let mut last = c;
        while let Some(&next) = chars.peek() {
            if !is_terminal(next) { break; }
            last = next;
            chars.next();
        }
        out.push(last);
    }
    out
}

/// Split on `.`, `!` or `?` followed by whitespace. Pieces are trimmed and
/// empty pieces are dropped; the punctuation stays with its sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c.is_whitespace() && prev.is_some_and(is_terminal) {
            push_trimmed(&mut sentences, &text[start..i]);
            let mut end = i + c.len_utf8();
            while let Some(&(j, next)) = chars.peek() {
                if !next.is_whitespace() { break; }
                end = j + next.len_utf8();
                chars.next();
            }
            start = end;
            prev = None;
            continue;
        }
        prev = Some(c);
    }
    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The last `n` characters of `text` (all of it when shorter).
pub fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 { return ""; }
    match text.char_indices().rev().nth(n - 1) {
        Some((i, _)) => &text[i..],
        None => text,
    }
}

/// The first `n` characters of `text` (all of it when shorter).
pub fn truncate_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// Reject user input that should not reach retrieval: blank, too short, too
/// long, or carrying script-injection patterns.
pub fn validate_query(query: &str) -> Result<()> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidQuery("query is empty".to_string()));
    }
    if char_len(trimmed) < MIN_QUERY_CHARS {
        return Err(Error::InvalidQuery(format!("query must be at least {MIN_QUERY_CHARS} characters")));
    }
    if char_len(query) > MAX_QUERY_CHARS {
        return Err(Error::InvalidQuery(format!("query must be at most {MAX_QUERY_CHARS} characters")));
    }
    let patterns = suspicious_patterns().as_ref().map_err(|e| Error::Operation(e.to_string()))?;
    if patterns.is_match(query) {
        return Err(Error::InvalidQuery("query contains disallowed content".to_string()));
    }
    Ok(())
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, piece: &'a str) {
    let piece = piece.trim();
    if !piece.is_empty() { out.push(piece); }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn straighten_quote(c: char) -> char {
    match c {
        '\u{201C}' | '\u{201D}' => '"',
        '\u{2018}' | '\u{2019}' => '\'',
        other => other,
    }
}

fn is_kept_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(c)
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn suspicious_patterns() -> &'static std::result::Result<Regex, regex::Error> {
    static RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script.*?>.*?</script>|javascript:|on\w+\s*=|eval\s*\(|document\.|window\."))
}
