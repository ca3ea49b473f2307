//! Best-effort recovery of a JSON object from chatty model output.
//!
//! Models are asked for bare JSON and mostly comply, but replies come back
//! wrapped in prose, fenced in markdown, or written as Python literals. The
//! janitor runs an ordered list of parsers and keeps the first result.

use serde_json::Value;
use tracing::{debug, warn};

/// A parser strategy: `None` means "not my kind of input".
pub type Strategy = fn(&str) -> Option<Value>;

/// Strategies in the order they're tried.
pub const STRATEGIES: [(&str, Strategy); 3] = [
    ("strict", parse_strict),
    ("literal", parse_literal),
    ("braces", parse_braced),
];

/// Repairs `text` into a JSON value, or `None` when nothing worked.
pub fn janitor(text: &str) -> Option<Value> {
    let repaired = repair_with(&STRATEGIES, text);
    if repaired.is_none() {
        warn!("Janitor failed to clean response");
    }
    repaired
}

/// Runs `strategies` in order and returns the first success.
pub fn repair_with(strategies: &[(&str, Strategy)], text: &str) -> Option<Value> {
    strategies.iter().find_map(|(name, strategy)| {
        let value = strategy(text)?;
        debug!("Janitor recovered JSON with the {name} strategy");
        Some(value)
    })
}

/// Plain `serde_json`.
pub fn parse_strict(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}

/// Accepts Python-flavoured literals: single quoted strings, `True`,
/// `False`, `None` and trailing commas.
pub fn parse_literal(text: &str) -> Option<Value> {
    let rewritten = literal_to_json(text.trim())?;
    serde_json::from_str(&rewritten).ok()
}

/// Strict parse of whatever sits between the first `{` and the last `}`.
pub fn parse_braced(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn literal_to_json(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut idx = 0;

    while let Some(&ch) = chars.get(idx) {
        match ch {
            '"' | '\'' => {
                idx = copy_string(&chars, idx, &mut out)?;
                continue;
            }
            ',' => {
                let next = chars[idx + 1..]
                    .iter()
                    .find(|candidate| !candidate.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(',');
                }
            }
            ch if ch.is_ascii_alphabetic() || ch == '_' => {
                let start = idx;
                while chars
                    .get(idx)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
                {
                    idx += 1;
                }
                let word: String = chars[start..idx].iter().collect();
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
                continue;
            }
            _ => out.push(ch),
        }
        idx += 1;
    }

    Some(out)
}

/// Copies the string literal starting at `start` as a double quoted JSON
/// string, returning the index just past its closing quote.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> Option<usize> {
    let quote = chars[start];
    let mut idx = start + 1;
    out.push('"');

    loop {
        let ch = *chars.get(idx)?;
        match ch {
            '\\' => {
                let escaped = *chars.get(idx + 1)?;
                if escaped == '\'' {
                    out.push('\'');
                } else {
                    out.push('\\');
                    out.push(escaped);
                }
                idx += 2;
                continue;
            }
            c if c == quote => {
                out.push('"');
                return Some(idx + 1);
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => {}
            other => out.push(other),
        }
        idx += 1;
    }
}
