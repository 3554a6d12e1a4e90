//! Response repair — turns raw model output into a parsed JSON object without
//! inventing any field values.
//!
//! Pipeline, in order:
//! 1. Fence stripping: a wholly fenced block loses its fences and language tag.
//! 2. Prose trimming: the first fenced block inside surrounding prose is used;
//!    without one, text around the outermost `{…}` / `[…]` is dropped.
//! 3. Escape normalization: backslashes that start no JSON escape are removed.
//! 4. Line-pair comma repair, iterated to a fixed point or `MAX_REPAIR_PASSES`.
//! 5. Strict `serde_json` parse; arrays are unwrapped to their first object.
//!
//! Steps 1–4 are text-only and idempotent: repairing repaired text is a no-op.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::fallback::bounded_prefix;
use crate::analysis::models::normalize_dimension_id;

/// Hard cap on comma-repair passes.
pub const MAX_REPAIR_PASSES: u32 = 10;

/// Raw text could not be coerced into a JSON object. Both texts are kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason}")]
pub struct RepairFailure {
    pub reason: String,
    pub raw: String,
    pub repaired: String,
}

/// Result of the text-level repair steps.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedText {
    pub text: String,
    /// Comma-repair passes executed, including the one confirming the fixed point.
    pub passes: u32,
    /// True when the pass limit was hit before a fixed point was confirmed.
    pub cap_reached: bool,
}

/// A parsed document ready for validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedDocument {
    pub document: Map<String, Value>,
    pub repaired_text: String,
    pub passes: u32,
    pub cap_reached: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Entry points
// ────────────────────────────────────────────────────────────────────────────

/// Repairs and parses a raw model response.
pub fn repair_response(raw: &str) -> Result<RepairedDocument, RepairFailure> {
    let repaired = repair_text(raw);

    if repaired.cap_reached {
        warn!(
            "Comma repair hit the {} pass cap without reaching a fixed point; attempting parse anyway",
            MAX_REPAIR_PASSES
        );
    } else {
        debug!("Comma repair reached a fixed point after {} passes", repaired.passes);
    }

    let failure = |reason: String| RepairFailure {
        reason,
        raw: raw.to_string(),
        repaired: repaired.text.clone(),
    };

    let parsed: Value = serde_json::from_str(&repaired.text).map_err(|e| {
        warn!(
            "Repaired response still fails to parse ({e}); prefix: {:?}",
            bounded_prefix(&repaired.text, 200)
        );
        failure(format!("response is not valid JSON after repair: {e}"))
    })?;

    let mut document = unwrap_document(parsed).ok_or_else(|| {
        failure("response is neither a JSON object nor an array starting with an object".to_string())
    })?;

    normalize_score_keys(&mut document);

    Ok(RepairedDocument {
        document,
        repaired_text: repaired.text,
        passes: repaired.passes,
        cap_reached: repaired.cap_reached,
    })
}

/// Applies the text-level repair steps.
pub fn repair_text(raw: &str) -> RepairedText {
    let text = strip_code_fence(raw);
    let text = trim_surrounding_prose(text);
    let text = normalize_escapes(text);
    let (text, passes, cap_reached) = repair_commas(text);
    RepairedText {
        text,
        passes,
        cap_reached,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Text steps
// ────────────────────────────────────────────────────────────────────────────

/// Strips a ```` ``` ```` fence (with optional language tag) wrapping the whole text.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.len() < 6 || !trimmed.starts_with("```") || !trimmed.ends_with("```") {
        return trimmed;
    }

    skip_language_tag(&trimmed[3..trimmed.len() - 3]).trim()
}

/// Drops a bare-word language tag line (e.g. `json`) following an opening fence.
fn skip_language_tag(inner: &str) -> &str {
    match inner.split_once('\n') {
        Some((first_line, rest))
            if first_line
                .trim()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
        {
            rest
        }
        _ => inner,
    }
}

/// Body of the first complete ```` ``` ```` block, if it holds anything.
fn first_fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let body = skip_language_tag(&text[open + 3..]);
    let close = body.find("```")?;
    Some(body[..close].trim()).filter(|block| !block.is_empty())
}

/// Prefers the first fenced block embedded in prose. Otherwise keeps the span from
/// the first `{`/`[` to the last `}`/`]`, or everything from the opening bracket
/// when no closing one follows (truncated output).
fn trim_surrounding_prose(text: &str) -> &str {
    let text = text.trim();
    let starts_structured = text.starts_with('{') || text.starts_with('[');
    let ends_structured = text.ends_with('}') || text.ends_with(']');
    if starts_structured && ends_structured {
        return text;
    }

    if let Some(block) = first_fenced_block(text) {
        return block;
    }

    let Some(start) = text.find(['{', '[']) else {
        return text;
    };
    match text.rfind(['}', ']']) {
        Some(end) if end > start => &text[start..=end],
        _ => &text[start..],
    }
}

/// Removes backslashes that do not begin a JSON escape sequence.
fn normalize_escapes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }

        match chars.get(i + 1).copied() {
            Some(next @ ('\\' | '/' | '"' | 'b' | 'f' | 'n' | 'r' | 't')) => {
                out.push('\\');
                out.push(next);
                i += 2;
            }
            Some('u') if is_unicode_escape(&chars[i + 2..]) => {
                out.push_str("\\u");
                i += 2;
            }
            // Stray backslash: drop it, keep whatever follows.
            _ => i += 1,
        }
    }
    out
}

fn is_unicode_escape(rest: &[char]) -> bool {
    rest.len() >= 4 && rest[..4].iter().all(|c| c.is_ascii_hexdigit())
}

/// Runs comma passes until nothing changes or the cap is hit.
fn repair_commas(text: String) -> (String, u32, bool) {
    let mut current = text;
    for pass in 1..=MAX_REPAIR_PASSES {
        let next = comma_pass(&current);
        if next == current {
            return (current, pass, false);
        }
        current = next;
    }
    (current, MAX_REPAIR_PASSES, true)
}

/// One pass over adjacent non-empty line pairs:
/// - two sibling elements with no separating comma get one;
/// - a comma directly before a closing `}`/`]` is removed.
fn comma_pass(text: &str) -> String {
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    let mut previous: Option<usize> = None;

    for i in 0..lines.len() {
        let current = lines[i].trim().to_string();
        if current.is_empty() {
            continue;
        }

        if let Some(p) = previous {
            let prev = lines[p].trim_end().to_string();
            if needs_comma(&prev, &current) {
                lines[p] = format!("{prev},");
            } else if prev.ends_with(',') && (current.starts_with('}') || current.starts_with(']')) {
                lines[p] = prev[..prev.len() - 1].to_string();
            }
        }
        previous = Some(i);
    }

    lines.join("\n")
}

/// True when `prev` ends a complete value and `next` starts a new sibling.
fn needs_comma(prev: &str, next: &str) -> bool {
    let next_opens = next.starts_with('"') || next.starts_with('{') || next.starts_with('[');
    if !next_opens {
        return false;
    }

    match prev.chars().last() {
        Some('}' | ']' | '"') => true,
        Some(c) if c.is_ascii_digit() => true,
        _ => prev.ends_with("true") || prev.ends_with("false") || prev.ends_with("null"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Document steps
// ────────────────────────────────────────────────────────────────────────────

/// Objects pass through; a non-empty array whose first element is an object is
/// unwrapped to that element. Extra elements are dropped.
fn unwrap_document(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Array(items) => {
            let total = items.len();
            match items.into_iter().next() {
                Some(Value::Object(map)) => {
                    if total > 1 {
                        warn!(
                            "Model returned an array of {total} documents; using the first and ignoring {}",
                            total - 1
                        );
                    }
                    Some(map)
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Rewrites `scores` keys onto the underscore convention. A key already in the
/// internal form wins over a differently-separated duplicate.
fn normalize_score_keys(document: &mut Map<String, Value>) {
    let Some(Value::Object(scores)) = document.get_mut("scores") else {
        return;
    };

    let original = std::mem::take(scores);
    let (canonical, other): (Vec<_>, Vec<_>) = original
        .into_iter()
        .partition(|(key, _)| normalize_dimension_id(key) == *key);

    for (key, value) in canonical {
        scores.insert(key, value);
    }
    for (key, value) in other {
        let normalized = normalize_dimension_id(&key);
        if scores.contains_key(&normalized) {
            debug!("Dropping duplicate score key '{key}' (already have '{normalized}')");
            continue;
        }
        scores.insert(normalized, value);
    }
}
