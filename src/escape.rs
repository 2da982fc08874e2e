//! Round-trip escaping for sanitized text that is re-serialized as markdown.
//!
//! Sanitized output is often re-parsed by a downstream markdown renderer. Any
//! text the sanitizer emits (including the plain-text fallbacks for blocked
//! links and images) must therefore be escaped so it cannot be reinterpreted
//! as markdown syntax — otherwise a fallback like `[text](href)` would
//! resurrect the very link that was just filtered.
//!
//! Two modes:
//! - [`commonmark_escape`] — backslash escaping per CommonMark 0.31.2 §2.4.
//!   The default.
//! - [`entity_escape`] — hex-entity replacement for sinks that compare bytes
//!   and where a backslash escape is not sufficient.

/// ASCII punctuation that may carry markdown meaning (CommonMark §2.4).
const MARKDOWN_PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Characters replaced in [`entity_escape`] mode.
const ENTITY_CLASS: &[char] = &[
    '<', '>', '&', '"', '\'', '[', ']', ':', '=', '/', '!', '(', ')', '\\', '@', '.',
];

fn is_markdown_punctuation(c: char) -> bool {
    c.is_ascii() && MARKDOWN_PUNCTUATION.contains(c)
}

/// Backslash-escape markdown-significant punctuation.
///
/// Scans left to right:
/// - `\\` is copied through as two literal backslashes;
/// - a backslash followed by a punctuation character is already a valid
///   escape and is copied through unchanged;
/// - a backslash followed by anything else is a literal backslash;
/// - any unescaped punctuation character is prefixed with `\`;
/// - everything else (whitespace, newlines, non-ASCII) passes through.
pub fn commonmark_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 2);
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek().copied() {
                Some('\\') => {
                    chars.next();
                    out.push_str("\\\\");
                }
                Some(next) if is_markdown_punctuation(next) => {
                    chars.next();
                    out.push('\\');
                    out.push(next);
                }
                _ => out.push('\\'),
            }
        } else if is_markdown_punctuation(c) {
            out.push('\\');
            out.push(c);
        } else {
            out.push(c);
        }
    }

    out
}

/// Replace dangerous characters with their hex-entity form (`&XX;`).
///
/// Stricter than [`commonmark_escape`]: the escaped character can no longer
/// be recovered by stripping a backslash, so byte-comparing sinks see inert
/// text. The character class matches the set the backslash mode protects
/// against link/image resurrection (`[ ] ( ) ! : /` and friends).
pub fn entity_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 2);
    for c in input.chars() {
        if ENTITY_CLASS.contains(&c) {
            out.push_str(&format!("&{:x};", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}
