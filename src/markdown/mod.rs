//! Sanitization pipeline: parse → structural sanitize → re-serialize.
//!
//! [`MarkdownSanitizer`] is the one-shot surface; [`StreamingSanitizer`]
//! wraps it with a line buffer for incremental input. The pipeline enforces
//! the content-length cap by truncation (never by erroring), guarantees a
//! trailing newline on non-empty output, and converts any failure in the
//! external parser/serializer into an empty result — the security property
//! ("never emit unsanitized content") holds even when the happy path breaks.

pub mod parse;
pub mod render;

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{error, warn};

use crate::policy::{PolicyConfig, PolicyError};
use crate::sanitizer::StructuralSanitizer;

/// One-shot markdown sanitizer. Construction validates the policy once;
/// `sanitize` is stateless with respect to content and may be called
/// concurrently from multiple threads on independent inputs.
pub struct MarkdownSanitizer {
    config: PolicyConfig,
}

impl MarkdownSanitizer {
    /// Build a sanitizer, validating the policy's required-field
    /// combinations.
    pub fn new(config: PolicyConfig) -> Result<Self, PolicyError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active policy.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Sanitize markdown (or markdown-shaped HTML) to safe markdown.
    pub fn sanitize(&self, input: &str) -> String {
        let input = truncate(input, self.config.max_content_length);

        let result = catch_unwind(AssertUnwindSafe(|| {
            let html = parse::markdown_to_html(input);
            let tree = parse::html_to_tree(&html);
            let tree = StructuralSanitizer::new(&self.config).sanitize(tree);
            render::to_markdown(&tree, self.config.escape_mode)
        }));

        match result {
            Ok(mut output) => {
                if !output.is_empty() && !output.ends_with('\n') {
                    output.push('\n');
                }
                output
            }
            Err(_) => {
                error!("markdown sanitization failed; returning empty output");
                String::new()
            }
        }
    }
}

/// Truncate input to `max` bytes on a char boundary. `0` means unlimited.
fn truncate(input: &str, max: usize) -> &str {
    if max == 0 || input.len() <= max {
        return input;
    }
    let mut end = max;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    warn!(
        len = input.len(),
        max, "input exceeds maxContentLength; truncating"
    );
    &input[..end]
}

/// Incremental sanitizer for streamed input (e.g. LLM token streams).
///
/// Chunks accumulate in a line buffer; only the complete-line prefix is ever
/// sanitized, so a URL split across chunks cannot be evaluated in a half
/// state. One logical stream = one instance; the buffer is private to the
/// stream and not synchronized.
pub struct StreamingSanitizer {
    inner: MarkdownSanitizer,
    buffer: String,
}

impl StreamingSanitizer {
    pub fn new(config: PolicyConfig) -> Result<Self, PolicyError> {
        Ok(Self {
            inner: MarkdownSanitizer::new(config)?,
            buffer: String::new(),
        })
    }

    /// Append a chunk; returns the sanitized complete lines, or `""` if no
    /// line completed yet.
    pub fn write(&mut self, chunk: &str) -> String {
        self.buffer.push_str(chunk);
        match self.buffer.rfind('\n') {
            Some(idx) => {
                let complete: String = self.buffer.drain(..=idx).collect();
                self.inner.sanitize(&complete)
            }
            None => String::new(),
        }
    }

    /// Flush and sanitize any non-blank remainder.
    pub fn end(&mut self) -> String {
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            return String::new();
        }
        self.inner.sanitize(&rest)
    }
}

/// One-shot convenience: validate the policy and sanitize a single input.
pub fn sanitize_markdown(input: &str, config: PolicyConfig) -> Result<String, PolicyError> {
    Ok(MarkdownSanitizer::new(config)?.sanitize(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wildcard_config() -> PolicyConfig {
        PolicyConfig {
            allowed_link_prefixes: vec!["*".to_string()],
            allowed_image_prefixes: vec!["*".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_trailing_newline_on_non_empty_output() {
        let sanitizer = MarkdownSanitizer::new(wildcard_config()).unwrap();
        let out = sanitizer.sanitize("hello");
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn test_empty_input_stays_empty() {
        let sanitizer = MarkdownSanitizer::new(wildcard_config()).unwrap();
        assert_eq!(sanitizer.sanitize(""), "");
        assert_eq!(sanitizer.sanitize("   \n"), "");
    }

    #[test]
    fn test_construction_rejects_invalid_policy() {
        let config = PolicyConfig {
            allowed_link_prefixes: vec!["https://github.com/".to_string()],
            ..Default::default()
        };
        assert!(MarkdownSanitizer::new(config).is_err());
    }

    #[test]
    fn test_truncation_on_char_boundary() {
        // 'é' is two bytes; a cap in the middle must back off.
        let input = "aé";
        assert_eq!(truncate(input, 2), "a");
        assert_eq!(truncate(input, 3), "aé");
        assert_eq!(truncate(input, 0), "aé");
    }

    #[test]
    fn test_max_content_length_truncates() {
        let config = PolicyConfig {
            max_content_length: 10,
            ..wildcard_config()
        };
        let sanitizer = MarkdownSanitizer::new(config).unwrap();
        let out = sanitizer.sanitize("0123456789ABCDEF");
        assert_eq!(out, "0123456789\n");
    }

    // ==================== Streaming ====================

    #[test]
    fn test_streaming_complete_line_emitted() {
        let mut s = StreamingSanitizer::new(wildcard_config()).unwrap();
        assert_eq!(s.write("Safe line\n"), "Safe line\n");
        assert_eq!(s.end(), "");
    }

    #[test]
    fn test_streaming_partial_buffered_until_end() {
        let mut s = StreamingSanitizer::new(wildcard_config()).unwrap();
        assert_eq!(s.write("partial"), "");
        assert_eq!(s.end(), "partial\n");
    }

    #[test]
    fn test_streaming_partial_completed_by_later_chunk() {
        let mut s = StreamingSanitizer::new(wildcard_config()).unwrap();
        assert_eq!(s.write("This is "), "");
        assert_eq!(s.write("a partial line"), "");
        assert_eq!(s.write(" that continues\n"), "This is a partial line that continues\n");
        assert_eq!(s.end(), "");
    }

    #[test]
    fn test_streaming_sanitizes_each_span() {
        let config = PolicyConfig {
            allowed_link_prefixes: vec!["https://example.com".to_string()],
            default_origin: Some("https://example.com".to_string()),
            ..Default::default()
        };
        let mut s = StreamingSanitizer::new(config).unwrap();
        let good = s.write("[ok](https://example.com/a)\n");
        assert!(good.contains("https://example.com/a"));
        let bad = s.write("[bad](https://evil.com/)\n");
        assert!(!bad.contains("evil.com"));
        assert!(bad.contains("blocked"));
    }

    #[test]
    fn test_streaming_blank_remainder_dropped() {
        let mut s = StreamingSanitizer::new(wildcard_config()).unwrap();
        assert_eq!(s.write("line\n"), "line\n");
        assert_eq!(s.write("   "), "");
        assert_eq!(s.end(), "");
    }
}
