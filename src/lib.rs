//! chitin content-security sanitizer
//!
//! This library sanitizes untrusted markdown/HTML-shaped text (LLM output,
//! user content) before it is rendered or re-stored: every hyperlink and
//! image reference either resolves to an allow-listed origin/prefix or is
//! neutralized, and no disallowed markup or executable content survives.
//!
//! The pieces, leaves first:
//!
//! - [`url_policy`] — normalizes a URL against a base origin, classifies its
//!   protocol, and decides admit/deny against the configured prefixes.
//! - [`sanitizer`] — walks the parsed content tree, filters tags and
//!   attributes, and applies the URL policy to `href`/`src`.
//! - [`escape`] — round-trip escaping so re-serialized text cannot be
//!   re-parsed into the syntax that was just filtered.
//! - [`markdown`] — the pipeline (parse → sanitize → serialize) with
//!   one-shot and streaming entry points.
//!
//! ```
//! use chitin::{sanitize_markdown, PolicyConfig};
//!
//! let config = PolicyConfig {
//!     allowed_link_prefixes: vec!["https://github.com/".to_string()],
//!     default_origin: Some("https://example.com".to_string()),
//!     ..Default::default()
//! };
//! let out = sanitize_markdown("[Evil](javascript:alert(1))", config).unwrap();
//! assert!(!out.contains("javascript:"));
//! ```

pub mod escape;
pub mod markdown;
pub mod policy;
pub mod sanitizer;
pub mod tree;
pub mod url_policy;

pub use markdown::{sanitize_markdown, MarkdownSanitizer, StreamingSanitizer};
pub use policy::{BlockPolicy, EscapeMode, PolicyConfig, PolicyError};
pub use sanitizer::{BlockedResult, StructuralSanitizer};
pub use tree::{ContentNode, ElementNode};
pub use url_policy::{UrlKind, UrlPolicy, BLOCKED_HREF, BLOCKED_SRC};
