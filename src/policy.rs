//! Sanitizer policy configuration.
//!
//! One fully-typed, immutable [`PolicyConfig`] replaces the loose option
//! objects this design grew out of: every field is defaulted, and the
//! required-field combinations are validated once at construction, never
//! per call. A config is read-only after construction and can be shared
//! across concurrent sanitize calls.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors raised at construction time.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Non-wildcard link prefixes require a base origin to resolve and
    /// compare relative URLs against.
    #[error("a default origin is required when non-wildcard allowedLinkPrefixes are configured")]
    MissingLinkOrigin,

    /// Non-wildcard image prefixes require a base origin.
    #[error("a default origin is required when non-wildcard allowedImagePrefixes are configured")]
    MissingImageOrigin,

    /// The serialized policy could not be parsed.
    #[error("failed to parse policy config: {0}")]
    Parse(String),
}

/// Replacement strategy applied to a denied link or image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockPolicy {
    /// Keep the element's visible content and append a blocked marker.
    #[default]
    Indicator,
    /// Replace the element with an inert plain-text rendering of its
    /// markdown-like syntax.
    TextOnly,
    /// Delete the element entirely.
    Remove,
}

/// How text nodes are escaped when the sanitized tree is re-serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeMode {
    /// CommonMark backslash escaping. The default.
    #[default]
    Commonmark,
    /// Hex-entity replacement for byte-comparing sinks.
    Entity,
}

/// Allow-list policy for one sanitizer instance.
///
/// Prefixes take one of four shapes: a bare protocol (`"https:"`), a
/// protocol with slashes (`"https://"`), a full URL prefix
/// (`"https://example.com/docs"`), or the wildcard `"*"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Allowed URL prefixes for link `href` values.
    #[serde(default)]
    pub allowed_link_prefixes: Vec<String>,

    /// Allowed URL prefixes for image `src` values. Independent of links.
    #[serde(default)]
    pub allowed_image_prefixes: Vec<String>,

    /// Base origin used to resolve relative URLs of either kind.
    #[serde(default)]
    pub default_origin: Option<String>,

    /// Base origin for relative links; overrides `default_origin`.
    #[serde(default)]
    pub default_link_origin: Option<String>,

    /// Base origin for relative images; overrides `default_origin`.
    #[serde(default)]
    pub default_image_origin: Option<String>,

    /// Protocols admitted in addition to the built-in safe set. Entries may
    /// be given with or without the trailing colon; `"*"` admits any
    /// protocol outside the blocked set.
    #[serde(default)]
    pub allowed_protocols: Vec<String>,

    /// Permit `data:image/...` URLs as image sources (never as links).
    #[serde(default)]
    pub allow_data_images: bool,

    /// Maximum length of a normalized URL. `0` means unlimited.
    #[serde(default = "default_url_max_length")]
    pub url_max_length: usize,

    /// Maximum input length; longer input is truncated before parsing.
    /// `0` means unlimited.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Replacement strategy for denied links.
    #[serde(default)]
    pub link_block_policy: BlockPolicy,

    /// Replacement strategy for denied images.
    #[serde(default)]
    pub image_block_policy: BlockPolicy,

    /// Text escaping mode for re-serialized output.
    #[serde(default)]
    pub escape_mode: EscapeMode,
}

fn default_url_max_length() -> usize {
    200
}

fn default_max_content_length() -> usize {
    100_000
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_link_prefixes: Vec::new(),
            allowed_image_prefixes: Vec::new(),
            default_origin: None,
            default_link_origin: None,
            default_image_origin: None,
            allowed_protocols: Vec::new(),
            allow_data_images: false,
            url_max_length: default_url_max_length(),
            max_content_length: default_max_content_length(),
            link_block_policy: BlockPolicy::default(),
            image_block_policy: BlockPolicy::default(),
            escape_mode: EscapeMode::default(),
        }
    }
}

impl PolicyConfig {
    /// Parse a policy from JSON5 (the configuration format used by the
    /// surrounding tooling) and validate it.
    pub fn from_json5(input: &str) -> Result<Self, PolicyError> {
        let config: Self = json5::from_str(input).map_err(|e| PolicyError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate required-field combinations.
    ///
    /// A prefix list containing anything other than the wildcard needs a
    /// base origin for its URL kind: relative URLs and full-URL prefixes
    /// cannot be resolved without one.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if has_specific_prefixes(&self.allowed_link_prefixes) && self.link_origin().is_none() {
            return Err(PolicyError::MissingLinkOrigin);
        }
        if has_specific_prefixes(&self.allowed_image_prefixes) && self.image_origin().is_none() {
            return Err(PolicyError::MissingImageOrigin);
        }
        Ok(())
    }

    /// Base origin for resolving link URLs.
    pub fn link_origin(&self) -> Option<&str> {
        self.default_link_origin
            .as_deref()
            .or(self.default_origin.as_deref())
    }

    /// Base origin for resolving image URLs.
    pub fn image_origin(&self) -> Option<&str> {
        self.default_image_origin
            .as_deref()
            .or(self.default_origin.as_deref())
    }
}

fn has_specific_prefixes(prefixes: &[String]) -> bool {
    !prefixes.is_empty() && prefixes.iter().any(|p| p != "*")
}
