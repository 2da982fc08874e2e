//! URL policy engine — admit/deny decisions for link and image URLs.
//!
//! Every `href`/`src` the sanitizer encounters runs through
//! [`UrlPolicy::transform`]: the URL is resolved against the configured base
//! origin, its protocol is classified, and the result is matched against the
//! allow-list prefixes. Denial is the single outcome for every failure mode
//! (unparsable input, blocked protocol, unknown protocol, no prefix match,
//! over-long URL) — unparsable input is never "safe by default".
//!
//! The engine defends against the usual URL tricks by deciding on the
//! *normalized* form: `.`/`..` traversal is collapsed and percent-encoding
//! canonicalized before any prefix comparison, and full-URL prefixes carry an
//! origin-equality gate so `https://good.com/` cannot be satisfied by
//! `https://good.com.evil.com/`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::policy::PolicyConfig;

/// Which attribute a URL was found in. Links and images carry independent
/// allow-lists, base origins, and block policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    Link,
    Image,
}

impl UrlKind {
    fn label(self) -> &'static str {
        match self {
            UrlKind::Link => "link",
            UrlKind::Image => "image",
        }
    }
}

/// Sentinel emitted for a denied link by [`UrlPolicy::sanitize_url`].
pub const BLOCKED_HREF: &str = "#";

/// Sentinel emitted for a denied image by [`UrlPolicy::sanitize_url`].
pub const BLOCKED_SRC: &str = "/forbidden";

/// Protocols that are rejected unconditionally, wildcard included. The only
/// carve-out is `data:image/` under `allow_data_images`, which never applies
/// to links.
const BLOCKED_PROTOCOLS: &[&str] = &["javascript", "data", "vbscript", "file"];

/// Protocols accepted without an `allowed_protocols` entry.
const SAFE_PROTOCOLS: &[&str] = &["https", "http", "mailto", "xmpp", "irc", "ircs", "blob"];

/// Base used to resolve path-relative URLs when no origin is registered.
/// Only reachable in wildcard-only configurations (validation requires a
/// real origin otherwise); output shaping re-emits the relative form, so
/// this host never appears in output.
const FALLBACK_BASE: &str = "http://example.com";

/// Bare protocol prefix shape, e.g. `https:`.
static RE_BARE_PROTOCOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:$").unwrap());

/// Protocol-with-slashes prefix shape, e.g. `https://`.
static RE_PROTOCOL_SLASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://$").unwrap());

/// The URL policy engine. Borrows an immutable [`PolicyConfig`]; safe to
/// share across calls.
pub struct UrlPolicy<'a> {
    config: &'a PolicyConfig,
}

impl<'a> UrlPolicy<'a> {
    pub fn new(config: &'a PolicyConfig) -> Self {
        Self { config }
    }

    /// Decide a URL. Returns the admitted (normalized) form, or `None` for
    /// denial.
    pub fn transform(&self, raw: &str, kind: UrlKind) -> Option<String> {
        if raw.is_empty() {
            return None;
        }

        // Fragment-only URLs navigate within the current document and need
        // no origin or prefix. Links only; an image cannot point at a
        // fragment.
        if kind == UrlKind::Link && raw.starts_with('#') && raw.len() > 1 {
            if let Some(url) = self.resolve(raw, Some(FALLBACK_BASE)) {
                if url.fragment() == Some(&raw[1..]) {
                    if self.exceeds_max_length(raw) {
                        return self.deny(raw, kind, "fragment exceeds urlMaxLength");
                    }
                    return Some(raw.to_string());
                }
            }
        }

        // data: is in the blocked set; the single carve-out is inline image
        // data when explicitly enabled. Admitted verbatim: a data URI has no
        // origin to normalize and is exempt from the length cap.
        if raw.starts_with("data:") {
            if kind == UrlKind::Image
                && self.config.allow_data_images
                && raw.starts_with("data:image/")
            {
                return Some(raw.to_string());
            }
            return self.deny(raw, kind, "data: URL");
        }

        // blob: references an object already loaded locally; there is no
        // origin to compare, so validate the shape instead.
        if raw.starts_with("blob:") {
            let url = match Url::parse(raw) {
                Ok(u) => u,
                Err(_) => return self.deny(raw, kind, "malformed blob: URL"),
            };
            if url.scheme() == "blob" && !url.path().is_empty() {
                return Some(raw.to_string());
            }
            return self.deny(raw, kind, "empty blob: URL");
        }

        let base = self.origin_for(kind);
        let Some(url) = self.resolve(raw, base) else {
            return self.deny(raw, kind, "unparsable URL");
        };

        if BLOCKED_PROTOCOLS.contains(&url.scheme()) {
            return self.deny(raw, kind, "blocked protocol");
        }
        if !self.protocol_allowed(url.scheme()) {
            return self.deny(raw, kind, "protocol not allowed");
        }

        let href = url.to_string();
        if self.exceeds_max_length(&href) {
            return self.deny(raw, kind, "exceeds urlMaxLength");
        }

        // Non-web protocols carry no origin, so prefix matching does not
        // apply; classification above is the whole decision.
        if url.scheme() != "http" && url.scheme() != "https" {
            return Some(href);
        }

        let prefixes = self.prefixes_for(kind);
        let input_was_relative = is_path_relative(raw);

        for prefix in prefixes {
            if prefix == "*" {
                continue;
            }
            if self.prefix_matches(prefix, &url, &href, base) {
                return Some(shape_output(&url, &href, input_was_relative));
            }
        }

        // The wildcard admits any http/https URL; blocked and unknown
        // protocols were already rejected above.
        if prefixes.iter().any(|p| p == "*") {
            return Some(shape_output(&url, &href, input_was_relative));
        }

        self.deny(raw, kind, "no prefix match")
    }

    /// Sentinel surface: the admitted URL, or the stable blocked sentinel
    /// (`"#"` for links, `"/forbidden"` for images).
    pub fn sanitize_url(&self, raw: &str, kind: UrlKind) -> String {
        match self.transform(raw, kind) {
            Some(href) => href,
            None => match kind {
                UrlKind::Link => BLOCKED_HREF.to_string(),
                UrlKind::Image => BLOCKED_SRC.to_string(),
            },
        }
    }

    fn deny(&self, raw: &str, kind: UrlKind, reason: &'static str) -> Option<String> {
        debug!(url = %raw, kind = kind.label(), reason, "URL denied");
        None
    }

    /// Resolve a URL string: absolute first, then against the given base.
    /// Path-relative input without a base falls back to the placeholder so
    /// wildcard-only configurations can still admit it.
    fn resolve(&self, raw: &str, base: Option<&str>) -> Option<Url> {
        match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(_) => {
                if let Some(base) = base {
                    return Url::parse(base).ok()?.join(raw).ok();
                }
                if is_path_relative(raw) {
                    return Url::parse(FALLBACK_BASE).ok()?.join(raw).ok();
                }
                None
            }
        }
    }

    fn origin_for(&self, kind: UrlKind) -> Option<&str> {
        match kind {
            UrlKind::Link => self.config.link_origin(),
            UrlKind::Image => self.config.image_origin(),
        }
    }

    fn prefixes_for(&self, kind: UrlKind) -> &[String] {
        match kind {
            UrlKind::Link => &self.config.allowed_link_prefixes,
            UrlKind::Image => &self.config.allowed_image_prefixes,
        }
    }

    fn protocol_allowed(&self, scheme: &str) -> bool {
        if SAFE_PROTOCOLS.contains(&scheme) {
            return true;
        }
        self.config.allowed_protocols.iter().any(|entry| {
            let entry = entry.trim_end_matches(':');
            entry == "*" || entry.eq_ignore_ascii_case(scheme)
        })
    }

    fn exceeds_max_length(&self, href: &str) -> bool {
        self.config.url_max_length > 0 && href.len() > self.config.url_max_length
    }

    /// Match one allow-list prefix against a normalized URL.
    fn prefix_matches(&self, prefix: &str, url: &Url, href: &str, base: Option<&str>) -> bool {
        // Bare protocol form: "https:" admits any https:// URL.
        if RE_BARE_PROTOCOL.is_match(prefix) {
            let wanted = format!("{}//", prefix.to_ascii_lowercase());
            return href.to_ascii_lowercase().starts_with(&wanted);
        }

        // Protocol-with-slashes form: direct lowercase prefix comparison.
        if RE_PROTOCOL_SLASHES.is_match(prefix) {
            return href
                .to_ascii_lowercase()
                .starts_with(&prefix.to_ascii_lowercase());
        }

        // Full-URL form: normalize the prefix against the same base, gate on
        // origin equality, then compare the normalized strings byte-wise.
        // Traversal and encoding tricks have already been collapsed on both
        // sides.
        let Some(prefix_url) = self.resolve(prefix, base) else {
            return false;
        };
        if prefix_url.origin() != url.origin() {
            return false;
        }
        href.starts_with(prefix_url.as_str())
    }
}

fn is_path_relative(raw: &str) -> bool {
    raw.starts_with('/') || raw.starts_with("./") || raw.starts_with("../")
}

/// Path-relative input stays root-relative: re-emit path + query + fragment
/// from the normalized URL, never the raw input. Absolute input emits the
/// full normalized href.
fn shape_output(url: &Url, href: &str, input_was_relative: bool) -> String {
    if !input_was_relative {
        return href.to_string();
    }
    let mut out = url.path().to_string();
    if let Some(query) = url.query() {
        out.push('?');
        out.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        out.push('#');
        out.push_str(fragment);
    }
    out
}
