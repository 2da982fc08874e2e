//! Structural sanitizer — tag/attribute filtering over the content tree.
//!
//! The tree is rebuilt bottom-up: children are sanitized before the parent's
//! decision is finalized, so nested dangerous content inside a blocked
//! element is already gone by the time a replacement node is produced, and a
//! replacement is returned to the caller rather than re-entered by the
//! traversal. Malformed trees never panic; anything ambiguous is denied.

use std::collections::HashSet;
use std::sync::LazyLock;

use tracing::debug;

use crate::policy::{BlockPolicy, PolicyConfig};
use crate::tree::{ContentNode, ElementNode};
use crate::url_policy::{UrlKind, UrlPolicy};

/// Tags that survive sanitization. Everything else is unwrapped (children
/// kept) unless it is in [`DANGEROUS_TAGS`].
static ALLOWED_TAGS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        // Text formatting
        "strong", "b", "em", "i", "code", "tt", "s", "strike", "del", "ins", "sub", "sup",
        // Links and images
        "a", "img",
        // Lists
        "ul", "ol", "li",
        // Headings and text structure
        "h1", "h2", "h3", "h4", "h5", "h6", "p", "blockquote", "q",
        // Line breaks and rules
        "br", "hr",
        // Code blocks and preformatted text
        "pre", "samp", "kbd", "var",
        // Tables
        "table", "thead", "tbody", "tfoot", "tr", "td", "th",
        // Definition lists
        "dl", "dt", "dd",
        // Details/summary
        "details", "summary",
        // Generic containers
        "div", "span",
    ])
});

/// Tags removed together with their entire subtree: executable content,
/// embedding surfaces, and form machinery.
static DANGEROUS_TAGS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "script", "style", "noscript", "iframe", "frame", "frameset", "object", "embed",
        "applet", "form", "input", "button", "select", "textarea", "option", "optgroup",
        "label", "link", "base", "meta",
    ])
});

/// Attributes that survive on allowed tags. Event handlers (`on*`) and
/// `style` are not in the list and are stripped with everything else.
static ALLOWED_ATTRIBUTES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        // Links
        "href", "title", "target", "rel",
        // Images
        "src", "alt", "width", "height",
        // Lists
        "start", "reversed", "value",
        // Tables
        "colspan", "rowspan", "headers", "align",
        // Details
        "open",
        // General
        "class", "id",
    ])
});

/// Outcome for a denied `a`/`img` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockedResult {
    /// Delete the node from its parent's children.
    Remove,
    /// Substitute the given node in place of the denied element.
    Replace(ContentNode),
}

/// Walks a [`ContentNode`] tree applying the tag/attribute allow-lists and
/// the URL policy engine.
pub struct StructuralSanitizer<'a> {
    config: &'a PolicyConfig,
    urls: UrlPolicy<'a>,
}

impl<'a> StructuralSanitizer<'a> {
    pub fn new(config: &'a PolicyConfig) -> Self {
        Self {
            config,
            urls: UrlPolicy::new(config),
        }
    }

    /// Sanitize a forest of nodes, returning the rebuilt forest.
    pub fn sanitize(&self, nodes: Vec<ContentNode>) -> Vec<ContentNode> {
        nodes
            .into_iter()
            .flat_map(|node| self.sanitize_node(node))
            .collect()
    }

    /// Sanitize one node. A node maps to zero nodes (removed), one node
    /// (kept or replaced), or its children (unwrapped).
    fn sanitize_node(&self, node: ContentNode) -> Vec<ContentNode> {
        let mut el = match node {
            ContentNode::Text(text) => return vec![ContentNode::Text(text)],
            ContentNode::Element(el) => el,
        };

        el.tag.make_ascii_lowercase();

        if DANGEROUS_TAGS.contains(el.tag.as_str()) {
            debug!(tag = %el.tag, "removed dangerous element");
            return Vec::new();
        }

        // Children first: a nested payload must not survive by being hoisted
        // into an unwrap or a block-policy replacement.
        el.children = self.sanitize(std::mem::take(&mut el.children));

        if !ALLOWED_TAGS.contains(el.tag.as_str()) {
            debug!(tag = %el.tag, "unwrapped disallowed element");
            return el.children;
        }

        el.attributes.retain(|(name, _)| {
            let name = name.to_ascii_lowercase();
            ALLOWED_ATTRIBUTES.contains(name.as_str())
                && !name.starts_with("on")
                && name != "style"
        });

        match el.tag.as_str() {
            "a" => self.sanitize_link(el),
            "img" => self.sanitize_image(el),
            _ => vec![ContentNode::Element(el)],
        }
    }

    fn sanitize_link(&self, mut el: ElementNode) -> Vec<ContentNode> {
        let raw = el.attr("href").unwrap_or_default().to_string();
        match self.urls.transform(&raw, UrlKind::Link) {
            Some(href) => {
                el.set_attr("href", href);
                el.set_attr("target", "_blank");
                el.set_attr("rel", "noopener noreferrer");
                vec![ContentNode::Element(el)]
            }
            None => match resolve_link_block(&el, &raw, self.config.link_block_policy) {
                BlockedResult::Remove => Vec::new(),
                BlockedResult::Replace(node) => vec![node],
            },
        }
    }

    fn sanitize_image(&self, mut el: ElementNode) -> Vec<ContentNode> {
        let raw = el.attr("src").unwrap_or_default().to_string();
        match self.urls.transform(&raw, UrlKind::Image) {
            Some(src) => {
                el.set_attr("src", src);
                vec![ContentNode::Element(el)]
            }
            None => match resolve_image_block(&el, &raw, self.config.image_block_policy) {
                BlockedResult::Remove => Vec::new(),
                BlockedResult::Replace(node) => vec![node],
            },
        }
    }
}

/// Build the replacement for a denied link.
pub fn resolve_link_block(el: &ElementNode, href: &str, policy: BlockPolicy) -> BlockedResult {
    match policy {
        BlockPolicy::Remove => BlockedResult::Remove,
        BlockPolicy::TextOnly => {
            let mut span = ElementNode::new("span");
            span.children.push(ContentNode::text(format!(
                "[{}]({})",
                el.text_content(),
                href
            )));
            BlockedResult::Replace(ContentNode::Element(span))
        }
        BlockPolicy::Indicator => {
            let mut span = ElementNode::new("span");
            span.set_attr("title", format!("Blocked URL: {href}"));
            span.children = el.children.clone();
            span.children.push(ContentNode::text(" [blocked]"));
            BlockedResult::Replace(ContentNode::Element(span))
        }
    }
}

/// Build the replacement for a denied image.
pub fn resolve_image_block(el: &ElementNode, src: &str, policy: BlockPolicy) -> BlockedResult {
    let alt = el.attr("alt").unwrap_or_default();
    match policy {
        BlockPolicy::Remove => BlockedResult::Remove,
        BlockPolicy::TextOnly => {
            let mut span = ElementNode::new("span");
            span.children
                .push(ContentNode::text(format!("![{alt}]({src})")));
            BlockedResult::Replace(ContentNode::Element(span))
        }
        BlockPolicy::Indicator => {
            let description = if alt.is_empty() { "No description" } else { alt };
            let mut span = ElementNode::new("span");
            span.children
                .push(ContentNode::text(format!("[Image blocked: {description}]")));
            BlockedResult::Replace(ContentNode::Element(span))
        }
    }
}
