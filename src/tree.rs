//! Content tree owned and rewritten by the structural sanitizer.
//!
//! A [`ContentNode`] is either an element (tag + ordered attributes +
//! children) or a text run. One sanitize call exclusively owns its tree:
//! replacement nodes are returned by the sanitizer, never spliced into a
//! shared traversal.

/// A node in the parsed content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Element(ElementNode),
    Text(String),
}

impl ContentNode {
    /// Convenience constructor for a text node.
    pub fn text(value: impl Into<String>) -> Self {
        ContentNode::Text(value.into())
    }
}

/// An element node: tag name, attributes in document order, and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<ContentNode>,
}

impl ElementNode {
    /// Create an empty element with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Look up an attribute value by (case-insensitive) name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value or appending.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(entry) = self
            .attributes
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            entry.1 = value;
        } else {
            self.attributes.push((name.to_string(), value));
        }
    }

    /// Remove an attribute by name, if present.
    pub fn remove_attr(&mut self, name: &str) {
        self.attributes.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Concatenation of all text descendants, depth-first.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[ContentNode], out: &mut String) {
    for node in nodes {
        match node {
            ContentNode::Text(t) => out.push_str(t),
            ContentNode::Element(el) => collect_text(&el.children, out),
        }
    }
}
