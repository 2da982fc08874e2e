//! External-parser adapters: markdown text and embedded raw HTML in, one
//! [`ContentNode`] tree out.
//!
//! Markdown is rendered to HTML with raw HTML passed through, then the whole
//! fragment goes through the HTML parser. Inline HTML in the source ends up
//! in the same tree as markdown-native structure, so the structural
//! sanitizer sees everything uniformly — there is no second code path for
//! tag soup.

use pulldown_cmark::{html, Options, Parser};
use ego_tree::NodeRef;
use scraper::{Html, Node};

use crate::tree::{ContentNode, ElementNode};

/// Render markdown to HTML, keeping raw HTML blocks and inline HTML intact
/// for the fragment parser.
pub fn markdown_to_html(input: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(input, options);
    let mut out = String::with_capacity(input.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Parse an HTML fragment into a content-node forest. Comments, doctypes,
/// and processing instructions are dropped; the parser's tag-soup recovery
/// handles unclosed and misnested markup.
pub fn html_to_tree(input: &str) -> Vec<ContentNode> {
    let document = Html::parse_fragment(input);
    let root = document.tree.root();

    let mut out = Vec::new();
    for child in root.children() {
        // The fragment parser wraps content in a synthetic <html> element.
        if let Node::Element(el) = child.value() {
            if el.name() == "html" {
                for inner in child.children() {
                    if let Some(node) = convert(inner) {
                        out.push(node);
                    }
                }
                continue;
            }
        }
        if let Some(node) = convert(child) {
            out.push(node);
        }
    }
    out
}

fn convert(node: NodeRef<'_, Node>) -> Option<ContentNode> {
    match node.value() {
        Node::Text(text) => Some(ContentNode::Text(text.text.to_string())),
        Node::Element(el) => {
            let mut element = ElementNode::new(el.name());
            for (name, value) in el.attrs() {
                element.attributes.push((name.to_string(), value.to_string()));
            }
            element.children = node.children().filter_map(convert).collect();
            Some(ContentNode::Element(element))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(nodes: &[ContentNode]) -> &ElementNode {
        nodes
            .iter()
            .find_map(|n| match n {
                ContentNode::Element(el) => Some(el),
                _ => None,
            })
            .expect("no element in tree")
    }

    #[test]
    fn test_markdown_link_becomes_anchor() {
        let html = markdown_to_html("[GitHub](https://github.com/user)");
        let tree = html_to_tree(&html);
        let p = first_element(&tree);
        assert_eq!(p.tag, "p");
        let a = first_element(&p.children);
        assert_eq!(a.tag, "a");
        assert_eq!(a.attr("href"), Some("https://github.com/user"));
        assert_eq!(a.text_content(), "GitHub");
    }

    #[test]
    fn test_raw_html_lands_in_tree() {
        let html = markdown_to_html("before <em onclick=\"x()\">mid</em> after");
        let tree = html_to_tree(&html);
        let p = first_element(&tree);
        let em = first_element(&p.children);
        assert_eq!(em.tag, "em");
        assert_eq!(em.attr("onclick"), Some("x()"));
        assert_eq!(em.text_content(), "mid");
    }

    #[test]
    fn test_script_block_parses_as_element() {
        let tree = html_to_tree("<script>alert(1)</script>");
        let script = first_element(&tree);
        assert_eq!(script.tag, "script");
        assert_eq!(script.text_content(), "alert(1)");
    }

    #[test]
    fn test_unclosed_tag_soup_recovers() {
        let tree = html_to_tree("<b>bold<i>both");
        let b = first_element(&tree);
        assert_eq!(b.tag, "b");
        assert!(b.text_content().contains("bold"));
    }

    #[test]
    fn test_comments_dropped() {
        let tree = html_to_tree("<!-- hidden --><p>shown</p>");
        let p = first_element(&tree);
        assert_eq!(p.tag, "p");
        assert_eq!(p.text_content(), "shown");
    }

    #[test]
    fn test_gfm_table_parses() {
        let html = markdown_to_html("| a | b |\n| --- | --- |\n| c | d |");
        let tree = html_to_tree(&html);
        let table = first_element(&tree);
        assert_eq!(table.tag, "table");
    }

    #[test]
    fn test_empty_input() {
        assert!(html_to_tree("").is_empty());
    }
}
