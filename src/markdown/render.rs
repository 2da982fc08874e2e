//! Serializes a sanitized content tree back to markdown.
//!
//! Output style matches common GFM conventions: ATX headings, fenced code
//! blocks, `*`/`**` emphasis, inlined links, `-` bullets, and pipe tables.
//! Every text node passes through the round-trip escaper so sanitized
//! fallback text cannot be re-parsed into new syntax; code spans and fenced
//! blocks are emitted raw.

use crate::escape::{commonmark_escape, entity_escape};
use crate::policy::EscapeMode;
use crate::tree::{ContentNode, ElementNode};

/// Render a sanitized forest to markdown. The result has no leading or
/// trailing blank lines; the pipeline appends the final newline.
pub fn to_markdown(nodes: &[ContentNode], mode: EscapeMode) -> String {
    let body = render_blocks(nodes, mode);
    collapse_blank_runs(body.trim())
}

fn escape_text(text: &str, mode: EscapeMode) -> String {
    match mode {
        EscapeMode::Commonmark => commonmark_escape(text),
        EscapeMode::Entity => entity_escape(text),
    }
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "pre"
            | "ul"
            | "ol"
            | "li"
            | "table"
            | "thead"
            | "tbody"
            | "tfoot"
            | "tr"
            | "hr"
            | "div"
            | "details"
            | "summary"
            | "dl"
            | "dt"
            | "dd"
    )
}

/// Render a mixed child list: inline runs accumulate into paragraphs, block
/// elements flush and emit their own spacing.
fn render_blocks(nodes: &[ContentNode], mode: EscapeMode) -> String {
    let mut out = String::new();
    let mut run = String::new();

    for node in nodes {
        match node {
            ContentNode::Element(el) if is_block_tag(&el.tag) => {
                flush_run(&mut out, &mut run);
                out.push_str(&render_block(el, mode));
            }
            _ => run.push_str(&render_inline(node, mode)),
        }
    }
    flush_run(&mut out, &mut run);
    out
}

fn flush_run(out: &mut String, run: &mut String) {
    let trimmed = run.trim();
    if !trimmed.is_empty() {
        out.push_str(trimmed);
        out.push_str("\n\n");
    }
    run.clear();
}

fn render_block(el: &ElementNode, mode: EscapeMode) -> String {
    match el.tag.as_str() {
        "p" | "summary" | "dt" | "dd" => {
            let inline = render_inline_children(el, mode);
            let inline = inline.trim();
            if inline.is_empty() {
                String::new()
            } else {
                format!("{inline}\n\n")
            }
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = el.tag[1..].parse::<usize>().unwrap_or(1);
            let inline = render_inline_children(el, mode);
            let inline = inline.trim();
            if inline.is_empty() {
                String::new()
            } else {
                format!("{} {}\n\n", "#".repeat(level), inline)
            }
        }
        "blockquote" => {
            let inner = render_blocks(&el.children, mode);
            let inner = inner.trim();
            if inner.is_empty() {
                return String::new();
            }
            let mut out = String::new();
            for line in inner.lines() {
                if line.is_empty() {
                    out.push_str(">\n");
                } else {
                    out.push_str("> ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
            out.push('\n');
            out
        }
        "pre" => render_code_block(el),
        "ul" => render_list(el, None, mode),
        "ol" => {
            let start = el
                .attr("start")
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            render_list(el, Some(start), mode)
        }
        "table" => render_table(el, mode),
        "hr" => "---\n\n".to_string(),
        // div, details, dl, and stray table parts have no markdown syntax
        // of their own; their children render in place.
        _ => render_blocks(&el.children, mode),
    }
}

fn render_inline(node: &ContentNode, mode: EscapeMode) -> String {
    let el = match node {
        ContentNode::Text(text) => return escape_text(text, mode),
        ContentNode::Element(el) => el,
    };

    match el.tag.as_str() {
        "strong" | "b" => wrap_inline(el, "**", mode),
        "em" | "i" => wrap_inline(el, "*", mode),
        "del" | "s" | "strike" => wrap_inline(el, "~~", mode),
        "code" | "tt" => render_code_span(&el.text_content()),
        "a" => render_link(el, mode),
        "img" => render_image(el, mode),
        "br" => "  \n".to_string(),
        _ => render_inline_children(el, mode),
    }
}

fn render_inline_children(el: &ElementNode, mode: EscapeMode) -> String {
    el.children
        .iter()
        .map(|child| render_inline(child, mode))
        .collect()
}

fn wrap_inline(el: &ElementNode, marker: &str, mode: EscapeMode) -> String {
    let inner = render_inline_children(el, mode);
    let inner = inner.trim();
    if inner.is_empty() {
        String::new()
    } else {
        format!("{marker}{inner}{marker}")
    }
}

fn render_link(el: &ElementNode, mode: EscapeMode) -> String {
    let text = render_inline_children(el, mode);
    let Some(href) = el.attr("href") else {
        return text;
    };
    match el.attr("title") {
        Some(title) => format!("[{}]({} \"{}\")", text, href, escape_title(title)),
        None => format!("[{text}]({href})"),
    }
}

fn render_image(el: &ElementNode, mode: EscapeMode) -> String {
    let alt = escape_text(el.attr("alt").unwrap_or_default(), mode);
    let Some(src) = el.attr("src") else {
        return alt;
    };
    match el.attr("title") {
        Some(title) => format!("![{}]({} \"{}\")", alt, src, escape_title(title)),
        None => format!("![{alt}]({src})"),
    }
}

/// Title attributes are emitted as plain text: quotes escaped, newlines
/// flattened.
fn escape_title(title: &str) -> String {
    title.replace('\n', " ").replace('"', "\\\"")
}

fn render_code_span(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    if !text.contains('`') {
        return format!("`{text}`");
    }
    let longest = longest_backtick_run(text);
    let fence = "`".repeat(longest + 1);
    format!("{fence} {text} {fence}")
}

fn render_code_block(el: &ElementNode) -> String {
    let info = el
        .children
        .iter()
        .find_map(|child| match child {
            ContentNode::Element(code) if code.tag == "code" => code.attr("class"),
            _ => None,
        })
        .and_then(|class| {
            class
                .split_whitespace()
                .find_map(|c| c.strip_prefix("language-"))
        })
        .unwrap_or_default();

    let mut text = el.text_content();
    if !text.ends_with('\n') {
        text.push('\n');
    }

    let longest = longest_backtick_run(&text);
    let fence = "`".repeat(longest.max(2) + 1);
    format!("{fence}{info}\n{text}{fence}\n\n")
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn render_list(el: &ElementNode, start: Option<u64>, mode: EscapeMode) -> String {
    let mut out = String::new();
    let mut number = start.unwrap_or(1);

    for child in &el.children {
        let ContentNode::Element(item) = child else {
            continue;
        };
        if item.tag != "li" {
            continue;
        }

        let marker = match start {
            Some(_) => format!("{number}. "),
            None => "- ".to_string(),
        };
        let body = render_blocks(&item.children, mode);
        let body = body.trim_end();

        if body.is_empty() {
            out.push_str(marker.trim_end());
            out.push('\n');
        } else {
            let indent = " ".repeat(marker.len());
            let mut lines = body.lines();
            out.push_str(&marker);
            out.push_str(lines.next().unwrap_or_default());
            out.push('\n');
            for line in lines {
                if line.is_empty() {
                    out.push('\n');
                } else {
                    out.push_str(&indent);
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        number += 1;
    }

    out.push('\n');
    out
}

fn render_table(el: &ElementNode, mode: EscapeMode) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();
    collect_rows(&el.children, &mut rows, mode);

    let Some((header, body)) = rows.split_first() else {
        return String::new();
    };

    let mut out = String::new();
    out.push_str(&format_row(header));
    out.push_str(&format_row(
        &header.iter().map(|_| "---".to_string()).collect::<Vec<_>>(),
    ));
    for row in body {
        out.push_str(&format_row(row));
    }
    out.push('\n');
    out
}

fn collect_rows(nodes: &[ContentNode], rows: &mut Vec<Vec<String>>, mode: EscapeMode) {
    for node in nodes {
        let ContentNode::Element(el) = node else {
            continue;
        };
        match el.tag.as_str() {
            "thead" | "tbody" | "tfoot" => collect_rows(&el.children, rows, mode),
            "tr" => rows.push(collect_cells(el, mode)),
            _ => {}
        }
    }
}

fn collect_cells(tr: &ElementNode, mode: EscapeMode) -> Vec<String> {
    tr.children
        .iter()
        .filter_map(|node| match node {
            ContentNode::Element(cell) if cell.tag == "td" || cell.tag == "th" => {
                let content = render_blocks(&cell.children, mode);
                Some(content.trim().replace('\n', " "))
            }
            _ => None,
        })
        .collect()
}

fn format_row(cells: &[String]) -> String {
    let mut out = String::from("|");
    for cell in cells {
        out.push(' ');
        out.push_str(cell);
        out.push_str(" |");
    }
    out.push('\n');
    out
}

/// Collapse runs of three or more newlines down to a blank line.
fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ContentNode, ElementNode};

    fn element(tag: &str, attrs: &[(&str, &str)], children: Vec<ContentNode>) -> ContentNode {
        let mut el = ElementNode::new(tag);
        for (k, v) in attrs {
            el.attributes.push((k.to_string(), v.to_string()));
        }
        el.children = children;
        ContentNode::Element(el)
    }

    fn markdown(nodes: Vec<ContentNode>) -> String {
        to_markdown(&nodes, EscapeMode::Commonmark)
    }

    #[test]
    fn test_heading() {
        let out = markdown(vec![element(
            "h2",
            &[],
            vec![ContentNode::text("Section")],
        )]);
        assert_eq!(out, "## Section");
    }

    #[test]
    fn test_paragraph_with_emphasis() {
        let out = markdown(vec![element(
            "p",
            &[],
            vec![
                ContentNode::text("a "),
                element("strong", &[], vec![ContentNode::text("b")]),
                ContentNode::text(" c"),
            ],
        )]);
        assert_eq!(out, "a **b** c");
    }

    #[test]
    fn test_link_rendering() {
        let out = markdown(vec![element(
            "p",
            &[],
            vec![element(
                "a",
                &[("href", "https://github.com/user")],
                vec![ContentNode::text("GitHub")],
            )],
        )]);
        assert_eq!(out, "[GitHub](https://github.com/user)");
    }

    #[test]
    fn test_image_rendering() {
        let out = markdown(vec![element(
            "p",
            &[],
            vec![element(
                "img",
                &[("src", "https://images.com/p.jpg"), ("alt", "pic")],
                vec![],
            )],
        )]);
        assert_eq!(out, "![pic](https://images.com/p.jpg)");
    }

    #[test]
    fn test_text_is_escaped() {
        let out = markdown(vec![element(
            "p",
            &[],
            vec![ContentNode::text("[not a link](x)")],
        )]);
        assert_eq!(out, "\\[not a link\\]\\(x\\)");
    }

    #[test]
    fn test_code_span_not_escaped() {
        let out = markdown(vec![element(
            "p",
            &[],
            vec![element("code", &[], vec![ContentNode::text("[x](y)")])],
        )]);
        assert_eq!(out, "`[x](y)`");
    }

    #[test]
    fn test_code_span_with_backtick() {
        let out = markdown(vec![element(
            "p",
            &[],
            vec![element("code", &[], vec![ContentNode::text("a`b")])],
        )]);
        assert_eq!(out, "`` a`b ``");
    }

    #[test]
    fn test_fenced_code_block() {
        let code = element(
            "code",
            &[("class", "language-rust")],
            vec![ContentNode::text("fn main() {}\n")],
        );
        let out = markdown(vec![element("pre", &[], vec![code])]);
        assert_eq!(out, "```rust\nfn main() {}\n```");
    }

    #[test]
    fn test_blockquote() {
        let out = markdown(vec![element(
            "blockquote",
            &[],
            vec![element("p", &[], vec![ContentNode::text("quoted")])],
        )]);
        assert_eq!(out, "> quoted");
    }

    #[test]
    fn test_unordered_list() {
        let out = markdown(vec![element(
            "ul",
            &[],
            vec![
                element("li", &[], vec![ContentNode::text("one")]),
                element("li", &[], vec![ContentNode::text("two")]),
            ],
        )]);
        assert_eq!(out, "- one\n- two");
    }

    #[test]
    fn test_ordered_list_with_start() {
        let out = markdown(vec![element(
            "ol",
            &[("start", "3")],
            vec![
                element("li", &[], vec![ContentNode::text("three")]),
                element("li", &[], vec![ContentNode::text("four")]),
            ],
        )]);
        assert_eq!(out, "3. three\n4. four");
    }

    #[test]
    fn test_nested_list_indents() {
        let nested = element(
            "ul",
            &[],
            vec![element("li", &[], vec![ContentNode::text("inner")])],
        );
        let out = markdown(vec![element(
            "ul",
            &[],
            vec![element(
                "li",
                &[],
                vec![ContentNode::text("outer"), nested],
            )],
        )]);
        assert_eq!(out, "- outer\n\n  - inner");
    }

    #[test]
    fn test_table() {
        let th = |t: &str| element("th", &[], vec![ContentNode::text(t)]);
        let td = |t: &str| element("td", &[], vec![ContentNode::text(t)]);
        let table = element(
            "table",
            &[],
            vec![
                element("thead", &[], vec![element("tr", &[], vec![th("a"), th("b")])]),
                element("tbody", &[], vec![element("tr", &[], vec![td("c"), td("d")])]),
            ],
        );
        let out = markdown(vec![table]);
        assert_eq!(out, "| a | b |\n| --- | --- |\n| c | d |");
    }

    #[test]
    fn test_hr_and_br() {
        let out = markdown(vec![element("hr", &[], vec![])]);
        assert_eq!(out, "---");
    }

    #[test]
    fn test_span_unwraps() {
        let out = markdown(vec![element(
            "p",
            &[],
            vec![element(
                "span",
                &[("title", "Blocked URL: javascript:alert(1)")],
                vec![ContentNode::text("Evil"), ContentNode::text(" [blocked]")],
            )],
        )]);
        assert_eq!(out, "Evil \\[blocked\\]");
    }

    #[test]
    fn test_entity_mode() {
        let out = to_markdown(
            &[element("p", &[], vec![ContentNode::text("[x](y)")])],
            EscapeMode::Entity,
        );
        assert_eq!(out, "&5b;x&5d;&28;y&29;");
    }

    #[test]
    fn test_empty_tree() {
        assert_eq!(markdown(vec![]), "");
    }
}
