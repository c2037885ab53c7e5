use std::fmt::Write;

use super::document::{Block, CodeBlock, Inline, RenderedDocument};

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Whether a link or image destination may be emitted as an attribute.
///
/// Relative references pass. Absolute ones need an allowed scheme; `data:`
/// is only accepted for images.
fn is_safe_url(url: &str, image: bool) -> bool {
    let url = url.trim();
    let scheme_end = url.find(':');
    let path_start = url.find(['/', '?', '#']);
    let Some(end) = scheme_end.filter(|end| path_start.is_none_or(|start| *end < start)) else {
        return true;
    };

    // Browsers drop whitespace and control characters inside a scheme
    let scheme: String = url[..end]
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if scheme == "data" {
        return image
            && url[end + 1..].trim_start().to_ascii_lowercase().starts_with("image/");
    }
    SAFE_SCHEMES.contains(&scheme.as_str())
}

/// Render a document to an HTML fragment.
///
/// All text is escaped; code blocks carry inline `color` styles from the
/// highlighter and a `data-lang` attribute. Links and images with a
/// scriptable destination are reduced to their text.
pub fn to_html(doc: &RenderedDocument) -> String {
    let mut out = String::new();
    write_blocks(&mut out, &doc.blocks);
    out
}

fn write_blocks(out: &mut String, blocks: &[Block]) {
    for block in blocks {
        write_block(out, block);
        out.push('\n');
    }
}

fn write_block(out: &mut String, block: &Block) {
    match block {
        Block::Heading { level, content } => {
            let _ = write!(out, "<h{level}>");
            write_inlines(out, content);
            let _ = write!(out, "</h{level}>");
        }
        Block::Paragraph(content) => {
            out.push_str("<p>");
            write_inlines(out, content);
            out.push_str("</p>");
        }
        Block::CodeBlock(code) => write_code_block(out, code),
        Block::List { start, items } => {
            let close = match start {
                Some(1) => {
                    out.push_str("<ol>\n");
                    "</ol>"
                }
                Some(n) => {
                    let _ = write!(out, "<ol start=\"{n}\">\n");
                    "</ol>"
                }
                None => {
                    out.push_str("<ul>\n");
                    "</ul>"
                }
            };
            for item in items {
                out.push_str("<li>");
                // A single paragraph item renders inline, like a tight list
                match item.as_slice() {
                    [Block::Paragraph(content)] => write_inlines(out, content),
                    blocks => {
                        out.push('\n');
                        write_blocks(out, blocks);
                    }
                }
                out.push_str("</li>\n");
            }
            out.push_str(close);
        }
        Block::BlockQuote(children) => {
            out.push_str("<blockquote>\n");
            write_blocks(out, children);
            out.push_str("</blockquote>");
        }
        Block::Rule => out.push_str("<hr />"),
    }
}

fn write_code_block(out: &mut String, code: &CodeBlock) {
    match &code.language {
        Some(lang) => {
            let _ = write!(
                out,
                "<pre class=\"code-block\" data-lang=\"{}\"><code>",
                html_escape(lang)
            );
        }
        None => out.push_str("<pre class=\"code-block\"><code>"),
    }

    match &code.highlighted {
        Some(spans) => {
            for span in spans {
                let c = span.color;
                let _ = write!(
                    out,
                    "<span style=\"color:#{:02x}{:02x}{:02x}\">{}</span>",
                    c.r,
                    c.g,
                    c.b,
                    html_escape(&span.text)
                );
            }
        }
        None => out.push_str(&html_escape(&code.code)),
    }
    out.push_str("</code></pre>");
}

fn write_inlines(out: &mut String, inlines: &[Inline]) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(&html_escape(text)),
            Inline::Code(code) => {
                let _ = write!(out, "<code>{}</code>", html_escape(code));
            }
            Inline::Emphasis(children) => wrap(out, "em", children),
            Inline::Strong(children) => wrap(out, "strong", children),
            Inline::Strikethrough(children) => wrap(out, "del", children),
            Inline::Link { url, children } if is_safe_url(url, false) => {
                let _ = write!(out, "<a href=\"{}\">", html_escape(url));
                write_inlines(out, children);
                out.push_str("</a>");
            }
            Inline::Link { children, .. } => write_inlines(out, children),
            Inline::Image { url, alt } if is_safe_url(url, true) => {
                let _ = write!(
                    out,
                    "<img src=\"{}\" alt=\"{}\" />",
                    html_escape(url),
                    html_escape(alt)
                );
            }
            Inline::Image { alt, .. } => out.push_str(&html_escape(alt)),
            Inline::SoftBreak => out.push('\n'),
            Inline::HardBreak => out.push_str("<br />\n"),
        }
    }
}

fn wrap(out: &mut String, tag: &str, children: &[Inline]) {
    let _ = write!(out, "<{tag}>");
    write_inlines(out, children);
    let _ = write!(out, "</{tag}>");
}
