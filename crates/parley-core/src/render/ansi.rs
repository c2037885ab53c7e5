use std::fmt::Write;

use super::document::{Block, CodeBlock, Inline, RenderedDocument};
use super::syntax_highlighter::Rgb;

const BOLD: &str = "\x1b[1m";
const BOLD_OFF: &str = "\x1b[22m";
const DIM: &str = "\x1b[2m";
// SGR 22 resets both bold and dim
const DIM_OFF: &str = "\x1b[22m";
const ITALIC: &str = "\x1b[3m";
const ITALIC_OFF: &str = "\x1b[23m";
const UNDERLINE: &str = "\x1b[4m";
const UNDERLINE_OFF: &str = "\x1b[24m";
const STRIKE: &str = "\x1b[9m";
const STRIKE_OFF: &str = "\x1b[29m";
const FG_DEFAULT: &str = "\x1b[39m";

const INLINE_CODE_COLOR: Rgb = Rgb {
    r: 235,
    g: 203,
    b: 139,
};

fn fg(color: Rgb) -> String {
    format!("\x1b[38;2;{};{};{}m", color.r, color.g, color.b)
}

/// Render a document as terminal text with 24-bit color escapes
pub fn to_ansi(doc: &RenderedDocument) -> String {
    blocks_to_ansi(&doc.blocks)
}

fn blocks_to_ansi(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(block_to_ansi)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn block_to_ansi(block: &Block) -> String {
    match block {
        Block::Heading { level, content } => {
            let text = inlines_to_ansi(content, true);
            if *level == 1 {
                format!("{BOLD}{UNDERLINE}{text}{UNDERLINE_OFF}{BOLD_OFF}")
            } else {
                format!("{BOLD}{text}{BOLD_OFF}")
            }
        }
        Block::Paragraph(content) => inlines_to_ansi(content, false),
        Block::CodeBlock(code) => code_block_to_ansi(code),
        Block::List { start, items } => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let marker = match start {
                    Some(n) => format!("{}. ", n + i as u64),
                    None => "• ".to_string(),
                };
                let indent = " ".repeat(marker.chars().count());
                out.push(prefix_lines(&blocks_to_ansi(item), &marker, &indent));
            }
            out.join("\n")
        }
        Block::BlockQuote(children) => {
            let quote = format!("{DIM}│{DIM_OFF} ");
            prefix_lines(&blocks_to_ansi(children), &quote, &quote)
        }
        Block::Rule => format!("{DIM}────────────────{DIM_OFF}"),
    }
}

fn code_block_to_ansi(code: &CodeBlock) -> String {
    let mut out = String::new();
    let label = code.language.as_deref().unwrap_or("text");
    let _ = writeln!(out, "{DIM}─── {label}{DIM_OFF}");

    let mut body = String::new();
    match &code.highlighted {
        Some(spans) => {
            for span in spans {
                body.push_str(&fg(span.color));
                body.push_str(&span.text);
            }
        }
        None => body.push_str(&code.code),
    }
    let trimmed_len = body.trim_end_matches('\n').len();
    body.truncate(trimmed_len);

    out.push_str(&body);
    if code.highlighted.is_some() {
        out.push_str(FG_DEFAULT);
    }
    out
}

/// `bold` is set when the surrounding text is already bold, so nested
/// strong spans must not switch it off
fn inlines_to_ansi(inlines: &[Inline], bold: bool) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(text),
            Inline::Code(code) => {
                let _ = write!(out, "{}{}{}", fg(INLINE_CODE_COLOR), code, FG_DEFAULT);
            }
            Inline::Emphasis(children) => {
                let _ = write!(out, "{ITALIC}{}{ITALIC_OFF}", inlines_to_ansi(children, bold));
            }
            Inline::Strong(children) if bold => out.push_str(&inlines_to_ansi(children, true)),
            Inline::Strong(children) => {
                let _ = write!(out, "{BOLD}{}{BOLD_OFF}", inlines_to_ansi(children, true));
            }
            Inline::Strikethrough(children) => {
                let _ = write!(out, "{STRIKE}{}{STRIKE_OFF}", inlines_to_ansi(children, bold));
            }
            Inline::Link { url, children } => {
                let label = inlines_to_ansi(children, bold);
                let _ = write!(out, "{UNDERLINE}{label}{UNDERLINE_OFF}");
                if Inline::plain_text(children) != *url {
                    let _ = write!(out, " ({url})");
                }
            }
            Inline::Image { url, alt } => {
                let _ = write!(out, "[image: {alt}] ({url})");
            }
            Inline::SoftBreak => out.push(' '),
            Inline::HardBreak => out.push('\n'),
        }
    }
    out
}

/// Prefix the first line with `first` and every following line with `rest`
fn prefix_lines(text: &str, first: &str, rest: &str) -> String {
    text.split('\n')
        .enumerate()
        .map(|(i, line)| {
            let prefix = if i == 0 { first } else { rest };
            format!("{prefix}{line}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render;

    fn strip_ansi(s: &str) -> String {
        let mut out = String::new();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                for c in chars.by_ref() {
                    if c == 'm' {
                        break;
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    #[test]
    fn test_plain_layout() {
        let ansi = to_ansi(&render(
            "# Title\n\nSome **bold** and `code`.\n\n- one\n- two\n\n> wise words\n",
        ));
        assert_eq!(
            strip_ansi(&ansi),
            "Title\n\nSome bold and code.\n\n• one\n• two\n\n│ wise words"
        );
    }

    #[test]
    fn test_strong_inside_heading_keeps_heading_bold() {
        let ansi = to_ansi(&render("# Use **cargo** here\n\nand **this**"));
        assert_eq!(
            ansi,
            format!("{BOLD}{UNDERLINE}Use cargo here{UNDERLINE_OFF}{BOLD_OFF}\n\nand {BOLD}this{BOLD_OFF}")
        );

        let nested = to_ansi(&render("**outer *mid **inner** mid* outer**"));
        assert_eq!(nested.matches(BOLD_OFF).count(), 1);
        assert!(nested.ends_with(&format!("outer{BOLD_OFF}")));
    }

    #[test]
    fn test_ordered_list_numbers_from_start() {
        let ansi = to_ansi(&render("7. seven\n8. eight\n"));
        assert_eq!(strip_ansi(&ansi), "7. seven\n8. eight");
    }

    #[test]
    fn test_code_block_is_colored_and_labelled() {
        let ansi = to_ansi(&render("```rust\nfn main() {}\n```\n"));
        assert!(ansi.contains("\x1b[38;2;"));
        assert_eq!(strip_ansi(&ansi), "─── rust\nfn main() {}");
    }

    #[test]
    fn test_link_shows_target() {
        let ansi = to_ansi(&render("[docs](https://docs.rs) and <https://example.com>"));
        assert_eq!(
            strip_ansi(&ansi),
            "docs (https://docs.rs) and https://example.com"
        );
    }
}
