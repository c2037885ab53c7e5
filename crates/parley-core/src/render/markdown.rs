use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag};

use super::document::{Block, CodeBlock, Inline, RenderedDocument};
use super::syntax_highlighter::{DEFAULT_THEME, highlight_code};

const MAX_HEADING_LEVEL: u8 = 3;

/// Parse message text into a document, highlighting code with the default theme.
///
/// Pure and stateless: every call is a fresh full parse, so it can be run on
/// the streaming buffer after each update. An unterminated fence renders as
/// a code block running to the end of the text.
pub fn render(text: &str) -> RenderedDocument {
    render_with_theme(text, DEFAULT_THEME)
}

/// Like [`render`], with an explicit syntect theme for code blocks
pub fn render_with_theme(text: &str, theme: &str) -> RenderedDocument {
    let parser = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH);
    let mut builder = TreeBuilder {
        events: parser,
        theme,
    };
    RenderedDocument {
        blocks: builder.blocks_until_end(),
    }
}

/// Folds the flat event stream into nested blocks.
///
/// pulldown-cmark always balances `Start`/`End`, so each `*_until_end` call
/// consumes exactly the events belonging to the container it was entered for.
struct TreeBuilder<'a, 't, I: Iterator<Item = Event<'a>>> {
    events: I,
    theme: &'t str,
}

impl<'a, I: Iterator<Item = Event<'a>>> TreeBuilder<'a, '_, I> {
    fn blocks_until_end(&mut self) -> Vec<Block> {
        let mut blocks = Vec::new();
        // Tight list items carry inline events without a paragraph wrapper
        let mut loose = Vec::new();

        while let Some(event) = self.events.next() {
            match event {
                Event::End(_) => break,
                Event::Start(tag) => match tag {
                    Tag::Paragraph => {
                        flush_loose(&mut blocks, &mut loose);
                        blocks.push(Block::Paragraph(self.inlines_until_end()));
                    }
                    Tag::Heading { level, .. } => {
                        flush_loose(&mut blocks, &mut loose);
                        blocks.push(Block::Heading {
                            level: (level as u8).min(MAX_HEADING_LEVEL),
                            content: self.inlines_until_end(),
                        });
                    }
                    Tag::BlockQuote(_) => {
                        flush_loose(&mut blocks, &mut loose);
                        blocks.push(Block::BlockQuote(self.blocks_until_end()));
                    }
                    Tag::CodeBlock(kind) => {
                        flush_loose(&mut blocks, &mut loose);
                        blocks.push(Block::CodeBlock(self.code_block(kind)));
                    }
                    Tag::List(start) => {
                        flush_loose(&mut blocks, &mut loose);
                        blocks.push(Block::List {
                            start,
                            items: self.list_items(),
                        });
                    }
                    Tag::HtmlBlock => {
                        flush_loose(&mut blocks, &mut loose);
                        let raw = Inline::plain_text(&self.inlines_until_end());
                        blocks.push(Block::Paragraph(vec![Inline::Text(raw)]));
                    }
                    other => loose.push(self.inline_from_start(other)),
                },
                Event::Rule => {
                    flush_loose(&mut blocks, &mut loose);
                    blocks.push(Block::Rule);
                }
                other => push_inline_event(&mut loose, other),
            }
        }

        flush_loose(&mut blocks, &mut loose);
        blocks
    }

    fn inlines_until_end(&mut self) -> Vec<Inline> {
        let mut inlines = Vec::new();
        while let Some(event) = self.events.next() {
            match event {
                Event::End(_) => break,
                Event::Start(tag) => inlines.push(self.inline_from_start(tag)),
                other => push_inline_event(&mut inlines, other),
            }
        }
        inlines
    }

    fn inline_from_start(&mut self, tag: Tag<'a>) -> Inline {
        match tag {
            Tag::Emphasis => Inline::Emphasis(self.inlines_until_end()),
            Tag::Strong => Inline::Strong(self.inlines_until_end()),
            Tag::Strikethrough => Inline::Strikethrough(self.inlines_until_end()),
            Tag::Link { dest_url, .. } => Inline::Link {
                url: dest_url.into_string(),
                children: self.inlines_until_end(),
            },
            Tag::Image { dest_url, .. } => Inline::Image {
                url: dest_url.into_string(),
                alt: Inline::plain_text(&self.inlines_until_end()),
            },
            _ => Inline::Text(Inline::plain_text(&self.inlines_until_end())),
        }
    }

    fn list_items(&mut self) -> Vec<Vec<Block>> {
        let mut items = Vec::new();
        while let Some(event) = self.events.next() {
            match event {
                Event::Start(Tag::Item) => items.push(self.blocks_until_end()),
                Event::End(_) => break,
                _ => {}
            }
        }
        items
    }

    fn code_block(&mut self, kind: CodeBlockKind<'a>) -> CodeBlock {
        let language = match kind {
            CodeBlockKind::Fenced(info) => info
                .split_whitespace()
                .next()
                .map(str::to_string),
            CodeBlockKind::Indented => None,
        };

        let mut code = String::new();
        while let Some(event) = self.events.next() {
            match event {
                Event::Text(text) => code.push_str(&text),
                Event::End(_) => break,
                _ => {}
            }
        }

        let highlighted = language
            .as_deref()
            .and_then(|lang| highlight_code(&code, lang, self.theme));
        CodeBlock {
            language,
            code,
            highlighted,
        }
    }
}

fn flush_loose(blocks: &mut Vec<Block>, loose: &mut Vec<Inline>) {
    if !loose.is_empty() {
        blocks.push(Block::Paragraph(std::mem::take(loose)));
    }
}

fn push_inline_event(inlines: &mut Vec<Inline>, event: Event<'_>) {
    match event {
        Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => push_text(inlines, text),
        Event::Code(code) => inlines.push(Inline::Code(code.into_string())),
        Event::SoftBreak => inlines.push(Inline::SoftBreak),
        Event::HardBreak => inlines.push(Inline::HardBreak),
        _ => {}
    }
}

/// Append text, merging with a preceding text run
fn push_text(inlines: &mut Vec<Inline>, text: CowStr<'_>) {
    if let Some(Inline::Text(last)) = inlines.last_mut() {
        last.push_str(&text);
    } else {
        inlines.push(Inline::Text(text.into_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let input = "# Title\n\nSome *text* with `code`.\n\n```rust\nfn main() {}\n```\n\n1. one\n2. two\n";
        assert_eq!(render(input), render(input));
    }

    #[test]
    fn test_headings_clamp_to_three() {
        let doc = render("# One\n\n#### Four\n\n###### Six");
        let levels: Vec<u8> = doc
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::Heading { level, .. } => Some(*level),
                _ => None,
            })
            .collect();
        assert_eq!(levels, vec![1, 3, 3]);
    }

    #[test]
    fn test_fenced_code_with_language_is_highlighted() {
        let doc = render("```python\nprint('hi')\n```\n");
        let blocks = doc.code_blocks();
        assert_eq!(blocks.len(), 1);

        let block = blocks[0];
        assert_eq!(block.language.as_deref(), Some("python"));
        assert_eq!(block.copy_text(), "print('hi')\n");
        let spans = block.highlighted.as_ref().unwrap();
        let joined: String = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(joined, "print('hi')\n");
    }

    #[test]
    fn test_fence_without_language_is_plain() {
        let doc = render("```\nplain text\n```\n");
        let block = doc.code_blocks()[0];
        assert!(block.language.is_none());
        assert!(block.highlighted.is_none());
        assert_eq!(block.copy_text(), "plain text\n");
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let doc = render("Here you go:\n\n```rust\nfn main() {\n    let x = 1;");
        assert_eq!(doc.blocks.len(), 2);
        match &doc.blocks[1] {
            Block::CodeBlock(block) => {
                assert_eq!(block.language.as_deref(), Some("rust"));
                assert!(block.code.starts_with("fn main() {\n    let x = 1;"));
            }
            other => panic!("expected code block, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_structure() {
        let doc = render("Use `cargo` and **bold** _em_ [docs](https://docs.rs)");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph(vec![
                text("Use "),
                Inline::Code("cargo".to_string()),
                text(" and "),
                Inline::Strong(vec![text("bold")]),
                text(" "),
                Inline::Emphasis(vec![text("em")]),
                text(" "),
                Inline::Link {
                    url: "https://docs.rs".to_string(),
                    children: vec![text("docs")],
                },
            ])]
        );
    }

    #[test]
    fn test_ordered_list_keeps_start() {
        let doc = render("3. three\n4. four\n");
        match &doc.blocks[0] {
            Block::List { start, items } => {
                assert_eq!(*start, Some(3));
                assert_eq!(items.len(), 2);
                assert_eq!(items[0], vec![Block::Paragraph(vec![text("three")])]);
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_unordered_list_and_quote() {
        let doc = render("- a\n- b\n\n> quoted\n");
        assert!(matches!(&doc.blocks[0], Block::List { start: None, items } if items.len() == 2));
        assert_eq!(
            doc.blocks[1],
            Block::BlockQuote(vec![Block::Paragraph(vec![text("quoted")])])
        );
    }

    #[test]
    fn test_nested_code_blocks_are_found() {
        let doc = render("- item\n\n  ```js\n  let a = 1;\n  ```\n");
        let blocks = doc.code_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language.as_deref(), Some("js"));
    }

    #[test]
    fn test_empty_input() {
        assert!(render("").is_empty());
    }
}
