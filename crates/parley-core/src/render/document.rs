use super::syntax_highlighter::HighlightedSpan;

/// Structured markup produced from a message's raw text
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderedDocument {
    pub blocks: Vec<Block>,
}

impl RenderedDocument {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All code blocks in document order, including ones nested in lists and quotes
    pub fn code_blocks(&self) -> Vec<&CodeBlock> {
        let mut found = Vec::new();
        collect_code_blocks(&self.blocks, &mut found);
        found
    }
}

fn collect_code_blocks<'a>(blocks: &'a [Block], found: &mut Vec<&'a CodeBlock>) {
    for block in blocks {
        match block {
            Block::CodeBlock(code) => found.push(code),
            Block::BlockQuote(children) => collect_code_blocks(children, found),
            Block::List { items, .. } => {
                for item in items {
                    collect_code_blocks(item, found);
                }
            }
            Block::Heading { .. } | Block::Paragraph(_) | Block::Rule => {}
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    /// Level is always 1..=3
    Heading { level: u8, content: Vec<Inline> },
    Paragraph(Vec<Inline>),
    CodeBlock(CodeBlock),
    /// `start` is set for ordered lists
    List {
        start: Option<u64>,
        items: Vec<Vec<Block>>,
    },
    BlockQuote(Vec<Block>),
    Rule,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    /// Inline code span, shown monospace without highlighting
    Code(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link { url: String, children: Vec<Inline> },
    Image { url: String, alt: String },
    SoftBreak,
    HardBreak,
}

impl Inline {
    /// Text content with all markup removed
    pub fn plain_text(inlines: &[Inline]) -> String {
        let mut out = String::new();
        for inline in inlines {
            match inline {
                Inline::Text(text) | Inline::Code(text) => out.push_str(text),
                Inline::Emphasis(children)
                | Inline::Strong(children)
                | Inline::Strikethrough(children)
                | Inline::Link { children, .. } => out.push_str(&Self::plain_text(children)),
                Inline::Image { alt, .. } => out.push_str(alt),
                Inline::SoftBreak | Inline::HardBreak => out.push('\n'),
            }
        }
        out
    }
}

/// A fenced or indented code block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
    /// Colored spans; `None` when the language is absent or unknown
    pub highlighted: Option<Vec<HighlightedSpan>>,
}

impl CodeBlock {
    /// Full block text, for a copy-to-clipboard affordance
    pub fn copy_text(&self) -> &str {
        &self.code
    }
}
