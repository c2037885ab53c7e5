//! Markdown rendering for committed messages and the live streaming buffer.
//!
//! [`render`] parses text into a [`RenderedDocument`] tree; the `html` and
//! `ansi` back ends turn that tree into output for a particular shell.

pub mod ansi;
pub mod document;
pub mod html;
pub mod markdown;
pub mod syntax_highlighter;

pub use ansi::to_ansi;
pub use document::{Block, CodeBlock, Inline, RenderedDocument};
pub use html::to_html;
pub use markdown::{render, render_with_theme};
pub use syntax_highlighter::{HighlightedSpan, Rgb};
