use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::debug;

/// Global syntax set for language definitions (initialized once)
static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

/// Global theme set for syntax highlighting themes (initialized once)
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

pub const DEFAULT_THEME: &str = "base16-ocean.dark";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A span of highlighted text with styling information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighlightedSpan {
    pub text: String,
    pub color: Rgb,
}

/// Normalize language names to match syntect's syntax definitions
pub fn normalize_language(lang: &str) -> String {
    match lang.to_lowercase().as_str() {
        "py" => "python".to_string(),
        "js" | "jsx" => "javascript".to_string(),
        "ts" | "tsx" => "typescript".to_string(),
        "rs" => "rust".to_string(),
        "sh" | "shell" | "zsh" => "bash".to_string(),
        "yml" => "yaml".to_string(),
        "md" => "markdown".to_string(),
        "cpp" | "c++" => "c++".to_string(),
        "cs" => "c#".to_string(),
        "rb" => "ruby".to_string(),
        "golang" => "go".to_string(),
        other => other.to_string(),
    }
}

fn find_syntax(language: &str) -> Option<&'static SyntaxReference> {
    let normalized = normalize_language(language);
    SYNTAX_SET
        .find_syntax_by_extension(&normalized)
        .or_else(|| SYNTAX_SET.find_syntax_by_name(&normalized))
        .or_else(|| SYNTAX_SET.find_syntax_by_token(&normalized))
}

fn find_theme(name: &str) -> Option<&'static Theme> {
    THEME_SET
        .themes
        .get(name)
        .or_else(|| THEME_SET.themes.get(DEFAULT_THEME))
}

pub fn is_known_theme(name: &str) -> bool {
    THEME_SET.themes.contains_key(name)
}

/// Highlight code and return styled spans.
///
/// Returns `None` when the language has no syntax definition, so callers
/// render the block as plain text.
pub fn highlight_code(code: &str, language: &str, theme_name: &str) -> Option<Vec<HighlightedSpan>> {
    let syntax = find_syntax(language)?;
    let theme = find_theme(theme_name)?;

    let mut highlighter = HighlightLines::new(syntax, theme);
    let mut spans: Vec<HighlightedSpan> = Vec::new();

    for line in LinesWithEndings::from(code) {
        let ranges = match highlighter.highlight_line(line, &SYNTAX_SET) {
            Ok(ranges) => ranges,
            Err(e) => {
                debug!(language, error = ?e, "Highlighting failed, falling back to plain text");
                return None;
            }
        };

        for (style, text) in ranges {
            let color = Rgb {
                r: style.foreground.r,
                g: style.foreground.g,
                b: style.foreground.b,
            };
            // Merge neighbours of the same color to keep span lists short
            if let Some(last) = spans.last_mut().filter(|last| last.color == color) {
                last.text.push_str(text);
            } else {
                spans.push(HighlightedSpan {
                    text: text.to_string(),
                    color,
                });
            }
        }
    }

    Some(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(normalize_language("PY"), "python");
        assert_eq!(normalize_language("rs"), "rust");
        assert_eq!(normalize_language("golang"), "go");
        assert_eq!(normalize_language("haskell"), "haskell");
    }

    #[test]
    fn test_highlight_known_language_preserves_text() {
        let code = "fn main() {\n    println!(\"hi\");\n}\n";
        let spans = highlight_code(code, "rust", DEFAULT_THEME).unwrap();

        let joined: String = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(joined, code);
        assert!(spans.len() > 1);
    }

    #[test]
    fn test_unknown_language_is_not_highlighted() {
        assert!(highlight_code("whatever", "not-a-language", DEFAULT_THEME).is_none());
    }

    #[test]
    fn test_unknown_theme_falls_back() {
        assert!(!is_known_theme("no-such-theme"));
        assert!(is_known_theme(DEFAULT_THEME));
        assert!(highlight_code("x = 1\n", "python", "no-such-theme").is_some());
    }
}
