//! Syntax highlight plugin for Markdown.
//!
//! Code blocks are highlighted with CSS classes, so that a stylesheet
//! generated for any theme can color them.
//!
//! This module uses [`syntect`] under the hood.

use markdown_it::{
    parser::{core::CoreRule, extset::MarkdownItExt},
    plugins::cmark::block::{code::CodeBlock, fence::CodeFence},
    MarkdownIt, Node, NodeValue, Renderer,
};
use once_cell::sync::Lazy;
use syntect::{
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::SyntaxSet,
    util::LinesWithEndings,
};

/// Set of default syntaxes.
static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

/// Options for syntax highlighting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxHighlightOptions {
    /// Prefix for CSS class names.
    ///
    /// syntect requires a `'static` prefix, see [`Self::new`].
    prefix: &'static str,
}

impl SyntaxHighlightOptions {
    /// Create options with a CSS class prefix.
    ///
    /// The prefix is leaked once to satisfy syntect; create options once per
    /// compiler, not per file.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix.is_empty() {
            ""
        } else {
            Box::leak(prefix.into_boxed_str())
        };
        Self { prefix }
    }

    /// Return the CSS class prefix.
    pub fn prefix(&self) -> &str {
        self.prefix
    }
}

// Allow using `md.ext.insert()` to store `SyntaxHighlightOptions`.
impl MarkdownItExt for SyntaxHighlightOptions {}

/// Add a Markdown rule for syntax highlighting.
pub fn add(md: &mut MarkdownIt, options: SyntaxHighlightOptions) {
    md.add_rule::<SyntaxHighlightRule>();
    md.ext.insert(options);
}

/// Highlight a code with specified language.
pub fn highlight(
    input: &str,
    language: Option<&str>,
    prefix: &'static str,
) -> Result<String, syntect::Error> {
    let syntax = language
        .and_then(|language| SYNTAX_SET.find_syntax_by_token(language))
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());

    let style = if prefix.is_empty() {
        ClassStyle::Spaced
    } else {
        ClassStyle::SpacedPrefixed { prefix }
    };

    let mut html_generator = ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, style);

    for line in LinesWithEndings::from(input) {
        html_generator.parse_html_for_line_which_includes_newline(line)?;
    }

    Ok(html_generator.finalize())
}

/// Syntax highlight rule for Markdown.
struct SyntaxHighlightRule;

impl CoreRule for SyntaxHighlightRule {
    fn run(root: &mut Node, md: &MarkdownIt) {
        let Some(options) = md.ext.get::<SyntaxHighlightOptions>().copied() else {
            return;
        };

        root.walk_mut(|node, _| {
            // Detect if the node is a code block or a code fence
            let (content, language) = if let Some(code_block) = node.cast::<CodeBlock>() {
                (&code_block.content, None)
            } else if let Some(code_fence) = node.cast::<CodeFence>() {
                // Only the first word of the info string names the language
                let language = code_fence
                    .info
                    .split_whitespace()
                    .next()
                    .map(str::to_owned);
                (&code_fence.content, language)
            } else {
                return;
            };

            let content = match highlight(content, language.as_deref(), options.prefix) {
                Ok(content) => content,
                Err(error) => {
                    // Keep the plain code block
                    tracing::warn!("markdown::syntax_highlight: {}", error);
                    return;
                },
            };

            node.replace(HighlightedCode {
                content,
                language,
                prefix: options.prefix,
            });
        });
    }
}

/// AST node for highlighted code.
#[derive(Debug)]
struct HighlightedCode {
    content: String,
    language: Option<String>,
    prefix: &'static str,
}

impl NodeValue for HighlightedCode {
    fn render(&self, _: &Node, fmt: &mut dyn Renderer) {
        const PRE: &str = "pre";
        const CODE: &str = "code";

        let class = match self.language.as_ref().filter(|v| !v.is_empty()) {
            Some(language) => format!("{}code language-{}", self.prefix, language),
            None => format!("{}code", self.prefix),
        };

        let attributes = [("class", class)];

        fmt.open(PRE, &attributes);
        fmt.open(CODE, &attributes);
        fmt.text_raw(&self.content);
        fmt.close(CODE);
        fmt.close(PRE);
        fmt.cr();
    }
}

#[cfg(test)]
mod tests {
    use super::{highlight, SyntaxHighlightOptions};
    use crate::compile::markdown::MarkdownParser;

    #[test]
    fn highlight_rust() {
        let result = highlight("fn main() {}\n", Some("rust"), "").unwrap();
        assert!(result.contains("<span class=\"source rust\">"));
    }

    #[test]
    fn highlight_unknown_language() {
        let result = highlight("plain <text>\n", Some("no-such-language"), "").unwrap();
        assert!(result.contains("plain &lt;text&gt;"));
    }

    #[test]
    fn highlight_fence() {
        let mut parser = MarkdownParser::new();
        parser.add_syntax_highlight(SyntaxHighlightOptions::new("hl-"));

        let result = parser.parse("```rust\nlet x = 1;\n```\n");

        assert!(result.contains(r#"<pre class="hl-code language-rust">"#));
        assert!(result.contains("hl-source hl-rust"));
    }
}
