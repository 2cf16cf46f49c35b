//! Parse Markdown.
//!
//! [Markdown](<https://spec.commonmark.org/>) is a plain text format for writing structured
//! documents. Content files are parsed with the GitHub-flavored extensions
//! (tables, strikethrough, task lists and autolinked URLs), and raw HTML
//! written by authors is preserved for the later HTML passes.
//!
//! This module uses [`markdown_it`] under the hood.

pub mod syntax_highlight;
pub mod task_list;

use markdown_it::MarkdownIt;
use thiserror::Error;

pub use self::syntax_highlight::SyntaxHighlightOptions;

/// List of errors for this module.
#[derive(Debug, Error)]
pub enum MarkdownError {
    /// Plugin not found error.
    #[error("plugin not found: `{0}`")]
    PluginNotFound(String),
}

/// Markdown parser.
#[derive(Debug)]
pub struct MarkdownParser {
    // Markdown-it parser.
    parser: MarkdownIt,
}

impl MarkdownParser {
    /// Create a Markdown parser.
    ///
    /// The parser always understands [CommonMark](<https://spec.commonmark.org/>),
    /// raw HTML, and the GitHub-flavored extensions. The syntax can be extended
    /// using the [`Self::add_plugin`] method.
    pub fn new() -> Self {
        use markdown_it::plugins::{cmark, extra, html};

        let mut parser = MarkdownIt::new();

        cmark::add(&mut parser);
        html::add(&mut parser);
        extra::tables::add(&mut parser);
        extra::strikethrough::add(&mut parser);
        extra::linkify::add(&mut parser);
        self::task_list::add(&mut parser);

        Self { parser }
    }

    /// Add an optional builtin plugin by name.
    ///
    /// This method returns an error when the plugin has not been found.
    ///
    /// Available plugins:
    ///
    /// - `beautify_links`: Pretty-print all urls and fit them into N
    ///   characters.
    /// - `typographer`: Common textual replacements for dashes, ©, ™, ….
    /// - `smartquotes`: Replaces `"` and `'` quotes with "nicer" ones like `‘`,
    ///   `’`, `“`, `”`, or with `’` for words like "isn't".
    /// - `sourcepos`: Add source mapping to resulting HTML, looks like this:
    ///   `<stuff data-sourcepos="1:1-2:3">`.
    ///
    /// See <https://docs.rs/markdown-it/0.6.0/markdown_it/plugins/index.html> for more details.
    pub fn add_plugin<S>(&mut self, name: S) -> Result<(), MarkdownError>
    where
        S: AsRef<str>,
    {
        use markdown_it::plugins::{extra, sourcepos};

        let name = name.as_ref();

        match name {
            "beautify_links" => extra::beautify_links::add(&mut self.parser),
            "typographer" => extra::typographer::add(&mut self.parser),
            "smartquotes" => extra::smartquotes::add(&mut self.parser),
            "sourcepos" => sourcepos::add(&mut self.parser),
            _ => return Err(MarkdownError::PluginNotFound(name.to_string())),
        }

        Ok(())
    }

    /// Highlight code blocks while parsing.
    pub fn add_syntax_highlight(&mut self, options: SyntaxHighlightOptions) {
        self::syntax_highlight::add(&mut self.parser, options);
    }

    /// Compile a Markdown string to HTML.
    pub fn parse<S>(&self, input: S) -> String
    where
        S: AsRef<str>,
    {
        let input = input.as_ref();
        let ast = self.parser.parse(input);
        ast.render()
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}
