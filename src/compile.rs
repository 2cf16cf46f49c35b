//! Compile markdown content files.
//!
//! A source file goes through the following steps:
//!
//! 1. Split the front matter, body and excerpt.
//! 2. Parse the markdown body into HTML, keeping raw HTML.
//! 3. Parse the HTML into a DOM.
//! 4. Sanitize the DOM (when enabled).
//! 5. Assign heading ids, link headings to themselves, and rewrite external
//!    links, in a single traversal that also collects the headings.
//! 6. Serialize the DOM to HTML.
//!
//! The result is a [`CompiledContent`] record, which can be emitted as an ES
//! module or as JSON.

pub mod emit;
pub mod front_matter;
pub mod headings;
pub mod html;
pub mod links;
pub mod markdown;
pub mod metadata;
pub mod sanitize;
pub mod slug;

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

pub use self::{
    front_matter::FrontMatter,
    headings::Heading,
    markdown::{MarkdownError, MarkdownParser, SyntaxHighlightOptions},
};
use self::{
    front_matter::{FrontMatterError, DEFAULT_EXCERPT_SEPARATOR},
    headings::{HeadingAutolink, HeadingCollector, HeadingIds},
    html::{walk, Fragment, HtmlError},
    links::ExternalLinks,
    metadata::DEFAULT_WORDS_PER_MINUTE,
    sanitize::Schema,
};

/// Default alias naming the content root in the host configuration.
pub const DEFAULT_CONTENT_ALIAS: &str = "@content";

/// Elements keeping their `class` attribute when code is highlighted.
const HIGHLIGHT_CLASS_ELEMENTS: [&str; 3] = ["pre", "code", "span"];

/// List of errors for this module.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Malformed front matter.
    #[error("invalid front matter in `{path}`")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },
    /// Error while reading a source file or its metadata.
    #[error("failed to read `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Error while parsing or serializing HTML.
    #[error("failed to transform HTML of `{path}`")]
    Transform {
        path: PathBuf,
        #[source]
        source: HtmlError,
    },
    /// Error while emitting a module.
    #[error("failed to emit `{path}`")]
    Emit {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Error while creating the markdown parser.
    #[error("failed to initialize the markdown parser")]
    Markdown(#[source] MarkdownError),
}

/// Options of the compiler.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Sanitize the HTML against the default schema.
    pub sanitize: bool,

    /// Line separating the excerpt from the rest of the body.
    pub excerpt_separator: String,

    /// Reading speed used to estimate the reading time.
    pub words_per_minute: u32,

    /// Hosts whose links are not treated as external.
    pub internal_hosts: Vec<String>,

    /// Alias naming the content root in the host configuration.
    pub content_alias: String,

    /// CSS class prefix of highlighted code, or [`None`] to disable syntax
    /// highlighting.
    pub syntax_highlight: Option<String>,

    /// Optional markdown plugins (see [`MarkdownParser::add_plugin`]).
    pub plugins: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            sanitize: true,
            excerpt_separator: DEFAULT_EXCERPT_SEPARATOR.to_owned(),
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            internal_hosts: Vec::new(),
            content_alias: DEFAULT_CONTENT_ALIAS.to_owned(),
            syntax_highlight: None,
            plugins: Vec::new(),
        }
    }
}

/// Compiled content file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledContent {
    /// Front matter data.
    pub frontmatter: FrontMatter,

    /// Sanitized HTML of the body.
    pub content_html: String,

    /// Body text before the excerpt separator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,

    /// Slug of the file.
    pub slug: String,

    /// Modification time of the source file.
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,

    /// Derived metadata.
    pub meta: Meta,
}

/// Metadata derived from the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// Estimated reading time in minutes.
    pub reading_time: usize,

    /// Number of words of the raw body.
    pub word_count: usize,

    /// Headings in document order.
    pub headings: Vec<Heading>,
}

/// Resolved configuration of the host build tool.
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    /// Import aliases.
    pub aliases: Vec<Alias>,
}

/// Import alias of the host build tool.
#[derive(Debug, Clone)]
pub struct Alias {
    /// Alias name, e.g. `@content`.
    pub find: String,
    /// Directory the alias resolves to.
    pub replacement: PathBuf,
}

/// Output of [`Compiler::transform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// ES module source.
    pub code: String,
    /// Source map, never produced.
    pub map: Option<String>,
}

/// Content compiler.
///
/// A compiler holds no per-file state: it can be shared by reference between
/// threads once configured.
#[derive(Debug)]
pub struct Compiler {
    options: CompileOptions,
    parser: MarkdownParser,
    schema: Option<Schema>,
    content_root: Option<PathBuf>,
}

impl Compiler {
    /// Create a compiler.
    pub fn new(options: CompileOptions) -> Result<Self, CompileError> {
        let mut parser = MarkdownParser::new();

        for plugin in &options.plugins {
            parser.add_plugin(plugin).map_err(CompileError::Markdown)?;
        }

        if let Some(prefix) = &options.syntax_highlight {
            parser.add_syntax_highlight(SyntaxHighlightOptions::new(prefix.as_str()));
        }

        let schema = options.sanitize.then(|| {
            let mut schema = Schema::default();
            if options.syntax_highlight.is_some() {
                schema.allow_classes(&HIGHLIGHT_CLASS_ELEMENTS);
            }
            schema
        });

        Ok(Self {
            options,
            parser,
            schema,
            content_root: None,
        })
    }

    /// Set the directory slugs are relative to.
    pub fn with_content_root(mut self, content_root: impl Into<PathBuf>) -> Self {
        self.content_root = Some(content_root.into());
        self
    }

    /// Return the compiler options.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Return the content root, if known.
    pub fn content_root(&self) -> Option<&Path> {
        self.content_root.as_deref()
    }

    /// Capture the content root from the host configuration.
    ///
    /// The root is the replacement of the alias named by
    /// [`CompileOptions::content_alias`]. Without such an alias, slugs fall
    /// back to file names.
    pub fn config_resolved(&mut self, config: &HostConfig) {
        match config
            .aliases
            .iter()
            .find(|alias| alias.find == self.options.content_alias)
        {
            Some(alias) => {
                tracing::debug!(
                    "compile: content root `{}`",
                    alias.replacement.display()
                );
                self.content_root = Some(alias.replacement.clone());
            },
            None => {
                tracing::debug!(
                    "compile: no alias `{}`, slugs fall back to file names",
                    self.options.content_alias
                );
            },
        }
    }

    /// Transform a source file into an ES module.
    ///
    /// Returns [`None`] when the path is not a markdown file. The modification
    /// time is read from the file system.
    pub fn transform(
        &self,
        source: &str,
        path: impl AsRef<Path>,
    ) -> Result<Option<TransformOutput>, CompileError> {
        let path = path.as_ref();

        if !slug::is_markdown(path) {
            return Ok(None);
        }

        let last_modified = modified_time(path)?;
        let content = self.compile(source, path, last_modified)?;

        let code = emit::emit_module(&content).map_err(|source| CompileError::Emit {
            path: path.to_owned(),
            source,
        })?;

        Ok(Some(TransformOutput { code, map: None }))
    }

    /// Return the modules to reload when a file changes.
    ///
    /// Markdown files reload their modules; other files are left to the host.
    pub fn handle_hot_update<M>(&self, path: impl AsRef<Path>, modules: Vec<M>) -> Option<Vec<M>> {
        slug::is_markdown(path).then_some(modules)
    }

    /// Read and compile a source file.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<CompiledContent, CompileError> {
        let path = path.as_ref();

        let read_error = |source| CompileError::Read {
            path: path.to_owned(),
            source,
        };

        let source = fs::read_to_string(path).map_err(read_error)?;
        let last_modified = modified_time(path)?;

        self.compile(&source, path, last_modified)
    }

    /// Compile a source string.
    ///
    /// `path` is used to resolve the slug and to give context to errors.
    pub fn compile(
        &self,
        source: &str,
        path: impl AsRef<Path>,
        last_modified: OffsetDateTime,
    ) -> Result<CompiledContent, CompileError> {
        let path = path.as_ref();

        let split = front_matter::split(source, &self.options.excerpt_separator).map_err(
            |source| CompileError::FrontMatter {
                path: path.to_owned(),
                source,
            },
        )?;

        let (content_html, headings) =
            self.render(split.body)
                .map_err(|source| CompileError::Transform {
                    path: path.to_owned(),
                    source,
                })?;

        let word_count = metadata::word_count(split.body);
        let reading_time = metadata::reading_time(word_count, self.options.words_per_minute);

        Ok(CompiledContent {
            frontmatter: split.front_matter,
            content_html,
            excerpt: split.excerpt.map(str::to_owned),
            slug: slug::resolve(path, self.content_root.as_deref()),
            last_modified,
            meta: Meta {
                reading_time,
                word_count,
                headings,
            },
        })
    }

    /// Render a markdown body to HTML and collect its headings.
    fn render(&self, body: &str) -> Result<(String, Vec<Heading>), HtmlError> {
        let html = self.parser.parse(body);
        let fragment = Fragment::parse(&html)?;

        if let Some(schema) = &self.schema {
            sanitize::sanitize(fragment.root(), schema);
        }

        let mut ids = HeadingIds::default();
        let mut collector = HeadingCollector::default();
        let mut autolink = HeadingAutolink;
        let mut links = ExternalLinks::new(&self.options.internal_hosts);

        // Headings are collected after ids are assigned and before their
        // content is wrapped in a link
        walk(
            fragment.root(),
            &mut [&mut ids, &mut collector, &mut autolink, &mut links],
        );

        Ok((fragment.to_html()?, collector.into_headings()))
    }
}

/// Read the modification time of a file.
fn modified_time(path: &Path) -> Result<OffsetDateTime, CompileError> {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map(OffsetDateTime::from)
        .map_err(|source| CompileError::Read {
            path: path.to_owned(),
            source,
        })
}
