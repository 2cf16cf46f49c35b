//! Configure the content compiler.
//!
//! The configuration is read from `quire.toml`, `quire.yaml` or `quire.yml` in
//! the working directory, or from the file given with `--config`. Every field
//! has a default, so the file is optional. Command line options override the
//! values of the file.

pub mod toml;
pub mod yaml;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    cli::Opts,
    compile::{
        emit, front_matter::DEFAULT_EXCERPT_SEPARATOR, metadata::DEFAULT_WORDS_PER_MINUTE,
        CompileError, CompileOptions, CompiledContent, Compiler, DEFAULT_CONTENT_ALIAS,
    },
};

/// Configuration files looked up in the working directory, by priority.
const CONFIG_FILE_NAMES: [&str; 3] = ["quire.toml", "quire.yaml", "quire.yml"];

/// List of errors for this module.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error while reading a configuration file.
    #[error("failed to read configuration file `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Error while parsing a TOML configuration file.
    #[error("failed to parse configuration file `{path}`")]
    Toml {
        path: PathBuf,
        #[source]
        source: ::toml::de::Error,
    },
    /// Error while parsing a YAML configuration file.
    #[error("failed to parse configuration file `{path}`")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    /// The configuration file has an unsupported extension.
    #[error("unknown configuration file extension `{path}` (expected toml, yaml or yml)")]
    UnknownExtension { path: PathBuf },
    /// The content directory cannot be resolved.
    #[error("content directory `{path}` not found")]
    ContentDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Error while resolving the working directory.
    #[error(transparent)]
    CurrentDir(std::io::Error),
    /// The output directory would overwrite the content directory.
    #[error("`content_dir` must be located outside `output_dir`")]
    OutputContainsContent,
}

/// Configuration of the content compiler.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory of markdown content files.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Directory of compiled files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Format of compiled files.
    #[serde(default)]
    pub format: OutputFormat,

    /// Alias naming the content root in the host configuration.
    #[serde(default = "default_content_alias")]
    pub content_alias: String,

    /// Markdown configuration.
    #[serde(default)]
    pub markdown: MarkdownConfig,

    /// Syntax highlight configuration.
    #[serde(default)]
    pub syntax_highlight: SyntaxHighlightConfig,
}

/// Format of compiled files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ES module with a default export.
    #[default]
    Module,
    /// JSON document.
    Json,
}

impl OutputFormat {
    /// Return the extension of compiled files.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Module => "js",
            Self::Json => "json",
        }
    }

    /// Emit a record in this format.
    pub fn emit(&self, content: &CompiledContent) -> Result<String, serde_json::Error> {
        match self {
            Self::Module => emit::emit_module(content),
            Self::Json => emit::emit_json(content),
        }
    }
}

/// Markdown configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkdownConfig {
    /// Sanitize the HTML of content files.
    #[serde(default = "default_sanitize")]
    pub sanitize: bool,

    /// Line separating the excerpt from the rest of the body.
    #[serde(default = "default_excerpt_separator")]
    pub excerpt_separator: String,

    /// Reading speed used to estimate the reading time.
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,

    /// Hosts whose links are not treated as external.
    #[serde(default)]
    pub internal_hosts: Vec<String>,

    /// Optional markdown plugins.
    #[serde(default)]
    pub plugins: Vec<String>,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            sanitize: default_sanitize(),
            excerpt_separator: default_excerpt_separator(),
            words_per_minute: default_words_per_minute(),
            internal_hosts: Vec::new(),
            plugins: Vec::new(),
        }
    }
}

/// Syntax highlight configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyntaxHighlightConfig {
    /// Highlight code blocks.
    #[serde(default)]
    pub enabled: bool,

    /// Prefix for CSS class names.
    #[serde(default)]
    pub css_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            output_dir: default_output_dir(),
            format: OutputFormat::default(),
            content_alias: default_content_alias(),
            markdown: MarkdownConfig::default(),
            syntax_highlight: SyntaxHighlightConfig::default(),
        }
    }
}

impl Config {
    /// Load the configuration for command line options.
    ///
    /// The returned configuration is normalized and checked.
    pub fn from_opts(opts: &Opts) -> Result<Self, ConfigError> {
        let config_path = opts.config.clone().or_else(|| {
            CONFIG_FILE_NAMES
                .into_iter()
                .map(PathBuf::from)
                .find(|path| path.exists())
        });

        let mut config = match config_path {
            Some(path) => {
                tracing::info!("Loading configuration `{}`", path.display());
                Self::from_path(path)?
            },
            None => Self::default(),
        };

        if let Some(content_dir) = &opts.content {
            config.content_dir = content_dir.clone();
        }

        if let Some(output_dir) = &opts.output {
            config.output_dir = output_dir.clone();
        }

        if let Some(format) = opts.format {
            config.format = format;
        }

        let config = config.normalize()?;

        config.check()?;

        Ok(config)
    }

    /// Load the configuration from a file.
    ///
    /// The format is determined by the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match path.extension().and_then(|extension| extension.to_str()) {
            Some("toml") => self::toml::load_config(path),
            Some("yaml" | "yml") => self::yaml::load_config(path),
            _ => Err(ConfigError::UnknownExtension {
                path: path.to_owned(),
            }),
        }
    }

    /// Normalize the configuration.
    ///
    /// Make all paths absolute, resolving the content directory.
    pub fn normalize(self) -> Result<Self, ConfigError> {
        let current_dir = std::env::current_dir().map_err(ConfigError::CurrentDir)?;

        let content_dir = current_dir
            .join(&self.content_dir)
            .canonicalize()
            .map_err(|source| ConfigError::ContentDir {
                path: self.content_dir.clone(),
                source,
            })?;

        let output_dir = current_dir.join(&self.output_dir);
        let output_dir = output_dir.canonicalize().unwrap_or(output_dir);

        Ok(Self {
            content_dir,
            output_dir,
            ..self
        })
    }

    /// Check if the configuration is valid.
    pub fn check(&self) -> Result<(), ConfigError> {
        debug_assert!(self.content_dir.is_absolute());
        debug_assert!(self.output_dir.is_absolute());

        // Prevent overwriting content files
        if self.content_dir.starts_with(&self.output_dir) {
            return Err(ConfigError::OutputContainsContent);
        }

        Ok(())
    }

    /// Return the options of the compiler.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            sanitize: self.markdown.sanitize,
            excerpt_separator: self.markdown.excerpt_separator.clone(),
            words_per_minute: self.markdown.words_per_minute,
            internal_hosts: self.markdown.internal_hosts.clone(),
            content_alias: self.content_alias.clone(),
            syntax_highlight: self
                .syntax_highlight
                .enabled
                .then(|| self.syntax_highlight.css_prefix.clone()),
            plugins: self.markdown.plugins.clone(),
        }
    }

    /// Create a compiler resolving slugs from the content directory.
    pub fn compiler(&self) -> Result<Compiler, CompileError> {
        Ok(Compiler::new(self.compile_options())?.with_content_root(&self.content_dir))
    }
}

/// Default value for [`Config::content_dir`].
pub fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

/// Default value for [`Config::output_dir`].
pub fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

/// Default value for [`Config::content_alias`].
pub fn default_content_alias() -> String {
    DEFAULT_CONTENT_ALIAS.to_owned()
}

/// Default value for [`MarkdownConfig::sanitize`].
pub fn default_sanitize() -> bool {
    true
}

/// Default value for [`MarkdownConfig::excerpt_separator`].
pub fn default_excerpt_separator() -> String {
    DEFAULT_EXCERPT_SEPARATOR.to_owned()
}

/// Default value for [`MarkdownConfig::words_per_minute`].
pub fn default_words_per_minute() -> u32 {
    DEFAULT_WORDS_PER_MINUTE
}
