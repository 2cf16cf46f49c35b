//! Compile markdown content into cacheable records.
//!
//! Quire turns markdown files with YAML front matter into records holding
//! sanitized HTML, the document outline and derived metadata. Records are
//! emitted as ES modules or JSON at build time, or served at runtime through a
//! cache that collapses concurrent loads.
//!
//! Quire can be used as both a CLI and a library.

pub mod build;
pub mod cli;
pub mod compile;
pub mod config;
pub mod provider;
pub mod serve;
pub mod util;
pub mod watch;

pub use build::build;
pub use compile::{CompileError, CompileOptions, CompiledContent, Compiler};
pub use config::Config;
pub use provider::{ContentFilters, ContentProvider, LoadError};
pub use serve::serve;
pub use watch::watch;
