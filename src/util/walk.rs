//! Walk content directories recursively.
//!
//! This module uses [`ignore`] under the hood.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::compile::slug::is_markdown;

/// A directory walker.
///
/// This walker creates a recursive directory iterator that filters hidden files
/// and paths specified in `.gitignore` files. Entries are yielded sorted by
/// file name, so that listings are stable across runs.
pub struct DirWalker {
    /// Builds a recursive directory iterator.
    builder: WalkBuilder,
}

impl DirWalker {
    /// Create a directory walker.
    pub fn new<P>(dir: P) -> Self
    where
        P: AsRef<Path>,
    {
        let mut builder = WalkBuilder::new(dir);

        builder
            .hidden(true)
            .git_ignore(true)
            .ignore(false)
            .parents(false)
            .git_global(false)
            .git_exclude(false)
            .require_git(false)
            .ignore_case_insensitive(false)
            .sort_by_file_name(|a, b| a.cmp(b));

        Self { builder }
    }

    /// Return an iterator over the paths of (valid) files.
    pub fn files(&self) -> impl Iterator<Item = PathBuf> {
        self.builder
            .build()
            .filter_map(|result| match result {
                Ok(entry) => Some(entry),
                Err(error) => {
                    tracing::warn!("walk: {}", error);
                    None
                },
            })
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|file_type| file_type.is_file())
            })
            .map(|entry| entry.into_path())
    }

    /// Return an iterator over the paths of markdown files.
    pub fn markdown_files(&self) -> impl Iterator<Item = PathBuf> {
        self.files().filter(|path| is_markdown(path))
    }
}
