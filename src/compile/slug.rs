//! Resolve content slugs from file paths.
//!
//! A slug is the canonical identifier of a content file: its path relative to
//! the content root, with `/` separators and without the `.md` extension
//! (e.g. `<root>/projects/example.md` becomes `projects/example`).

use std::path::{Component, Path};

/// Extension of markdown source files.
pub const MARKDOWN_EXTENSION: &str = "md";

/// Determine if a path points to a markdown source file.
pub fn is_markdown(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .is_some_and(|extension| extension == MARKDOWN_EXTENSION)
}

/// Resolve the slug of a file.
///
/// Without a content root, or when the file is not located inside it, the slug
/// falls back to the file name. Distinct files may share a slug in the latter
/// case; the resolver does not deduplicate.
pub fn resolve(path: impl AsRef<Path>, content_root: Option<&Path>) -> String {
    let path = path.as_ref();

    let relative = content_root
        .and_then(|root| path.strip_prefix(root).ok())
        .filter(|relative| relative.file_name().is_some());

    let slug = match relative {
        Some(relative) => join_components(relative),
        None => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    strip_extension(slug)
}

/// Join normal path components with `/`.
fn join_components(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Remove the trailing `.md` extension.
fn strip_extension(slug: String) -> String {
    match slug.strip_suffix(".md") {
        Some(stem) => stem.to_owned(),
        None => slug,
    }
}
