//! Sources of content records.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::{future::BoxFuture, FutureExt};

use super::LoadError;
use crate::{
    compile::{slug, CompiledContent, Compiler},
    util::walk::DirWalker,
};

/// Registry of content records.
pub trait ContentSource: Send + Sync {
    /// Enumerate known slugs.
    fn slugs(&self) -> Vec<String>;

    /// Return a future producing the record of a slug.
    ///
    /// Unknown slugs resolve to [`LoadError::NotFound`]. This method must not
    /// block: looking the slug up and loading it happen when the future is
    /// polled.
    fn load(&self, slug: &str) -> BoxFuture<'static, Result<CompiledContent, LoadError>>;
}

/// Compile records from markdown files of a content directory.
///
/// Files are compiled on a blocking thread each time they are loaded; pair
/// this source with a cache. Only files listed by the directory walker are
/// served: hidden and ignored files are unknown slugs.
#[derive(Debug, Clone)]
pub struct FsSource {
    compiler: Arc<Compiler>,
    content_dir: PathBuf,
}

impl FsSource {
    /// Create a source reading from `content_dir`.
    ///
    /// Slugs are resolved relative to `content_dir`.
    pub fn new(compiler: Compiler, content_dir: impl Into<PathBuf>) -> Self {
        let content_dir = content_dir.into();

        Self {
            compiler: Arc::new(compiler.with_content_root(&content_dir)),
            content_dir,
        }
    }

    /// Return the content directory.
    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Return the compiler.
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Return the source file of a known slug.
    ///
    /// This function walks the content directory.
    pub fn path_of(&self, slug: &str) -> Option<PathBuf> {
        self.entries()
            .find(|(known, _)| known == slug)
            .map(|(_, path)| path)
    }

    /// Return the slug of a markdown file located in the content directory.
    pub fn slug_of(&self, path: impl AsRef<Path>) -> Option<String> {
        let path = path.as_ref();

        (path.starts_with(&self.content_dir) && slug::is_markdown(path))
            .then(|| slug::resolve(path, Some(self.content_dir.as_path())))
    }

    /// Iterate over the slugs and paths of content files.
    fn entries(&self) -> impl Iterator<Item = (String, PathBuf)> + '_ {
        DirWalker::new(&self.content_dir)
            .markdown_files()
            .map(|path| (slug::resolve(&path, Some(self.content_dir.as_path())), path))
    }

    /// Look a slug up and compile its file.
    fn load_blocking(&self, slug: &str) -> Result<CompiledContent, LoadError> {
        let entries: Vec<(String, PathBuf)> = self.entries().collect();

        let Some((_, path)) = entries.iter().find(|(known, _)| known == slug) else {
            return Err(LoadError::NotFound {
                slug: slug.to_owned(),
                available: entries.into_iter().map(|(known, _)| known).collect(),
            });
        };

        tracing::debug!("load: compile `{}`", path.display());

        self.compiler
            .compile_file(path)
            .map_err(|source| LoadError::Compile {
                slug: slug.to_owned(),
                source: Arc::new(source),
            })
    }
}

impl ContentSource for FsSource {
    fn slugs(&self) -> Vec<String> {
        self.entries().map(|(slug, _)| slug).collect()
    }

    fn load(&self, slug: &str) -> BoxFuture<'static, Result<CompiledContent, LoadError>> {
        let source = self.clone();
        let slug = slug.to_owned();

        async move {
            let task_slug = slug.clone();

            tokio::task::spawn_blocking(move || source.load_blocking(&task_slug))
                .await
                .map_err(|error| LoadError::Interrupted {
                    slug,
                    reason: error.to_string(),
                })?
        }
        .boxed()
    }
}
