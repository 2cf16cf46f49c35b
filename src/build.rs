//! Compile every content file to the output directory.
//!
//! Each markdown file of the content directory is compiled to
//! `<output>/<slug>.js` (or `.json`), and `<output>/manifest.json` lists the
//! slugs of compiled files.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use thiserror::Error;

use crate::{
    compile::{slug, CompileError, Compiler},
    config::Config,
    util::walk::DirWalker,
};

/// Name of the manifest file.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// List of build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Error while creating the compiler.
    #[error("failed to initialize the compiler")]
    Compiler(#[source] CompileError),
    /// Error while compiling a content file.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Error while emitting a compiled file.
    #[error("failed to emit `{path}`")]
    Emit {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Error while writing or removing an output file.
    #[error("failed to write `{path}`")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Some content files failed to compile.
    #[error("{count} content file(s) failed to compile")]
    Failed { count: usize },
}

/// Summary of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Slugs of compiled files, in walk order.
    pub slugs: Vec<String>,
    /// Time spent building.
    pub duration: Duration,
}

/// Build every content file.
pub fn build(config: &Config) -> Result<BuildReport, BuildError> {
    let compiler = config.compiler().map_err(BuildError::Compiler)?;
    build_with(config, &compiler)
}

/// Build every content file with a given compiler.
///
/// Every file is attempted: failures are logged with their path, and the
/// build fails after the manifest of the other files has been written.
pub fn build_with(config: &Config, compiler: &Compiler) -> Result<BuildReport, BuildError> {
    let start = Instant::now();

    let mut slugs = Vec::new();
    let mut failed = 0;

    for path in DirWalker::new(&config.content_dir).markdown_files() {
        match compile_one(config, compiler, &path) {
            Ok(slug) => slugs.push(slug),
            Err(error) => {
                tracing::error!("{:#}", anyhow::Error::from(error));
                failed += 1;
            },
        }
    }

    write_manifest(config, &slugs)?;

    if failed > 0 {
        return Err(BuildError::Failed { count: failed });
    }

    Ok(BuildReport {
        slugs,
        duration: start.elapsed(),
    })
}

/// Compile a content file and write its output.
///
/// Returns the slug of the file.
pub fn compile_one(
    config: &Config,
    compiler: &Compiler,
    path: impl AsRef<Path>,
) -> Result<String, BuildError> {
    let path = path.as_ref();

    let content = compiler.compile_file(path)?;
    let output_path = output_path(config, &content.slug);

    let code = config
        .format
        .emit(&content)
        .map_err(|source| BuildError::Emit {
            path: path.to_owned(),
            source,
        })?;

    write_file(&output_path, code)?;

    tracing::debug!("build: `{}` -> `{}`", path.display(), output_path.display());

    Ok(content.slug)
}

/// Remove the output of a slug, if any.
pub fn remove_output(config: &Config, slug: &str) -> Result<(), BuildError> {
    let path = output_path(config, slug);

    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BuildError::Write { path, source }),
    }
}

/// Write the manifest listing compiled slugs.
pub fn write_manifest(config: &Config, slugs: &[String]) -> Result<(), BuildError> {
    let path = config.output_dir.join(MANIFEST_FILE_NAME);

    let json = serde_json::to_string_pretty(slugs).map_err(|source| BuildError::Emit {
        path: path.clone(),
        source,
    })?;

    write_file(&path, json)
}

/// Enumerate the slugs of the content directory.
pub fn slugs(config: &Config) -> Vec<String> {
    DirWalker::new(&config.content_dir)
        .markdown_files()
        .map(|path| slug::resolve(path, Some(config.content_dir.as_path())))
        .collect()
}

/// Return the output path of a slug.
pub fn output_path(config: &Config, slug: &str) -> PathBuf {
    config
        .output_dir
        .join(format!("{}.{}", slug, config.format.extension()))
}

/// Write a file, creating parent directories.
fn write_file(path: &Path, content: impl AsRef<[u8]>) -> Result<(), BuildError> {
    let write_error = |source| BuildError::Write {
        path: path.to_owned(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }

    fs::write(path, content).map_err(write_error)
}

#[cfg(test)]
mod tests {
    use assert_fs::{prelude::*, TempDir};
    use predicates::prelude::*;

    use super::{build, output_path, remove_output, BuildError};
    use crate::config::{Config, OutputFormat};

    fn config(dir: &TempDir) -> Config {
        Config {
            content_dir: dir.path().join("content"),
            output_dir: dir.path().join("dist"),
            ..Default::default()
        }
    }

    #[test]
    fn build_modules() {
        let dir = TempDir::new().unwrap();
        dir.child("content/blog/first.md")
            .write_str("---\ntitle: First\n---\n# First\n")
            .unwrap();
        dir.child("content/about.md").write_str("About").unwrap();

        let report = build(&config(&dir)).unwrap();

        assert_eq!(report.slugs, vec!["about", "blog/first"]);

        dir.child("dist/blog/first.js")
            .assert(predicate::str::contains("export default compiled;"))
            .assert(predicate::str::contains(r#"slug: "blog/first""#));
        dir.child("dist/manifest.json")
            .assert(predicate::str::contains(r#""blog/first""#));
    }

    #[test]
    fn build_json() {
        let dir = TempDir::new().unwrap();
        dir.child("content/post.md").write_str("# Post").unwrap();

        let config = Config {
            format: OutputFormat::Json,
            ..config(&dir)
        };

        build(&config).unwrap();

        dir.child("dist/post.json")
            .assert(predicate::str::contains(r#""contentHtml""#));
    }

    #[test]
    fn attempt_every_file() {
        let dir = TempDir::new().unwrap();
        dir.child("content/a.md").write_str("---\n: [\n---\n").unwrap();
        dir.child("content/b.md").write_str("# B").unwrap();

        let result = build(&config(&dir));

        assert!(matches!(result, Err(BuildError::Failed { count: 1 })));
        dir.child("dist/b.js").assert(predicate::path::is_file());
        dir.child("dist/a.js").assert(predicate::path::missing());
    }

    #[test]
    fn remove_outputs() {
        let dir = TempDir::new().unwrap();
        dir.child("content/post.md").write_str("# Post").unwrap();

        let config = config(&dir);
        build(&config).unwrap();

        let path = output_path(&config, "post");
        assert!(path.is_file());

        remove_output(&config, "post").unwrap();
        assert!(!path.exists());

        // Removing a missing output is not an error
        remove_output(&config, "post").unwrap();
    }
}
