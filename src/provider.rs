//! Load compiled content at runtime.
//!
//! A [`ContentProvider`] serves records from a [`ContentSource`] through a
//! [`ContentCache`], so that each record is compiled once until invalidated.

pub mod cache;
pub mod source;

use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::Value;
use thiserror::Error;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
};

pub use self::{
    cache::{CacheStats, ContentCache},
    source::{ContentSource, FsSource},
};
use crate::compile::{CompileError, CompiledContent, FrontMatter};

/// Front matter keys holding the publication date, by priority.
const DATE_KEYS: [&str; 2] = ["pubDate", "date"];

/// List of errors for this module.
///
/// Errors are shared between every waiter of a load, hence cloneable.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// No content has this slug.
    #[error("content not found: `{slug}`")]
    NotFound {
        slug: String,
        /// Known slugs.
        available: Vec<String>,
    },
    /// The content exists but failed to compile.
    #[error("failed to load `{slug}`")]
    Compile {
        slug: String,
        #[source]
        source: Arc<CompileError>,
    },
    /// The compile task died before producing a result.
    #[error("loading `{slug}` was interrupted: {reason}")]
    Interrupted { slug: String, reason: String },
}

impl LoadError {
    /// Check if the error means that the content does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Return the requested slug.
    pub fn slug(&self) -> &str {
        match self {
            Self::NotFound { slug, .. }
            | Self::Compile { slug, .. }
            | Self::Interrupted { slug, .. } => slug,
        }
    }
}

/// Filters of a content collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilters {
    /// Keep records whose front matter `type` equals this value.
    pub content_type: Option<String>,

    /// Keep records whose front matter `category` equals this value.
    pub category: Option<String>,

    /// Keep records sharing at least one tag with this list (ignored when
    /// empty).
    pub tags: Vec<String>,

    /// Sort by publication date, newest first.
    pub sort_by_date: bool,
}

impl ContentFilters {
    /// Check if a front matter passes the filters.
    pub fn matches(&self, frontmatter: &FrontMatter) -> bool {
        let equals = |key: &str, expected: &Option<String>| match expected {
            Some(expected) => {
                frontmatter.get(key).and_then(Value::as_str) == Some(expected.as_str())
            },
            None => true,
        };

        let has_tag = || {
            self.tags.is_empty()
                || tags(frontmatter).any(|tag| self.tags.iter().any(|expected| expected == tag))
        };

        equals("type", &self.content_type) && equals("category", &self.category) && has_tag()
    }
}

/// Iterate over the tags of a front matter.
///
/// Tags are either a list or a single string.
fn tags(frontmatter: &FrontMatter) -> impl Iterator<Item = &str> {
    let tags: Vec<&str> = match frontmatter.get("tags") {
        Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(tag)) => vec![tag.as_str()],
        _ => Vec::new(),
    };
    tags.into_iter()
}

/// Read the publication date of a front matter.
///
/// Dates are either RFC 3339 date-times or `YYYY-MM-DD` dates (midnight UTC).
fn publication_date(frontmatter: &FrontMatter) -> Option<OffsetDateTime> {
    let value = DATE_KEYS
        .iter()
        .find_map(|key| frontmatter.get(*key).and_then(Value::as_str))?;

    OffsetDateTime::parse(value, &Rfc3339).ok().or_else(|| {
        Date::parse(value, format_description!("[year]-[month]-[day]"))
            .ok()
            .map(|date| date.midnight().assume_utc())
    })
}

/// Provide compiled content by slug.
pub struct ContentProvider<S> {
    source: S,
    cache: ContentCache,
}

impl<S> ContentProvider<S>
where
    S: ContentSource,
{
    /// Create a provider with an empty cache.
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: ContentCache::new(),
        }
    }

    /// Return the content source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Return the cache.
    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Load the record of a slug.
    ///
    /// Concurrent requests for the same slug share a single load.
    pub async fn load_content(&self, slug: &str) -> Result<Arc<CompiledContent>, LoadError> {
        self.cache
            .get_or_load(slug, || self.source.load(slug))
            .await
    }

    /// Load every record matching the filters.
    ///
    /// Records are loaded concurrently and returned in source order, unless
    /// sorted by date.
    pub async fn load_content_collection(
        &self,
        filters: &ContentFilters,
    ) -> Result<Vec<Arc<CompiledContent>>, LoadError> {
        let slugs = self.source.slugs();

        let contents = try_join_all(slugs.iter().map(|slug| self.load_content(slug))).await?;

        let mut contents: Vec<_> = contents
            .into_iter()
            .filter(|content| filters.matches(&content.frontmatter))
            .collect();

        if filters.sort_by_date {
            // Stable sort: undated records come last, in source order
            contents.sort_by_cached_key(|content| {
                std::cmp::Reverse(publication_date(&content.frontmatter))
            });
        }

        Ok(contents)
    }

    /// Evict one slug, or every slug when `slug` is [`None`].
    pub fn invalidate_cache(&self, slug: Option<&str>) {
        self.cache.invalidate(slug);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::{Duration, Instant},
    };

    use futures::{future::BoxFuture, FutureExt};
    use serde_json::json;
    use time::OffsetDateTime;

    use super::{ContentFilters, ContentProvider, ContentSource, LoadError};
    use crate::compile::{CompiledContent, FrontMatter, Meta};

    /// In-memory source counting its loads.
    ///
    /// Unknown slugs are resolved on a blocking thread after `lookup_delay`.
    #[derive(Default)]
    struct MemorySource {
        records: BTreeMap<String, FrontMatter>,
        loads: Arc<AtomicUsize>,
        lookup_delay: Duration,
    }

    impl MemorySource {
        fn with(mut self, slug: &str, frontmatter: serde_json::Value) -> Self {
            let frontmatter = frontmatter.as_object().cloned().unwrap_or_default();
            self.records.insert(slug.to_owned(), frontmatter);
            self
        }
    }

    impl ContentSource for MemorySource {
        fn slugs(&self) -> Vec<String> {
            self.records.keys().cloned().collect()
        }

        fn load(&self, slug: &str) -> BoxFuture<'static, Result<CompiledContent, LoadError>> {
            let record = self.records.get(slug).cloned();
            let available = self.slugs();
            let delay = self.lookup_delay;
            let slug = slug.to_owned();
            let loads = self.loads.clone();

            async move {
                let Some(frontmatter) = record else {
                    return tokio::task::spawn_blocking(move || {
                        std::thread::sleep(delay);
                        Err(LoadError::NotFound { slug, available })
                    })
                    .await
                    .unwrap();
                };

                loads.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;

                Ok(CompiledContent {
                    frontmatter,
                    content_html: String::new(),
                    excerpt: None,
                    slug,
                    last_modified: OffsetDateTime::UNIX_EPOCH,
                    meta: Meta::default(),
                })
            }
            .boxed()
        }
    }

    fn slugs(contents: &[Arc<CompiledContent>]) -> Vec<&str> {
        contents.iter().map(|content| content.slug.as_str()).collect()
    }

    fn provider() -> ContentProvider<MemorySource> {
        ContentProvider::new(
            MemorySource::default()
                .with(
                    "a",
                    json!({"type": "post", "category": "rust", "tags": ["async", "cache"], "pubDate": "2024-01-10"}),
                )
                .with(
                    "b",
                    json!({"type": "post", "category": "web", "tags": "html", "date": "2024-03-01T08:00:00Z"}),
                )
                .with("c", json!({"type": "page"}))
                .with(
                    "d",
                    json!({"type": "post", "tags": ["cache"], "pubDate": "2023-12-31"}),
                ),
        )
    }

    #[tokio::test]
    async fn load_once() {
        let provider = provider();

        let (a, b) = tokio::join!(provider.load_content("a"), provider.load_content("a"));

        assert_eq!(a.unwrap().slug, "a");
        assert_eq!(b.unwrap().slug, "a");
        assert_eq!(provider.source().loads.load(Ordering::SeqCst), 1);

        provider.load_content("a").await.unwrap();
        assert_eq!(provider.source().loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reload_after_invalidation() {
        let provider = provider();

        provider.load_content("a").await.unwrap();
        provider.invalidate_cache(Some("a"));
        provider.load_content("a").await.unwrap();

        assert_eq!(provider.source().loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_found() {
        let provider = provider();

        let error = provider.load_content("does/not/exist").await.unwrap_err();

        assert!(error.is_not_found());
        assert_eq!(error.slug(), "does/not/exist");
        assert!(
            matches!(error, LoadError::NotFound { available, .. } if available == vec!["a", "b", "c", "d"])
        );
        assert_eq!(provider.cache().stats().cached, 0);
    }

    #[tokio::test]
    async fn cached_hits_while_resolving_unknown_slug() {
        let mut provider = provider();
        provider.source.lookup_delay = Duration::from_millis(500);

        provider.load_content("a").await.unwrap();

        let (missing, elapsed) = tokio::join!(provider.load_content("missing"), async {
            let start = Instant::now();
            provider.load_content("a").await.unwrap();
            start.elapsed()
        });

        assert!(missing.unwrap_err().is_not_found());
        assert!(elapsed < Duration::from_millis(100), "{elapsed:?}");
    }

    #[tokio::test]
    async fn collection_in_source_order() {
        let provider = provider();

        let contents = provider
            .load_content_collection(&ContentFilters::default())
            .await
            .unwrap();

        assert_eq!(slugs(&contents), vec!["a", "b", "c", "d"]);
        assert_eq!(provider.cache().stats().cached, 4);
    }

    #[tokio::test]
    async fn filter_collection() {
        let provider = provider();

        let posts = provider
            .load_content_collection(&ContentFilters {
                content_type: Some("post".to_owned()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(slugs(&posts), vec!["a", "b", "d"]);

        let rust = provider
            .load_content_collection(&ContentFilters {
                content_type: Some("post".to_owned()),
                category: Some("rust".to_owned()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(slugs(&rust), vec!["a"]);

        let tagged = provider
            .load_content_collection(&ContentFilters {
                tags: vec!["cache".to_owned(), "html".to_owned()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(slugs(&tagged), vec!["a", "b", "d"]);
    }

    #[tokio::test]
    async fn sort_collection_by_date() {
        let provider = provider();

        let contents = provider
            .load_content_collection(&ContentFilters {
                sort_by_date: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(slugs(&contents), vec!["b", "a", "d", "c"]);
    }
}
