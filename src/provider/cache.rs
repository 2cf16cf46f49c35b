//! Cache compiled content and de-duplicate concurrent loads.
//!
//! Each slug is in one of three states: uncached, loading or cached. The
//! first request of an uncached slug starts a load and registers it as
//! in-flight; concurrent requests for the same slug await that same load. A
//! successful load moves the slug to the cached state, a failed load moves it
//! back to uncached so the next request retries.

use std::{collections::HashMap, sync::Arc};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use parking_lot::Mutex;

use super::LoadError;
use crate::compile::CompiledContent;

/// Result of a load, shared between waiters.
type SharedLoad = Shared<BoxFuture<'static, Result<Arc<CompiledContent>, LoadError>>>;

/// A load in progress.
struct InFlight {
    /// Identifies the load that registered this entry.
    ticket: u64,
    future: SharedLoad,
}

#[derive(Default)]
struct State {
    records: HashMap<String, Arc<CompiledContent>>,
    in_flight: HashMap<String, InFlight>,
    next_ticket: u64,
}

/// Number of entries in a [`ContentCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached records.
    pub cached: usize,
    /// Number of loads in progress.
    pub in_flight: usize,
}

/// Cache of compiled content, keyed by slug.
///
/// The lock is never held across an await point. At most one load per slug
/// runs at a time, while different slugs load in parallel.
#[derive(Default)]
pub struct ContentCache {
    state: Mutex<State>,
}

impl ContentCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached record of a slug, or load it.
    ///
    /// `load` is called only when the slug is neither cached nor loading. It
    /// must return without blocking: the work happens when the returned
    /// future is polled.
    ///
    /// A record is cached only if the slug has not been invalidated while it
    /// was loading. Errors are returned to every waiter and never cached.
    pub async fn get_or_load<F>(
        &self,
        slug: &str,
        load: F,
    ) -> Result<Arc<CompiledContent>, LoadError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<CompiledContent, LoadError>>,
    {
        let (ticket, future) = {
            let mut state = self.state.lock();

            if let Some(content) = state.records.get(slug) {
                tracing::debug!("cache: hit `{}`", slug);
                return Ok(content.clone());
            }

            match state.in_flight.get(slug) {
                Some(in_flight) => {
                    tracing::debug!("cache: join `{}`", slug);
                    (in_flight.ticket, in_flight.future.clone())
                },
                None => {
                    tracing::debug!("cache: load `{}`", slug);

                    let ticket = state.next_ticket;
                    state.next_ticket += 1;

                    let future = load().map(|result| result.map(Arc::new)).boxed().shared();

                    state.in_flight.insert(
                        slug.to_owned(),
                        InFlight {
                            ticket,
                            future: future.clone(),
                        },
                    );

                    (ticket, future)
                },
            }
        };

        let result = future.await;

        {
            let mut state = self.state.lock();

            // Only the registered load may settle the entry; an invalidated
            // load must not resurrect a stale record
            let is_current = state
                .in_flight
                .get(slug)
                .is_some_and(|in_flight| in_flight.ticket == ticket);

            if is_current {
                state.in_flight.remove(slug);

                if let Ok(content) = &result {
                    state.records.insert(slug.to_owned(), content.clone());
                }
            }
        }

        result
    }

    /// Evict one slug, or every slug when `slug` is [`None`].
    ///
    /// Loads in progress for evicted slugs still complete for their waiters,
    /// but their results are not cached.
    pub fn invalidate(&self, slug: Option<&str>) {
        let mut state = self.state.lock();

        match slug {
            Some(slug) => {
                tracing::debug!("cache: invalidate `{}`", slug);
                state.records.remove(slug);
                state.in_flight.remove(slug);
            },
            None => {
                tracing::debug!("cache: invalidate all");
                state.records.clear();
                state.in_flight.clear();
            },
        }
    }

    /// Check if a slug is cached.
    pub fn contains(&self, slug: &str) -> bool {
        self.state.lock().records.contains_key(slug)
    }

    /// Return the number of cached records and loads in progress.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();

        CacheStats {
            cached: state.records.len(),
            in_flight: state.in_flight.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use futures::{future::BoxFuture, FutureExt};
    use time::OffsetDateTime;

    use super::{CacheStats, ContentCache};
    use crate::{
        compile::{CompileError, CompiledContent, Meta},
        provider::LoadError,
    };

    fn record(slug: &str, version: usize) -> CompiledContent {
        CompiledContent {
            frontmatter: Default::default(),
            content_html: format!("<p>{}</p>", version),
            excerpt: None,
            slug: slug.to_owned(),
            last_modified: OffsetDateTime::UNIX_EPOCH,
            meta: Meta::default(),
        }
    }

    /// Return a loader that counts its calls and yields once before
    /// completing.
    fn counting_loader(
        counter: &Arc<AtomicUsize>,
        slug: &'static str,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<CompiledContent, LoadError>> {
        let counter = counter.clone();
        move || {
            async move {
                let version = counter.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::task::yield_now().await;
                Ok(record(slug, version))
            }
            .boxed()
        }
    }

    fn failing_loader(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<CompiledContent, LoadError>> {
        let counter = counter.clone();
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Err(LoadError::Compile {
                    slug: "x".to_owned(),
                    source: Arc::new(CompileError::Read {
                        path: "x.md".into(),
                        source: io::Error::new(io::ErrorKind::Other, "boom"),
                    }),
                })
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn concurrent_loads_are_collapsed() {
        let cache = ContentCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get_or_load("x", counting_loader(&counter, "x")),
            cache.get_or_load("x", counting_loader(&counter, "x")),
        );

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(
            cache.stats(),
            CacheStats {
                cached: 1,
                in_flight: 0
            }
        );
    }

    #[tokio::test]
    async fn cached_records_skip_the_loader() {
        let cache = ContentCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_load("x", counting_loader(&counter, "x"))
            .await
            .unwrap();
        let second = cache
            .get_or_load("x", counting_loader(&counter, "x"))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn different_slugs_load_separately() {
        let cache = ContentCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get_or_load("a", counting_loader(&counter, "a")),
            cache.get_or_load("b", counting_loader(&counter, "b")),
        );

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(a.unwrap().slug, "a");
        assert_eq!(b.unwrap().slug, "b");
    }

    #[tokio::test]
    async fn invalidate_one_slug() {
        let cache = ContentCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_load("x", counting_loader(&counter, "x"))
            .await
            .unwrap();
        cache
            .get_or_load("y", counting_loader(&counter, "y"))
            .await
            .unwrap();

        cache.invalidate(Some("x"));

        assert!(!cache.contains("x"));
        assert!(cache.contains("y"));

        let fresh = cache
            .get_or_load("x", counting_loader(&counter, "x"))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(fresh.content_html, "<p>3</p>");
    }

    #[tokio::test]
    async fn invalidate_all() {
        let cache = ContentCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_load("x", counting_loader(&counter, "x"))
            .await
            .unwrap();
        cache
            .get_or_load("y", counting_loader(&counter, "y"))
            .await
            .unwrap();

        cache.invalidate(None);

        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = ContentCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get_or_load("x", failing_loader(&counter)),
            cache.get_or_load("x", failing_loader(&counter)),
        );

        assert!(matches!(a, Err(LoadError::Compile { .. })));
        assert!(matches!(b, Err(LoadError::Compile { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats::default());

        // The next request retries
        let result = cache.get_or_load("x", failing_loader(&counter)).await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidated_load_is_not_cached() {
        let cache = ContentCache::new();
        let (sender, receiver) = tokio::sync::oneshot::channel::<()>();

        let load = move || {
            async move {
                let _ = receiver.await;
                Ok(record("x", 1))
            }
            .boxed()
        };

        let (result, _) = tokio::join!(cache.get_or_load("x", load), async {
            tokio::task::yield_now().await;
            assert_eq!(cache.stats().in_flight, 1);
            cache.invalidate(Some("x"));
            let _ = sender.send(());
        });

        // Waiters still receive the result
        assert_eq!(result.unwrap().slug, "x");
        assert!(!cache.contains("x"));
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
