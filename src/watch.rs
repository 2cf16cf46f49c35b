//! Watch for file changes.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher},
    DebouncedEvent, Debouncer, FileIdMap,
};
use thiserror::Error;

/// Delay grouping file events.
const DEBOUNCE_TIMEOUT: Duration = Duration::from_millis(500);

/// List of watcher errors.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Notify error.
    #[error(transparent)]
    Notify(#[from] notify_debouncer_full::notify::Error),
}

/// Watch for file changes.
///
/// Call a given function with the sorted list of paths created, modified or
/// removed in `dirs`. Paths located in `ignore` are skipped.
pub async fn watch<F>(dirs: &[PathBuf], ignore: &[PathBuf], mut callback: F) -> Result<(), WatchError>
where
    F: FnMut(&[PathBuf]),
{
    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();

    let event_handler = move |result| {
        if let Err(error) = sender.send(result) {
            tracing::error!("watch: {}", error);
        }
    };

    let mut debouncer = new_debouncer(DEBOUNCE_TIMEOUT, None, event_handler)?;

    for dir in dirs {
        add_watch_path(&mut debouncer, dir)?;
    }

    tracing::info!("Watching for file changes");

    let mut last_callback_time = Instant::now();

    while let Some(result) = receiver.recv().await {
        match result {
            Ok(events) => {
                let paths = changed_paths(&events, ignore, last_callback_time);

                if paths.is_empty() {
                    continue;
                }

                tracing::info!(
                    "Files changed: {}",
                    paths
                        .iter()
                        .map(|path| path.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );

                last_callback_time = Instant::now();

                callback(&paths);
            },
            Err(errors) => {
                for error in errors {
                    tracing::error!("watch: {}", error);
                }
            },
        }
    }

    Ok(())
}

/// Collect the paths of relevant events, sorted and deduplicated.
fn changed_paths(events: &[DebouncedEvent], ignore: &[PathBuf], since: Instant) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = events
        .iter()
        .filter(|event| event.time > since)
        .filter(|event| {
            matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            )
        })
        .flat_map(|event| &event.paths)
        .filter(|path| !ignore.iter().any(|ignored| path.starts_with(ignored)))
        .cloned()
        .collect();

    paths.sort();
    paths.dedup();

    paths
}

fn add_watch_path(
    debouncer: &mut Debouncer<RecommendedWatcher, FileIdMap>,
    path: impl AsRef<Path>,
) -> Result<(), WatchError> {
    let path = path.as_ref();

    debouncer.watcher().watch(path, RecursiveMode::Recursive)?;

    debouncer.cache().add_root(path, RecursiveMode::Recursive);

    Ok(())
}
