//! Filesystem notification bridge.
//!
//! Watches the parent directory of every database file non-recursively and
//! forwards events for the watched files only. FSEvents reports real paths
//! (e.g. `/private/var/...`), so both sides are compared canonicalized.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{io_err, ListenerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Renamed(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(path) | FileChange::Renamed(path) | FileChange::Removed(path) => {
                path
            }
        }
    }
}

/// What the trigger loop receives from the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    Changed(FileChange),
    Error(String),
}

/// Keeps the OS watch alive; dropping it detaches.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    files: Vec<PathBuf>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher").field("files", &self.files).finish()
    }
}

impl FileWatcher {
    pub fn start(
        files: &[PathBuf],
        tx: mpsc::UnboundedSender<WatchSignal>,
    ) -> Result<Self, ListenerError> {
        if files.is_empty() {
            return Err(ListenerError::NoWatchedFiles);
        }

        let watched: HashSet<PathBuf> = files.iter().map(|f| canonical_file(f)).collect();
        let mut dirs = HashSet::new();
        for file in &watched {
            let dir = file
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| io_err(file, std::io::ErrorKind::NotFound.into()))?;
            dirs.insert(dir);
        }

        let filter = watched.clone();
        let mut watcher = recommended_watcher(move |event: notify::Result<Event>| {
            let signals = match event {
                Ok(event) => classify(&event, &filter)
                    .into_iter()
                    .map(WatchSignal::Changed)
                    .collect(),
                Err(err) => vec![WatchSignal::Error(err.to_string())],
            };
            for signal in signals {
                let _ = tx.send(signal);
            }
        })?;

        for dir in &dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            tracing::debug!(dir = %dir.display(), "watching directory");
        }

        let mut files: Vec<PathBuf> = watched.into_iter().collect();
        files.sort();
        Ok(Self {
            _watcher: watcher,
            files,
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

/// Changes in `event` that touch one of `watched`.
pub fn classify(event: &Event, watched: &HashSet<PathBuf>) -> Vec<FileChange> {
    let make: fn(PathBuf) -> FileChange = match event.kind {
        EventKind::Modify(ModifyKind::Name(_)) => FileChange::Renamed,
        EventKind::Create(_) | EventKind::Modify(_) => FileChange::Modified,
        EventKind::Remove(_) => FileChange::Removed,
        _ => return Vec::new(),
    };
    event
        .paths
        .iter()
        .map(|path| canonical_file(path))
        .filter(|path| watched.contains(path))
        .map(make)
        .collect()
}

/// Canonical parent joined with the file name, so removed files still map.
fn canonical_file(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            fs::canonicalize(parent)
                .unwrap_or_else(|_| parent.to_path_buf())
                .join(name)
        }
        _ => path.to_path_buf(),
    }
}
