//! Save events from the file system
//!
//! Wraps a `notify` watcher and forwards the paths of created or modified
//! files into a tokio channel consumed by the change debouncer.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::error::Result;

/// Directory names whose contents never count as user edits
const IGNORED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Recursive watcher over a working directory.
///
/// Events stop when this value is dropped.
pub struct SaveWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl SaveWatcher {
    /// Start watching `root` and return the stream of saved file paths.
    pub fn start(root: &Path) -> Result<(Self, UnboundedReceiver<PathBuf>)> {
        let (tx, rx) = unbounded_channel();
        let filter_root = root.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => forward(&filter_root, event, &tx),
                Err(e) => tracing::warn!(error = %e, "File watcher error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), "Watching for saves");

        Ok((
            Self {
                _watcher: watcher,
                root: root.to_path_buf(),
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn forward(root: &Path, event: Event, tx: &UnboundedSender<PathBuf>) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }
    for path in event.paths {
        if path.is_dir() || !is_tracked(root, &path) {
            continue;
        }
        tracing::trace!(path = %path.display(), "Save event");
        // The receiver is gone once the debouncer shut down
        let _ = tx.send(path);
    }
}

/// Whether a change to `path` should be treated as a user edit
pub fn is_tracked(root: &Path, path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };

    let in_ignored_dir = relative.components().any(|c| match c {
        Component::Normal(name) => IGNORED_DIRS.iter().any(|d| name == *d),
        _ => false,
    });
    if in_ignored_dir {
        return false;
    }

    let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !(name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".tmp")
        || name.starts_with(".#"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_regular_files() {
        let root = Path::new("/notes");
        assert!(is_tracked(root, Path::new("/notes/todo.md")));
        assert!(is_tracked(root, Path::new("/notes/daily/2024-01-01.md")));
        assert!(is_tracked(root, Path::new("/notes/.autosync.toml")));
    }

    #[test]
    fn ignores_repository_internals() {
        let root = Path::new("/notes");
        assert!(!is_tracked(root, Path::new("/notes/.git/index")));
        assert!(!is_tracked(root, Path::new("/notes/.git/refs/heads/main")));
        assert!(!is_tracked(root, Path::new("/notes/sub/node_modules/x.js")));
    }

    #[test]
    fn ignores_editor_scratch_files() {
        let root = Path::new("/notes");
        assert!(!is_tracked(root, Path::new("/notes/todo.md~")));
        assert!(!is_tracked(root, Path::new("/notes/.todo.md.swp")));
        assert!(!is_tracked(root, Path::new("/notes/.#todo.md")));
        assert!(!is_tracked(root, Path::new("/notes/write.tmp")));
    }

    #[test]
    fn ignores_paths_outside_root() {
        assert!(!is_tracked(Path::new("/notes"), Path::new("/other/file.md")));
    }
}
