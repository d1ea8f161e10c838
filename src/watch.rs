use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    /// A single note that stays the active document.
    Note(PathBuf),
    /// A vault; the most recently touched markdown file becomes active.
    Vault(PathBuf),
}

impl WatchTarget {
    pub fn from_path(path: &Path) -> Self {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if path.is_dir() {
            WatchTarget::Vault(path)
        } else {
            WatchTarget::Note(path)
        }
    }

    fn root(&self) -> &Path {
        match self {
            WatchTarget::Note(path) => path.parent().unwrap_or(path),
            WatchTarget::Vault(root) => root,
        }
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Most recently modified markdown file under `root`, hidden directories excluded.
pub fn newest_markdown(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_markdown(entry.path()))
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, entry.into_path()))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, path)| path)
}

/// Decides which document is active and whether a change concerns it.
#[derive(Debug, Clone)]
pub struct DocumentTracker {
    target: WatchTarget,
    active: Option<PathBuf>,
}

impl DocumentTracker {
    /// In a vault the newest markdown file starts out active.
    pub fn new(target: WatchTarget) -> Self {
        let active = match &target {
            WatchTarget::Note(path) => Some(path.clone()),
            WatchTarget::Vault(root) => newest_markdown(root),
        };
        if let Some(path) = &active {
            tracing::debug!(path = %path.display(), "initial active document");
        }
        Self { target, active }
    }

    pub fn active(&self) -> Option<&Path> {
        self.active.as_deref()
    }

    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    /// Returns true when the gallery must be rebuilt for the active document.
    pub fn observe(&mut self, path: &Path) -> bool {
        match &self.target {
            WatchTarget::Note(note) => path == note,
            WatchTarget::Vault(root) => {
                if !is_markdown(path) || !path.starts_with(root) {
                    return false;
                }
                if self.active.as_deref() != Some(path) {
                    tracing::debug!(path = %path.display(), "active document changed");
                    self.active = Some(path.to_path_buf());
                }
                true
            }
        }
    }
}

/// File-system watcher feeding a [`DocumentTracker`].
pub struct DocumentWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    tracker: DocumentTracker,
}

impl DocumentWatcher {
    pub fn spawn(target: WatchTarget) -> Result<Self> {
        let (tx, events) = unbounded::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .context("creating file watcher")?;
        let mode = match target {
            WatchTarget::Note(_) => RecursiveMode::NonRecursive,
            WatchTarget::Vault(_) => RecursiveMode::Recursive,
        };
        watcher
            .watch(target.root(), mode)
            .with_context(|| format!("watching {}", target.root().display()))?;
        Ok(Self {
            _watcher: watcher,
            events,
            tracker: DocumentTracker::new(target),
        })
    }

    pub fn active(&self) -> Option<&Path> {
        self.tracker.active()
    }

    /// Drains pending events. Bursts collapse into a single reload signal.
    pub fn poll(&mut self) -> bool {
        let mut reload = false;
        loop {
            match self.events.try_recv() {
                Ok(Ok(event)) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        continue;
                    }
                    for path in &event.paths {
                        reload |= self.tracker.observe(path);
                    }
                }
                Ok(Err(err)) => tracing::warn!(%err, "file watcher error"),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        reload
    }
}
