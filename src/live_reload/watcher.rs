//! Filesystem watcher feeding the reload hub.
//!
//! ```text
//! notify::RecommendedWatcher ──▶ mpsc ──▶ watch task ──▶ ReloadHub
//!        (OS events)                     (Debouncer)     (broadcast)
//! ```
//!
//! The notify callback runs on the backend's own thread and only forwards
//! raw events into an unbounded channel. A single tokio task owns the
//! [`Debouncer`], sleeps until the earliest pending deadline, and
//! broadcasts each stabilised change with its path relative to the
//! project root.

use super::debounce::{Debouncer, DEFAULT_STABILITY_WINDOW};
use super::event::{ChangeEvent, ChangeKind};
use super::hub::ReloadHub;
use crate::config::{ProjectConfig, CONFIG_FILE_NAME};
use crate::error::SlidefError;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What to watch.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Reported paths are relative to this directory.
    pub project_root: PathBuf,
    /// Directories watched recursively.
    pub roots: Vec<PathBuf>,
    /// A single file watched on its own, typically the project config.
    pub config_file: Option<PathBuf>,
    /// Quiet period per path before a change is reported. Default: 100 ms.
    pub stability_window: Duration,
}

impl WatchConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            roots: Vec::new(),
            config_file: None,
            stability_window: DEFAULT_STABILITY_WINDOW,
        }
    }

    /// The slide store and `slidef.config.json` of a project.
    pub fn for_project(project_root: &Path, config: &ProjectConfig) -> Self {
        Self::new(project_root)
            .watch_dir(config.slides_path(project_root))
            .config_file(project_root.join(CONFIG_FILE_NAME))
    }

    pub fn watch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.roots.push(dir.into());
        self
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn stability_window(mut self, window: Duration) -> Self {
        self.stability_window = window;
        self
    }
}

/// Decides which raw paths are reported and how they are named.
#[derive(Debug, Clone)]
struct PathFilter {
    project_root: PathBuf,
    roots: Vec<PathBuf>,
    config_file: Option<PathBuf>,
}

impl PathFilter {
    /// Project-relative path for `path`, or `None` if it is outside the
    /// watched set or hidden below its watch root.
    fn relative(&self, path: &Path) -> Option<PathBuf> {
        let below_root = if self.config_file.as_deref() == Some(path) {
            path.file_name().map(PathBuf::from)?
        } else {
            let root = self.roots.iter().find(|r| path.starts_with(r))?;
            path.strip_prefix(root).ok()?.to_path_buf()
        };
        if below_root.as_os_str().is_empty() || is_hidden(&below_root) {
            return None;
        }
        Some(
            path.strip_prefix(&self.project_root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.to_path_buf()),
        )
    }
}

fn is_hidden(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Resolve symlinks so paths reported by the OS match the configured ones.
/// A file that does not exist yet is resolved through its parent.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(p) = std::fs::canonicalize(path) {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

/// Map a raw notify event onto per-path change kinds.
fn classify(event: &Event) -> Vec<(PathBuf, ChangeKind)> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Added,
        EventKind::Remove(_) => ChangeKind::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Added,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::new();
            if let Some(from) = event.paths.first() {
                out.push((from.clone(), ChangeKind::Removed));
            }
            if let Some(to) = event.paths.get(1) {
                out.push((to.clone(), ChangeKind::Added));
            }
            return out;
        }
        EventKind::Modify(_) | EventKind::Any => ChangeKind::Changed,
        EventKind::Access(_) | EventKind::Other => return Vec::new(),
    };
    event.paths.iter().map(|p| (p.clone(), kind)).collect()
}

/// A running watcher. Dropping it stops watching.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Start watching and broadcasting into `hub`.
    ///
    /// Roots that do not exist are skipped with a warning. The config file
    /// is watched through its parent directory so it can be created after
    /// startup. Must be called from within a tokio runtime.
    pub fn start(config: WatchConfig, hub: Arc<ReloadHub>) -> Result<Self, SlidefError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| watch_error(&config.project_root, e))?;

        let mut roots = Vec::new();
        for root in &config.roots {
            if !root.is_dir() {
                warn!("Not watching {}: not a directory", root.display());
                continue;
            }
            let root = resolve(root);
            watcher
                .watch(&root, RecursiveMode::Recursive)
                .map_err(|e| watch_error(&root, e))?;
            debug!("Watching {}", root.display());
            roots.push(root);
        }

        let config_file = config.config_file.as_deref().map(resolve);
        if let Some(file) = &config_file {
            match file.parent().filter(|p| p.is_dir()) {
                Some(parent) if !roots.iter().any(|r| file.starts_with(r)) => {
                    watcher
                        .watch(parent, RecursiveMode::NonRecursive)
                        .map_err(|e| watch_error(parent, e))?;
                    debug!("Watching {}", file.display());
                }
                Some(_) => {}
                None => warn!("Not watching {}: parent directory missing", file.display()),
            }
        }

        let filter = PathFilter {
            project_root: resolve(&config.project_root),
            roots,
            config_file,
        };
        let debouncer = Debouncer::new(config.stability_window);
        let task = tokio::spawn(run(rx, filter, debouncer, hub));

        info!("Live reload watching {}", config.project_root.display());
        Ok(Self {
            _watcher: watcher,
            task,
        })
    }

    /// Stop watching. Pending changes are discarded.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn watch_error(path: &Path, e: notify::Error) -> SlidefError {
    SlidefError::io(path, std::io::Error::other(e.to_string()))
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    filter: PathFilter,
    mut debouncer: Debouncer,
    hub: Arc<ReloadHub>,
) {
    loop {
        let deadline = debouncer.next_deadline();
        tokio::select! {
            received = rx.recv() => match received {
                Some(Ok(event)) => {
                    let now = Instant::now();
                    for (path, kind) in classify(&event) {
                        if let Some(rel) = filter.relative(&path) {
                            debouncer.record(rel, kind, now);
                        }
                    }
                }
                Some(Err(e)) => warn!("File watch error: {}", e),
                None => break,
            },
            _ = sleep_until(deadline) => {
                for change in debouncer.poll_ready(Instant::now()) {
                    report(&hub, &change);
                }
            }
        }
    }
    debug!("Watch task finished");
}

fn report(hub: &ReloadHub, change: &ChangeEvent) {
    info!("{}: {}", change.kind.reason(), change.path.display());
    let result = hub.notify_change(change);
    if !result.removed.is_empty() {
        debug!("{} subscribers went away", result.removed.len());
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
        None => std::future::pending().await,
    }
}
