//! Per-path stability window.
//!
//! Every path is either `Idle` or `Pending(deadline)`. An event on an idle
//! path makes it pending; an event on a pending path pushes its deadline
//! out again. Once `now` passes the deadline with no further events, the
//! path yields one coalesced [`ChangeEvent`] and returns to idle. Paths are
//! independent, so a busy file never holds back an unrelated one.
//!
//! Time is passed in explicitly; the watcher task supplies the clock.

use super::event::{ChangeEvent, ChangeKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Quiet period before a write is considered finished.
pub const DEFAULT_STABILITY_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { deadline: Instant },
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    deadline: Instant,
    kind: ChangeKind,
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_STABILITY_WINDOW)
    }
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Note a raw event for `path` observed at `now`.
    pub fn record(&mut self, path: PathBuf, kind: ChangeKind, now: Instant) {
        let deadline = now + self.window;
        self.pending
            .entry(path)
            .and_modify(|p| {
                p.deadline = deadline;
                p.kind = p.kind.merge(kind);
            })
            .or_insert(Pending { deadline, kind });
    }

    pub fn state(&self, path: &Path) -> DebounceState {
        match self.pending.get(path) {
            Some(p) => DebounceState::Pending {
                deadline: p.deadline,
            },
            None => DebounceState::Idle,
        }
    }

    /// Earliest deadline among pending paths.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Take every path whose window has elapsed at `now`, oldest first.
    pub fn poll_ready(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let mut ready: Vec<(Instant, PathBuf, ChangeKind)> = Vec::new();
        self.pending.retain(|path, p| {
            if p.deadline <= now {
                ready.push((p.deadline, path.clone(), p.kind));
                false
            } else {
                true
            }
        });
        ready.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        ready
            .into_iter()
            .map(|(_, path, kind)| ChangeEvent::new(kind, path))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
