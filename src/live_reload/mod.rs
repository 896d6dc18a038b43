//! Live reload for development: filesystem changes pushed to open viewers.
//!
//! ## Architecture
//!
//! ```text
//! ChangeWatcher (notify + Debouncer)
//!        │  ChangeEvent { kind, path }
//!        ▼
//!    ReloadHub ──▶ subscriber 1 ("data: {...}\n\n")
//!              ──▶ subscriber 2
//!              ──▶ …
//! ```
//!
//! Subscribers are ephemeral and in-memory. Any HTTP layer can mount a
//! subscriber with [`ReloadHub::subscribe_stream`] as a `text/event-stream`
//! body; dead connections are dropped on the next broadcast.
//!
//! ```rust,no_run
//! use slidef::live_reload::{ChangeWatcher, ReloadHub, WatchConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), slidef::SlidefError> {
//! let hub = Arc::new(ReloadHub::new());
//! let _watcher = ChangeWatcher::start(
//!     WatchConfig::new(".").watch_dir("slides").config_file("slidef.config.json"),
//!     hub.clone(),
//! )?;
//! let frames = hub.subscribe_stream();
//! # drop(frames);
//! # Ok(())
//! # }
//! ```

pub mod debounce;
pub mod event;
pub mod hub;
pub mod watcher;

pub use debounce::{DebounceState, Debouncer, DEFAULT_STABILITY_WINDOW};
pub use event::{ChangeEvent, ChangeKind, ReloadEvent};
pub use hub::{BroadcastReport, EventSink, ReloadHub, SinkClosed, SubscriberId, SubscriberState};
pub use watcher::{ChangeWatcher, WatchConfig};
