//! Progress-callback trait for per-page render events.
//!
//! Inject an [`Arc<dyn RenderProgressCallback>`] via
//! [`crate::config::RenderOptionsBuilder::progress_callback`] to receive
//! events as the rasterizer works through a document.
//!
//! # Why callbacks instead of channels?
//!
//! Rendering runs on a blocking thread (`spawn_blocking`), so a callback is
//! the least-invasive way out: callers can forward events to a progress bar,
//! a live-reload hub, or a log line without the rasterizer knowing how the
//! host application communicates. The trait is `Send + Sync` because the
//! callback crosses from the async caller onto the blocking pool.
//!
//! # Example
//!
//! ```rust
//! use slidef::{RenderOptions, RenderProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl RenderProgressCallback for CountingCallback {
//!     fn on_page_rendered(&self, page_num: usize, total_pages: usize, bytes: usize) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} written ({} bytes)", page_num, total_pages, bytes);
//!     }
//! }
//!
//! let options = RenderOptions::builder()
//!     .progress_callback(Arc::new(CountingCallback { rendered: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the rasterizer as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are rendered strictly in order, so events for
/// one document never interleave.
pub trait RenderProgressCallback: Send + Sync {
    /// Called once the document is open and its page count is known.
    fn on_render_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after a page image has been written to disk.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total pages in the document
    /// * `bytes`       — encoded size of the written image
    fn on_page_rendered(&self, page_num: usize, total_pages: usize, bytes: usize) {
        let _ = (page_num, total_pages, bytes);
    }

    /// Called when a page fails; no further pages are attempted.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: String) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has been written.
    fn on_render_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RenderOptions`].
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        started_total: AtomicUsize,
        rendered: AtomicUsize,
        errors: AtomicUsize,
        completed_total: AtomicUsize,
    }

    impl RenderProgressCallback for TrackingCallback {
        fn on_render_start(&self, total_pages: usize) {
            self.started_total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_rendered(&self, _page_num: usize, _total_pages: usize, _bytes: usize) {
            self.rendered.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_render_complete(&self, total_pages: usize) {
            self.completed_total.store(total_pages, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_render_start(5);
        cb.on_page_rendered(1, 5, 42);
        cb.on_page_error(2, 5, "some error".into());
        cb.on_render_complete(5);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_render_start(3);
        tracker.on_page_rendered(1, 3, 100);
        tracker.on_page_rendered(2, 3, 200);
        tracker.on_page_error(3, 3, "bitmap failed".into());

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.rendered.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed_total.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_render_start(10);
        cb.on_page_rendered(1, 10, 512);
    }
}
