//! Progress-callback trait for per-range extraction events.
//!
//! Inject an [`Arc<dyn PassProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the controller walks a document range by range.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a log sink, or a terminal progress bar
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` so passes for different modes can run in parallel
//! tasks sharing one callback.

use crate::config::OutputMode;
use crate::output::PassStats;
use std::path::Path;
use std::sync::Arc;

/// Called by the controller as it processes each page range of a pass.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. When passes run concurrently, implementations must
/// protect shared mutable state themselves.
pub trait PassProgressCallback: Send + Sync {
    /// Called once at the start of a pass, before any range is submitted.
    fn on_pass_start(&self, mode: OutputMode, total_pages: u32) {
        let _ = (mode, total_pages);
    }

    /// Called just before a chunk is materialised and submitted.
    fn on_range_start(&self, start: u32, end: u32) {
        let _ = (start, end);
    }

    /// Called when a range's artifact has been written.
    fn on_range_complete(&self, start: u32, end: u32, artifact: &Path) {
        let _ = (start, end, artifact);
    }

    /// Called when a range fails irrecoverably and an error marker is written.
    fn on_range_error(&self, start: u32, end: u32, error: &str) {
        let _ = (start, end, error);
    }

    /// Called when a capacity failure shrinks the chunk size. The failed
    /// range will be retried from the same start page at the new size.
    fn on_shrink(&self, old_size: u32, new_size: u32) {
        let _ = (old_size, new_size);
    }

    /// Called once after the last range of the pass.
    fn on_pass_complete(&self, mode: OutputMode, stats: &PassStats) {
        let _ = (mode, stats);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PassProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn PassProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        ranges: AtomicUsize,
        errors: AtomicUsize,
        shrinks: AtomicUsize,
    }

    impl PassProgressCallback for TrackingCallback {
        fn on_range_complete(&self, _start: u32, _end: u32, _artifact: &Path) {
            self.ranges.fetch_add(1, Ordering::SeqCst);
        }

        fn on_range_error(&self, _start: u32, _end: u32, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_shrink(&self, _old: u32, _new: u32) {
            self.shrinks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_pass_start(OutputMode::Markdown, 12);
        cb.on_range_start(1, 10);
        cb.on_shrink(10, 5);
        cb.on_range_complete(1, 5, Path::new("out/doc_p1-5.md"));
        cb.on_range_error(6, 10, "HTTP 400");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb = TrackingCallback {
            ranges: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            shrinks: AtomicUsize::new(0),
        };
        cb.on_range_start(1, 10);
        cb.on_shrink(10, 5);
        cb.on_range_complete(1, 5, Path::new("x.md"));
        cb.on_range_error(6, 10, "boom");

        assert_eq!(cb.ranges.load(Ordering::SeqCst), 1);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
        assert_eq!(cb.shrinks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProgressCallback>();
    }
}
