//! Progress-callback trait for per-image batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::MattingConfigBuilder::progress_callback`] to receive
//! events as the packager works through the batch.
//!
//! Two channels are offered. The per-item methods carry names and the
//! matting strategy that was used; [`BatchProgressCallback::on_progress`]
//! carries the single integer percentage a progress bar needs. The
//! percentage reaches 100 only once the archive has been finalised.
//!
//! # Example
//!
//! ```rust
//! use cutout::{BatchProgressCallback, MattingConfig};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Recorder {
//!     seen: Mutex<Vec<u8>>,
//! }
//!
//! impl BatchProgressCallback for Recorder {
//!     fn on_progress(&self, percent: u8) {
//!         self.seen.lock().unwrap().push(percent);
//!     }
//! }
//!
//! let config = MattingConfig::builder()
//!     .progress_callback(Arc::new(Recorder::default()) as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::MattingStrategy;
use std::sync::Arc;

/// Called by the batch packager as it processes each image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Items are processed one at a time, so calls never
/// overlap for a single batch, but the trait is `Send + Sync` so the same
/// callback may be shared by batches running on different tasks.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first image is decoded.
    fn on_batch_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called before an image is decoded.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the batch
    /// * `total`: number of images in the batch
    /// * `name`: the input filename
    fn on_item_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called after an image has been matted, encoded and added to the
    /// archive.
    fn on_item_complete(&self, index: usize, total: usize, strategy: MattingStrategy) {
        let _ = (index, total, strategy);
    }

    /// Aggregate completion, `round(done / total * 100)`.
    ///
    /// Fires exactly once per item, in order, never decreasing.
    fn on_progress(&self, percent: u8) {
        let _ = percent;
    }

    /// Called once after the archive has been finalised.
    fn on_batch_complete(&self, total_items: usize, archive_entries: usize) {
        let _ = (total_items, archive_entries);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::MattingConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

/// Percentage to report after `completed` of `total` items.
///
/// Intermediate values are capped at 99 so that 100 is only ever reported
/// for the final item, even when rounding would get there early (for
/// example 299 of 300).
pub(crate) fn percent_complete(completed: usize, total: usize) -> u8 {
    if total == 0 || completed >= total {
        return 100;
    }
    let pct = ((completed as f64 / total as f64) * 100.0).round() as u8;
    pct.min(99)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        fallbacks: AtomicUsize,
        last_percent: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_item_start(&self, _index: usize, _total: usize, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_complete(&self, _index: usize, _total: usize, strategy: MattingStrategy) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            if strategy == MattingStrategy::ColourTolerance {
                self.fallbacks.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_progress(&self, percent: u8) {
            self.last_percent.store(percent as usize, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_item_start(1, 2, "a.png");
        cb.on_item_complete(1, 2, MattingStrategy::Segmentation);
        cb.on_progress(50);
        cb.on_batch_complete(2, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            fallbacks: AtomicUsize::new(0),
            last_percent: AtomicUsize::new(0),
        };

        tracker.on_item_start(1, 2, "a.png");
        tracker.on_item_complete(1, 2, MattingStrategy::Segmentation);
        tracker.on_progress(50);
        tracker.on_item_start(2, 2, "b.png");
        tracker.on_item_complete(2, 2, MattingStrategy::ColourTolerance);
        tracker.on_progress(100);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.fallbacks.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.last_percent.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn percent_rounds_and_caps_before_last_item() {
        assert_eq!(percent_complete(1, 3), 33);
        assert_eq!(percent_complete(2, 3), 67);
        assert_eq!(percent_complete(3, 3), 100);
        assert_eq!(percent_complete(299, 300), 99);
        assert_eq!(percent_complete(1, 8), 13);
    }
}
