//! Segmentation provider: lazy, load-once access to a person-segmentation
//! model.
//!
//! A [`SegmentationBackend`] knows how to load a model; the loaded
//! [`SegmentationModel`] turns one RGBA image into a [`Mask`]. The
//! [`SegmentationProvider`] sits in front of a backend and guarantees:
//!
//! * the backend's `load()` runs at most once per provider, and callers that
//!   arrive while it is still running wait on that same load;
//! * the outcome, success or failure, is remembered, so a model that failed
//!   to download is not fetched again for every image;
//! * after [`SegmentationProvider::shutdown`] an in-flight load is dropped,
//!   its result discarded, and every later call reports
//!   [`SegmentationError::Cancelled`].
//!
//! Every failure is a [`SegmentationError`]; the batch packager answers all
//! of them by falling back to colour-tolerance matting.

use crate::config::SegmentOptions;
use crate::error::SegmentationError;
use crate::pipeline::mask::Mask;
use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, OnceCell};
use tracing::{debug, info, warn};

/// A loaded model. Read-only after load and shared by every batch.
#[async_trait]
pub trait SegmentationModel: Send + Sync {
    /// Produce a mask with one entry per pixel of `image`.
    async fn segment(
        &self,
        image: &RgbaImage,
        options: &SegmentOptions,
    ) -> Result<Mask, SegmentationError>;
}

/// Something that can load a [`SegmentationModel`], typically by fetching
/// weights over the network.
#[async_trait]
pub trait SegmentationBackend: Send + Sync {
    /// Short name for log lines.
    fn name(&self) -> &str;

    async fn load(&self) -> Result<Arc<dyn SegmentationModel>, SegmentationError>;
}

type LoadOutcome = Result<Arc<dyn SegmentationModel>, SegmentationError>;

/// Owned, lifecycle-managed handle to a segmentation model.
///
/// Create one per session and share it (behind an `Arc`) between every
/// [`crate::batch::BatchPackager`] that should reuse the model.
pub struct SegmentationProvider {
    backend: Arc<dyn SegmentationBackend>,
    model: OnceCell<LoadOutcome>,
    teardown: watch::Sender<bool>,
}

impl SegmentationProvider {
    pub fn new(backend: Arc<dyn SegmentationBackend>) -> Self {
        let (teardown, _) = watch::channel(false);
        Self {
            backend,
            model: OnceCell::new(),
            teardown,
        }
    }

    /// A provider with no model: every image is matted with the
    /// colour-tolerance fallback.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::new(Arc::new(UnavailableBackend {
            reason: reason.into(),
        }))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// `true` once a model has loaded successfully.
    pub fn is_loaded(&self) -> bool {
        matches!(self.model.get(), Some(Ok(_)))
    }

    pub fn is_shut_down(&self) -> bool {
        *self.teardown.borrow()
    }

    /// Tear the provider down. A load still in flight is abandoned and its
    /// result never stored.
    pub fn shutdown(&self) {
        if !self.teardown.send_replace(true) {
            info!("Segmentation provider '{}' shut down", self.backend.name());
        }
    }

    /// The loaded model, loading it on first use.
    pub async fn model(&self) -> Result<Arc<dyn SegmentationModel>, SegmentationError> {
        if self.is_shut_down() {
            return Err(SegmentationError::Cancelled);
        }

        let outcome = self.model.get_or_init(|| self.load_once()).await;

        if self.is_shut_down() {
            return Err(SegmentationError::Cancelled);
        }
        outcome.clone()
    }

    /// Segment one image. The returned mask is guaranteed to match the
    /// image's dimensions.
    pub async fn segment(
        &self,
        image: &RgbaImage,
        options: &SegmentOptions,
    ) -> Result<Mask, SegmentationError> {
        let model = self.model().await?;

        let start = Instant::now();
        let mask = model.segment(image, options).await?;
        if self.is_shut_down() {
            return Err(SegmentationError::Cancelled);
        }

        let (width, height) = image.dimensions();
        if mask.dimensions() != (width, height) {
            return Err(SegmentationError::MaskMismatch {
                width,
                height,
                mask_width: mask.width(),
                mask_height: mask.height(),
            });
        }

        debug!(
            "Segmented {}x{} in {}ms ({} foreground px)",
            width,
            height,
            start.elapsed().as_millis(),
            mask.foreground_count()
        );
        Ok(mask)
    }

    async fn load_once(&self) -> LoadOutcome {
        let teardown = self.teardown.subscribe();
        let start = Instant::now();
        info!("Loading segmentation model via '{}'", self.backend.name());

        tokio::select! {
            biased;
            _ = torn_down(teardown) => {
                warn!("Segmentation model load abandoned: provider shut down");
                Err(SegmentationError::Cancelled)
            }
            loaded = self.backend.load() => {
                match &loaded {
                    Ok(_) => info!(
                        "Segmentation model ready in {}ms",
                        start.elapsed().as_millis()
                    ),
                    Err(e) => warn!("Segmentation model unavailable: {e}"),
                }
                loaded
            }
        }
    }
}

/// Resolves once `true` has been published on the teardown channel.
async fn torn_down(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            // Sender gone: the provider itself was dropped.
            std::future::pending::<()>().await;
        }
    }
}

/// Backend used when no model is configured.
struct UnavailableBackend {
    reason: String,
}

#[async_trait]
impl SegmentationBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "none"
    }

    async fn load(&self) -> Result<Arc<dyn SegmentationModel>, SegmentationError> {
        Err(SegmentationError::ModelUnavailable {
            reason: self.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Model that marks the left half of the image as foreground.
    struct LeftHalf;

    #[async_trait]
    impl SegmentationModel for LeftHalf {
        async fn segment(
            &self,
            image: &RgbaImage,
            _options: &SegmentOptions,
        ) -> Result<Mask, SegmentationError> {
            let (w, h) = image.dimensions();
            Ok(Mask::from_fn(w, h, |x, _| x < w / 2))
        }
    }

    /// Model that always returns a 1x1 mask.
    struct WrongSize;

    #[async_trait]
    impl SegmentationModel for WrongSize {
        async fn segment(
            &self,
            _image: &RgbaImage,
            _options: &SegmentOptions,
        ) -> Result<Mask, SegmentationError> {
            Ok(Mask::from_fn(1, 1, |_, _| true))
        }
    }

    struct CountingBackend {
        loads: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingBackend {
        fn new(delay_ms: u64, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
                delay: Duration::from_millis(delay_ms),
                fail,
            })
        }
    }

    #[async_trait]
    impl SegmentationBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        async fn load(&self) -> Result<Arc<dyn SegmentationModel>, SegmentationError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(SegmentationError::LoadFailed {
                    detail: "404".into(),
                })
            } else {
                Ok(Arc::new(LeftHalf))
            }
        }
    }

    struct NeverLoads;

    #[async_trait]
    impl SegmentationBackend for NeverLoads {
        fn name(&self) -> &str {
            "never"
        }

        async fn load(&self) -> Result<Arc<dyn SegmentationModel>, SegmentationError> {
            std::future::pending().await
        }
    }

    struct FixedModel(Arc<dyn SegmentationModel>);

    #[async_trait]
    impl SegmentationBackend for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn load(&self) -> Result<Arc<dyn SegmentationModel>, SegmentationError> {
            Ok(Arc::clone(&self.0))
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_load() {
        let backend = CountingBackend::new(20, false);
        let provider = SegmentationProvider::new(backend.clone());
        let img = RgbaImage::new(4, 2);
        let opts = SegmentOptions::default();

        let results =
            futures::future::join_all((0..5).map(|_| provider.segment(&img, &opts))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
        assert!(provider.is_loaded());
    }

    #[tokio::test]
    async fn failed_load_is_remembered() {
        let backend = CountingBackend::new(0, true);
        let provider = SegmentationProvider::new(backend.clone());
        let img = RgbaImage::new(2, 2);

        for _ in 0..3 {
            let err = provider
                .segment(&img, &SegmentOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, SegmentationError::LoadFailed { .. }));
        }
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
        assert!(!provider.is_loaded());
    }

    #[tokio::test]
    async fn segment_returns_model_mask() {
        let provider = SegmentationProvider::new(Arc::new(FixedModel(Arc::new(LeftHalf))));
        let mask = provider
            .segment(&RgbaImage::new(4, 1), &SegmentOptions::default())
            .await
            .unwrap();
        assert_eq!(mask.as_raw(), &[1, 1, 0, 0]);
    }

    #[tokio::test]
    async fn wrong_sized_mask_is_rejected() {
        let provider = SegmentationProvider::new(Arc::new(FixedModel(Arc::new(WrongSize))));
        let err = provider
            .segment(&RgbaImage::new(3, 3), &SegmentOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SegmentationError::MaskMismatch { width: 3, .. }));
    }

    #[tokio::test]
    async fn unavailable_provider_reports_reason() {
        let provider = SegmentationProvider::unavailable("no --model given");
        assert_eq!(provider.backend_name(), "none");
        let err = provider.model().await.err().unwrap();
        assert_eq!(
            err,
            SegmentationError::ModelUnavailable {
                reason: "no --model given".into()
            }
        );
    }

    #[tokio::test]
    async fn shutdown_abandons_in_flight_load() {
        let provider = SegmentationProvider::new(Arc::new(NeverLoads));
        let img = RgbaImage::new(1, 1);
        let opts = SegmentOptions::default();

        let (result, _) = tokio::join!(provider.segment(&img, &opts), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            provider.shutdown();
        });

        assert_eq!(result.unwrap_err(), SegmentationError::Cancelled);
        assert!(provider.is_shut_down());
        assert!(!provider.is_loaded());
    }

    #[tokio::test]
    async fn shutdown_after_load_discards_model() {
        let provider = SegmentationProvider::new(Arc::new(FixedModel(Arc::new(LeftHalf))));
        assert!(provider.model().await.is_ok());
        provider.shutdown();
        let err = provider.model().await.err().unwrap();
        assert_eq!(err, SegmentationError::Cancelled);
    }

    #[test]
    fn fresh_provider_is_idle() {
        let provider = SegmentationProvider::unavailable("none");
        assert!(!provider.is_loaded());
        assert!(!provider.is_shut_down());
        let err = tokio_test::block_on(provider.model()).err().unwrap();
        assert!(matches!(err, SegmentationError::ModelUnavailable { .. }));
    }
}
