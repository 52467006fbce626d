//! Batch entry points: many images in, one ZIP of transparent PNGs out.
//!
//! Items are processed one at a time and in input order. Each item is
//! decoded, matted (segmentation first, colour tolerance when the model
//! cannot help), encoded as PNG and appended to the archive. A decode,
//! encode or archive failure aborts the whole batch: the partly built
//! archive is dropped and only the error reaches the caller.

use crate::config::MattingConfig;
use crate::error::{CutoutError, SegmentationError};
use crate::output::{ArchiveEntry, BatchResult, BatchStats, ItemReport, MattingStrategy, ProcessedImage};
use crate::pipeline::archive::{ArchiveBuilder, ArchiveSink};
use crate::pipeline::decode::decode_image;
use crate::pipeline::encode::encode_png;
use crate::pipeline::fallback::apply_colour_tolerance;
use crate::pipeline::input::InputImage;
use crate::pipeline::mask::transparent_pixels;
use crate::progress::percent_complete;
use crate::provider::SegmentationProvider;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Turns batches of images into a single archive.
///
/// The provider is shared: build one [`SegmentationProvider`] per session
/// and hand clones of the `Arc` to every packager so the model loads once.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use cutout::{BatchPackager, InputImage, MattingConfig, SegmentationProvider};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = Arc::new(SegmentationProvider::unavailable("no model configured"));
/// let packager = BatchPackager::new(provider, MattingConfig::default());
///
/// let inputs = InputImage::from_paths(&["portrait.jpg", "product.png"]).await?;
/// if let Some(result) = packager.package(&inputs).await? {
///     std::fs::write("transparent_images.zip", &result.archive)?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct BatchPackager {
    provider: Arc<SegmentationProvider>,
    config: MattingConfig,
}

impl BatchPackager {
    pub fn new(provider: Arc<SegmentationProvider>, config: MattingConfig) -> Self {
        Self { provider, config }
    }

    /// Process every input and build the archive.
    ///
    /// # Returns
    /// `Ok(None)` for an empty input set; no progress events are emitted.
    /// Otherwise `Ok(Some(result))` with one archive entry per input.
    ///
    /// # Errors
    /// Returns the first hard failure ([`CutoutError::DecodeFailure`],
    /// [`CutoutError::EncodeFailure`] or [`CutoutError::ArchiveFailure`]).
    /// Nothing processed before the failure is returned.
    pub async fn package(&self, inputs: &[InputImage]) -> Result<Option<BatchResult>, CutoutError> {
        let archive = ArchiveBuilder::new(self.config.archive_compression);
        self.package_into(inputs, archive).await
    }

    async fn package_into<W: ArchiveSink>(
        &self,
        inputs: &[InputImage],
        mut archive: ArchiveBuilder<W>,
    ) -> Result<Option<BatchResult>, CutoutError> {
        if inputs.is_empty() {
            debug!("Empty batch: nothing to package");
            return Ok(None);
        }

        let total_start = Instant::now();
        let total = inputs.len();
        let callback = self.config.progress_callback.as_ref();
        info!("Packaging {} image(s) via '{}'", total, self.provider.backend_name());

        if let Some(cb) = callback {
            cb.on_batch_start(total);
        }

        for input in inputs {
            archive.reserve(input.entry_name());
        }
        let mut entries = Vec::with_capacity(total);
        let mut reports = Vec::with_capacity(total);

        for (i, input) in inputs.iter().enumerate() {
            let index = i + 1;
            let item_start = Instant::now();
            if let Some(cb) = callback {
                cb.on_item_start(index, total, input.filename());
            }

            // ── Steps 1–3: decode, matte, encode ─────────────────────────
            let matted = matte_image(input, &self.provider, &self.config).await?;

            // ── Step 4: append to archive ────────────────────────────────
            let stem = input.stem();
            let entry_name = archive.unique_entry_name(&stem);
            archive.add_entry(&entry_name, &matted.image.png)?;

            let strategy = matted.image.strategy;
            reports.push(ItemReport {
                index,
                source_name: input.filename().to_string(),
                entry_name: entry_name.clone(),
                width: matted.image.width,
                height: matted.image.height,
                strategy,
                fallback_reason: matted.fallback_reason,
                transparent_pixels: matted.transparent_pixels,
                duration_ms: item_start.elapsed().as_millis() as u64,
            });
            entries.push(ArchiveEntry {
                stem,
                entry_name,
                image: matted.image,
            });

            if let Some(cb) = callback {
                cb.on_item_complete(index, total, strategy);
                // The final 100% is reported once the archive is finalised.
                if index < total {
                    cb.on_progress(percent_complete(index, total));
                }
            }

            if self.config.yield_between_items && index < total {
                tokio::task::yield_now().await;
            }
        }

        // ── Step 5: finalise archive ─────────────────────────────────────
        let archive = archive.finish()?;
        if let Some(cb) = callback {
            cb.on_progress(100);
        }

        let segmented = reports
            .iter()
            .filter(|r| r.strategy == MattingStrategy::Segmentation)
            .count();
        let stats = BatchStats {
            total_items: total,
            segmented_items: segmented,
            fallback_items: total - segmented,
            archive_bytes: archive.len() as u64,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Packaged {} image(s) ({} segmented, {} fallback) → {} bytes in {}ms",
            total, stats.segmented_items, stats.fallback_items, stats.archive_bytes, stats.total_duration_ms
        );

        if let Some(cb) = callback {
            cb.on_batch_complete(total, entries.len());
        }

        Ok(Some(BatchResult {
            entries,
            archive,
            reports,
            stats,
        }))
    }

    /// Package a batch and write the archive straight to `output_path`.
    ///
    /// Uses an atomic write (temp file in the target directory + rename), so
    /// a failed batch never leaves a partial archive behind. The rename
    /// happens on the calling task: dropping this future before it resolves
    /// discards the staged file. Returns `Ok(None)` without touching the
    /// filesystem for an empty batch.
    pub async fn package_to_file(
        &self,
        inputs: &[InputImage],
        output_path: impl AsRef<Path>,
    ) -> Result<Option<BatchStats>, CutoutError> {
        let path = output_path.as_ref().to_path_buf();
        let Some(result) = self.package(inputs).await? else {
            return Ok(None);
        };

        let BatchResult { archive, stats, .. } = result;
        let target = path.clone();
        let staged = tokio::task::spawn_blocking(move || stage_archive(&target, &archive))
            .await
            .map_err(|e| CutoutError::Internal(format!("Write task panicked: {e}")))??;
        staged
            .persist(&path)
            .map_err(|e| CutoutError::OutputWriteFailed {
                path: path.clone(),
                source: e.error,
            })?;

        info!("Wrote {}", path.display());
        Ok(Some(stats))
    }

    /// Synchronous wrapper around [`BatchPackager::package`].
    ///
    /// Creates a temporary tokio runtime internally; do not call it from
    /// inside an async context.
    pub fn package_sync(&self, inputs: &[InputImage]) -> Result<Option<BatchResult>, CutoutError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| CutoutError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.package(inputs))
    }
}

/// Remove the background from a single image.
///
/// Same per-item behaviour as [`BatchPackager::package`] without the
/// archive: segmentation when the provider can deliver a mask, colour
/// tolerance otherwise.
pub async fn remove_background(
    input: &InputImage,
    provider: &SegmentationProvider,
    config: &MattingConfig,
) -> Result<ProcessedImage, CutoutError> {
    Ok(matte_image(input, provider, config).await?.image)
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct MattedImage {
    image: ProcessedImage,
    fallback_reason: Option<SegmentationError>,
    transparent_pixels: u64,
}

async fn matte_image(
    input: &InputImage,
    provider: &SegmentationProvider,
    config: &MattingConfig,
) -> Result<MattedImage, CutoutError> {
    let mut pixels = decode_image(input).await?;

    let segmented = match provider.segment(&pixels, &config.segment_options()).await {
        Ok(mask) => mask.apply(&mut pixels),
        Err(e) => Err(e),
    };
    let (strategy, fallback_reason) = match segmented {
        Ok(()) => (MattingStrategy::Segmentation, None),
        Err(reason) => {
            warn!("{}: {}; using colour tolerance", input.filename(), reason);
            apply_colour_tolerance(&mut pixels, config.colour_tolerance);
            (MattingStrategy::ColourTolerance, Some(reason))
        }
    };

    let (pixels, png) = encode_png(input.filename(), pixels).await?;
    let (width, height) = pixels.dimensions();
    debug!(
        "{} → {}x{} via {} ({} bytes)",
        input.filename(),
        width,
        height,
        strategy,
        png.len()
    );

    Ok(MattedImage {
        transparent_pixels: transparent_pixels(&pixels),
        image: ProcessedImage {
            width,
            height,
            strategy,
            png,
        },
        fallback_reason,
    })
}

/// Write `bytes` to a temp file next to `path`. The file is deleted on drop
/// unless the caller persists it.
fn stage_archive(path: &Path, bytes: &[u8]) -> Result<tempfile::NamedTempFile, CutoutError> {
    let write_err = |source| CutoutError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    Ok(tmp)
}
