//! # cutout
//!
//! Batch background removal: turn a set of images into a ZIP archive of
//! transparent PNGs.
//!
//! Each image is matted with a person-segmentation model when one is
//! available. When it is not (no model configured, download failed,
//! inference error) the image is matted with a colour-tolerance fallback
//! instead: every pixel close to the top-left pixel's colour becomes
//! transparent. Either way the batch keeps going.
//!
//! ## Pipeline Overview
//!
//! ```text
//! images
//!  │
//!  ├─ 1. Decode   bytes → RGBA (spawn_blocking)
//!  ├─ 2. Matte    segmentation mask, or colour-tolerance fallback
//!  ├─ 3. Encode   RGBA → PNG (spawn_blocking)
//!  ├─ 4. Archive  <stem>_transparent.png, in input order
//!  └─ 5. Output   finalised ZIP + per-item reports and stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cutout::{BatchPackager, InputImage, MattingConfig, SegmentationProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // No model: every image uses the colour-tolerance fallback.
//!     let provider = Arc::new(SegmentationProvider::unavailable("no model"));
//!     let packager = BatchPackager::new(provider, MattingConfig::default());
//!
//!     let inputs = InputImage::from_paths(&["logo.png", "banner.jpg"]).await?;
//!     if let Some(stats) = packager.package_to_file(&inputs, "transparent_images.zip").await? {
//!         eprintln!("{} images, {} bytes", stats.total_items, stats.archive_bytes);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cutout` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `onnx`  | off     | [`OnnxBackend`]: person segmentation through ONNX Runtime |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! cutout = { version = "0.1", default-features = false }
//! ```
//!
//! ## Bringing your own model
//!
//! Implement [`SegmentationBackend`] (load once) and [`SegmentationModel`]
//! (one mask per image) and wrap the backend in a [`SegmentationProvider`].
//! The provider guarantees a single load even when several batches ask for
//! the model at the same time.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod provider;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{remove_background, BatchPackager};
pub use config::{
    ArchiveCompression, MattingConfig, MattingConfigBuilder, ResolutionTier, SegmentOptions,
};
pub use error::{CutoutError, SegmentationError};
pub use output::{ArchiveEntry, BatchResult, BatchStats, ItemReport, MattingStrategy, ProcessedImage};
pub use pipeline::input::InputImage;
pub use pipeline::mask::Mask;
#[cfg(feature = "onnx")]
pub use pipeline::onnx::OnnxBackend;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::{SegmentationBackend, SegmentationModel, SegmentationProvider};
