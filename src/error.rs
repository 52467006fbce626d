//! Error types for the cutout library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CutoutError`]: **Fatal**: the batch cannot be delivered (an image
//!   could not be decoded or encoded, the archive could not be finalised,
//!   the configuration is invalid). Returned as `Err(CutoutError)` from the
//!   top-level entry points. Any fatal error discards the whole batch.
//!
//! * [`SegmentationError`]: **Non-fatal**: the segmentation model could not
//!   produce a mask for one image. The packager absorbs it, mattes that image
//!   with the colour-tolerance fallback instead, and records the reason in
//!   [`crate::output::ItemReport`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the cutout library.
///
/// Segmentation failures use [`SegmentationError`] and never surface here.
#[derive(Debug, Error)]
pub enum CutoutError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// A data URL could not be split into MIME type and base64 payload.
    #[error("Invalid data URL for '{name}': {reason}")]
    InvalidDataUrl { name: String, reason: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The input bytes could not be interpreted as a raster image.
    #[error("Could not decode '{name}' as an image: {detail}")]
    DecodeFailure { name: String, detail: String },

    /// The matted image could not be encoded as PNG.
    #[error("Could not encode '{name}' as PNG: {detail}")]
    EncodeFailure { name: String, detail: String },

    /// Writing an entry or finalising the ZIP archive failed.
    #[error("Failed to build the archive: {detail}")]
    ArchiveFailure { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output archive file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal segmentation failure for a single image.
///
/// Cloneable because a failed model load is remembered by the provider and
/// handed to every later caller.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum SegmentationError {
    /// No model is configured for this provider.
    #[error("segmentation model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    /// The model artifact could not be fetched or loaded.
    #[error("segmentation model failed to load: {detail}")]
    LoadFailed { detail: String },

    /// Inference raised an error for this image.
    #[error("segmentation inference failed: {detail}")]
    InferenceFailed { detail: String },

    /// The model returned a mask whose size does not match the image.
    #[error("mask is {mask_width}x{mask_height} but image is {width}x{height}")]
    MaskMismatch {
        width: u32,
        height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    /// The provider was shut down; pending loads are discarded.
    #[error("segmentation provider was shut down")]
    Cancelled,
}
