//! Configuration types for batch background removal.
//!
//! All matting behaviour is controlled through [`MattingConfig`], built via
//! its [`MattingConfigBuilder`]. The segmentation model itself is not part of
//! the config: it lives in a [`crate::provider::SegmentationProvider`] that
//! is created once and handed to every [`crate::batch::BatchPackager`].

use crate::error::CutoutError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for a background-removal batch.
///
/// Built via [`MattingConfig::builder()`] or using
/// [`MattingConfig::default()`].
///
/// # Example
/// ```rust
/// use cutout::{MattingConfig, ResolutionTier};
///
/// let config = MattingConfig::builder()
///     .segmentation_threshold(0.6)
///     .internal_resolution(ResolutionTier::High)
///     .colour_tolerance(24)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct MattingConfig {
    /// Foreground probability at or above which a pixel counts as subject.
    /// Range: 0.0–1.0. Default: 0.7.
    ///
    /// Lower values keep more of the fringe around hair and clothing at the
    /// cost of leaving background halos.
    pub segmentation_threshold: f32,

    /// Resolution the model runs at, relative to the input. Default: Medium.
    pub internal_resolution: ResolutionTier,

    /// Per-channel distance from the top-left pixel under which the
    /// colour-tolerance fallback treats a pixel as background.
    /// Range: 0–255. Default: 30.
    pub colour_tolerance: u8,

    /// How entries are stored in the output archive. Default: Stored.
    ///
    /// PNG data is already deflate-compressed, so recompressing rarely saves
    /// more than a few bytes.
    pub archive_compression: ArchiveCompression,

    /// Yield to the Tokio scheduler between items. Default: true.
    pub yield_between_items: bool,

    /// Receives per-item and percentage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for MattingConfig {
    fn default() -> Self {
        Self {
            segmentation_threshold: 0.7,
            internal_resolution: ResolutionTier::default(),
            colour_tolerance: 30,
            archive_compression: ArchiveCompression::default(),
            yield_between_items: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for MattingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MattingConfig")
            .field("segmentation_threshold", &self.segmentation_threshold)
            .field("internal_resolution", &self.internal_resolution)
            .field("colour_tolerance", &self.colour_tolerance)
            .field("archive_compression", &self.archive_compression)
            .field("yield_between_items", &self.yield_between_items)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl MattingConfig {
    /// Create a new builder for `MattingConfig`.
    pub fn builder() -> MattingConfigBuilder {
        MattingConfigBuilder {
            config: Self::default(),
        }
    }

    /// The options passed to the segmentation model for each image.
    pub fn segment_options(&self) -> SegmentOptions {
        SegmentOptions {
            internal_resolution: self.internal_resolution,
            segmentation_threshold: self.segmentation_threshold,
        }
    }
}

/// Builder for [`MattingConfig`].
#[derive(Debug)]
pub struct MattingConfigBuilder {
    config: MattingConfig,
}

impl MattingConfigBuilder {
    pub fn segmentation_threshold(mut self, t: f32) -> Self {
        self.config.segmentation_threshold = t;
        self
    }

    pub fn internal_resolution(mut self, tier: ResolutionTier) -> Self {
        self.config.internal_resolution = tier;
        self
    }

    pub fn colour_tolerance(mut self, tolerance: u8) -> Self {
        self.config.colour_tolerance = tolerance;
        self
    }

    pub fn archive_compression(mut self, compression: ArchiveCompression) -> Self {
        self.config.archive_compression = compression;
        self
    }

    pub fn yield_between_items(mut self, v: bool) -> Self {
        self.config.yield_between_items = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<MattingConfig, CutoutError> {
        let t = self.config.segmentation_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(CutoutError::InvalidConfig(format!(
                "Segmentation threshold must be 0.0–1.0, got {t}"
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Resolution the segmentation model runs at, as a fraction of the input.
///
/// | Tier | Scale |
/// |------|-------|
/// | Low | 0.25 |
/// | Medium | 0.5 (default) |
/// | High | 0.75 |
/// | Full | 1.0 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionTier {
    Low,
    #[default]
    Medium,
    High,
    Full,
}

impl ResolutionTier {
    pub fn scale(self) -> f32 {
        match self {
            ResolutionTier::Low => 0.25,
            ResolutionTier::Medium => 0.5,
            ResolutionTier::High => 0.75,
            ResolutionTier::Full => 1.0,
        }
    }

    /// Model input size for an image of `width` x `height`.
    ///
    /// Each side is scaled, then rounded up to a multiple of 32 (the
    /// output stride of common U-Net style matting networks).
    pub fn model_input_size(self, width: u32, height: u32) -> (u32, u32) {
        let side = |v: u32| {
            let scaled = ((v as f32) * self.scale()).round().max(1.0) as u32;
            scaled.div_ceil(32) * 32
        };
        (side(width), side(height))
    }
}

/// Compression applied to archive entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArchiveCompression {
    /// Entries stored as-is. (default)
    #[default]
    Stored,
    /// Entries deflate-compressed.
    Deflated,
}

/// Per-image options handed to a [`crate::provider::SegmentationModel`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentOptions {
    pub internal_resolution: ResolutionTier,
    pub segmentation_threshold: f32,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        MattingConfig::default().segment_options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = MattingConfig::default();
        assert_eq!(c.segmentation_threshold, 0.7);
        assert_eq!(c.internal_resolution, ResolutionTier::Medium);
        assert_eq!(c.colour_tolerance, 30);
        assert_eq!(c.archive_compression, ArchiveCompression::Stored);
        assert!(c.yield_between_items);
        assert!(c.progress_callback.is_none());
    }

    #[test]
    fn builder_rejects_out_of_range_threshold() {
        let err = MattingConfig::builder()
            .segmentation_threshold(1.5)
            .build()
            .unwrap_err();
        assert!(matches!(err, CutoutError::InvalidConfig(_)));

        let err = MattingConfig::builder()
            .segmentation_threshold(f32::NAN)
            .build()
            .unwrap_err();
        assert!(matches!(err, CutoutError::InvalidConfig(_)));
    }

    #[test]
    fn builder_sets_fields() {
        let c = MattingConfig::builder()
            .segmentation_threshold(0.5)
            .internal_resolution(ResolutionTier::Low)
            .colour_tolerance(10)
            .archive_compression(ArchiveCompression::Deflated)
            .yield_between_items(false)
            .build()
            .unwrap();
        let opts = c.segment_options();
        assert_eq!(opts.segmentation_threshold, 0.5);
        assert_eq!(opts.internal_resolution, ResolutionTier::Low);
        assert_eq!(c.colour_tolerance, 10);
        assert!(!c.yield_between_items);
    }

    #[test]
    fn model_input_size_rounds_up_to_stride() {
        assert_eq!(ResolutionTier::Medium.model_input_size(640, 480), (320, 256));
        assert_eq!(ResolutionTier::Full.model_input_size(33, 1), (64, 32));
        assert_eq!(ResolutionTier::Low.model_input_size(1, 1), (32, 32));
    }

    #[test]
    fn tier_serialises_lowercase() {
        let json = serde_json::to_string(&ResolutionTier::High).unwrap();
        assert_eq!(json, "\"high\"");
    }
}
