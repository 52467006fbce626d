//! Result types returned by the batch packager.

use crate::error::SegmentationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an image's background was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MattingStrategy {
    /// The segmentation model produced the mask.
    Segmentation,
    /// The model was unavailable; pixels close to the top-left colour were
    /// cleared instead.
    ColourTolerance,
}

impl fmt::Display for MattingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MattingStrategy::Segmentation => f.write_str("segmentation"),
            MattingStrategy::ColourTolerance => f.write_str("colour tolerance"),
        }
    }
}

/// A matted image encoded as PNG.
///
/// `width` and `height` always equal the decoded input's dimensions.
///
/// Matting only ever lowers alpha. Pixels that were already transparent in
/// the input stay transparent whichever strategy ran, so alpha 0 in the
/// output means "background or transparent in the source".
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub width: u32,
    pub height: u32,
    pub strategy: MattingStrategy,
    pub png: Vec<u8>,
}

/// One file inside the output archive, in input order.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Stem of the original filename (`photo` for `photo.JPG`).
    pub stem: String,
    /// Name inside the archive (`photo_transparent.png`).
    pub entry_name: String,
    pub image: ProcessedImage,
}

/// What happened to one input image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    /// 1-indexed position in the batch.
    pub index: usize,
    pub source_name: String,
    pub entry_name: String,
    pub width: u32,
    pub height: u32,
    pub strategy: MattingStrategy,
    /// Why segmentation was skipped, when the fallback ran.
    pub fallback_reason: Option<SegmentationError>,
    /// Pixels left fully transparent, including any inherited from the input.
    pub transparent_pixels: u64,
    pub duration_ms: u64,
}

/// Aggregate statistics for a finished batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_items: usize,
    pub segmented_items: usize,
    pub fallback_items: usize,
    pub archive_bytes: u64,
    pub total_duration_ms: u64,
}

/// A successfully packaged batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub entries: Vec<ArchiveEntry>,
    /// The finalised ZIP archive.
    pub archive: Vec<u8>,
    pub reports: Vec<ItemReport>,
    pub stats: BatchStats,
}

impl BatchResult {
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.entry_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_display_and_serde() {
        assert_eq!(MattingStrategy::ColourTolerance.to_string(), "colour tolerance");
        let json = serde_json::to_string(&MattingStrategy::ColourTolerance).unwrap();
        assert_eq!(json, "\"colour_tolerance\"");
    }

    #[test]
    fn report_serialises_fallback_reason() {
        let report = ItemReport {
            index: 1,
            source_name: "a.png".into(),
            entry_name: "a_transparent.png".into(),
            width: 2,
            height: 2,
            strategy: MattingStrategy::ColourTolerance,
            fallback_reason: Some(SegmentationError::Cancelled),
            transparent_pixels: 3,
            duration_ms: 1,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy"], "colour_tolerance");
        assert_eq!(json["fallback_reason"], "Cancelled");
    }
}
