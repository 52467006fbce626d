//! Decoding: input bytes → RGBA pixel buffer.
//!
//! Decoding is CPU-bound, so it runs in `spawn_blocking` the same way
//! the other heavy stages do. The format is sniffed from the bytes; the
//! declared MIME type is only used in log lines.

use super::input::InputImage;
use crate::error::CutoutError;
use image::RgbaImage;
use tracing::debug;

/// A decoded RGBA surface, exclusively owned by the stage that decoded it.
pub type PixelBuffer = RgbaImage;

/// Decode an input image into an RGBA buffer.
pub async fn decode_image(input: &InputImage) -> Result<PixelBuffer, CutoutError> {
    let bytes = input.shared_bytes();
    let name = input.filename().to_string();

    let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| CutoutError::Internal(format!("Decode task panicked: {e}")))?;

    let image = decoded.map_err(|e| CutoutError::DecodeFailure {
        name: name.clone(),
        detail: e.to_string(),
    })?;

    let rgba = image.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(CutoutError::DecodeFailure {
            name,
            detail: "image has no pixels".to_string(),
        });
    }

    debug!(
        "Decoded {} ({}) → {}x{} px",
        input.filename(),
        input.mime_type(),
        rgba.width(),
        rgba.height()
    );
    Ok(rgba)
}
