//! Encoding: matted RGBA buffer → PNG bytes.
//!
//! PNG is the output format because it is lossless and carries a full
//! alpha channel; the transparency produced by matting must survive
//! byte-for-byte.

use super::decode::PixelBuffer;
use crate::error::CutoutError;
use image::ImageFormat;
use std::io::Cursor;
use tracing::debug;

/// Encode a matted surface as PNG on a blocking thread.
///
/// The buffer is moved in and handed back alongside the bytes so callers
/// can still inspect it afterwards.
pub async fn encode_png(
    name: &str,
    image: PixelBuffer,
) -> Result<(PixelBuffer, Vec<u8>), CutoutError> {
    let owned_name = name.to_string();
    tokio::task::spawn_blocking(move || -> Result<_, CutoutError> {
        let png = encode_png_blocking(&owned_name, &image)?;
        Ok((image, png))
    })
    .await
    .map_err(|e| CutoutError::Internal(format!("Encode task panicked: {e}")))?
}

/// Blocking implementation of PNG encoding.
pub fn encode_png_blocking(name: &str, image: &PixelBuffer) -> Result<Vec<u8>, CutoutError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| CutoutError::EncodeFailure {
            name: name.to_string(),
            detail: e.to_string(),
        })?;

    debug!("Encoded {} → {} bytes PNG", name, buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[tokio::test]
    async fn encoded_png_keeps_alpha() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 0]));
        let (back, png) = encode_png("red.png", img.clone()).await.unwrap();
        assert_eq!(back, img);
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }
}
