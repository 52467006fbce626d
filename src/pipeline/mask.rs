//! Foreground masks and applying them to an RGBA surface.

use crate::error::SegmentationError;
use image::RgbaImage;

/// Per-pixel foreground indicator, row-major, aligned 1:1 with an image.
///
/// `0` is background, anything else is foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    /// Build a mask from raw values. Returns `None` if `data` does not hold
    /// exactly `width * height` entries.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Build a mask by evaluating `is_foreground` at every pixel, row-major.
    pub fn from_fn(width: u32, height: u32, mut is_foreground: impl FnMut(u32, u32) -> bool) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(u8::from(is_foreground(x, y)));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Threshold foreground probabilities: `p >= threshold` is foreground.
    pub fn from_probabilities(
        width: u32,
        height: u32,
        probabilities: &[f32],
        threshold: f32,
    ) -> Option<Self> {
        let data = probabilities
            .iter()
            .map(|&p| u8::from(p >= threshold))
            .collect();
        Self::from_raw(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Force alpha to 0 on every background pixel. Foreground pixels are
    /// left untouched, so a foreground pixel that was already transparent in
    /// the input stays transparent.
    pub fn apply(&self, image: &mut RgbaImage) -> Result<(), SegmentationError> {
        let (width, height) = image.dimensions();
        if (width, height) != self.dimensions() {
            return Err(SegmentationError::MaskMismatch {
                width,
                height,
                mask_width: self.width,
                mask_height: self.height,
            });
        }
        for (pixel, &m) in image.pixels_mut().zip(self.data.iter()) {
            if m == 0 {
                pixel[3] = 0;
            }
        }
        Ok(())
    }
}

/// Number of fully transparent pixels in `image`.
pub fn transparent_pixels(image: &RgbaImage) -> u64 {
    image.pixels().filter(|p| p[3] == 0).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn from_raw_checks_length() {
        assert!(Mask::from_raw(2, 2, vec![1, 0, 1]).is_none());
        assert!(Mask::from_raw(2, 2, vec![1, 0, 1, 0]).is_some());
        assert!(Mask::from_raw(0, 0, vec![]).is_some());
    }

    #[test]
    fn from_fn_is_row_major() {
        let m = Mask::from_fn(3, 2, |x, y| x == 2 && y == 0);
        assert_eq!(m.as_raw(), &[0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn probabilities_are_thresholded_inclusively() {
        let m = Mask::from_probabilities(4, 1, &[0.1, 0.69, 0.7, 0.99], 0.7).unwrap();
        assert_eq!(m.as_raw(), &[0, 0, 1, 1]);
        assert_eq!(m.foreground_count(), 2);
    }

    #[test]
    fn apply_clears_background_alpha_only() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([10, 20, 30, 200]));
        let m = Mask::from_raw(2, 1, vec![0, 7]).unwrap();
        m.apply(&mut img).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([10, 20, 30, 0]));
        assert_eq!(img.get_pixel(1, 0), &Rgba([10, 20, 30, 200]));
        assert_eq!(transparent_pixels(&img), 1);
    }

    #[test]
    fn apply_keeps_input_transparency_on_foreground() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        let m = Mask::from_raw(2, 1, vec![1, 1]).unwrap();
        m.apply(&mut img).unwrap();
        let alphas: Vec<u8> = img.pixels().map(|p| p[3]).collect();
        assert_eq!(alphas, vec![255, 0]);
    }

    #[test]
    fn apply_rejects_mismatched_dimensions() {
        let mut img = RgbaImage::new(3, 2);
        let m = Mask::from_raw(2, 2, vec![1; 4]).unwrap();
        let err = m.apply(&mut img).unwrap_err();
        assert!(matches!(err, SegmentationError::MaskMismatch { width: 3, .. }));
    }
}
