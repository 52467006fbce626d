//! Colour-tolerance matting: background removal without a model.
//!
//! The top-left pixel is taken as the background colour. Every pixel whose
//! red, green and blue channels are each within `tolerance` of it is made
//! fully transparent. Channels are compared independently rather than by
//! Euclidean distance, so gradient backgrounds are only partly removed, and
//! a subject touching the top-left corner defeats the whole pass.

use super::mask::Mask;
use image::RgbaImage;
use tracing::debug;

/// Classify every pixel against the top-left reference colour.
///
/// Returns an empty mask for a zero-sized image.
pub fn colour_tolerance_mask(image: &RgbaImage, tolerance: u8) -> Mask {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Mask::from_fn(width, height, |_, _| true);
    }

    let [r0, g0, b0, _] = image.get_pixel(0, 0).0;
    debug!(
        "Colour-tolerance reference ({r0},{g0},{b0}), tolerance {tolerance}, {}x{}",
        width, height
    );

    Mask::from_fn(width, height, |x, y| {
        let p = image.get_pixel(x, y);
        let background = p[0].abs_diff(r0) <= tolerance
            && p[1].abs_diff(g0) <= tolerance
            && p[2].abs_diff(b0) <= tolerance;
        !background
    })
}

/// Clear the alpha channel of every pixel that matches the top-left colour.
pub fn apply_colour_tolerance(image: &mut RgbaImage, tolerance: u8) {
    let mask = colour_tolerance_mask(image, tolerance);
    // Dimensions come from `image` itself, so this cannot mismatch.
    let _ = mask.apply(image);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn white_with_black_corner() -> RgbaImage {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 1, Rgba([0, 0, 0, 255]));
        img
    }

    fn alpha(img: &RgbaImage) -> Vec<u8> {
        img.pixels().map(|p| p[3]).collect()
    }

    #[test]
    fn white_background_black_pixel() {
        let mut img = white_with_black_corner();
        apply_colour_tolerance(&mut img, 30);
        assert_eq!(alpha(&img), vec![0, 0, 0, 255]);
    }

    #[test]
    fn second_pass_changes_nothing() {
        let mut img = white_with_black_corner();
        apply_colour_tolerance(&mut img, 30);
        let once = img.clone();
        apply_colour_tolerance(&mut img, 30);
        assert_eq!(img, once);
    }

    #[test]
    fn tolerance_is_inclusive_and_per_channel() {
        let mut img = RgbaImage::from_pixel(4, 1, Rgba([100, 100, 100, 255]));
        // Exactly at tolerance on every channel: background.
        img.put_pixel(1, 0, Rgba([130, 70, 130, 255]));
        // One channel just past tolerance: foreground.
        img.put_pixel(2, 0, Rgba([100, 100, 131, 255]));
        // Euclidean distance ~52 but every channel within 30: background.
        img.put_pixel(3, 0, Rgba([130, 130, 130, 255]));
        apply_colour_tolerance(&mut img, 30);
        assert_eq!(alpha(&img), vec![0, 0, 255, 0]);
    }

    #[test]
    fn reference_alpha_is_ignored() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([5, 5, 5, 0]));
        img.put_pixel(1, 0, Rgba([5, 5, 5, 255]));
        apply_colour_tolerance(&mut img, 0);
        assert_eq!(alpha(&img), vec![0, 0]);
    }

    #[test]
    fn partially_transparent_foreground_keeps_alpha() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([200, 0, 0, 128]));
        apply_colour_tolerance(&mut img, 30);
        assert_eq!(alpha(&img), vec![0, 128]);
    }

    #[test]
    fn empty_image_is_a_no_op() {
        let mut img = RgbaImage::new(0, 0);
        apply_colour_tolerance(&mut img, 30);
        assert_eq!(colour_tolerance_mask(&img, 30).dimensions(), (0, 0));
    }

    #[test]
    fn mask_matches_applied_alpha() {
        let img = white_with_black_corner();
        let mask = colour_tolerance_mask(&img, 30);
        assert_eq!(mask.as_raw(), &[0, 0, 0, 1]);
    }
}
