//! Bottom-right watermark masking.
//!
//! Exported decks from some slide tools carry a small badge in the bottom
//! right corner. The badge area is painted over with the colour of a pixel
//! just above and to the left of it, which on real slides is almost always the
//! slide background.

use image::RgbImage;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use tracing::debug;

/// Share of the image width covered by the mask.
pub const MASK_WIDTH_RATIO: f64 = 0.18;
/// Share of the image height covered by the mask.
pub const MASK_HEIGHT_RATIO: f64 = 0.08;
/// How far outside the region's top-left corner the fill colour is sampled.
const SAMPLE_OFFSET: u32 = 5;

/// Pixel region `(x0, y0, w, h)` the mask covers for an image of this size.
pub fn mask_region(width: u32, height: u32) -> (u32, u32, u32, u32) {
    let w = (width as f64 * MASK_WIDTH_RATIO).floor() as u32;
    let h = (height as f64 * MASK_HEIGHT_RATIO).floor() as u32;
    (width - w, height - h, w, h)
}

/// Paint the watermark region with the sampled background colour.
///
/// Pixels outside the region are untouched. Tiny images whose region rounds
/// down to nothing are returned as-is.
pub fn mask(mut image: RgbImage) -> RgbImage {
    let (x0, y0, w, h) = mask_region(image.width(), image.height());
    if w == 0 || h == 0 {
        return image;
    }

    let sample = *image.get_pixel(
        x0.saturating_sub(SAMPLE_OFFSET),
        y0.saturating_sub(SAMPLE_OFFSET),
    );
    draw_filled_rect_mut(&mut image, Rect::at(x0 as i32, y0 as i32).of_size(w, h), sample);
    debug!("Masked watermark region ({}, {}, {}x{})", x0, y0, w, h);
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn slide_with_badge() -> RgbImage {
        // White background, dark badge in the corner, one red marker pixel.
        let mut img = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        for y in 93..100 {
            for x in 170..200 {
                img.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img
    }

    #[test]
    fn region_is_anchored_bottom_right() {
        assert_eq!(mask_region(200, 100), (164, 92, 36, 8));
        assert_eq!(mask_region(1920, 1080), (1575, 994, 345, 86));
    }

    #[test]
    fn region_is_uniform_after_masking() {
        let masked = mask(slide_with_badge());
        let (x0, y0, w, h) = mask_region(200, 100);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                assert_eq!(*masked.get_pixel(x, y), Rgb([255, 255, 255]), "({x},{y})");
            }
        }
    }

    #[test]
    fn pixels_outside_region_are_unchanged() {
        let original = slide_with_badge();
        let masked = mask(original.clone());
        let (x0, y0, _, _) = mask_region(200, 100);
        for (x, y, px) in original.enumerate_pixels() {
            if x < x0 || y < y0 {
                assert_eq!(masked.get_pixel(x, y), px);
            }
        }
    }

    #[test]
    fn masking_twice_changes_nothing() {
        let once = mask(slide_with_badge());
        let twice = mask(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn tiny_image_is_left_alone() {
        let img = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        assert_eq!(mask(img.clone()), img);
    }
}
