//! Face locator — selects the most prominent face per frame and produces
//! a canonical crop for verification and enrollment.

use crate::types::BoundingBox;
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Side length of the canonical face crop handed to the verifier and
/// persisted on enrollment.
pub const FACE_CROP_SIZE: u32 = 224;

/// Pick the detection with the largest relative area. Ties are broken by
/// first-encountered order. "Track the most prominent person" policy, not
/// an error condition.
pub fn largest_face(detections: &[BoundingBox]) -> Option<&BoundingBox> {
    let mut best: Option<&BoundingBox> = None;
    for b in detections {
        if best.map_or(true, |cur| b.area() > cur.area()) {
            best = Some(b);
        }
    }
    best
}

/// Denormalize a box against the frame dimensions, clamp it to the frame,
/// and return a [`FACE_CROP_SIZE`] square crop.
///
/// Returns `None` for degenerate crops (zero-area after clamping, e.g.
/// from rounding at the frame edge): the frame is skipped, not failed.
pub fn crop_face(frame: &RgbImage, bbox: &BoundingBox) -> Option<RgbImage> {
    let (fw, fh) = frame.dimensions();

    let x0 = ((bbox.x * fw as f32) as i64).clamp(0, fw as i64);
    let y0 = ((bbox.y * fh as f32) as i64).clamp(0, fh as i64);
    let x1 = (((bbox.x + bbox.width) * fw as f32) as i64).clamp(0, fw as i64);
    let y1 = (((bbox.y + bbox.height) * fh as f32) as i64).clamp(0, fh as i64);

    let w = (x1 - x0).max(0) as u32;
    let h = (y1 - y0).max(0) as u32;
    if w == 0 || h == 0 {
        return None;
    }

    let crop = imageops::crop_imm(frame, x0 as u32, y0 as u32, w, h).to_image();
    Some(imageops::resize(
        &crop,
        FACE_CROP_SIZE,
        FACE_CROP_SIZE,
        FilterType::Triangle,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_largest_face_empty() {
        assert!(largest_face(&[]).is_none());
    }

    #[test]
    fn test_largest_face_picks_max_area() {
        let boxes = vec![
            bbox(0.0, 0.0, 0.1, 0.1),
            bbox(0.2, 0.2, 0.4, 0.5),
            bbox(0.5, 0.5, 0.2, 0.2),
        ];
        let selected = largest_face(&boxes).unwrap();
        // Property: area(selected) >= area(b) for all detected b.
        for b in &boxes {
            assert!(selected.area() >= b.area());
        }
        assert!((selected.width - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_largest_face_tie_first_wins() {
        let boxes = vec![
            bbox(0.0, 0.0, 0.2, 0.2),
            bbox(0.5, 0.5, 0.2, 0.2),
        ];
        let selected = largest_face(&boxes).unwrap();
        assert_eq!(selected.x, 0.0);
    }

    #[test]
    fn test_crop_face_center() {
        let frame = RgbImage::from_pixel(100, 100, image::Rgb([50, 60, 70]));
        let crop = crop_face(&frame, &bbox(0.25, 0.25, 0.5, 0.5)).unwrap();
        assert_eq!(crop.dimensions(), (FACE_CROP_SIZE, FACE_CROP_SIZE));
        assert_eq!(crop.get_pixel(0, 0).0, [50, 60, 70]);
    }

    #[test]
    fn test_crop_face_clamps_to_frame() {
        let frame = RgbImage::from_pixel(80, 60, image::Rgb([10, 20, 30]));
        // Box overhangs the right/bottom edge; crop must clamp, not fail.
        let crop = crop_face(&frame, &bbox(0.9, 0.9, 0.5, 0.5));
        assert!(crop.is_some());
    }

    #[test]
    fn test_crop_face_negative_coords_clamped() {
        let frame = RgbImage::from_pixel(80, 60, image::Rgb([10, 20, 30]));
        let crop = crop_face(&frame, &bbox(-0.2, -0.2, 0.5, 0.5));
        assert!(crop.is_some());
    }

    #[test]
    fn test_crop_face_degenerate_zero_area() {
        let frame = RgbImage::from_pixel(80, 60, image::Rgb([10, 20, 30]));
        assert!(crop_face(&frame, &bbox(0.5, 0.5, 0.0, 0.3)).is_none());
    }

    #[test]
    fn test_crop_face_degenerate_outside_frame() {
        let frame = RgbImage::from_pixel(80, 60, image::Rgb([10, 20, 30]));
        // Entirely past the right edge: clamps to zero width.
        assert!(crop_face(&frame, &bbox(1.0, 0.2, 0.3, 0.3)).is_none());
    }

    #[test]
    fn test_crop_face_subpixel_box_rounds_down_to_skip() {
        let frame = RgbImage::from_pixel(100, 100, image::Rgb([0, 0, 0]));
        // 0.004 * 100 = 0.4 px, truncating to a zero-width crop.
        assert!(crop_face(&frame, &bbox(0.5, 0.5, 0.004, 0.004)).is_none());
    }
}
