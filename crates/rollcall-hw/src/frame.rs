//! Frame type and pixel format conversion — YUYV→RGB and MJPG decode.

use image::RgbImage;

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Interleaved RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    /// Convert into an owned `RgbImage`. Returns `None` if the buffer
    /// length does not match the stated dimensions.
    pub fn into_image(self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("MJPG decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Convert packed YUYV (4:2:2) to interleaved RGB using BT.601.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share
/// one chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        push_pixel(&mut rgb, y0, u, v);
        push_pixel(&mut rgb, y1, u, v);
    }
    Ok(rgb)
}

fn push_pixel(rgb: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    // BT.601 studio-swing coefficients, fixed-point.
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    rgb.push(r.clamp(0, 255) as u8);
    rgb.push(g.clamp(0, 255) as u8);
    rgb.push(b.clamp(0, 255) as u8);
}

/// Decode a MJPG (JPEG) compressed frame into an `RgbImage`.
pub fn decode_mjpg(buf: &[u8]) -> Result<RgbImage, FrameError> {
    Ok(image::load_from_memory(buf)?.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_neutral_gray() {
        // Y=128 with neutral chroma → mid gray on both pixels.
        let yuyv = vec![128, 128, 128, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb, vec![131, 131, 131, 131, 131, 131]);
    }

    #[test]
    fn test_yuyv_black_and_white() {
        // Y=16 is studio black, Y=235 is studio white.
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(&rgb[..3], &[0, 0, 0]);
        assert_eq!(&rgb[3..], &[255, 255, 255]);
    }

    #[test]
    fn test_yuyv_clamps_out_of_range() {
        // Saturated chroma must clamp rather than wrap.
        let yuyv = vec![235, 255, 235, 255];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert!(rgb.iter().all(|&c| c <= 255));
        assert_eq!(rgb[2], 255); // blue channel saturates high
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![128, 128];
        assert!(matches!(
            yuyv_to_rgb(&yuyv, 2, 1),
            Err(FrameError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_yuyv_output_size() {
        let yuyv = vec![128u8; 8 * 2 * 2]; // 8x2 frame
        let rgb = yuyv_to_rgb(&yuyv, 8, 2).unwrap();
        assert_eq!(rgb.len(), 8 * 2 * 3);
    }

    #[test]
    fn test_frame_into_image() {
        let frame = Frame {
            data: vec![0u8; 4 * 2 * 3],
            width: 4,
            height: 2,
            timestamp: std::time::Instant::now(),
            sequence: 7,
        };
        let img = frame.into_image().unwrap();
        assert_eq!(img.dimensions(), (4, 2));
    }

    #[test]
    fn test_frame_into_image_size_mismatch() {
        let frame = Frame {
            data: vec![0u8; 5],
            width: 4,
            height: 2,
            timestamp: std::time::Instant::now(),
            sequence: 0,
        };
        assert!(frame.into_image().is_none());
    }

    #[test]
    fn test_decode_mjpg_round_trip() {
        let img = RgbImage::from_pixel(16, 16, image::Rgb([200, 40, 40]));
        let mut jpeg = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut jpeg),
            image::ImageFormat::Jpeg,
        )
        .unwrap();

        let decoded = decode_mjpg(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));
    }

    #[test]
    fn test_decode_mjpg_garbage() {
        assert!(matches!(
            decode_mjpg(b"not a jpeg"),
            Err(FrameError::Decode(_))
        ));
    }
}
