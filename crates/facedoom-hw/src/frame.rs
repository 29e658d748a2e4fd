//! Engine frame type and icon scaling.

use image::imageops::{self, FilterType};
use image::RgbaImage;

/// One engine framebuffer: tightly packed RGBA, top row first.
#[derive(Clone)]
pub struct RgbaFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for RgbaFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbaFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl RgbaFrame {
    /// Wrap a buffer, checking the dimensions are positive and the length
    /// is exactly `width * height * 4`.
    pub fn new(data: Vec<u8>, width: i64, height: i64) -> Result<Self, FrameError> {
        if width <= 0 || height <= 0 || width > u32::MAX as i64 || height > u32::MAX as i64 {
            return Err(FrameError::InvalidSize { width, height });
        }
        let Some(expected) = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
        else {
            return Err(FrameError::InvalidSize { width, height });
        };
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width: width as u32,
            height: height as u32,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Scale proportionally (nearest neighbour, no smoothing) to fit a
    /// `size` × `size` square, centred on a transparent canvas. The engine
    /// leaves the alpha byte unspecified, so every frame pixel is made opaque.
    pub fn to_icon(&self, size: u32) -> RgbaImage {
        let mut canvas = RgbaImage::new(size, size);
        if size == 0 {
            return canvas;
        }

        // `new` guarantees the buffer matches the dimensions.
        let Some(mut source) = RgbaImage::from_raw(self.width, self.height, self.data.clone()) else {
            return canvas;
        };
        for px in source.pixels_mut() {
            px.0[3] = 255;
        }

        let scale = (size as f32 / self.width as f32).min(size as f32 / self.height as f32);
        let w = ((self.width as f32 * scale).round() as u32).clamp(1, size);
        let h = ((self.height as f32 * scale).round() as u32).clamp(1, size);
        let scaled = imageops::resize(&source, w, h, FilterType::Nearest);

        let x = i64::from((size - w) / 2);
        let y = i64::from((size - h) / 2);
        imageops::overlay(&mut canvas, &scaled, x, y);
        canvas
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame size: {width}x{height}")]
    InvalidSize { width: i64, height: i64 },
    #[error("invalid RGBA length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaFrame {
        let data = rgba.repeat((width * height) as usize);
        RgbaFrame::new(data, width as i64, height as i64).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_size() {
        assert!(matches!(
            RgbaFrame::new(vec![], 0, 10),
            Err(FrameError::InvalidSize { .. })
        ));
        assert!(matches!(
            RgbaFrame::new(vec![], 10, -1),
            Err(FrameError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_rejects_size_whose_byte_length_overflows() {
        let huge = i64::from(u32::MAX);
        assert!(matches!(
            RgbaFrame::new(vec![0; 16], huge, huge),
            Err(FrameError::InvalidSize { .. })
        ));
        assert!(matches!(
            RgbaFrame::new(vec![0; 16], 4_000_000_000, 4_000_000_000),
            Err(FrameError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_rejects_short_buffer() {
        let result = RgbaFrame::new(vec![0; 15], 2, 2);
        assert!(matches!(
            result,
            Err(FrameError::InvalidLength { expected: 16, actual: 15 })
        ));
    }

    #[test]
    fn test_icon_letterboxes_wide_frame() {
        // 8x4 red frame with zero alpha into a 16x16 icon: 16x8 band in the middle.
        let frame = solid(8, 4, [255, 0, 0, 0]);
        let icon = frame.to_icon(16);
        assert_eq!(icon.dimensions(), (16, 16));
        assert_eq!(*icon.get_pixel(8, 8), Rgba([255, 0, 0, 255]));
        assert_eq!(*icon.get_pixel(8, 1), CLEAR);
        assert_eq!(*icon.get_pixel(8, 14), CLEAR);
    }

    #[test]
    fn test_icon_square_frame_fills_canvas() {
        let frame = solid(4, 4, [0, 200, 0, 17]);
        let icon = frame.to_icon(8);
        assert!(icon.pixels().all(|p| *p == Rgba([0, 200, 0, 255])));
    }
}
