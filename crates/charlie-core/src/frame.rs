//! Fixed-format pixel buffers produced by plugin `render` calls.

use std::error::Error;
use std::fmt;

/// Bytes per pixel. Channel order is R, G, B, A.
pub const BYTES_PER_PIXEL: usize = 4;

/// Errors constructing a [`FrameBuffer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// Pixel data length does not equal `width * height * 4`.
    LengthMismatch {
        /// Required length in bytes.
        expected: usize,
        /// Supplied length in bytes.
        actual: usize,
    },
    /// `width * height * 4` does not fit in `usize`.
    TooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { expected, actual } => {
                write!(f, "pixel data is {actual} bytes, expected {expected}")
            }
            Self::TooLarge { width, height } => {
                write!(f, "frame {width}x{height} is too large")
            }
        }
    }
}

impl Error for FrameError {}

fn byte_len(width: u32, height: u32) -> Result<usize, FrameError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .ok_or(FrameError::TooLarge { width, height })
}

/// An RGBA8 image, row-major, top row first.
///
/// The pixel buffer always holds exactly `width * height * 4` bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    /// A fully transparent black frame.
    pub fn new(width: u32, height: u32) -> Result<Self, FrameError> {
        let len = byte_len(width, height)?;
        Ok(Self {
            width,
            height,
            pixels: vec![0; len],
        })
    }

    /// Wrap existing RGBA pixel data.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FrameError> {
        let expected = byte_len(width, height)?;
        if pixels.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume the frame and return its RGBA bytes.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Set every pixel to `rgba`.
    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Pixel at `(x, y)`, or `None` if out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let i = self.offset(x, y)?;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[i..i + BYTES_PER_PIXEL]);
        Some(rgba)
    }

    /// Set the pixel at `(x, y)`. Out-of-bounds writes are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(i) = self.offset(x, y) {
            self.pixels[i..i + BYTES_PER_PIXEL].copy_from_slice(&rgba);
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL)
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_frame_is_zeroed_and_sized() {
        let frame = FrameBuffer::new(3, 2).unwrap();
        assert_eq!(frame.pixels().len(), 24);
        assert!(frame.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn from_pixels_checks_length() {
        let err = FrameBuffer::from_pixels(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            FrameError::LengthMismatch {
                expected: 16,
                actual: 15
            }
        );
        assert!(FrameBuffer::from_pixels(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn set_and_get_pixel() {
        let mut frame = FrameBuffer::new(4, 4).unwrap();
        frame.set_pixel(1, 2, [10, 20, 30, 40]);
        assert_eq!(frame.pixel(1, 2), Some([10, 20, 30, 40]));
        assert_eq!(frame.pixel(2, 1), Some([0, 0, 0, 0]));
        assert_eq!(frame.pixel(4, 0), None);
        frame.set_pixel(9, 9, [1, 1, 1, 1]);
    }

    #[test]
    fn fill_paints_every_pixel() {
        let mut frame = FrameBuffer::new(5, 1).unwrap();
        frame.fill([255, 0, 0, 255]);
        assert!(frame
            .pixels()
            .chunks_exact(BYTES_PER_PIXEL)
            .all(|px| px == [255, 0, 0, 255]));
    }

    #[test]
    fn zero_sized_frames_are_valid() {
        let frame = FrameBuffer::new(0, 10).unwrap();
        assert!(frame.pixels().is_empty());
    }
}
