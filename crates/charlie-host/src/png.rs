//! PNG output for captured frames (8-bit RGBA).

use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use charlie_core::FrameBuffer;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

/// A frame that could not be written as PNG.
#[derive(Debug)]
pub enum ImageError {
    /// PNG cannot hold a zero-sized image.
    EmptyFrame,
    /// The encoder rejected the frame or failed to write it.
    Encode(image::ImageError),
    /// Creating or flushing the output failed.
    Io(io::Error),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFrame => write!(f, "cannot encode an empty frame"),
            Self::Encode(e) => write!(f, "PNG encoding failed: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl Error for ImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EmptyFrame => None,
            Self::Encode(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for ImageError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<image::ImageError> for ImageError {
    fn from(e: image::ImageError) -> Self {
        Self::Encode(e)
    }
}

/// Write `frame` as a PNG stream.
pub fn encode_png(frame: &FrameBuffer, out: &mut impl Write) -> Result<(), ImageError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(ImageError::EmptyFrame);
    }
    PngEncoder::new(&mut *out).write_image(
        frame.pixels(),
        frame.width(),
        frame.height(),
        ExtendedColorType::Rgba8,
    )?;
    out.flush()?;
    Ok(())
}

/// Write `frame` to a PNG file at `path`.
pub fn save_png(frame: &FrameBuffer, path: impl AsRef<Path>) -> Result<(), ImageError> {
    let mut out = BufWriter::new(File::create(path)?);
    encode_png(frame, &mut out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbaImage};

    fn checker() -> FrameBuffer {
        let mut frame = FrameBuffer::new(3, 2).unwrap();
        frame.fill([255, 255, 255, 255]);
        frame.set_pixel(0, 0, [255, 0, 0, 255]);
        frame.set_pixel(2, 1, [0, 0, 255, 128]);
        frame
    }

    fn decode(bytes: &[u8]) -> RgbaImage {
        image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .unwrap()
            .to_rgba8()
    }

    #[test]
    fn stream_is_recognised_as_png() {
        let mut png = Vec::new();
        encode_png(&checker(), &mut png).unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn pixels_survive_with_alpha() {
        let frame = checker();
        let mut png = Vec::new();
        encode_png(&frame, &mut png).unwrap();

        let decoded = decode(&png);
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(decoded.get_pixel(1, 0).0, [255, 255, 255, 255]);
        assert_eq!(decoded.get_pixel(2, 1).0, [0, 0, 255, 128]);
        assert_eq!(decoded.as_raw().as_slice(), frame.pixels());
    }

    #[test]
    fn empty_frame_is_rejected() {
        let frame = FrameBuffer::new(0, 4).unwrap();
        assert!(matches!(
            encode_png(&frame, &mut Vec::new()),
            Err(ImageError::EmptyFrame)
        ));
    }

    #[test]
    fn save_png_writes_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        save_png(&checker(), &path).unwrap();
        let decoded = decode(&std::fs::read(&path).unwrap());
        assert_eq!(decoded.get_pixel(2, 1).0, [0, 0, 255, 128]);
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("frame.png");
        assert!(matches!(save_png(&checker(), &path), Err(ImageError::Io(_))));
    }
}
