//! Image encoding for the OCR engine.
//!
//! Embedded images arrive in whatever format pdfium decodes them to. Before
//! recognition they are flattened to 8-bit grayscale and written as PNG:
//! tesseract binarises internally, and grayscale input gives it the same
//! starting point for every source colour space.

use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Decode arbitrary image bytes and re-encode them as grayscale PNG.
pub fn grayscale_png(bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let gray = match img {
        DynamicImage::ImageLuma8(_) => img,
        other => DynamicImage::ImageLuma8(other.to_luma8()),
    };
    encode_png(&gray)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn grayscale_round_trip() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba([10, 200, 30, 255])));
        let png = encode_png(&img).unwrap();
        let gray = grayscale_png(&png).unwrap();
        let decoded = image::load_from_memory(&gray).unwrap();
        assert!(matches!(decoded, DynamicImage::ImageLuma8(_)));
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn garbage_bytes_fail() {
        assert!(grayscale_png(b"definitely not an image").is_err());
    }
}
