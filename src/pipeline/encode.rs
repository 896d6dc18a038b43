//! Image encoding: `DynamicImage` → PNG / JPEG / WebP bytes.
//!
//! PNG keeps slide text pixel-exact; JPEG and WebP trade that for much
//! smaller files at the requested quality. JPEG has no alpha channel, so
//! pages are flattened to RGB first; pdfium renders onto an opaque white
//! background, so nothing visible is lost.

use crate::config::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page in `format`.
///
/// `quality` (0–100) is honoured by the lossy formats and ignored for PNG.
pub fn encode_page(
    img: &DynamicImage,
    format: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, String> {
    let buf = match format {
        ImageFormat::Png => {
            let mut buf = Vec::new();
            img.write_with_encoder(PngEncoder::new(Cursor::new(&mut buf)))
                .map_err(|e| format!("PNG encoding failed: {e}"))?;
            buf
        }
        ImageFormat::Jpeg => {
            let mut buf = Vec::new();
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(
                Cursor::new(&mut buf),
                quality.max(1),
            ))
            .map_err(|e| format!("JPEG encoding failed: {e}"))?;
            buf
        }
        ImageFormat::Webp => {
            let rgba = img.to_rgba8();
            let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
                .encode_simple(false, f32::from(quality))
                .map_err(|e| {
                    format!(
                        "WebP encoding failed for {}x{} page: {:?}",
                        rgba.width(),
                        rgba.height(),
                        e
                    )
                })?;
            encoded.to_vec()
        }
    };

    debug!(
        "Encoded {}x{} page as {} → {} bytes",
        img.width(),
        img.height(),
        format,
        buf.len()
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn page() -> DynamicImage {
        let mut img = RgbaImage::from_pixel(64, 48, Rgba([255, 255, 255, 255]));
        for x in 0..64 {
            img.put_pixel(x, 24, Rgba([0, 0, 0, 255]));
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn png_signature() {
        let bytes = encode_page(&page(), ImageFormat::Png, 85).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn jpeg_signature_and_alpha_flattened() {
        let bytes = encode_page(&page(), ImageFormat::Jpeg, 85).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn webp_signature() {
        let bytes = encode_page(&page(), ImageFormat::Webp, 85).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn oversized_webp_is_an_error() {
        let wide = DynamicImage::ImageRgba8(RgbaImage::new(17_000, 2));
        let err = encode_page(&wide, ImageFormat::Webp, 85).unwrap_err();
        assert!(err.contains("17000x2"), "{err}");
    }

    #[test]
    fn png_ignores_quality() {
        let a = encode_page(&page(), ImageFormat::Png, 0).unwrap();
        let b = encode_page(&page(), ImageFormat::Png, 100).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn decoded_jpeg_keeps_dimensions() {
        let bytes = encode_page(&page(), ImageFormat::Jpeg, 50).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }
}
