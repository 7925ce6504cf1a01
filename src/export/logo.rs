use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

use super::ExportError;

/// Largest accepted width or height of an uploaded logo, in pixels
pub const MAX_LOGO_DIMENSION: u32 = 4096;

/// Logos are downscaled to fit this many pixels per side before embedding
const EMBED_MAX_PIXELS: u32 = 480;

/// Decoded logo ready to embed as an RGB image XObject
#[derive(Debug, Clone, PartialEq)]
pub struct LogoRaster {
    pub width: u32,
    pub height: u32,
    /// 8-bit RGB samples, row-major
    pub rgb: Vec<u8>,
}

/// Verifies an uploaded image and turns it into a `data:` URL.
pub fn encode_data_url(bytes: &[u8], max_bytes: usize) -> Result<String, ExportError> {
    if bytes.is_empty() {
        return Err(ExportError::InvalidImage("empty upload".into()));
    }
    if bytes.len() > max_bytes {
        return Err(ExportError::InvalidImage(format!(
            "image is {} bytes, limit is {}",
            bytes.len(),
            max_bytes
        )));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| ExportError::InvalidImage(format!("unrecognized image format: {}", e)))?;
    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
        return Err(ExportError::InvalidImage(format!(
            "unsupported image format {:?}, use PNG or JPEG",
            format
        )));
    }
    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| ExportError::InvalidImage(format!("image could not be read: {}", e)))?;
    if width > MAX_LOGO_DIMENSION || height > MAX_LOGO_DIMENSION {
        return Err(ExportError::InvalidImage(format!(
            "image is {}x{} pixels, limit is {}x{}",
            width, height, MAX_LOGO_DIMENSION, MAX_LOGO_DIMENSION
        )));
    }
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ExportError::InvalidImage(format!("image could not be decoded: {}", e)))?;

    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(bytes)
    ))
}

/// Splits a base64 `data:` URL into its mime type and payload bytes.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), ExportError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ExportError::InvalidImage("not a data URL".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ExportError::InvalidImage("data URL has no payload".into()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| ExportError::InvalidImage("data URL is not base64 encoded".into()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| ExportError::InvalidImage(format!("invalid base64 payload: {}", e)))?;
    Ok((mime.to_string(), bytes))
}

impl LogoRaster {
    pub fn from_data_url(url: &str) -> Result<Self, ExportError> {
        let (_, bytes) = decode_data_url(url)?;
        let mut decoded = image::load_from_memory(&bytes)
            .map_err(|e| ExportError::InvalidImage(format!("image could not be decoded: {}", e)))?;
        if decoded.width() > EMBED_MAX_PIXELS || decoded.height() > EMBED_MAX_PIXELS {
            decoded = decoded.thumbnail(EMBED_MAX_PIXELS, EMBED_MAX_PIXELS);
        }
        let rgb = decoded.to_rgb8();
        Ok(Self {
            width: rgb.width(),
            height: rgb.height(),
            rgb: rgb.into_raw(),
        })
    }

    /// Largest size fitting inside `max_w` x `max_h` points, aspect ratio kept.
    pub fn fit_within(&self, max_w: u32, max_h: u32) -> (u32, u32) {
        if self.width == 0 || self.height == 0 {
            return (0, 0);
        }
        let scale_w = max_w as f64 / self.width as f64;
        let scale_h = max_h as f64 / self.height as f64;
        let scale = scale_w.min(scale_h);
        (
            ((self.width as f64 * scale).round() as u32).max(1),
            ((self.height as f64 * scale).round() as u32).max(1),
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(width, height, |x, y| Rgb([(x * 40) as u8, (y * 40) as u8, 200]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn png_round_trips_through_data_url() {
        let png = sample_png(4, 2);
        let url = encode_data_url(&png, 1024 * 1024).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));

        let (mime, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, png);

        let raster = LogoRaster::from_data_url(&url).unwrap();
        assert_eq!((raster.width, raster.height), (4, 2));
        assert_eq!(raster.rgb.len(), 4 * 2 * 3);
        assert_eq!(&raster.rgb[..3], &[0, 0, 200]);
    }

    #[test]
    fn rejects_oversized_and_garbage_uploads() {
        let png = sample_png(4, 4);
        assert!(matches!(
            encode_data_url(&png, 10),
            Err(ExportError::InvalidImage(_))
        ));
        assert!(matches!(
            encode_data_url(b"definitely not an image", 1024),
            Err(ExportError::InvalidImage(_))
        ));
        assert!(matches!(
            encode_data_url(&[], 1024),
            Err(ExportError::InvalidImage(_))
        ));
    }

    fn flat_png(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn rejects_images_beyond_the_dimension_limit() {
        let wide = flat_png(MAX_LOGO_DIMENSION + 1, 1);
        assert!(wide.len() < 64 * 1024);
        assert!(matches!(
            encode_data_url(&wide, 64 * 1024),
            Err(ExportError::InvalidImage(msg)) if msg.contains("pixels")
        ));
        assert!(encode_data_url(&flat_png(MAX_LOGO_DIMENSION, 1), 64 * 1024).is_ok());
    }

    #[test]
    fn large_logos_are_downscaled_for_embedding() {
        let url = encode_data_url(&flat_png(1000, 500), 1024 * 1024).unwrap();
        let raster = LogoRaster::from_data_url(&url).unwrap();
        assert_eq!(raster.width, EMBED_MAX_PIXELS);
        assert_eq!(raster.height, EMBED_MAX_PIXELS / 2);
        assert_eq!(raster.rgb.len(), (raster.width * raster.height * 3) as usize);
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        assert!(decode_data_url("http://example.com/logo.png").is_err());
        assert!(decode_data_url("data:image/png,rawbytes").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn fit_keeps_aspect_ratio() {
        let raster = LogoRaster {
            width: 400,
            height: 100,
            rgb: Vec::new(),
        };
        assert_eq!(raster.fit_within(120, 60), (120, 30));
    }
}
