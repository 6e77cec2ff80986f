//! Image codec: decode source spreads, re-encode cropped pages.
//!
//! Pages are stored as lossy JPEG at a fixed quality (85 by default). The
//! `image` crate's WebP encoder is lossless-only, which would make scanned
//! pages several times larger, so JPEG is the compact format available here.
//! Alpha is flattened to RGB first because JPEG has no alpha channel.
//!
//! [`PageCodec`] is a trait so a platform-native codec can replace
//! [`RasterCodec`] without touching the pipeline.

use crate::error::IngestError;
use crate::model::{Crop, EncodedImage, OutputPage};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// Decodes source images and encodes page images.
pub trait PageCodec: Send + Sync {
    /// Decode raw file bytes (PNG or JPEG) into pixels.
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, image::ImageError>;

    /// Encode `image` at `quality` (1–100).
    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<EncodedImage, image::ImageError>;
}

/// [`PageCodec`] backed by the `image` crate, emitting JPEG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterCodec;

impl PageCodec for RasterCodec {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, image::ImageError> {
        image::load_from_memory(data)
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<EncodedImage, image::ImageError> {
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let mut buf = Vec::new();
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
        Ok(EncodedImage {
            data: buf,
            mime_type: "image/jpeg",
            extension: "jpg",
        })
    }
}

/// Encode one cropped region into an [`OutputPage`].
pub fn encode_page(
    codec: &dyn PageCodec,
    image: &DynamicImage,
    crop: Crop,
    number: u32,
    source: &str,
    quality: u8,
) -> Result<OutputPage, IngestError> {
    // A 1-px-wide spread leaves an empty left half.
    if crop.width == 0 || crop.height == 0 {
        return Err(IngestError::Encode {
            page: number,
            detail: format!("empty crop {}x{} from '{}'", crop.width, crop.height, source),
        });
    }

    let encoded = codec
        .encode(image, quality)
        .map_err(|e| IngestError::Encode {
            page: number,
            detail: e.to_string(),
        })?;

    debug!(
        "Encoded page {} ({}x{}) → {} bytes {}",
        number,
        crop.width,
        crop.height,
        encoded.data.len(),
        encoded.mime_type
    );

    Ok(OutputPage {
        number,
        is_cover: crop.is_cover,
        source: source.to_string(),
        crop,
        image: encoded,
    })
}
