//! Orientation-corrected, resized JPEG copies of source images.
//!
//! Both the KMZ renderer and the spreadsheet renderer go through
//! [`prepare_thumbnail`], so the two never disagree on how a photo looks.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader};
use std::path::Path;

use crate::record::Orientation;

/// An encoded JPEG plus its pixel size.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Apply the transform that makes stored pixels display upright.
pub fn orient(image: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => image,
        Orientation::FlipHorizontal => image.fliph(),
        Orientation::Rotate180 => image.rotate180(),
        Orientation::FlipVertical => image.flipv(),
        Orientation::Transpose => image.rotate90().fliph(),
        Orientation::Rotate90 => image.rotate90(),
        Orientation::Transverse => image.rotate270().fliph(),
        Orientation::Rotate270 => image.rotate270(),
    }
}

/// Scale down to `width`, keeping the aspect ratio. Narrower images are kept as is.
pub fn fit_width(image: DynamicImage, width: u32) -> DynamicImage {
    if width == 0 || image.width() <= width {
        return image;
    }
    let height = (u64::from(image.height()) * u64::from(width) / u64::from(image.width())).max(1);
    image.resize_exact(width, height as u32, FilterType::Lanczos3)
}

pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .context("Failed to encode JPEG")?;
    Ok(bytes)
}

/// Decode a source image, orient it, then resize. Rotation happens before the
/// resize so `width` always applies to the displayed width.
pub fn prepare_thumbnail(path: &Path, orientation: Orientation, width: u32, quality: u8) -> Result<Thumbnail> {
    let image = ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_guessed_format()
        .context("Failed to detect image format")?
        .decode()
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    let image = fit_width(orient(image, orientation), width);
    Ok(Thumbnail {
        bytes: encode_jpeg(&image, quality)?,
        width: image.width(),
        height: image.height(),
    })
}
