use anyhow::{Context, Result};
use img_parts::Bytes;
use img_parts::ImageEXIF;
use img_parts::jpeg::{Jpeg, JpegSegment};
use img_parts::png::Png;
use std::path::Path;

use crate::pipeline::{ImageKind, write_atomic};

// IFD0 tags owned by the writer
const TAG_IMAGE_DESCRIPTION: u16 = 0x010E;
const TAG_ARTIST: u16 = 0x013B;
const TIFF_ASCII: u16 = 2;

const EXIF_PREFIX: &[u8] = b"Exif\0\0";
// APP1 length field is 16 bits and counts itself
const JPEG_SEGMENT_MAX: usize = 65_533;

/// The two fields the round-trip update is allowed to change.
///
/// `None` leaves a tag untouched, `Some("")` removes it, anything else sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataEdit {
    pub description: Option<String>,
    pub artist: Option<String>,
}

impl MetadataEdit {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.artist.is_none()
    }
}

/// Write ImageDescription and Artist into an image, leaving every other tag and
/// all pixel data untouched.
///
/// Strategy:
/// 1. JPEG/PNG: take the raw TIFF block out of the container with img-parts
/// 2. Rebuild only IFD0 at the end of the block (old entries copied verbatim,
///    the two owned entries replaced or dropped)
/// 3. Put the block back and persist through a temporary file, so the
///    original is either fully replaced or not touched at all
///
/// A TIFF file is itself the TIFF block, so step 2 runs on the whole file and
/// the strip data stays where it was.
pub fn write_tags(path: &Path, edit: &MetadataEdit) -> Result<()> {
    if edit.is_empty() {
        return Ok(());
    }

    let kind = ImageKind::from_path(path)
        .with_context(|| format!("Unsupported image format: {}", path.display()))?;

    match kind {
        ImageKind::Jpeg => {
            let bytes = std::fs::read(path).context("Failed to read image file")?;
            let updated = rewrite_jpeg(bytes, edit)?;
            write_atomic(path, &updated).context("Failed to write JPEG file")
        }
        ImageKind::Png => {
            let bytes = std::fs::read(path).context("Failed to read image file")?;
            let updated = rewrite_png(bytes, edit)?;
            write_atomic(path, &updated).context("Failed to write PNG file")
        }
        ImageKind::Tiff => {
            let bytes = std::fs::read(path).context("Failed to read image file")?;
            let updated = rewrite_ifd0(&bytes, edit)?;
            write_atomic(path, &updated).context("Failed to write TIFF file")
        }
    }
}

fn rewrite_jpeg(bytes: Vec<u8>, edit: &MetadataEdit) -> Result<Vec<u8>> {
    let mut jpeg = Jpeg::from_bytes(Bytes::from(bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse JPEG: {e}"))?;

    let exif_pos = find_exif_segment_pos(&jpeg);
    let original_tiff = match exif_pos {
        Some(pos) => jpeg.segments()[pos].contents()[EXIF_PREFIX.len()..].to_vec(),
        None => empty_tiff(),
    };
    let new_tiff = rewrite_ifd0(&original_tiff, edit)?;
    if new_tiff.len() + EXIF_PREFIX.len() > JPEG_SEGMENT_MAX {
        anyhow::bail!("EXIF block would exceed the JPEG segment limit");
    }

    match exif_pos {
        // Replace in place so the segment order stays as it was
        Some(pos) => {
            let mut contents = Vec::with_capacity(EXIF_PREFIX.len() + new_tiff.len());
            contents.extend_from_slice(EXIF_PREFIX);
            contents.extend_from_slice(&new_tiff);
            jpeg.segments_mut()[pos] = JpegSegment::new_with_contents(0xE1, Bytes::from(contents));
        }
        None => jpeg.set_exif(Some(Bytes::from(new_tiff))),
    }

    Ok(jpeg.encoder().bytes().to_vec())
}

fn rewrite_png(bytes: Vec<u8>, edit: &MetadataEdit) -> Result<Vec<u8>> {
    let mut png = Png::from_bytes(Bytes::from(bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse PNG: {e}"))?;

    let original_tiff = png.exif().map(|b| b.to_vec()).unwrap_or_else(empty_tiff);
    let new_tiff = rewrite_ifd0(&original_tiff, edit)?;
    png.set_exif(Some(Bytes::from(new_tiff)));

    Ok(png.encoder().bytes().to_vec())
}

/// Find the position of the EXIF APP1 segment in a JPEG.
/// EXIF segments have marker 0xE1 (APP1) and contents starting with "Exif\0\0".
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == 0xE1 && s.contents().starts_with(EXIF_PREFIX))
}

/// A little-endian TIFF header followed by an empty IFD0.
fn empty_tiff() -> Vec<u8> {
    let mut tiff = b"II".to_vec();
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&0u16.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff
}

/// Byte-order aware reads and writes over a TIFF block.
#[derive(Clone, Copy)]
struct ByteOrder {
    big_endian: bool,
}

impl ByteOrder {
    fn detect(tiff: &[u8]) -> Result<Self> {
        if tiff.len() < 8 {
            anyhow::bail!("TIFF data too short");
        }
        let order = match &tiff[0..2] {
            b"MM" => Self { big_endian: true },
            b"II" => Self { big_endian: false },
            _ => anyhow::bail!("Invalid TIFF byte order"),
        };
        // 43 would be BigTIFF, whose IFDs use 64-bit offsets
        if order.read_u16(tiff, 2) != 42 {
            anyhow::bail!("Not a classic TIFF block");
        }
        Ok(order)
    }

    fn read_u16(self, data: &[u8], offset: usize) -> u16 {
        let b = [data[offset], data[offset + 1]];
        if self.big_endian { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) }
    }

    fn read_u32(self, data: &[u8], offset: usize) -> u32 {
        let b = [data[offset], data[offset + 1], data[offset + 2], data[offset + 3]];
        if self.big_endian { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) }
    }

    fn u16_bytes(self, val: u16) -> [u8; 2] {
        if self.big_endian { val.to_be_bytes() } else { val.to_le_bytes() }
    }

    fn u32_bytes(self, val: u32) -> [u8; 4] {
        if self.big_endian { val.to_be_bytes() } else { val.to_le_bytes() }
    }
}

/// Rebuild IFD0 at the end of the TIFF block with the owned tags replaced.
///
/// Original entries are copied byte for byte (their offsets still point at the
/// untouched original data), the entry list is kept in ascending tag order and
/// the TIFF header is re-pointed at the new IFD0.
fn rewrite_ifd0(original: &[u8], edit: &MetadataEdit) -> Result<Vec<u8>> {
    let order = ByteOrder::detect(original)?;

    let ifd0_offset = order.read_u32(original, 4) as usize;
    if ifd0_offset + 2 > original.len() {
        anyhow::bail!("IFD0 offset out of bounds");
    }
    let ifd0_count = order.read_u16(original, ifd0_offset) as usize;
    let ifd0_start = ifd0_offset + 2;
    let ifd0_end = ifd0_start + ifd0_count * 12;
    if ifd0_end + 4 > original.len() {
        anyhow::bail!("IFD0 entries extend beyond TIFF data");
    }
    let ifd0_next = order.read_u32(original, ifd0_end);

    let owned: Vec<(u16, &str)> = [
        (TAG_IMAGE_DESCRIPTION, edit.description.as_deref()),
        (TAG_ARTIST, edit.artist.as_deref()),
    ]
    .into_iter()
    .filter_map(|(tag, value)| value.map(|v| (tag, v)))
    .collect();

    let mut entries: Vec<(u16, [u8; 12])> = (0..ifd0_count)
        .map(|i| {
            let eo = ifd0_start + i * 12;
            let mut raw = [0u8; 12];
            raw.copy_from_slice(&original[eo..eo + 12]);
            (order.read_u16(original, eo), raw)
        })
        .filter(|(tag, _)| !owned.iter().any(|(t, _)| t == tag))
        .collect();

    let mut result = original.to_vec();

    // Value blobs for the new entries go before the IFD itself
    for (tag, value) in owned.iter().filter(|(_, v)| !v.is_empty()) {
        let mut data = value.as_bytes().to_vec();
        data.push(0);

        let mut raw = [0u8; 12];
        raw[0..2].copy_from_slice(&order.u16_bytes(*tag));
        raw[2..4].copy_from_slice(&order.u16_bytes(TIFF_ASCII));
        raw[4..8].copy_from_slice(&order.u32_bytes(data.len() as u32));
        if data.len() <= 4 {
            raw[8..8 + data.len()].copy_from_slice(&data);
        } else {
            pad_to_word(&mut result);
            raw[8..12].copy_from_slice(&order.u32_bytes(offset_u32(result.len())?));
            result.extend_from_slice(&data);
        }
        entries.push((*tag, raw));
    }
    entries.sort_by_key(|(tag, _)| *tag);

    pad_to_word(&mut result);
    let new_ifd0_start = offset_u32(result.len())?;
    result.extend_from_slice(&order.u16_bytes(entries.len() as u16));
    for (_, raw) in &entries {
        result.extend_from_slice(raw);
    }
    result.extend_from_slice(&order.u32_bytes(ifd0_next));

    result[4..8].copy_from_slice(&order.u32_bytes(new_ifd0_start));
    Ok(result)
}

fn pad_to_word(data: &mut Vec<u8>) {
    if data.len() % 2 != 0 {
        data.push(0);
    }
}

fn offset_u32(offset: usize) -> Result<u32> {
    u32::try_from(offset).context("TIFF offset exceeds 32 bits")
}
