//! Fixture builders for tests: small images with a hand-assembled EXIF block.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, Rgb, RgbImage};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use std::path::{Path, PathBuf};

const ASCII: u16 = 2;
const SHORT: u16 = 3;
const LONG: u16 = 4;
const RATIONAL: u16 = 5;
const BYTE: u16 = 1;

/// Tags to embed in a fixture image. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct FixtureExif<'a> {
    pub description: Option<&'a str>,
    pub artist: Option<&'a str>,
    pub orientation: Option<u16>,
    pub date_time_original: Option<&'a str>,
    /// IFD0 DateTime (ModifyDate).
    pub date_time: Option<&'a str>,
    /// ((deg, min, sec), ref, (deg, min, sec), ref)
    pub gps: Option<((u32, u32, u32), char, (u32, u32, u32), char)>,
}

struct Field {
    tag: u16,
    kind: u16,
    count: u32,
    data: Vec<u8>,
}

impl Field {
    fn ascii(tag: u16, value: &str) -> Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        Self { tag, kind: ASCII, count: data.len() as u32, data }
    }

    fn short(tag: u16, value: u16) -> Self {
        Self { tag, kind: SHORT, count: 1, data: value.to_le_bytes().to_vec() }
    }

    fn long(tag: u16, value: u32) -> Self {
        Self { tag, kind: LONG, count: 1, data: value.to_le_bytes().to_vec() }
    }

    fn rationals(tag: u16, values: &[(u32, u32)]) -> Self {
        let mut data = Vec::new();
        for (num, den) in values {
            data.extend_from_slice(&num.to_le_bytes());
            data.extend_from_slice(&den.to_le_bytes());
        }
        Self { tag, kind: RATIONAL, count: values.len() as u32, data }
    }
}

fn ifd_size(fields: &[Field]) -> usize {
    let data: usize = fields
        .iter()
        .filter(|f| f.data.len() > 4)
        .map(|f| f.data.len() + f.data.len() % 2)
        .sum();
    2 + fields.len() * 12 + 4 + data
}

/// Append an IFD at the current end of `out`, with its out-of-line values right after it.
fn write_ifd(out: &mut Vec<u8>, fields: &mut [Field]) {
    fields.sort_by_key(|f| f.tag);
    let data_start = out.len() + 2 + fields.len() * 12 + 4;
    let mut data = Vec::new();

    out.extend_from_slice(&(fields.len() as u16).to_le_bytes());
    for field in fields.iter() {
        out.extend_from_slice(&field.tag.to_le_bytes());
        out.extend_from_slice(&field.kind.to_le_bytes());
        out.extend_from_slice(&field.count.to_le_bytes());
        if field.data.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..field.data.len()].copy_from_slice(&field.data);
            out.extend_from_slice(&inline);
        } else {
            out.extend_from_slice(&((data_start + data.len()) as u32).to_le_bytes());
            data.extend_from_slice(&field.data);
            if data.len() % 2 != 0 {
                data.push(0);
            }
        }
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&data);
}

/// Assemble a little-endian TIFF block: IFD0, then the Exif and GPS sub-IFDs.
pub fn build_tiff(exif: &FixtureExif) -> Vec<u8> {
    let mut ifd0 = Vec::new();
    if let Some(v) = exif.description {
        ifd0.push(Field::ascii(0x010E, v));
    }
    if let Some(v) = exif.orientation {
        ifd0.push(Field::short(0x0112, v));
    }
    if let Some(v) = exif.date_time {
        ifd0.push(Field::ascii(0x0132, v));
    }
    if let Some(v) = exif.artist {
        ifd0.push(Field::ascii(0x013B, v));
    }

    let mut exif_ifd = Vec::new();
    if let Some(v) = exif.date_time_original {
        exif_ifd.push(Field::ascii(0x9003, v));
    }

    let mut gps_ifd = Vec::new();
    if let Some(((ld, lm, ls), lat_ref, (od, om, os), lon_ref)) = exif.gps {
        gps_ifd.push(Field::ascii(0x0001, &lat_ref.to_string()));
        gps_ifd.push(Field::rationals(0x0002, &[(ld, 1), (lm, 1), (ls, 1)]));
        gps_ifd.push(Field::ascii(0x0003, &lon_ref.to_string()));
        gps_ifd.push(Field::rationals(0x0004, &[(od, 1), (om, 1), (os, 1)]));
        gps_ifd.push(Field { tag: 0x0005, kind: BYTE, count: 1, data: vec![0] });
        gps_ifd.push(Field::rationals(0x0006, &[(12, 1)]));
    }

    // Pointer entries take a fixed 12 bytes, so sizes are known up front
    let pointers = usize::from(!exif_ifd.is_empty()) + usize::from(!gps_ifd.is_empty());
    let ifd0_len = ifd_size(&ifd0) + pointers * 12;
    let exif_offset = 8 + ifd0_len;
    let gps_offset = exif_offset + if exif_ifd.is_empty() { 0 } else { ifd_size(&exif_ifd) };

    if !exif_ifd.is_empty() {
        ifd0.push(Field::long(0x8769, exif_offset as u32));
    }
    if !gps_ifd.is_empty() {
        ifd0.push(Field::long(0x8825, gps_offset as u32));
    }

    let mut tiff = b"II".to_vec();
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    write_ifd(&mut tiff, &mut ifd0);
    if !exif_ifd.is_empty() {
        write_ifd(&mut tiff, &mut exif_ifd);
    }
    if !gps_ifd.is_empty() {
        write_ifd(&mut tiff, &mut gps_ifd);
    }
    tiff
}

/// Two-tone image: left half red, right half blue.
pub fn two_tone(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        if x < width.div_ceil(2) { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
    })
}

pub fn jpeg_bytes(width: u32, height: u32, exif: Option<&FixtureExif>) -> Vec<u8> {
    let img = two_tone(width, height);
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, 95)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();

    match exif {
        Some(exif) => {
            let mut jpeg = Jpeg::from_bytes(Bytes::from(encoded)).unwrap();
            jpeg.set_exif(Some(Bytes::from(build_tiff(exif))));
            jpeg.encoder().bytes().to_vec()
        }
        None => encoded,
    }
}

/// Write a JPEG fixture into `dir` and return its path.
pub fn write_jpeg(
    dir: &Path,
    name: &str,
    width: u32,
    height: u32,
    exif: Option<&FixtureExif>,
) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, jpeg_bytes(width, height, exif)).unwrap();
    path
}

/// Write a PNG fixture (no EXIF) into `dir` and return its path.
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    two_tone(width, height).save(&path).unwrap();
    path
}

/// A geotagged JPEG with the given names, placed at (lat, lon) in whole degrees.
pub fn write_geotagged(
    dir: &Path,
    name: &str,
    artist: Option<&str>,
    description: Option<&str>,
    lat: (u32, char),
    lon: (u32, char),
    taken: &str,
) -> PathBuf {
    let exif = FixtureExif {
        description,
        artist,
        orientation: Some(1),
        date_time_original: Some(taken),
        date_time: None,
        gps: Some(((lat.0, 0, 0), lat.1, (lon.0, 0, 0), lon.1)),
    };
    write_jpeg(dir, name, 32, 16, Some(&exif))
}
