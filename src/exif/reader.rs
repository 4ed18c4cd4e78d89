use anyhow::{Context, Result};
use img_parts::png::Png;
use img_parts::{Bytes, ImageEXIF};
use nom_exif::*;
use std::io::Cursor;
use std::path::Path;

use crate::pipeline::ImageKind;

// IFD0 tag IDs read by code rather than through `ExifTag`
const TAG_ARTIST: u16 = 0x013B;

/// Raw tag values read from an image, before any normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTags {
    /// ImageDescription (0x010E).
    pub description: Option<String>,
    /// Artist (0x013B).
    pub artist: Option<String>,
    /// Orientation (0x0112), 1–8.
    pub orientation: Option<u16>,
    /// DateTimeOriginal (0x9003), as the reader renders it.
    pub date_time_original: Option<String>,
    /// DateTime / ModifyDate (0x0132).
    pub modify_date: Option<String>,
    pub gps: Option<RawGps>,
}

/// GPS position as stored: degree/minute/second triples plus hemisphere refs.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGps {
    pub latitude: [f64; 3],
    pub latitude_ref: char,
    pub longitude: [f64; 3],
    pub longitude_ref: char,
}

/// Read the tags the extractor cares about.
///
/// PNG files are read through their `eXIf` chunk, which holds a plain TIFF
/// block. A file without an EXIF block, or one the metadata parser does not
/// recognise, yields `RawTags::default()`. Only a file that cannot be opened
/// (or a PNG that cannot be parsed) is an error.
pub fn read_tags(path: &Path) -> Result<RawTags> {
    let mut parser = MediaParser::new();

    let parsed = if ImageKind::from_path(path) == Some(ImageKind::Png) {
        let Some(tiff) = png_exif(path)? else {
            log::debug!("No eXIf chunk in {}", path.display());
            return Ok(RawTags::default());
        };
        match MediaSource::seekable(Cursor::new(tiff)) {
            Ok(ms) => parser.parse(ms),
            Err(e) => {
                log::debug!("Unreadable eXIf chunk in {}: {e}", path.display());
                return Ok(RawTags::default());
            }
        }
    } else {
        let ms = MediaSource::file_path(path).context("Failed to open image file")?;
        parser.parse(ms)
    };

    let iter: ExifIter = match parsed {
        Ok(iter) => iter,
        Err(_) => {
            log::debug!("No EXIF data found in {}", path.display());
            return Ok(RawTags::default());
        }
    };

    // Parse GPS info before converting to Exif (consumes the iterator)
    let gps_info = iter.parse_gps_info().ok().flatten();
    let exif: Exif = iter.into();

    let mut tags = RawTags {
        description: exif.get(ExifTag::ImageDescription).map(entry_to_text),
        artist: exif.get_by_ifd_tag_code(0, TAG_ARTIST).map(entry_to_text),
        orientation: exif
            .get(ExifTag::Orientation)
            .and_then(|v| v.to_string().trim().parse::<u16>().ok()),
        date_time_original: exif.get(ExifTag::DateTimeOriginal).map(entry_to_text),
        modify_date: exif.get(ExifTag::ModifyDate).map(entry_to_text),
        gps: None,
    };

    if let Some(gps) = gps_info {
        tags.gps = Some(RawGps {
            latitude: latlng_components(&gps.latitude),
            latitude_ref: gps.latitude_ref,
            longitude: latlng_components(&gps.longitude),
            longitude_ref: gps.longitude_ref,
        });
    }

    log::debug!("{}: {tags:?}", path.display());
    Ok(tags)
}

/// The raw TIFF block of a PNG's `eXIf` chunk, if it has one.
fn png_exif(path: &Path) -> Result<Option<Vec<u8>>> {
    let bytes = std::fs::read(path).context("Failed to open image file")?;
    let png = Png::from_bytes(Bytes::from(bytes)).map_err(|e| anyhow::anyhow!("Failed to parse PNG: {e}"))?;
    Ok(png.exif().map(|b| b.to_vec()))
}

/// Render an entry as text, keeping content verbatim apart from NUL padding.
fn entry_to_text(val: &EntryValue) -> String {
    let s = match val {
        EntryValue::Text(s) => s.clone(),
        other => other.to_string(),
    };
    s.trim_end_matches('\0').to_string()
}

/// Split a nom-exif LatLng (3 URationals: deg, min, sec) into floats.
fn latlng_components(latlng: &LatLng) -> [f64; 3] {
    [
        ratio(latlng.0.0, latlng.0.1),
        ratio(latlng.1.0, latlng.1.1),
        ratio(latlng.2.0, latlng.2.1),
    ]
}

fn ratio(num: u32, den: u32) -> f64 {
    if den == 0 { f64::NAN } else { num as f64 / den as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::{MetadataEdit, write_tags};
    use crate::test_utils::{FixtureExif, write_jpeg, write_png};
    use tempfile::TempDir;

    #[test]
    fn reads_all_fixture_tags() {
        let dir = TempDir::new().unwrap();
        let exif = FixtureExif {
            description: Some("Bridge\nbuilt 1920"),
            artist: Some("North Bridge"),
            orientation: Some(6),
            date_time_original: Some("2023:05:01 10:20:30"),
            date_time: Some("2024:01:01 00:00:00"),
            gps: Some(((45, 30, 0), 'N', (93, 15, 0), 'W')),
        };
        let path = write_jpeg(dir.path(), "a.jpg", 8, 4, Some(&exif));

        let tags = read_tags(&path).unwrap();
        assert_eq!(tags.description.as_deref(), Some("Bridge\nbuilt 1920"));
        assert_eq!(tags.artist.as_deref(), Some("North Bridge"));
        assert_eq!(tags.orientation, Some(6));
        assert!(tags.date_time_original.is_some());
        assert!(tags.modify_date.is_some());

        let gps = tags.gps.unwrap();
        assert_eq!(gps.latitude, [45.0, 30.0, 0.0]);
        assert_eq!(gps.latitude_ref, 'N');
        assert_eq!(gps.longitude, [93.0, 15.0, 0.0]);
        assert_eq!(gps.longitude_ref, 'W');
    }

    #[test]
    fn jpeg_without_exif_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(dir.path(), "plain.jpg", 4, 4, None);
        assert_eq!(read_tags(&path).unwrap(), RawTags::default());
    }

    #[test]
    fn png_is_read_through_exif_chunk() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "shot.png", 6, 6);
        assert_eq!(read_tags(&path).unwrap(), RawTags::default());

        let edit = MetadataEdit {
            description: Some("Harbour at dusk".into()),
            artist: Some("North Bridge".into()),
        };
        write_tags(&path, &edit).unwrap();

        let tags = read_tags(&path).unwrap();
        assert_eq!(tags.description.as_deref(), Some("Harbour at dusk"));
        assert_eq!(tags.artist.as_deref(), Some("North Bridge"));
        assert_eq!(tags.gps, None);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_tags(Path::new("/nonexistent/photo.jpg")).is_err());
    }

    #[test]
    fn zero_denominator_is_nan() {
        assert!(ratio(1, 0).is_nan());
        assert_eq!(ratio(3, 2), 1.5);
    }
}
