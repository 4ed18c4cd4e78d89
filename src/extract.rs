use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::config::RecordOrder;
use crate::error::Error;
use crate::exif::{RawGps, RawTags, read_tags};
use crate::geo::{Projector, Utm, dms_to_decimal};
use crate::record::{ImageRecord, Orientation, Skipped};

/// Timestamp layouts seen in EXIF text and in the reader's rendering of it.
const TIMESTAMP_FORMATS: &[&str] = &["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Records built from a directory plus every file that could not be read.
#[derive(Debug, Default, Serialize)]
pub struct ExtractionReport {
    pub records: Vec<ImageRecord>,
    pub skipped: Vec<Skipped>,
}

/// Build the normalized record for one image, projecting with WGS84 UTM.
pub fn extract(path: &Path) -> Result<ImageRecord, Error> {
    extract_with(path, &Utm::wgs84())
}

/// Build the normalized record for one image.
///
/// Only a file that cannot be opened as an image is an error. Missing tags,
/// a bad GPS block or a failed projection just leave the fields absent.
pub fn extract_with(path: &Path, projector: &dyn Projector) -> Result<ImageRecord, Error> {
    let unreadable = |reason: String| Error::UnreadableImage {
        path: path.to_path_buf(),
        reason,
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| unreadable("path has no file name".into()))?;

    image::image_dimensions(path).map_err(|e| unreadable(e.to_string()))?;

    let tags = match read_tags(path) {
        Ok(tags) => tags,
        Err(e) => {
            log::warn!("Failed to read EXIF from {}: {e:#}", path.display());
            RawTags::default()
        }
    };

    let mut record = ImageRecord::new(filename, path);
    record.orientation = tags.orientation.map(Orientation::from_exif).unwrap_or_default();
    record.capture_timestamp = capture_timestamp(&tags);

    if let Some(ref gps) = tags.gps {
        match gps_to_decimal(gps) {
            Ok((latitude, longitude)) => {
                record.latitude = Some(latitude);
                record.longitude = Some(longitude);
                match projector.project(latitude, longitude, None) {
                    Ok(projected) => record.projected = Some(projected),
                    Err(e) => log::warn!("{}: {e}", record.filename),
                }
            }
            Err(e) => log::warn!("{}: ignoring GPS block: {e}", record.filename),
        }
    }

    record.custom_name = tags.artist;
    record.description = tags.description;
    Ok(record)
}

/// Extract every path in order, turning per-file failures into skips.
pub fn extract_all(paths: &[PathBuf]) -> ExtractionReport {
    let projector = Utm::wgs84();
    let mut report = ExtractionReport::default();

    for path in paths {
        match extract_with(path, &projector) {
            Ok(record) => report.records.push(record),
            Err(e) => {
                log::warn!("Skipping {}: {e}", path.display());
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                report.skipped.push(Skipped::new(name, e));
            }
        }
    }

    log_summary(paths.len(), &report);
    report
}

/// Put records in the configured order. Stable, so equal keys keep input order.
pub fn sort_records(records: &mut [ImageRecord], order: RecordOrder) {
    match order {
        RecordOrder::Filename => records.sort_by(|a, b| a.filename.cmp(&b.filename)),
        RecordOrder::CaptureTime => records.sort_by(|a, b| {
            let by_time = match (a.capture_timestamp, b.capture_timestamp) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_time.then_with(|| a.filename.cmp(&b.filename))
        }),
    }
}

/// DateTimeOriginal first, the generic DateTime tag as fallback.
fn capture_timestamp(tags: &RawTags) -> Option<NaiveDateTime> {
    tags.date_time_original
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| tags.modify_date.as_deref().and_then(parse_timestamp))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    // Offsets and sub-seconds trail the 19-char body; the body is local time
    let body = raw.get(..19).unwrap_or(raw);
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(body, fmt).ok())
}

fn gps_to_decimal(gps: &RawGps) -> Result<(f64, f64), Error> {
    let [lat_d, lat_m, lat_s] = gps.latitude;
    let [lon_d, lon_m, lon_s] = gps.longitude;
    let latitude = dms_to_decimal(lat_d, lat_m, lat_s, gps.latitude_ref)?;
    let longitude = dms_to_decimal(lon_d, lon_m, lon_s, gps.longitude_ref)?;

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::Conversion(format!(
            "coordinates out of range ({latitude}, {longitude})"
        )));
    }
    Ok((latitude, longitude))
}

fn log_summary(found: usize, report: &ExtractionReport) {
    let records = &report.records;
    let count = |f: fn(&ImageRecord) -> bool| records.iter().filter(|r| f(r)).count();

    log::info!(
        "Extraction: {found} files, {} records, {} skipped",
        records.len(),
        report.skipped.len()
    );
    log::info!(
        "  with coordinates: {}, projection failed: {}, with timestamp: {}",
        count(|r| r.coordinates().is_some()),
        count(|r| r.coordinates().is_some() && r.projected.is_none()),
        count(|r| r.capture_timestamp.is_some()),
    );
    log::info!(
        "  with description: {}, with custom name: {}",
        count(|r| r.description.as_deref().is_some_and(|d| !d.trim().is_empty())),
        count(|r| r.custom_name.as_deref().is_some_and(|c| !c.trim().is_empty())),
    );
}
