//! Flat table (CSV) and the cell formatting shared with the spreadsheet.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use super::{COLUMNS, ExportFormat, Rendered, Renderer};
use crate::record::ImageRecord;

pub(crate) const TABLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Table cells for one record, in [`COLUMNS`] order. Absent values are empty.
pub fn row_cells(record: &ImageRecord) -> [String; COLUMNS.len()] {
    let projected = record.projected.as_ref();
    [
        record.filename.clone(),
        record.custom_name_or_empty().to_string(),
        record.description_or_empty().to_string(),
        fixed(record.latitude, 7),
        fixed(record.longitude, 7),
        fixed(projected.map(|p| p.easting), 2),
        fixed(projected.map(|p| p.northing), 2),
        projected.map(|p| p.zone.to_string()).unwrap_or_default(),
        projected.map(|p| p.hemisphere.to_string()).unwrap_or_default(),
        record.capture_timestamp.map(format_timestamp).unwrap_or_default(),
    ]
}

pub(crate) fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TABLE_TIMESTAMP_FORMAT).to_string()
}

fn fixed(value: Option<f64>, decimals: usize) -> String {
    value.map(|v| format!("{v:.decimals$}")).unwrap_or_default()
}

/// UTF-8 CSV with a header row and one row per record.
pub struct CsvRenderer;

impl Renderer for CsvRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn render(&self, records: &[ImageRecord]) -> Result<Rendered> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(COLUMNS).context("Failed to write CSV header")?;
        for record in records {
            writer
                .write_record(row_cells(record))
                .with_context(|| format!("Failed to write CSV row for {}", record.filename))?;
        }
        let bytes = writer.into_inner().context("Failed to finish CSV")?;

        Ok(Rendered {
            bytes,
            entries: records.len(),
            failures: Vec::new(),
        })
    }
}
