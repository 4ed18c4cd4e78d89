//! Spreadsheet with an embedded thumbnail per row.
//!
//! Column A holds the photo, the table columns start at B. The sheet is
//! protected with only the custom-name and description cells unlocked, which
//! is what the updater later reads back.

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, FormatAlign, Image, Workbook, Worksheet};

use super::table::row_cells;
use super::{COL_CUSTOM_NAME, COL_DESCRIPTION, COLUMNS, ExportFormat, ItemFailure, Rendered, Renderer};
use crate::record::ImageRecord;
use crate::thumbnail::prepare_thumbnail;

pub const SHEET_NAME: &str = "Coordenadas_UTM_Data";
pub const PHOTO_HEADER: &str = "Foto";

// Pixel → Excel unit conversions
const COLUMN_WIDTH_PER_PIXEL: f64 = 0.15;
const ROW_HEIGHT_PER_PIXEL: f64 = 0.75;
const ROW_PADDING_POINTS: f64 = 5.0;

/// Excel's per-cell text limit.
const MAX_CELL_CHARS: usize = 32_767;

/// Display widths for the table columns, in character units.
const COLUMN_WIDTHS: [f64; COLUMNS.len()] = [24.0, 30.0, 50.0, 14.0, 14.0, 14.0, 14.0, 8.0, 11.0, 20.0];

/// Number format per column for cells written as numbers; `None` keeps the text cell.
const NUMBER_FORMATS: [Option<&str>; COLUMNS.len()] = [
    None,
    None,
    None,
    Some("0.0000000"),
    Some("0.0000000"),
    Some("0.00"),
    Some("0.00"),
    Some("0"),
    None,
    None,
];

pub struct XlsxRenderer {
    pub thumbnail_width: u32,
    pub thumbnail_quality: u8,
}

impl Renderer for XlsxRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Xlsx
    }

    fn render(&self, records: &[ImageRecord]) -> Result<Rendered> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        let header = Format::new().set_bold().set_align(FormatAlign::Center);
        let locked = Format::new().set_align(FormatAlign::VerticalCenter);
        let editable = Format::new()
            .set_unlocked()
            .set_text_wrap()
            .set_align(FormatAlign::VerticalCenter);
        let number_formats: Vec<Option<Format>> = NUMBER_FORMATS
            .iter()
            .map(|nf| nf.map(|nf| locked.clone().set_num_format(nf)))
            .collect();

        worksheet.write_string_with_format(0, 0, PHOTO_HEADER, &header)?;
        worksheet.set_column_width(0, f64::from(self.thumbnail_width) * COLUMN_WIDTH_PER_PIXEL)?;
        for (i, name) in COLUMNS.iter().enumerate() {
            let col = (i + 1) as u16;
            worksheet.write_string_with_format(0, col, *name, &header)?;
            worksheet.set_column_width(col, COLUMN_WIDTHS[i])?;
        }
        worksheet.set_freeze_panes(1, 0)?;

        let mut failures = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let row = (index + 1) as u32;

            for (i, value) in row_cells(record).iter().enumerate() {
                let col = (i + 1) as u16;
                let is_editable = COLUMNS[i] == COL_CUSTOM_NAME || COLUMNS[i] == COL_DESCRIPTION;
                let format = if is_editable { &editable } else { &locked };
                let mut fail = |reason: String| {
                    failures.push(ItemFailure {
                        format: ExportFormat::Xlsx,
                        filename: record.filename.clone(),
                        reason: format!("{}: {reason}", COLUMNS[i]),
                    })
                };

                let value = match truncate_chars(value, MAX_CELL_CHARS) {
                    Some(cut) => {
                        fail(format!("truncated to {MAX_CELL_CHARS} characters"));
                        cut
                    }
                    None => value.as_str(),
                };
                if let Err(e) = write_cell(worksheet, row, col, value, format, number_formats[i].as_ref()) {
                    fail(format!("{e:#}"));
                    worksheet.write_blank(row, col, format)?;
                }
            }

            match prepare_thumbnail(&record.path, record.orientation, self.thumbnail_width, self.thumbnail_quality)
                .and_then(|thumb| {
                    let image = Image::new_from_buffer(&thumb.bytes).context("Failed to embed thumbnail")?;
                    worksheet.insert_image(row, 0, &image)?;
                    Ok(thumb.height)
                }) {
                Ok(height) => {
                    worksheet.set_row_height(row, f64::from(height) * ROW_HEIGHT_PER_PIXEL + ROW_PADDING_POINTS)?;
                }
                Err(e) => failures.push(ItemFailure {
                    format: ExportFormat::Xlsx,
                    filename: record.filename.clone(),
                    reason: format!("{e:#}"),
                }),
            }
        }

        worksheet.protect();

        let bytes = workbook.save_to_buffer().context("Failed to build XLSX workbook")?;
        Ok(Rendered {
            bytes,
            entries: records.len(),
            failures,
        })
    }
}

/// The prefix of `value` holding at most `max` characters, when it is longer.
fn truncate_chars(value: &str, max: usize) -> Option<&str> {
    value.char_indices().nth(max).map(|(cut, _)| &value[..cut])
}

/// Numeric columns are written as numbers so they sort and sum; everything
/// else, and anything that does not parse, stays text.
fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &str,
    format: &Format,
    number_format: Option<&Format>,
) -> Result<()> {
    if value.is_empty() {
        worksheet.write_blank(row, col, format)?;
        return Ok(());
    }
    if let (Some(number_format), Ok(number)) = (number_format, value.parse::<f64>()) {
        worksheet.write_number_with_format(row, col, number, number_format)?;
        return Ok(());
    }
    worksheet.write_string_with_format(row, col, value, format)?;
    Ok(())
}
