//! Round-trip update: read an edited table and write its custom-name and
//! description columns back into the source images.

use anyhow::{Context, Result};
use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::Error;
use crate::exif::{MetadataEdit, RawTags, read_tags, write_tags};
use crate::export::spreadsheet::SHEET_NAME;
use crate::export::{COL_CUSTOM_NAME, COL_DESCRIPTION, COL_FILENAME};
use crate::pipeline::collect_images;
use crate::record::{Skipped, UpdateRow};

/// Final state of one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RowOutcome {
    Updated,
    /// Matched, but the file already holds the edited values.
    Unchanged,
    WriteFailed(String),
    Unmatched(String),
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateReport {
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: Vec<Skipped>,
    /// Nothing was written; `updated` counts files that would have changed.
    pub dry_run: bool,
}

/// Read the edited rows from a spreadsheet (`.xlsx`) or flat table (`.csv`).
///
/// Only the `Nome`, `NomePersonalizado` and `Descricao` columns are read; any
/// other column is ignored. A table without `Nome` is an error. An editable
/// column that is missing altogether yields `None` edits, so that tag is left
/// alone.
pub fn read_update_rows(path: &Path) -> Result<Vec<UpdateRow>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let (header, rows) = match ext.as_str() {
        "xlsx" | "xlsm" => read_xlsx(path)?,
        "csv" => read_csv(path)?,
        _ => anyhow::bail!("Unsupported table format: {}", path.display()),
    };
    rows_from_table(&header, rows)
}

fn read_xlsx(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let range = match workbook.worksheet_range(SHEET_NAME) {
        Ok(range) => range,
        Err(_) => {
            log::info!("Sheet '{SHEET_NAME}' not found, reading the first sheet");
            workbook
                .worksheet_range_at(0)
                .context("Workbook has no sheets")?
                .context("Failed to read the first sheet")?
        }
    };
    Ok(split_header(range_to_text(&range)))
}

fn range_to_text(range: &Range<Data>) -> Vec<Vec<String>> {
    // Numeric cells come back as their text form, e.g. 123.0 → "123"
    range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("Failed to read CSV row")?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    let (mut header, rows) = split_header(rows);
    if let Some(first) = header.first_mut() {
        *first = first.trim_start_matches('\u{feff}').to_string();
    }
    Ok((header, rows))
}

fn split_header(mut rows: Vec<Vec<String>>) -> (Vec<String>, Vec<Vec<String>>) {
    if rows.is_empty() {
        return (Vec::new(), rows);
    }
    let header = rows.remove(0);
    (header, rows)
}

fn rows_from_table(header: &[String], rows: Vec<Vec<String>>) -> Result<Vec<UpdateRow>> {
    let column = |name: &str| header.iter().position(|h| h.trim() == name);

    let filename_col = column(COL_FILENAME)
        .ok_or(Error::MissingField(COL_FILENAME))
        .context("Edited table has no file name column")?;
    let custom_name_col = column(COL_CUSTOM_NAME);
    let description_col = column(COL_DESCRIPTION);
    if custom_name_col.is_none() && description_col.is_none() {
        log::warn!("Edited table has neither '{COL_CUSTOM_NAME}' nor '{COL_DESCRIPTION}'; nothing to update");
    }

    // Tag values are kept verbatim so untouched cells compare equal to the file
    let cell = |row: &[String], col: usize| row.get(col).cloned().unwrap_or_default();

    Ok(rows
        .into_iter()
        .filter(|row| row.iter().any(|v| !v.trim().is_empty()))
        .map(|row| UpdateRow {
            filename: cell(&row, filename_col).trim().to_string(),
            custom_name_edited: custom_name_col.map(|c| cell(&row, c)),
            description_edited: description_col.map(|c| cell(&row, c)),
        })
        .collect())
}

/// Apply edited rows to the images in `source_dir`.
pub fn apply(rows: &[UpdateRow], source_dir: &Path) -> Result<UpdateReport> {
    apply_with(rows, source_dir, false)
}

/// Apply edited rows, matching each one to a file by exact name.
///
/// Every row ends in exactly one [`RowOutcome`]. Rows that are not applied are
/// listed in [`UpdateReport::skipped`] with the reason; none of them stops the
/// batch. Only an unreadable source directory is an error.
pub fn apply_with(rows: &[UpdateRow], source_dir: &Path, dry_run: bool) -> Result<UpdateReport> {
    let images: HashMap<String, std::path::PathBuf> = collect_images(source_dir)?
        .into_iter()
        .filter_map(|p| {
            let name = p.file_name()?.to_str()?.to_string();
            Some((name, p))
        })
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.filename.as_str()).or_default() += 1;
    }

    let mut report = UpdateReport {
        dry_run,
        ..Default::default()
    };
    let mut seen = HashSet::new();

    for row in rows {
        let duplicated = counts.get(row.filename.as_str()).copied().unwrap_or(0) > 1;
        let outcome = if duplicated && !row.filename.is_empty() {
            if seen.insert(row.filename.as_str()) {
                log::warn!("'{}' appears in more than one row", row.filename);
            }
            RowOutcome::Unmatched("more than one row names this file".into())
        } else {
            apply_row(row, &images, dry_run)
        };

        match outcome {
            RowOutcome::Updated => report.updated += 1,
            RowOutcome::Unchanged => report.unchanged += 1,
            RowOutcome::WriteFailed(reason) => {
                let path = source_dir.join(&row.filename);
                let e = Error::WriteFailed { path, reason };
                log::warn!("{e}");
                report.skipped.push(Skipped::new(&row.filename, e));
            }
            RowOutcome::Unmatched(reason) => {
                let e = Error::UnmatchedRow {
                    filename: row.filename.clone(),
                    reason,
                };
                log::warn!("{e}");
                report.skipped.push(Skipped::new(&row.filename, e));
            }
        }
    }

    log::info!(
        "Update{}: {} rows, {} updated, {} unchanged, {} skipped",
        if dry_run { " (dry run)" } else { "" },
        rows.len(),
        report.updated,
        report.unchanged,
        report.skipped.len()
    );
    Ok(report)
}

fn apply_row(
    row: &UpdateRow,
    images: &HashMap<String, std::path::PathBuf>,
    dry_run: bool,
) -> RowOutcome {
    if row.filename.is_empty() {
        return RowOutcome::Unmatched("empty file name".into());
    }
    let Some(path) = images.get(&row.filename) else {
        return RowOutcome::Unmatched("no such image in the source directory".into());
    };

    let has_value = [&row.description_edited, &row.custom_name_edited]
        .iter()
        .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()));
    if !has_value {
        return RowOutcome::Unmatched("no values to write".into());
    }

    // Tags the reader cannot see count as absent; the writer decides whether the file is writable
    let current = read_tags(path).unwrap_or_else(|e| {
        log::debug!("{}: no readable tags ({e:#})", row.filename);
        RawTags::default()
    });
    if same_value(&row.description_edited, &current.description)
        && same_value(&row.custom_name_edited, &current.artist)
    {
        log::debug!("{}: already up to date", row.filename);
        return RowOutcome::Unchanged;
    }

    let edit = MetadataEdit {
        description: row.description_edited.as_deref().map(blank_as_removal),
        artist: row.custom_name_edited.as_deref().map(blank_as_removal),
    };

    if dry_run {
        log::info!("Would update {}", row.filename);
        return RowOutcome::Updated;
    }

    match write_tags(path, &edit) {
        Ok(()) => {
            log::info!("Updated {}", row.filename);
            RowOutcome::Updated
        }
        Err(e) => RowOutcome::WriteFailed(format!("{e:#}")),
    }
}

/// Whether an edited cell already matches the tag in the file. A blank cell
/// matches a missing tag.
fn same_value(edited: &Option<String>, current: &Option<String>) -> bool {
    match (edited.as_deref(), current.as_deref()) {
        (None, _) => true,
        (Some(v), Some(c)) if v == c => true,
        (Some(v), c) => v.trim().is_empty() && c.unwrap_or("").is_empty(),
    }
}

/// A whitespace-only cell removes the tag; anything else is written verbatim.
fn blank_as_removal(value: &str) -> String {
    if value.trim().is_empty() { String::new() } else { value.to_string() }
}
