//! Export pipeline: one [`Renderer`] per artifact format, all fed the same
//! ordered records.
//!
//! Renderers share their input contract:
//!
//! - records without a projected coordinate are left off map overlays but keep
//!   their row in tables
//! - output follows input order, nothing is re-sorted
//! - every label comes from [`title::resolve`](crate::title::resolve)
//!
//! A failure on one record is collected as an [`ItemFailure`]; a failure of a
//! whole format is collected as a [`FormatFailure`]. Neither stops the other
//! formats.

pub mod kml;
pub mod spreadsheet;
pub mod table;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::ExportConfig;
use crate::pipeline::write_atomic;
use crate::record::ImageRecord;

/// Fixed column contract shared by the flat table, the spreadsheet and the updater.
pub const COL_FILENAME: &str = "Nome";
pub const COL_CUSTOM_NAME: &str = "NomePersonalizado";
pub const COL_DESCRIPTION: &str = "Descricao";

pub const COLUMNS: [&str; 10] = [
    COL_FILENAME,
    COL_CUSTOM_NAME,
    COL_DESCRIPTION,
    "Latitude",
    "Longitude",
    "Este",
    "Norte",
    "Zona",
    "Hemisferio",
    "DataHora",
];

const MAX_BASE_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Map overlay with embedded photos.
    Kmz,
    /// Map overlay, markup only.
    Kml,
    Csv,
    /// Spreadsheet with thumbnails and editable name/description columns.
    Xlsx,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [Self::Kmz, Self::Kml, Self::Csv, Self::Xlsx];

    /// Appended to the output base name.
    pub fn file_suffix(self) -> &'static str {
        match self {
            Self::Kmz => ".kmz",
            Self::Kml => "_simple.kml",
            Self::Csv => ".csv",
            Self::Xlsx => "_con_fotos.xlsx",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Kmz => "kmz",
            Self::Kml => "kml",
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown export format '{s}' (expected kmz, kml, csv or xlsx)"))
    }
}

/// One record that could not be fully rendered in one format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub format: ExportFormat,
    pub filename: String,
    pub reason: String,
}

/// A whole format that produced no artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatFailure {
    pub format: ExportFormat,
    pub reason: String,
}

/// Renderer output: the artifact bytes plus per-record failures.
#[derive(Debug, Default)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    /// Placemarks or rows written.
    pub entries: usize,
    pub failures: Vec<ItemFailure>,
}

/// One artifact format.
pub trait Renderer {
    fn format(&self) -> ExportFormat;

    /// Render the records, in order, into a complete artifact.
    fn render(&self, records: &[ImageRecord]) -> Result<Rendered>;
}

#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub format: ExportFormat,
    pub path: PathBuf,
    pub entries: usize,
}

/// What an export run produced, and everything it had to leave out.
#[derive(Debug, Default, Serialize)]
pub struct ExportReport {
    pub artifacts: Vec<Artifact>,
    pub format_failures: Vec<FormatFailure>,
    pub item_failures: Vec<ItemFailure>,
}

/// Build the renderer for a format from the export settings.
pub fn renderer_for(format: ExportFormat, config: &ExportConfig, document_name: &str) -> Box<dyn Renderer> {
    match format {
        ExportFormat::Kmz => Box::new(kml::KmzRenderer {
            document_name: document_name.to_string(),
            image_width: config.overlay_image_width,
            image_quality: config.overlay_image_quality,
        }),
        ExportFormat::Kml => Box::new(kml::KmlRenderer {
            document_name: format!("{document_name} (Simple)"),
        }),
        ExportFormat::Csv => Box::new(table::CsvRenderer),
        ExportFormat::Xlsx => Box::new(spreadsheet::XlsxRenderer {
            thumbnail_width: config.thumbnail_width,
            thumbnail_quality: config.thumbnail_quality,
        }),
    }
}

/// Render every configured format and write each artifact atomically into
/// `output_dir`. Only an unusable output directory is fatal.
pub fn export(
    records: &[ImageRecord],
    output_dir: &Path,
    folder_name: &str,
    config: &ExportConfig,
) -> Result<ExportReport> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let base_name = output_base_name(folder_name);
    let document_name = format!("Coords {folder_name}");
    let mut report = ExportReport::default();

    for &format in &config.formats {
        let renderer = renderer_for(format, config, &document_name);
        let path = output_dir.join(format!("{base_name}{}", format.file_suffix()));
        log::info!("Rendering {format} ({} records)...", records.len());

        let rendered = match renderer.render(records) {
            Ok(rendered) => rendered,
            Err(e) => {
                log::warn!("{format} export failed: {e:#}");
                report.format_failures.push(FormatFailure { format, reason: format!("{e:#}") });
                continue;
            }
        };

        for failure in &rendered.failures {
            log::warn!("{format}: {}: {}", failure.filename, failure.reason);
        }
        report.item_failures.extend(rendered.failures);

        match write_atomic(&path, &rendered.bytes) {
            Ok(()) => {
                log::info!("Saved {}", path.display());
                report.artifacts.push(Artifact { format, path, entries: rendered.entries });
            }
            Err(e) => {
                log::warn!("Failed to save {}: {e:#}", path.display());
                report.format_failures.push(FormatFailure { format, reason: format!("{e:#}") });
            }
        }
    }

    Ok(report)
}

/// `coordenadas_utm_<folder>_ordenado`, made safe as a file name.
pub fn output_base_name(folder_name: &str) -> String {
    sanitize_filename(&format!("coordenadas_utm_{folder_name}_ordenado"))
}

/// Strip characters that are invalid in file names, turn spaces into
/// underscores and cap the length.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .map(|c| if c == ' ' { '_' } else { c })
        .take(MAX_BASE_NAME_CHARS)
        .collect()
}
