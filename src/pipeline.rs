use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{ExportConfig, UpdateConfig};
use crate::export::{self, ExportReport};
use crate::extract::{extract_all, sort_records};
use crate::record::Skipped;
use crate::update::{self, UpdateReport, read_update_rows};

/// Supported image extensions.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff"];

/// Folder name used when the source directory has none (e.g. `/`).
const FALLBACK_FOLDER_NAME: &str = "fotos";

/// The container format of an image, which decides how its metadata is written.
///
/// Use [`ImageKind::from_path`] to detect the format from a file extension.
///
/// # Example
///
/// ```rust
/// use exif_mapper::pipeline::ImageKind;
/// use std::path::Path;
///
/// let kind = ImageKind::from_path(Path::new("photo.JPG"));
/// assert_eq!(kind, Some(ImageKind::Jpeg));
///
/// let kind = ImageKind::from_path(Path::new("clip.mp4"));
/// assert_eq!(kind, None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageKind {
    /// JPEG: EXIF in the APP1 segment
    Jpeg,
    /// PNG: EXIF in the eXIf chunk
    Png,
    /// TIFF: the file itself is the EXIF block
    Tiff,
}

impl ImageKind {
    /// Determine the image kind from a file path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }
}

/// Outcome of a full export run over one directory.
#[derive(Debug, Serialize)]
pub struct ExportRun {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Images found in the directory.
    pub found: usize,
    /// Records that reached the renderers.
    pub records: usize,
    /// Files that could not be read as images.
    pub skipped: Vec<Skipped>,
    pub export: ExportReport,
}

/// Collect the supported images directly inside `dir`, sorted by file name.
///
/// Subdirectories are not entered. A missing or unreadable directory is an
/// error, since there is nothing meaningful to do without it.
///
/// # Example
///
/// ```rust,no_run
/// use exif_mapper::pipeline::collect_images;
/// use std::path::Path;
///
/// let images = collect_images(Path::new("./photos")).unwrap();
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Source directory does not exist: {}", dir.display());
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        let p = entry.path();
        if p.is_file() && is_supported_image(p) {
            images.push(p.to_path_buf());
        }
    }

    Ok(images)
}

/// Check if a file has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Replace `path` with `bytes` through a temporary file in the same directory.
///
/// Readers see either the old file or the complete new one. An existing
/// file's permissions carry over to the replacement.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(bytes).context("Failed to write temporary file")?;
    tmp.as_file().sync_all().context("Failed to flush temporary file")?;

    if let Ok(metadata) = std::fs::metadata(path) {
        if let Err(e) = std::fs::set_permissions(tmp.path(), metadata.permissions()) {
            log::debug!("Could not copy permissions to {}: {e}", path.display());
        }
    }

    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Name of the source folder, as used in artifact and document names.
pub fn folder_name(dir: &Path) -> String {
    let resolved = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_FOLDER_NAME.to_string())
}

/// Export everything in `source_dir`: collect, extract, order, render.
///
/// Per-file and per-format problems end up in the returned [`ExportRun`];
/// only a missing source directory or an unusable output directory fail.
///
/// # Example
///
/// ```rust,no_run
/// use exif_mapper::config::Config;
/// use exif_mapper::pipeline::run_export;
/// use std::path::Path;
///
/// let config = Config::load(None).unwrap();
/// let run = run_export(Path::new("./photos"), &config.export).unwrap();
/// for artifact in &run.export.artifacts {
///     println!("{}: {}", artifact.format, artifact.path.display());
/// }
/// for skipped in &run.skipped {
///     println!("skipped {}: {}", skipped.name, skipped.reason);
/// }
/// ```
pub fn run_export(source_dir: &Path, config: &ExportConfig) -> Result<ExportRun> {
    let images = collect_images(source_dir)?;
    log::info!("Found {} images in {}", images.len(), source_dir.display());

    let mut extraction = extract_all(&images);
    sort_records(&mut extraction.records, config.order);

    let output_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| source_dir.to_path_buf());
    let report = export::export(&extraction.records, &output_dir, &folder_name(source_dir), config)?;

    Ok(ExportRun {
        source_dir: source_dir.to_path_buf(),
        output_dir,
        found: images.len(),
        records: extraction.records.len(),
        skipped: extraction.skipped,
        export: report,
    })
}

/// Read an edited table and write its edits into the images of `source_dir`.
pub fn run_update(source_dir: &Path, table: &Path, config: &UpdateConfig) -> Result<UpdateReport> {
    let rows = read_update_rows(table)
        .with_context(|| format!("Failed to read edited table {}", table.display()))?;
    log::info!("Read {} rows from {}", rows.len(), table.display());
    update::apply_with(&rows, source_dir, config.dry_run)
}
