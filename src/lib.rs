//! # exif-mapper
//!
//! Reads GPS position, capture time and descriptive EXIF tags from a folder of
//! photos, projects each position to UTM, and exports the result as a KMZ with
//! embedded photos, a plain KML, a CSV table and an XLSX sheet with thumbnails.
//! Edits made in the sheet's `NomePersonalizado` and `Descricao` columns can be
//! written back into the photos.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exif_mapper::config::Config;
//! use exif_mapper::pipeline::{run_export, run_update};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!
//!     let run = run_export(Path::new("./photos"), &config.export)?;
//!     for artifact in &run.export.artifacts {
//!         println!("{}: {}", artifact.format, artifact.path.display());
//!     }
//!
//!     // After editing the spreadsheet
//!     let report = run_update(
//!         Path::new("./photos"),
//!         Path::new("./photos/photos_con_fotos.xlsx"),
//!         &config.update,
//!     )?;
//!     println!("{} photos updated", report.updated);
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! ```rust,no_run
//! use exif_mapper::extract::extract;
//! use exif_mapper::geo::convert;
//! use exif_mapper::title;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let record = extract(Path::new("photo.jpg"))?;
//!     println!("{}", title::resolve(&record));
//!
//!     let utm = convert(-23.55, -46.63)?;
//!     println!("Zona {}{} E {:.2} N {:.2}", utm.zone, utm.hemisphere, utm.easting, utm.northing);
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Read | Write-back |
//! |--------|------|------------|
//! | JPEG (`.jpg`, `.jpeg`) | EXIF | APP1 segment rewrite |
//! | PNG (`.png`) | EXIF (`eXIf`) | `eXIf` chunk rewrite |
//! | TIFF (`.tif`, `.tiff`) | EXIF | IFD0 tags |
//!
//! ## Modules
//!
//! - [`record`]: the image record and its value types
//! - [`geo`]: latitude/longitude to UTM
//! - [`exif`]: tag reading and the write-back path
//! - [`extract`]: builds records from image files
//! - [`title`]: placemark title selection
//! - [`export`]: KMZ, KML, CSV and XLSX renderers
//! - [`update`]: applies edited table rows to the photos
//! - [`pipeline`]: directory scanning and the two end-to-end runs
//! - [`config`]: configuration types and loading/saving

pub mod config;
pub mod error;
pub mod exif;
pub mod export;
pub mod extract;
pub mod geo;
pub mod pipeline;
pub mod record;
pub mod thumbnail;
pub mod title;
pub mod update;

#[cfg(test)]
pub(crate) mod test_utils;
