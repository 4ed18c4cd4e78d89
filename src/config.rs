use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::export::ExportFormat;

/// Top-level configuration for exif-mapper.
///
/// Controls which artifacts an export produces and how, and how an update
/// run behaves. Every section falls back to its defaults, so a partial file
/// loads fine.
///
/// # Loading
///
/// ```rust,no_run
/// use exif_mapper::config::Config;
/// use exif_mapper::export::ExportFormat;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.export.formats = vec![ExportFormat::Csv];
/// config.update.dry_run = true;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub export: ExportConfig,
    pub update: UpdateConfig,
}

/// Order of records fed to the renderers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrder {
    /// Capture time, then file name; records without a timestamp go last.
    #[default]
    CaptureTime,
    Filename,
}

/// Export behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Artifacts to produce, in this order.
    pub formats: Vec<ExportFormat>,
    /// Where artifacts are written. `None` means the source directory.
    pub output_dir: Option<PathBuf>,
    pub order: RecordOrder,
    /// Width of the photo embedded in each KMZ placemark bubble.
    pub overlay_image_width: u32,
    pub overlay_image_quality: u8,
    /// Width of the spreadsheet thumbnails.
    pub thumbnail_width: u32,
    pub thumbnail_quality: u8,
}

/// Update behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// If `true`, report what would be written without modifying any files.
    pub dry_run: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            formats: ExportFormat::ALL.to_vec(),
            output_dir: None,
            order: RecordOrder::default(),
            overlay_image_width: 400,
            overlay_image_quality: 85,
            thumbnail_width: 250,
            thumbnail_quality: 90,
        }
    }
}

impl Config {
    /// Resolve the config file path: same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::debug!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}
