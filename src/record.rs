use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// EXIF orientation (tag 0x0112), identity plus seven flip/rotate variants.
///
/// Each variant names the transform that must be applied to the stored pixels
/// for the image to display upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    /// Map a raw EXIF value (1–8). Anything else is treated as identity.
    pub fn from_exif(value: u16) -> Self {
        match value {
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }

    pub fn to_exif(self) -> u8 {
        match self {
            Self::Normal => 1,
            Self::FlipHorizontal => 2,
            Self::Rotate180 => 3,
            Self::FlipVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90 => 6,
            Self::Transverse => 7,
            Self::Rotate270 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    pub fn from_latitude(latitude: f64) -> Self {
        if latitude >= 0.0 { Self::North } else { Self::South }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::North => 'N',
            Self::South => 'S',
        }
    }
}

impl Display for Hemisphere {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Planar UTM position derived from latitude/longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectedCoord {
    pub easting: f64,
    pub northing: f64,
    /// UTM zone, 1–60.
    pub zone: u8,
    pub hemisphere: Hemisphere,
}

/// Normalized metadata for one source image.
///
/// Built once per file by [`extract`](crate::extract::extract) and never
/// mutated afterwards within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    /// File name inside the source directory; unique within a run.
    pub filename: String,
    /// Full path of the source file, used to re-read pixels for thumbnails.
    pub path: PathBuf,
    /// Artist tag.
    pub custom_name: Option<String>,
    /// ImageDescription tag.
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub capture_timestamp: Option<NaiveDateTime>,
    pub orientation: Orientation,
    pub projected: Option<ProjectedCoord>,
}

impl ImageRecord {
    /// A record with nothing but its file identity; every tag absent.
    pub fn new(filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            path: path.into(),
            custom_name: None,
            description: None,
            latitude: None,
            longitude: None,
            capture_timestamp: None,
            orientation: Orientation::Normal,
            projected: None,
        }
    }

    /// Latitude and longitude, only when both are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    /// Whether the record can be placed on a map overlay.
    pub fn is_placeable(&self) -> bool {
        self.coordinates().is_some() && self.projected.is_some()
    }

    pub fn custom_name_or_empty(&self) -> &str {
        self.custom_name.as_deref().unwrap_or("")
    }

    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// One row of an edited table, keyed by file name.
///
/// A `None` edit means the column was not present in the table at all, so the
/// corresponding tag is left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRow {
    pub filename: String,
    pub custom_name_edited: Option<String>,
    pub description_edited: Option<String>,
}

/// A file, row or render target that was not processed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    pub name: String,
    pub reason: String,
}

impl Skipped {
    pub fn new(name: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
