use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Per-item failures raised by extraction, conversion, rendering and update.
///
/// These never escape a batch: callers turn them into [`Skipped`](crate::record::Skipped)
/// entries at the item boundary. Run-level failures use `anyhow` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The file cannot be opened or decoded as an image at all.
    UnreadableImage { path: PathBuf, reason: String },
    /// Coordinate outside its domain, or the projection cannot represent it.
    Conversion(String),
    /// An expected tag or column is absent.
    MissingField(&'static str),
    /// A metadata write could not be persisted; the file is unchanged.
    WriteFailed { path: PathBuf, reason: String },
    /// An edited-table row has no (or no unambiguous) source file.
    UnmatchedRow { filename: String, reason: String },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnreadableImage { path, reason } => {
                write!(f, "cannot read {} as an image: {reason}", path.display())
            }
            Self::Conversion(reason) => write!(f, "coordinate conversion failed: {reason}"),
            Self::MissingField(name) => write!(f, "missing field: {name}"),
            Self::WriteFailed { path, reason } => {
                write!(f, "failed to write metadata to {}: {reason}", path.display())
            }
            Self::UnmatchedRow { filename, reason } => write!(f, "row '{filename}' not applied: {reason}"),
        }
    }
}

impl std::error::Error for Error {}
