//! EXIF metadata reading and writing.
//!
//! This module provides two main functions:
//!
//! - [`read_tags`]: Read the handful of tags the mapper uses from any supported image
//! - [`write_tags`]: Rewrite ImageDescription and Artist in place, touching nothing else
//!
//! Both route on [`ImageKind`](crate::pipeline::ImageKind). PNG is read from
//! its eXIf chunk. On write, JPEG and PNG get their IFD0 rebuilt through
//! img-parts, and a TIFF file has its own IFD0 rebuilt in place.

mod reader;
mod writer;

pub use reader::{RawGps, RawTags, read_tags};
pub use writer::{MetadataEdit, write_tags};
