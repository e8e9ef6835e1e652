//! Error types for manual exports.

use std::io;

use thiserror::Error;

use crate::capture::Region;

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Reasons a region could not be turned into a raster block.
///
/// Capture failures never abort an export on their own; the assembler skips
/// the affected region and continues with the next one.
#[derive(Error, Debug)]
pub enum CaptureFailure {
    /// The source has nothing registered for the region.
    #[error("region {0} is not available")]
    MissingRegion(Region),

    /// The region rendered to an empty pixel buffer.
    #[error("region rendered to an empty {width}x{height} buffer")]
    ZeroArea {
        /// Captured width in pixels.
        width: u32,
        /// Captured height in pixels.
        height: u32,
    },

    /// The region would need a pixel buffer too large to allocate.
    #[error("region would render to an oversized {width}x{height} buffer")]
    TooLarge {
        /// Requested width in pixels.
        width: u64,
        /// Requested height in pixels.
        height: u64,
    },

    /// Image data belonging to the region could not be decoded.
    #[error("image could not be decoded: {0}")]
    Image(String),

    /// Reading snapshot data failed.
    #[error("I/O error while capturing: {0}")]
    Io(#[from] io::Error),
}

impl From<image::ImageError> for CaptureFailure {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

/// Terminal errors that abort an export.
#[derive(Error, Debug)]
pub enum ExportError {
    /// No region produced any page.
    #[error("nothing to export: the manual produced no content")]
    EmptyDocument,

    /// A slice could not be cut or an image could not be embedded.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// Geometry or export options are unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Another export is still running on the same exporter.
    #[error("an export is already in progress")]
    ExportInProgress,

    /// Writing the output file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other failure while writing the output document.
    #[error("export failed: {0}")]
    Failed(String),

    /// Section bookmarks could not be embedded into the PDF.
    #[cfg(feature = "bookmarks")]
    #[error("bookmark injection failed: {0}")]
    Bookmarks(#[from] crate::bookmarks::BookmarkError),
}

impl From<image::ImageError> for ExportError {
    fn from(err: image::ImageError) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Failed(format!("slide deck container: {err}"))
    }
}
