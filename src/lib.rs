//! Raster pagination and export for step-by-step manuals.
//!
//! A manual is split into visual regions (an optional header and one region
//! per step). Each region is captured as a pixel block, cut into page-sized
//! slices and written out as a paged-image PDF or a widescreen slide deck.

pub mod assemble;
pub mod capture;
pub mod error;
pub mod export;
pub mod fonts;
pub mod geometry;
pub mod image_ref;
pub mod manual;
pub mod paginate;
pub mod raster;

#[cfg(feature = "bookmarks")]
pub mod bookmarks;

pub use assemble::{Document, DocumentAssembler, OutlineEntry, Page};
pub use error::{CaptureFailure, ExportError, Result};
pub use geometry::PageGeometry;
pub use paginate::{paginate, Placement};
pub use raster::RasterBlock;
