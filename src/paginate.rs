//! Splitting a captured block into page-sized slices.
//!
//! A block is scaled to the full content width of the page. If the scaled
//! height fits the content height it occupies exactly one page; otherwise it
//! is cut into full-width horizontal slices, each as tall as one page of
//! content, with a possibly shorter final slice. The block's own pixel width is
//! the scale reference for every computation so aspect ratio errors stay
//! below one pixel.

use log::debug;

use crate::geometry::PageGeometry;
use crate::raster::RasterBlock;

/// Absorbs floating point noise when converting page heights to pixel rows.
const ROW_EPSILON: f64 = 1e-9;

/// One page's worth of a block: the source rows to show and their rendered size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// First source row of the slice.
    pub source_y_offset: u32,
    /// Number of source rows in the slice.
    pub slice_height_px: u32,
    /// Rendered width in points.
    pub rendered_width: f64,
    /// Rendered height in points.
    pub rendered_height: f64,
}

/// Splits `block` into one placement per output page.
pub fn paginate(block: &RasterBlock, geometry: &PageGeometry) -> Vec<Placement> {
    paginate_extent(block.width(), block.height(), geometry)
}

/// Same as [`paginate`] but driven by dimensions only.
///
/// A zero width or height yields no placements.
pub fn paginate_extent(width: u32, height: u32, geometry: &PageGeometry) -> Vec<Placement> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let content_width = geometry.content_width();
    let content_height = geometry.content_height();
    let native_width = f64::from(width);
    let scaled_height = f64::from(height) / native_width * content_width;

    if scaled_height <= content_height {
        debug!("block {width}x{height}px fits one page at {scaled_height:.2}pt");
        return vec![Placement {
            source_y_offset: 0,
            slice_height_px: height,
            rendered_width: content_width,
            rendered_height: scaled_height,
        }];
    }

    let rows_per_page = full_page_rows(width, geometry);
    let mut placements = Vec::with_capacity((height / rows_per_page) as usize + 1);
    let mut cursor = 0u32;
    let mut remaining = height;

    while remaining > 0 {
        let slice_height_px = rows_per_page.min(remaining);
        placements.push(Placement {
            source_y_offset: cursor,
            slice_height_px,
            rendered_width: content_width,
            rendered_height: f64::from(slice_height_px) / native_width * content_width,
        });
        cursor += slice_height_px;
        remaining -= slice_height_px;
    }

    debug!(
        "block {width}x{height}px split into {} pages of up to {rows_per_page} rows",
        placements.len()
    );
    placements
}

/// Largest number of source rows whose rendered height at content width does
/// not exceed the content height. Never less than one row.
fn full_page_rows(width: u32, geometry: &PageGeometry) -> u32 {
    let exact = geometry.content_height() / geometry.content_width() * f64::from(width);
    let rows = (exact + ROW_EPSILON).floor();
    if rows >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        (rows as u32).max(1)
    }
}
