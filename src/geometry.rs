//! Page and slide geometry.
//!
//! All measurements are PDF points (1/72 inch). The content area is the page
//! minus a uniform margin on every side, and it is validated to be non-empty
//! when the geometry is created so later stages never divide by zero.

use crate::error::{ExportError, Result};

/// Millimetres per PDF point.
pub const MM_PER_PT: f64 = 25.4 / 72.0;

/// English Metric Units per PDF point, used by the slide deck writer.
pub const EMU_PER_PT: f64 = 12_700.0;

/// Fixed page size and margin for one export.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    page_width: f64,
    page_height: f64,
    margin: f64,
}

impl PageGeometry {
    /// Creates a geometry after checking that every dimension is positive and
    /// that the margins leave a usable content area.
    pub fn new(page_width: f64, page_height: f64, margin: f64) -> Result<Self> {
        let all_finite = [page_width, page_height, margin]
            .iter()
            .all(|value| value.is_finite());
        if !all_finite || page_width <= 0.0 || page_height <= 0.0 || margin <= 0.0 {
            return Err(ExportError::Config(format!(
                "page {page_width}x{page_height}pt with margin {margin}pt must be positive"
            )));
        }

        let geometry = Self {
            page_width,
            page_height,
            margin,
        };
        if geometry.content_width() <= 0.0 || geometry.content_height() <= 0.0 {
            return Err(ExportError::Config(format!(
                "margin {margin}pt leaves no content area on a {page_width}x{page_height}pt page"
            )));
        }

        Ok(geometry)
    }

    /// A4 portrait with a 20pt margin.
    pub fn a4_portrait() -> Self {
        Self {
            page_width: 595.28,
            page_height: 841.89,
            margin: 20.0,
        }
    }

    /// US Letter portrait with a 20pt margin.
    pub fn letter_portrait() -> Self {
        Self {
            page_width: 612.0,
            page_height: 792.0,
            margin: 20.0,
        }
    }

    /// Widescreen 16:9 slide (13.333in x 7.5in) with a half-inch margin.
    pub fn widescreen_slide() -> Self {
        Self {
            page_width: 960.0,
            page_height: 540.0,
            margin: 36.0,
        }
    }

    /// Returns a copy with a different margin, validated like [`PageGeometry::new`].
    pub fn with_margin(self, margin: f64) -> Result<Self> {
        Self::new(self.page_width, self.page_height, margin)
    }

    /// Full page width in points.
    pub fn page_width(&self) -> f64 {
        self.page_width
    }

    /// Full page height in points.
    pub fn page_height(&self) -> f64 {
        self.page_height
    }

    /// Margin applied on all four sides, in points.
    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Width available for images once both side margins are removed.
    pub fn content_width(&self) -> f64 {
        self.page_width - 2.0 * self.margin
    }

    /// Height available for images once top and bottom margins are removed.
    pub fn content_height(&self) -> f64 {
        self.page_height - 2.0 * self.margin
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4_portrait()
    }
}

/// Destination rectangle of an image inside a page, measured from the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Scales `width` x `height` to fit entirely inside `bounds`, centred, keeping
/// the aspect ratio ("contain" fit).
pub fn contain(width: f64, height: f64, bounds: Rect) -> Rect {
    if width <= 0.0 || height <= 0.0 {
        return Rect {
            x: bounds.x + bounds.width / 2.0,
            y: bounds.y + bounds.height / 2.0,
            width: 0.0,
            height: 0.0,
        };
    }

    let scale = (bounds.width / width).min(bounds.height / height);
    let fitted_width = width * scale;
    let fitted_height = height * scale;
    Rect {
        x: bounds.x + (bounds.width - fitted_width) / 2.0,
        y: bounds.y + (bounds.height - fitted_height) / 2.0,
        width: fitted_width,
        height: fitted_height,
    }
}

/// Scales `width` x `height` to cover `bounds` entirely, centred, keeping the
/// aspect ratio ("cover" fit). The result may overflow `bounds`.
pub fn cover(width: f64, height: f64, bounds: Rect) -> Rect {
    if width <= 0.0 || height <= 0.0 {
        return bounds;
    }

    let scale = (bounds.width / width).max(bounds.height / height);
    let fitted_width = width * scale;
    let fitted_height = height * scale;
    Rect {
        x: bounds.x + (bounds.width - fitted_width) / 2.0,
        y: bounds.y + (bounds.height - fitted_height) / 2.0,
        width: fitted_width,
        height: fitted_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn content_area_subtracts_both_margins() {
        let geometry = PageGeometry::new(600.0, 800.0, 20.0).expect("valid geometry");
        assert!((geometry.content_width() - 560.0).abs() < EPSILON);
        assert!((geometry.content_height() - 760.0).abs() < EPSILON);
    }

    #[test]
    fn rejects_margins_that_consume_the_page() {
        assert!(matches!(
            PageGeometry::new(100.0, 800.0, 50.0),
            Err(ExportError::Config(_))
        ));
        assert!(matches!(
            PageGeometry::new(100.0, 100.0, 0.0),
            Err(ExportError::Config(_))
        ));
        assert!(matches!(
            PageGeometry::new(f64::NAN, 100.0, 5.0),
            Err(ExportError::Config(_))
        ));
    }

    #[test]
    fn presets_are_valid() {
        for preset in [
            PageGeometry::a4_portrait(),
            PageGeometry::letter_portrait(),
            PageGeometry::widescreen_slide(),
        ] {
            let rebuilt = PageGeometry::new(preset.page_width(), preset.page_height(), preset.margin())
                .expect("preset geometry");
            assert_eq!(rebuilt, preset);
        }
    }

    #[test]
    fn contain_letterboxes_wide_images() {
        let bounds = Rect {
            x: 10.0,
            y: 10.0,
            width: 100.0,
            height: 100.0,
        };
        let fitted = contain(200.0, 100.0, bounds);
        assert!((fitted.width - 100.0).abs() < EPSILON);
        assert!((fitted.height - 50.0).abs() < EPSILON);
        assert!((fitted.x - 10.0).abs() < EPSILON);
        assert!((fitted.y - 35.0).abs() < EPSILON);
    }

    #[test]
    fn cover_fills_bounds() {
        let bounds = Rect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 50.0,
        };
        let fitted = cover(100.0, 100.0, bounds);
        assert!((fitted.width - 100.0).abs() < EPSILON);
        assert!((fitted.height - 100.0).abs() < EPSILON);
        assert!((fitted.y + 25.0).abs() < EPSILON);
    }
}
