//! Paged-image PDF output.
//!
//! Every document page becomes one PDF page of the document geometry. The
//! slice is drawn edge to edge across the content width, anchored at the top
//! left margin.

use std::io::{BufWriter, Cursor, Seek, Write};

use image::{DynamicImage, RgbImage, RgbaImage};
use log::debug;
use printpdf::{Image, Mm, PdfDocument};

use super::Exporter;
use crate::assemble::Document;
use crate::error::{ExportError, Result};
use crate::geometry::MM_PER_PT;

/// Pixels map one-to-one onto points at this resolution, which keeps the
/// scale factors below equal to points per source pixel.
const POINTS_DPI: f64 = 72.0;

/// Writes documents as PDF files with one raster image per page.
#[derive(Clone, Debug)]
pub struct PdfExporter {
    title: String,
}

impl PdfExporter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Renders the document to PDF bytes.
    pub fn render(&self, document: &Document) -> Result<Vec<u8>> {
        let geometry = document.geometry();
        let page_width = Mm(geometry.page_width() * MM_PER_PT);
        let page_height = Mm(geometry.page_height() * MM_PER_PT);

        let (pdf, first_page, first_layer) =
            PdfDocument::new(self.title.as_str(), page_width, page_height, "Page 1");
        let mut target = (first_page, first_layer);

        for (index, page) in document.pages().iter().enumerate() {
            if index > 0 {
                target = pdf.add_page(page_width, page_height, format!("Page {}", index + 1));
            }
            let layer = pdf.get_page(target.0).get_layer(target.1);

            let placement = page.placement;
            let (px_width, px_height) = page.image.dimensions();
            if px_width == 0 || px_height == 0 {
                return Err(ExportError::Encoding(format!(
                    "page {} has an empty slice",
                    index + 1
                )));
            }

            let top = geometry.page_height() - geometry.margin() - placement.rendered_height;
            let image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(flatten(&page.image)));
            image.add_to_layer(
                layer,
                Some(Mm(geometry.margin() * MM_PER_PT)),
                Some(Mm(top * MM_PER_PT)),
                None,
                Some(placement.rendered_width / f64::from(px_width)),
                Some(placement.rendered_height / f64::from(px_height)),
                Some(POINTS_DPI),
            );
            debug!(
                "pdf page {}: {}x{}px at {:.2}x{:.2}pt",
                index + 1,
                px_width,
                px_height,
                placement.rendered_width,
                placement.rendered_height
            );
        }

        let mut writer = BufWriter::new(Cursor::new(Vec::new()));
        pdf.save(&mut writer)
            .map_err(|err| ExportError::Failed(format!("PDF writer: {err}")))?;
        let cursor = writer
            .into_inner()
            .map_err(|err| ExportError::Failed(format!("PDF writer: {}", err.error())))?;
        Ok(cursor.into_inner())
    }
}

impl Exporter for PdfExporter {
    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn export<W: Write + Seek>(&self, document: &Document, writer: &mut W) -> Result<()> {
        let bytes = self.render(document)?;
        writer.write_all(&bytes)?;
        Ok(())
    }
}

/// Composites the slice over white; PDF image objects carry no alpha here.
fn flatten(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let over_white = |channel: u8| -> u8 {
            ((u16::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255) as u8
        };
        image::Rgb([over_white(r), over_white(g), over_white(b)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_blends_transparency_onto_white() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgba([0, 0, 0, 0]));
        image.put_pixel(1, 0, image::Rgba([10, 20, 30, 255]));
        let flat = flatten(&image);
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 0).0, [10, 20, 30]);
    }
}
