//! Building a paginated document out of captured regions.

use image::RgbaImage;
use log::{debug, info, warn};

use crate::capture::{RasterSource, Region};
use crate::error::{ExportError, Result};
use crate::geometry::PageGeometry;
use crate::paginate::{paginate, Placement};

/// One output page: a single slice of one region.
#[derive(Clone, Debug)]
pub struct Page {
    /// Region the slice was cut from.
    pub region: Region,
    /// Where the slice sits in its block and how large it renders.
    pub placement: Placement,
    /// Whether the page starts a new region after earlier content.
    pub break_before: bool,
    /// Pixel rows of the slice, `placement.slice_height_px` tall.
    pub image: RgbaImage,
}

/// First page of a region, used for bookmarks and summaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutlineEntry {
    pub region: Region,
    pub first_page: usize,
}

/// Ordered pages of one export.
#[derive(Clone, Debug)]
pub struct Document {
    geometry: PageGeometry,
    pages: Vec<Page>,
    outline: Vec<OutlineEntry>,
}

impl Document {
    /// Page size and margin every page was cut against.
    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// All pages in output order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// One entry per captured region, pointing at its first page.
    pub fn outline(&self) -> &[OutlineEntry] {
        &self.outline
    }

    /// Number of pages; never zero for an assembled document.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pages that belong to `region`, in order.
    pub fn pages_for<'a>(&'a self, region: &'a Region) -> impl Iterator<Item = &'a Page> + 'a {
        self.pages.iter().filter(move |page| &page.region == region)
    }
}

/// Captures regions one after another and lays them out on pages.
pub struct DocumentAssembler<'a, S: RasterSource + ?Sized> {
    source: &'a S,
    geometry: PageGeometry,
}

impl<'a, S: RasterSource + ?Sized> DocumentAssembler<'a, S> {
    pub fn new(source: &'a S, geometry: PageGeometry) -> Self {
        Self { source, geometry }
    }

    /// Captures and paginates every region in order.
    ///
    /// Regions that fail to capture are skipped. Every region after the first
    /// one with content starts on a fresh page. Fails with
    /// [`ExportError::EmptyDocument`] when nothing produced a page.
    pub async fn assemble(&self, regions: &[Region]) -> Result<Document> {
        let mut pages = Vec::new();
        let mut outline = Vec::new();
        let mut any_content_added = false;

        for region in regions {
            let block = match self.source.capture(region).await {
                Ok(block) => block,
                Err(failure) => {
                    warn!("skipping {region}: {failure}");
                    continue;
                }
            };

            let placements = paginate(&block, &self.geometry);
            if placements.is_empty() {
                warn!("skipping {region}: no pages");
                continue;
            }

            debug!(
                "{region}: {}x{}px block on {} page(s)",
                block.width(),
                block.height(),
                placements.len()
            );
            outline.push(OutlineEntry {
                region: region.clone(),
                first_page: pages.len(),
            });

            for (index, placement) in placements.into_iter().enumerate() {
                let image = block.slice(placement.source_y_offset, placement.slice_height_px)?;
                pages.push(Page {
                    region: region.clone(),
                    placement,
                    break_before: index == 0 && any_content_added,
                    image,
                });
            }
            any_content_added = true;
        }

        if !any_content_added {
            return Err(ExportError::EmptyDocument);
        }

        info!(
            "assembled {} page(s) from {} of {} region(s)",
            pages.len(),
            outline.len(),
            regions.len()
        );
        Ok(Document {
            geometry: self.geometry,
            pages,
            outline,
        })
    }
}
