//! Sources that turn a visual region of the manual into a [`RasterBlock`].
//!
//! The assembler only talks to the [`RasterSource`] trait. Three adapters are
//! provided: [`MemorySource`] for blocks captured elsewhere, [`SnapshotSource`]
//! for PNG screenshots written to a directory by an external tool, and
//! [`ComposedSource`] which draws the regions itself from the manual data.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::error::CaptureFailure;
use crate::raster::RasterBlock;

mod compose;
mod snapshot;

pub use compose::{ComposeStyle, ComposedSource};
pub use snapshot::SnapshotSource;

/// A named visual region of the manual preview.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Region {
    /// Title, header image and introduction text.
    Header,
    /// A single step, addressed by its position and its stable identifier.
    Step {
        /// Zero-based position in the step list.
        index: usize,
        /// Identifier of the step, unaffected by reordering.
        id: String,
    },
}

impl Region {
    /// Element identifier used by screenshot tools and snapshot file names.
    pub fn element_id(&self) -> String {
        match self {
            Self::Header => "pdf-header-content".to_owned(),
            Self::Step { index, .. } => format!("pdf-step-content-{index}"),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "header"),
            Self::Step { index, .. } => write!(f, "step {}", index + 1),
        }
    }
}

/// Capability that rasterizes one region at a time.
///
/// Implementations may suspend while images referenced by the region finish
/// loading. Callers capture regions sequentially.
#[async_trait]
pub trait RasterSource: Send + Sync {
    /// Captures the region or explains why it produced no pixels.
    async fn capture(&self, region: &Region) -> Result<RasterBlock, CaptureFailure>;
}

/// Pre-captured blocks keyed by region.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    blocks: HashMap<Region, RasterBlock>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a block for the region and returns the updated source.
    pub fn with_block(mut self, region: Region, block: RasterBlock) -> Self {
        self.insert(region, block);
        self
    }

    /// Registers a block for the region, replacing any previous one.
    pub fn insert(&mut self, region: Region, block: RasterBlock) {
        self.blocks.insert(region, block);
    }
}

#[async_trait]
impl RasterSource for MemorySource {
    async fn capture(&self, region: &Region) -> Result<RasterBlock, CaptureFailure> {
        self.blocks
            .get(region)
            .cloned()
            .ok_or_else(|| CaptureFailure::MissingRegion(region.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn step(index: usize) -> Region {
        Region::Step {
            index,
            id: format!("id-{index}"),
        }
    }

    #[test]
    fn element_ids_follow_preview_markup() {
        assert_eq!(Region::Header.element_id(), "pdf-header-content");
        assert_eq!(step(3).element_id(), "pdf-step-content-3");
        assert_eq!(step(3).to_string(), "step 4");
    }

    #[tokio::test]
    async fn memory_source_reports_missing_regions() {
        let block = RasterBlock::new(RgbaImage::new(2, 2)).expect("block");
        let source = MemorySource::new().with_block(step(0), block.clone());

        assert_eq!(source.capture(&step(0)).await.expect("captured"), block);
        assert!(matches!(
            source.capture(&Region::Header).await,
            Err(CaptureFailure::MissingRegion(Region::Header))
        ));
    }
}
