use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;

use super::{RasterSource, Region};
use crate::error::CaptureFailure;
use crate::raster::RasterBlock;

/// Reads region screenshots from a directory.
///
/// Each region is expected at `<directory>/<element id>.png`, for example
/// `pdf-header-content.png` or `pdf-step-content-0.png`. Any format the
/// `image` crate can sniff is accepted despite the extension.
#[derive(Clone, Debug)]
pub struct SnapshotSource {
    directory: PathBuf,
}

impl SnapshotSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Location of the screenshot for `region`.
    pub fn path_for(&self, region: &Region) -> PathBuf {
        self.directory.join(format!("{}.png", region.element_id()))
    }
}

#[async_trait]
impl RasterSource for SnapshotSource {
    async fn capture(&self, region: &Region) -> Result<RasterBlock, CaptureFailure> {
        let path = self.path_for(region);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(CaptureFailure::MissingRegion(region.clone()));
            }
            Err(err) => return Err(err.into()),
        };
        debug!("read {} bytes of {} from {}", bytes.len(), region, path.display());
        RasterBlock::from_encoded(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};

    fn write_png(path: &Path, width: u32, height: u32) {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut bytes, ImageOutputFormat::Png)
            .expect("encode png");
        std::fs::write(path, bytes).expect("write png");
    }

    #[tokio::test]
    async fn reads_region_screenshots() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = SnapshotSource::new(dir.path());
        write_png(&source.path_for(&Region::Header), 12, 7);

        let block = source.capture(&Region::Header).await.expect("captured");
        assert_eq!((block.width(), block.height()), (12, 7));
    }

    #[tokio::test]
    async fn missing_file_is_a_missing_region() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = SnapshotSource::new(dir.path());
        let region = Region::Step {
            index: 2,
            id: "abc".into(),
        };

        assert!(matches!(
            source.capture(&region).await,
            Err(CaptureFailure::MissingRegion(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_image_failure() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = SnapshotSource::new(dir.path());
        std::fs::write(source.path_for(&Region::Header), b"garbage").expect("write");

        assert!(matches!(
            source.capture(&Region::Header).await,
            Err(CaptureFailure::Image(_))
        ));
    }
}
