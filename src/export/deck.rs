//! Widescreen slide deck output (Office Open XML presentation).
//!
//! Every document page becomes one slide holding one picture. Slides take the
//! size of the document geometry (widescreen by default) and the picture is
//! contain-fitted and centred in the same content region the pages were
//! paginated for, so slices of any aspect ratio are letterboxed rather than cut.

use std::io::{Cursor, Seek, Write};

use image::{DynamicImage, ImageOutputFormat};
use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{escape_xml, Exporter};
use crate::assemble::Document;
use crate::error::{ExportError, Result};
use crate::geometry::{contain, PageGeometry, Rect, EMU_PER_PT};

macro_rules! namespaces {
    () => {
        concat!(
            "xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" ",
            "xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" ",
            "xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\""
        )
    };
}

/// Writes documents as `.pptx` slide decks.
#[derive(Clone, Debug)]
pub struct DeckExporter {
    title: String,
}

impl DeckExporter {
    /// Creates an exporter writing `title` into the deck properties.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Content region of a slide of `geometry`, in points.
    pub fn content_region(geometry: &PageGeometry) -> Rect {
        Rect {
            x: geometry.margin(),
            y: geometry.margin(),
            width: geometry.content_width(),
            height: geometry.content_height(),
        }
    }

    /// Where a slice of `width` x `height` pixels lands on a slide of
    /// `geometry`, in points.
    pub fn picture_frame(geometry: &PageGeometry, width: u32, height: u32) -> Rect {
        contain(
            f64::from(width),
            f64::from(height),
            Self::content_region(geometry),
        )
    }

    /// Renders the deck to bytes.
    pub fn render(&self, document: &Document) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_package(document, &mut cursor)?;
        Ok(cursor.into_inner())
    }

    fn write_package<W: Write + Seek>(&self, document: &Document, writer: &mut W) -> Result<()> {
        let slide_count = document.page_count();
        let geometry = document.geometry();
        let mut zip = ZipWriter::new(writer);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        // PNG data is already compressed.
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        zip.start_file("[Content_Types].xml", deflated)?;
        zip.write_all(content_types(slide_count).as_bytes())?;

        zip.start_file("_rels/.rels", deflated)?;
        zip.write_all(ROOT_RELS.as_bytes())?;

        zip.start_file("docProps/core.xml", deflated)?;
        zip.write_all(core_properties(&self.title).as_bytes())?;

        zip.start_file("ppt/presentation.xml", deflated)?;
        zip.write_all(presentation(geometry, slide_count).as_bytes())?;

        zip.start_file("ppt/_rels/presentation.xml.rels", deflated)?;
        zip.write_all(presentation_rels(slide_count).as_bytes())?;

        zip.start_file("ppt/slideMasters/slideMaster1.xml", deflated)?;
        zip.write_all(SLIDE_MASTER.as_bytes())?;
        zip.start_file("ppt/slideMasters/_rels/slideMaster1.xml.rels", deflated)?;
        zip.write_all(SLIDE_MASTER_RELS.as_bytes())?;

        zip.start_file("ppt/slideLayouts/slideLayout1.xml", deflated)?;
        zip.write_all(SLIDE_LAYOUT.as_bytes())?;
        zip.start_file("ppt/slideLayouts/_rels/slideLayout1.xml.rels", deflated)?;
        zip.write_all(SLIDE_LAYOUT_RELS.as_bytes())?;

        zip.start_file("ppt/theme/theme1.xml", deflated)?;
        zip.write_all(THEME.as_bytes())?;

        for (index, page) in document.pages().iter().enumerate() {
            let number = index + 1;
            let (width, height) = page.image.dimensions();
            let frame = Self::picture_frame(geometry, width, height);
            debug!(
                "slide {number}: {width}x{height}px in {:.1}x{:.1}pt at ({:.1}, {:.1})",
                frame.width, frame.height, frame.x, frame.y
            );

            let mut png = Vec::new();
            DynamicImage::ImageRgba8(page.image.clone())
                .write_to(&mut png, ImageOutputFormat::Png)
                .map_err(|err| ExportError::Encoding(format!("slide {number} image: {err}")))?;

            zip.start_file(format!("ppt/media/image{number}.png"), stored)?;
            zip.write_all(&png)?;

            zip.start_file(format!("ppt/slides/slide{number}.xml"), deflated)?;
            zip.write_all(slide_xml(number, frame).as_bytes())?;

            zip.start_file(format!("ppt/slides/_rels/slide{number}.xml.rels"), deflated)?;
            zip.write_all(slide_rels(number).as_bytes())?;
        }

        zip.finish()?;
        Ok(())
    }
}

impl Exporter for DeckExporter {
    fn extension(&self) -> &'static str {
        "pptx"
    }

    fn export<W: Write + Seek>(&self, document: &Document, writer: &mut W) -> Result<()> {
        self.write_package(document, writer)
    }
}

/// Relationship ids 1 and 2 of the presentation are the master and the theme.
const FIRST_SLIDE_REL: usize = 3;

fn emu(points: f64) -> i64 {
    (points * EMU_PER_PT).round() as i64
}

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const OFFICE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn presentation(geometry: &PageGeometry, slide_count: usize) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(concat!(
        "<p:presentation ",
        namespaces!(),
        " saveSubsetFonts=\"1\">",
        "<p:sldMasterIdLst><p:sldMasterId id=\"2147483648\" r:id=\"rId1\"/></p:sldMasterIdLst>",
        "<p:sldIdLst>"
    ));
    for index in 0..slide_count {
        xml.push_str(&format!(
            "<p:sldId id=\"{}\" r:id=\"rId{}\"/>",
            256 + index,
            index + FIRST_SLIDE_REL
        ));
    }
    xml.push_str(&format!(
        "</p:sldIdLst><p:sldSz cx=\"{}\" cy=\"{}\"/><p:notesSz cx=\"6858000\" cy=\"9144000\"/></p:presentation>",
        emu(geometry.page_width()),
        emu(geometry.page_height())
    ));
    xml
}

fn content_types(slide_count: usize) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(concat!(
        "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
        "<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>",
        "<Default Extension=\"xml\" ContentType=\"application/xml\"/>",
        "<Default Extension=\"png\" ContentType=\"image/png\"/>",
        "<Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>",
        "<Override PartName=\"/ppt/slideMasters/slideMaster1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml\"/>",
        "<Override PartName=\"/ppt/slideLayouts/slideLayout1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml\"/>",
        "<Override PartName=\"/ppt/theme/theme1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.theme+xml\"/>",
        "<Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>"
    ));
    for number in 1..=slide_count {
        xml.push_str(&format!(
            "<Override PartName=\"/ppt/slides/slide{number}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>"
        ));
    }
    xml.push_str("</Types>");
    xml
}

const ROOT_RELS: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"ppt/presentation.xml\"/>",
    "<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/>",
    "</Relationships>"
);

fn core_properties(title: &str) -> String {
    format!(
        concat!(
            "{}<cp:coreProperties ",
            "xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" ",
            "xmlns:dc=\"http://purl.org/dc/elements/1.1/\">",
            "<dc:title>{}</dc:title></cp:coreProperties>"
        ),
        XML_DECLARATION,
        escape_xml(title)
    )
}

fn presentation_rels(slide_count: usize) -> String {
    let mut xml = format!("{XML_DECLARATION}<Relationships xmlns=\"{REL_NS}\">");
    xml.push_str(&format!(
        "<Relationship Id=\"rId1\" Type=\"{OFFICE_REL}/slideMaster\" Target=\"slideMasters/slideMaster1.xml\"/>"
    ));
    xml.push_str(&format!(
        "<Relationship Id=\"rId2\" Type=\"{OFFICE_REL}/theme\" Target=\"theme/theme1.xml\"/>"
    ));
    for index in 0..slide_count {
        xml.push_str(&format!(
            "<Relationship Id=\"rId{}\" Type=\"{OFFICE_REL}/slide\" Target=\"slides/slide{}.xml\"/>",
            index + FIRST_SLIDE_REL,
            index + 1
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn slide_xml(number: usize, frame: Rect) -> String {
    format!(
        concat!(
            "{decl}<p:sld {ns}>",
            "<p:cSld><p:spTree>",
            "<p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>",
            "<p:grpSpPr/>",
            "<p:pic>",
            "<p:nvPicPr><p:cNvPr id=\"2\" name=\"Page {number}\"/>",
            "<p:cNvPicPr><a:picLocks noChangeAspect=\"1\"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>",
            "<p:blipFill><a:blip r:embed=\"rId2\"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>",
            "<p:spPr><a:xfrm><a:off x=\"{x}\" y=\"{y}\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>",
            "<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr>",
            "</p:pic>",
            "</p:spTree></p:cSld>",
            "<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>",
            "</p:sld>"
        ),
        decl = XML_DECLARATION,
        ns = namespaces!(),
        number = number,
        x = emu(frame.x),
        y = emu(frame.y),
        cx = emu(frame.width),
        cy = emu(frame.height),
    )
}

fn slide_rels(number: usize) -> String {
    format!(
        concat!(
            "{decl}<Relationships xmlns=\"{rel_ns}\">",
            "<Relationship Id=\"rId1\" Type=\"{office}/slideLayout\" Target=\"../slideLayouts/slideLayout1.xml\"/>",
            "<Relationship Id=\"rId2\" Type=\"{office}/image\" Target=\"../media/image{number}.png\"/>",
            "</Relationships>"
        ),
        decl = XML_DECLARATION,
        rel_ns = REL_NS,
        office = OFFICE_REL,
        number = number,
    )
}

const SLIDE_MASTER: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<p:sldMaster ",
    namespaces!(),
    ">",
    "<p:cSld><p:bg><p:bgRef idx=\"1001\"><a:schemeClr val=\"bg1\"/></p:bgRef></p:bg>",
    "<p:spTree><p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld>",
    "<p:clrMap bg1=\"lt1\" tx1=\"dk1\" bg2=\"lt2\" tx2=\"dk2\" accent1=\"accent1\" accent2=\"accent2\" ",
    "accent3=\"accent3\" accent4=\"accent4\" accent5=\"accent5\" accent6=\"accent6\" hlink=\"hlink\" folHlink=\"folHlink\"/>",
    "<p:sldLayoutIdLst><p:sldLayoutId id=\"2147483649\" r:id=\"rId1\"/></p:sldLayoutIdLst>",
    "</p:sldMaster>"
);

const SLIDE_MASTER_RELS: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout\" Target=\"../slideLayouts/slideLayout1.xml\"/>",
    "<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme\" Target=\"../theme/theme1.xml\"/>",
    "</Relationships>"
);

const SLIDE_LAYOUT: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<p:sldLayout ",
    namespaces!(),
    " type=\"blank\" preserve=\"1\">",
    "<p:cSld name=\"Blank\"><p:spTree><p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld>",
    "<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>",
    "</p:sldLayout>"
);

const SLIDE_LAYOUT_RELS: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster\" Target=\"../slideMasters/slideMaster1.xml\"/>",
    "</Relationships>"
);

const THEME: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<a:theme xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" name=\"Manual\">",
    "<a:themeElements>",
    "<a:clrScheme name=\"Manual\">",
    "<a:dk1><a:srgbClr val=\"000000\"/></a:dk1><a:lt1><a:srgbClr val=\"FFFFFF\"/></a:lt1>",
    "<a:dk2><a:srgbClr val=\"1F2937\"/></a:dk2><a:lt2><a:srgbClr val=\"F3F4F6\"/></a:lt2>",
    "<a:accent1><a:srgbClr val=\"4F46E5\"/></a:accent1><a:accent2><a:srgbClr val=\"0EA5E9\"/></a:accent2>",
    "<a:accent3><a:srgbClr val=\"10B981\"/></a:accent3><a:accent4><a:srgbClr val=\"F59E0B\"/></a:accent4>",
    "<a:accent5><a:srgbClr val=\"EF4444\"/></a:accent5><a:accent6><a:srgbClr val=\"8B5CF6\"/></a:accent6>",
    "<a:hlink><a:srgbClr val=\"2563EB\"/></a:hlink><a:folHlink><a:srgbClr val=\"7C3AED\"/></a:folHlink>",
    "</a:clrScheme>",
    "<a:fontScheme name=\"Manual\">",
    "<a:majorFont><a:latin typeface=\"Calibri\"/><a:ea typeface=\"\"/><a:cs typeface=\"\"/></a:majorFont>",
    "<a:minorFont><a:latin typeface=\"Calibri\"/><a:ea typeface=\"\"/><a:cs typeface=\"\"/></a:minorFont>",
    "</a:fontScheme>",
    "<a:fmtScheme name=\"Manual\">",
    "<a:fillStyleLst><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill>",
    "<a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:fillStyleLst>",
    "<a:lnStyleLst><a:ln w=\"6350\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln>",
    "<a:ln w=\"12700\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln>",
    "<a:ln w=\"19050\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln></a:lnStyleLst>",
    "<a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle>",
    "<a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst>",
    "<a:bgFillStyleLst><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill>",
    "<a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:bgFillStyleLst>",
    "</a:fmtScheme>",
    "</a:themeElements>",
    "</a:theme>"
);

#[cfg(test)]
mod tests {
    use std::io::Read;

    use image::RgbaImage;

    use super::*;
    use crate::assemble::DocumentAssembler;
    use crate::capture::{MemorySource, Region};
    use crate::raster::RasterBlock;

    const EPSILON: f64 = 1e-9;

    async fn one_region_document(geometry: PageGeometry, width: u32, height: u32) -> Document {
        let block = RasterBlock::new(RgbaImage::new(width, height)).expect("block");
        let source = MemorySource::new().with_block(Region::Header, block);
        DocumentAssembler::new(&source, geometry)
            .assemble(&[Region::Header])
            .await
            .expect("document")
    }

    #[test]
    fn tall_slices_are_letterboxed_horizontally() {
        let slide = PageGeometry::widescreen_slide();
        let region = DeckExporter::content_region(&slide);
        let frame = DeckExporter::picture_frame(&slide, 100, 400);

        assert!((frame.height - region.height).abs() < EPSILON);
        assert!(frame.width < region.width);
        let left = frame.x - region.x;
        let right = region.x + region.width - (frame.x + frame.width);
        assert!((left - right).abs() < EPSILON);
    }

    #[test]
    fn wide_slices_are_letterboxed_vertically() {
        let slide = PageGeometry::widescreen_slide();
        let region = DeckExporter::content_region(&slide);
        let frame = DeckExporter::picture_frame(&slide, 4000, 100);

        assert!((frame.width - region.width).abs() < EPSILON);
        assert!(frame.height < region.height);
        assert!((frame.y - (region.y + (region.height - frame.height) / 2.0)).abs() < EPSILON);
    }

    #[tokio::test]
    async fn frames_follow_the_paginated_geometry() {
        let narrow_margin = PageGeometry::widescreen_slide()
            .with_margin(10.0)
            .expect("geometry");
        let document = one_region_document(narrow_margin, 940, 520).await;
        let page = &document.pages()[0];
        let frame = DeckExporter::picture_frame(
            document.geometry(),
            page.image.width(),
            page.image.height(),
        );

        assert!((frame.x - 10.0).abs() < EPSILON);
        assert!((frame.y - 10.0).abs() < EPSILON);
        assert!((frame.width - page.placement.rendered_width).abs() < EPSILON);
        assert!((frame.height - page.placement.rendered_height).abs() < EPSILON);
    }

    #[tokio::test]
    async fn portrait_geometry_fills_the_content_width() {
        let document = one_region_document(PageGeometry::a4_portrait(), 800, 4000).await;
        assert!(document.page_count() > 1);
        for page in document.pages() {
            let frame = DeckExporter::picture_frame(
                document.geometry(),
                page.image.width(),
                page.image.height(),
            );
            assert!((frame.width - page.placement.rendered_width).abs() < 1e-6);
            assert!((frame.height - page.placement.rendered_height).abs() < 1e-6);
        }

        let xml = presentation(document.geometry(), document.page_count());
        assert!(xml.contains(&format!(
            "<p:sldSz cx=\"{}\" cy=\"{}\"/>",
            emu(595.28),
            emu(841.89)
        )));
    }

    #[tokio::test]
    async fn slide_picture_is_placed_at_the_margin() {
        let geometry = PageGeometry::widescreen_slide()
            .with_margin(10.0)
            .expect("geometry");
        let document = one_region_document(geometry, 940, 520).await;
        let bytes = DeckExporter::new("Manual").render(&document).expect("deck");

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("zip");
        let mut slide = String::new();
        archive
            .by_name("ppt/slides/slide1.xml")
            .expect("slide part")
            .read_to_string(&mut slide)
            .expect("utf-8");
        assert!(slide.contains("<a:off x=\"127000\" y=\"127000\"/>"));
        assert!(slide.contains("<a:ext cx=\"11938000\" cy=\"6604000\"/>"));
    }

    #[test]
    fn widescreen_slide_size_in_emu() {
        let xml = presentation(&PageGeometry::widescreen_slide(), 2);
        assert!(xml.contains("<p:sldSz cx=\"12192000\" cy=\"6858000\"/>"));
        assert!(xml.contains("<p:sldId id=\"257\" r:id=\"rId4\"/>"));
    }

    #[test]
    fn titles_are_escaped() {
        let xml = core_properties("Tom & Jerry <3");
        assert!(xml.contains("<dc:title>Tom &amp; Jerry &lt;3</dc:title>"));
    }
}
