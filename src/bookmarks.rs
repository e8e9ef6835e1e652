//! PDF outline (bookmark) injection built on `lopdf`.
//!
//! The PDF writer has no outline support, so bookmarks are added after
//! rendering by reopening the bytes and linking a flat `/Outlines` tree into
//! the catalog.

use lopdf::{Dictionary, Document, Object, StringFormat};
use thiserror::Error;

/// One outline item pointing at a zero-based page index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bookmark {
    pub title: String,
    pub page_index: usize,
}

impl Bookmark {
    pub fn new(title: impl Into<String>, page_index: usize) -> Self {
        Self {
            title: title.into(),
            page_index,
        }
    }
}

#[derive(Debug, Error)]
pub enum BookmarkError {
    #[error("failed to parse rendered PDF: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("failed to write PDF with outline: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF catalog is missing or not a dictionary")]
    MissingCatalog,
    #[error("bookmark \"{title}\" points at page {page} but the PDF has {available}")]
    MissingPage {
        title: String,
        page: usize,
        available: usize,
    },
}

/// Returns `pdf_bytes` with an outline holding `bookmarks` in order.
///
/// An empty bookmark list leaves the bytes untouched.
pub fn apply_bookmarks(pdf_bytes: &[u8], bookmarks: &[Bookmark]) -> Result<Vec<u8>, BookmarkError> {
    if bookmarks.is_empty() {
        return Ok(pdf_bytes.to_vec());
    }

    let mut document = Document::load_mem(pdf_bytes)?;
    let pages = document.get_pages();

    let mut targets = Vec::with_capacity(bookmarks.len());
    for bookmark in bookmarks {
        // lopdf numbers pages from one.
        let page_ref = pages
            .get(&(bookmark.page_index as u32 + 1))
            .copied()
            .ok_or_else(|| BookmarkError::MissingPage {
                title: bookmark.title.clone(),
                page: bookmark.page_index + 1,
                available: pages.len(),
            })?;
        targets.push((document.new_object_id(), page_ref));
    }

    let root_id = document.new_object_id();
    for (index, (bookmark, (item_id, page_ref))) in bookmarks.iter().zip(&targets).enumerate() {
        let mut item = Dictionary::new();
        item.set("Title", pdf_text(&bookmark.title));
        item.set(
            "Dest",
            Object::Array(vec![
                Object::Reference(*page_ref),
                Object::Name(b"Fit".to_vec()),
            ]),
        );
        item.set("Parent", Object::Reference(root_id));
        if index > 0 {
            item.set("Prev", Object::Reference(targets[index - 1].0));
        }
        if let Some((next_id, _)) = targets.get(index + 1) {
            item.set("Next", Object::Reference(*next_id));
        }
        document.objects.insert(*item_id, Object::Dictionary(item));
    }

    let mut root = Dictionary::new();
    root.set("Type", Object::Name(b"Outlines".to_vec()));
    root.set("Count", Object::Integer(targets.len() as i64));
    if let (Some(first), Some(last)) = (targets.first(), targets.last()) {
        root.set("First", Object::Reference(first.0));
        root.set("Last", Object::Reference(last.0));
    }
    document.objects.insert(root_id, Object::Dictionary(root));

    let catalog = document
        .catalog_mut()
        .map_err(|_| BookmarkError::MissingCatalog)?;
    catalog.set("Outlines", Object::Reference(root_id));
    catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));

    let mut buffer = Vec::new();
    document.save_to(&mut buffer)?;
    Ok(buffer)
}

/// PDFDocEncoding covers ASCII; anything else goes out as UTF-16BE with a BOM.
fn pdf_text(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use image::RgbaImage;

    use super::*;
    use crate::assemble::DocumentAssembler;
    use crate::capture::{MemorySource, Region};
    use crate::export::PdfExporter;
    use crate::geometry::PageGeometry;
    use crate::raster::RasterBlock;

    fn step(index: usize) -> Region {
        Region::Step {
            index,
            id: format!("step-{index}"),
        }
    }

    /// Header on page 1, a step spread over pages 2 to 6.
    async fn rendered_pdf() -> Vec<u8> {
        let source = MemorySource::new()
            .with_block(
                Region::Header,
                RasterBlock::new(RgbaImage::new(100, 100)).expect("block"),
            )
            .with_block(
                step(0),
                RasterBlock::new(RgbaImage::new(800, 5000)).expect("block"),
            );
        let geometry = PageGeometry::new(840.0, 1040.0, 20.0).expect("geometry");
        let document = DocumentAssembler::new(&source, geometry)
            .assemble(&[Region::Header, step(0)])
            .await
            .expect("document");
        assert_eq!(document.page_count(), 6);
        PdfExporter::new("Manual").render(&document).expect("pdf")
    }

    fn reference(dictionary: &Dictionary, key: &[u8]) -> lopdf::ObjectId {
        dictionary
            .get(key)
            .and_then(Object::as_reference)
            .expect("reference entry")
    }

    #[tokio::test]
    async fn outline_is_linked_into_the_catalog() {
        let bytes = apply_bookmarks(
            &rendered_pdf().await,
            &[Bookmark::new("Manual", 0), Bookmark::new("Step 1: Unpack", 1)],
        )
        .expect("bookmarks");

        let document = Document::load_mem(&bytes).expect("reload");
        let pages = document.get_pages();
        assert_eq!(pages.len(), 6);

        let catalog = document.catalog().expect("catalog");
        let root_id = reference(catalog, b"Outlines");
        let root = document
            .get_object(root_id)
            .and_then(Object::as_dict)
            .expect("outline root");
        assert_eq!(root.get(b"Count").and_then(Object::as_i64).expect("count"), 2);

        let first_id = reference(root, b"First");
        let last_id = reference(root, b"Last");
        let first = document
            .get_object(first_id)
            .and_then(Object::as_dict)
            .expect("first item");
        let last = document
            .get_object(last_id)
            .and_then(Object::as_dict)
            .expect("last item");

        assert_eq!(reference(first, b"Next"), last_id);
        assert_eq!(reference(last, b"Prev"), first_id);
        assert!(first.get(b"Prev").is_err());
        assert!(last.get(b"Next").is_err());
        assert_eq!(reference(first, b"Parent"), root_id);
        assert_eq!(
            first.get(b"Title").and_then(Object::as_str).expect("title"),
            b"Manual"
        );

        for (item, page_number) in [(first, 1u32), (last, 2u32)] {
            let dest = item.get(b"Dest").and_then(Object::as_array).expect("dest");
            assert_eq!(dest[0].as_reference().expect("page ref"), pages[&page_number]);
            assert_eq!(dest[1].as_name().expect("fit"), b"Fit");
        }
    }

    #[tokio::test]
    async fn out_of_range_page_is_reported() {
        let result = apply_bookmarks(&rendered_pdf().await, &[Bookmark::new("Gone", 6)]);
        match result {
            Err(BookmarkError::MissingPage {
                page, available, ..
            }) => {
                assert_eq!(page, 7);
                assert_eq!(available, 6);
            }
            other => panic!("expected a missing page, got {other:?}"),
        }
    }

    #[test]
    fn non_ascii_titles_are_utf16() {
        match pdf_text("Étape") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(&bytes[..4], &[0xFE, 0xFF, 0x00, 0xC9]);
            }
            other => panic!("unexpected object {other:?}"),
        }
        assert!(matches!(pdf_text("Step 1"), Object::String(_, StringFormat::Literal)));
    }

    #[test]
    fn empty_outline_keeps_bytes() {
        let bytes = b"not even a pdf".to_vec();
        assert_eq!(apply_bookmarks(&bytes, &[]).expect("untouched"), bytes);
    }
}
