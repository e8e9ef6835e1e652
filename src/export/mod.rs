//! Turning an assembled [`Document`] into a saved file.
//!
//! [`ManualExporter`] drives one export end to end: it asks the manual for its
//! regions, assembles them through a [`RasterSource`], encodes the pages with
//! the chosen format writer and saves the result atomically.

use std::fs;
use std::io::{self, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use crate::assemble::{Document, DocumentAssembler};
use crate::capture::RasterSource;
use crate::error::{ExportError, Result};
use crate::geometry::PageGeometry;
use crate::manual::{FormSchema, ManualData};

mod deck;
mod pdf;

pub use deck::DeckExporter;
pub use pdf::PdfExporter;

/// A writer for one output format.
pub trait Exporter {
    /// File extension without the leading dot.
    fn extension(&self) -> &'static str;

    /// Encodes every page of `document` into `writer`.
    fn export<W: Write + Seek>(&self, document: &Document, writer: &mut W) -> Result<()>;
}

/// Output formats supported by [`ManualExporter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// Paged-image PDF.
    #[default]
    Pdf,
    /// Widescreen slide deck.
    Deck,
}

impl ExportFormat {
    /// Page geometry used when the options do not name one.
    pub fn default_geometry(self) -> PageGeometry {
        match self {
            Self::Pdf => PageGeometry::a4_portrait(),
            Self::Deck => PageGeometry::widescreen_slide(),
        }
    }
}

/// Derives the output file name from the manual title.
///
/// Every character outside ASCII letters and digits becomes `_` and the
/// result is lower-cased. A blank title falls back to `manual`.
pub fn file_name_for(title: &str, extension: &str) -> String {
    let title = title.trim();
    let stem: String = if title.is_empty() {
        "manual".to_owned()
    } else {
        title
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect()
    };
    format!("{stem}.{extension}")
}

/// Escapes the five XML special characters.
pub(crate) fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Settings for a single export.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    format: ExportFormat,
    geometry: Option<PageGeometry>,
    output_dir: PathBuf,
    file_name: Option<String>,
    schema: FormSchema,
    bookmarks: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Pdf,
            geometry: None,
            output_dir: PathBuf::from("."),
            file_name: None,
            schema: FormSchema::default(),
            bookmarks: false,
        }
    }
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_geometry(mut self, geometry: PageGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Overrides the file name derived from the manual title.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_schema(mut self, schema: FormSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Adds a PDF outline with one entry per region. Needs the `bookmarks`
    /// feature and is ignored for slide decks.
    pub fn with_bookmarks(mut self, bookmarks: bool) -> Self {
        self.bookmarks = bookmarks;
        self
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
            .unwrap_or_else(|| self.format.default_geometry())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn bookmarks(&self) -> bool {
        self.bookmarks
    }

    /// Destination path for a manual titled `title`.
    pub fn output_path(&self, title: &str) -> PathBuf {
        let extension = match self.format {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Deck => "pptx",
        };
        let file_name = self
            .file_name
            .clone()
            .unwrap_or_else(|| file_name_for(title, extension));
        self.output_dir.join(file_name)
    }
}

/// Summary of a finished export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub pages: usize,
    pub bytes: usize,
}

/// Runs exports one at a time.
#[derive(Debug, Default)]
pub struct ManualExporter {
    in_flight: Mutex<()>,
}

impl ManualExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures, paginates, encodes and saves `manual`.
    ///
    /// Fails with [`ExportError::ExportInProgress`] while another export on
    /// this exporter has not finished. Nothing is written unless every step
    /// succeeds.
    pub async fn export<S>(
        &self,
        manual: &ManualData,
        source: &S,
        options: &ExportOptions,
    ) -> Result<ExportReport>
    where
        S: RasterSource + ?Sized,
    {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| ExportError::ExportInProgress)?;

        let geometry = options.geometry();
        let regions = manual.regions(options.schema());
        debug!(
            "exporting {} region(s) as {:?} on {:.2}x{:.2}pt pages",
            regions.len(),
            options.format(),
            geometry.page_width(),
            geometry.page_height()
        );

        let document = DocumentAssembler::new(source, geometry)
            .assemble(&regions)
            .await?;

        let title = document_title(manual);
        let bytes = match options.format() {
            ExportFormat::Pdf => {
                let bytes = encode(&PdfExporter::new(title), &document)?;
                if options.bookmarks() {
                    with_outline(bytes, manual, &document)?
                } else {
                    bytes
                }
            }
            ExportFormat::Deck => encode(&DeckExporter::new(title), &document)?,
        };

        let path = options.output_path(manual.title());
        let size = bytes.len();
        save_atomically(path.clone(), bytes).await?;

        info!(
            "saved {} ({} page(s), {} bytes)",
            path.display(),
            document.page_count(),
            size
        );
        Ok(ExportReport {
            path,
            pages: document.page_count(),
            bytes: size,
        })
    }
}

fn document_title(manual: &ManualData) -> String {
    let title = manual.title().trim();
    if title.is_empty() {
        "Manual".to_owned()
    } else {
        title.to_owned()
    }
}

fn encode<E: Exporter>(exporter: &E, document: &Document) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    exporter.export(document, &mut cursor)?;
    debug!(
        "encoded {} page(s) as .{}",
        document.page_count(),
        exporter.extension()
    );
    Ok(cursor.into_inner())
}

#[cfg(feature = "bookmarks")]
fn with_outline(bytes: Vec<u8>, manual: &ManualData, document: &Document) -> Result<Vec<u8>> {
    use crate::bookmarks::{apply_bookmarks, Bookmark};
    use crate::capture::Region;

    let bookmarks: Vec<Bookmark> = document
        .outline()
        .iter()
        .map(|entry| {
            let title = match &entry.region {
                Region::Header => document_title(manual),
                Region::Step { index, id } => {
                    let step_title = manual.step(id).map(|step| step.title().trim()).unwrap_or("");
                    if step_title.is_empty() {
                        format!("Step {}", index + 1)
                    } else {
                        format!("Step {}: {}", index + 1, step_title)
                    }
                }
            };
            Bookmark::new(title, entry.first_page)
        })
        .collect();
    Ok(apply_bookmarks(&bytes, &bookmarks)?)
}

#[cfg(not(feature = "bookmarks"))]
fn with_outline(bytes: Vec<u8>, _manual: &ManualData, _document: &Document) -> Result<Vec<u8>> {
    log::warn!("bookmarks requested but the `bookmarks` feature is disabled; skipping outline");
    Ok(bytes)
}

/// Writes through a temporary file in the destination directory and renames
/// it into place.
async fn save_atomically(path: PathBuf, bytes: Vec<u8>) -> Result<()> {
    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&directory)?;
        let mut file = NamedTempFile::new_in(&directory)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|err| err.error)?;
        Ok(())
    })
    .await
    .map_err(|err| ExportError::Failed(format!("save task: {err}")))??;
    Ok(())
}
