//! Built-in rasterizer that draws manual regions from the manual data.
//!
//! The layout follows the on-screen preview: a 21cm wide white sheet, a
//! centred bold title with an optional cover-fitted header image and
//! introduction, and for every step a "Step N: title" heading, an optional
//! contain-fitted image box and the wrapped description. All measurements
//! below are CSS pixels, multiplied by [`ComposeStyle::scale`] when drawn.

use std::path::Path;

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect as PixelRect;
use log::{debug, warn};
use rusttype::{point, Font, Scale};

use super::{RasterSource, Region};
use crate::error::CaptureFailure;
use crate::fonts::{self, FontPair};
use crate::geometry::{contain, cover, Rect};
use crate::image_ref::ImageRef;
use crate::manual::{FormSchema, ManualData, ManualStep};
use crate::raster::RasterBlock;

/// Upper bound on a composed region, in pixels (about 1 GiB of RGBA).
const MAX_CANVAS_PIXELS: u64 = 1 << 28;

const SHEET_WIDTH: f32 = 794.0;
const PADDING: f32 = 32.0;

const TITLE_SIZE: f32 = 36.0;
const TITLE_LINE_HEIGHT: f32 = 40.0;
const TITLE_GAP: f32 = 24.0;
const HEADER_IMAGE_HEIGHT: f32 = 256.0;
const HEADER_IMAGE_GAP: f32 = 32.0;

const HEADING_SIZE: f32 = 24.0;
const HEADING_LINE_HEIGHT: f32 = 32.0;
const HEADING_GAP: f32 = 12.0;
const STEP_IMAGE_HEIGHT: f32 = 224.0;
const STEP_IMAGE_GAP: f32 = 16.0;

const BODY_SIZE: f32 = 16.0;
const BODY_LINE_HEIGHT: f32 = 26.0;
const INTRODUCTION_GAP: f32 = 16.0;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TITLE_COLOR: Rgba<u8> = Rgba([31, 41, 55, 255]);
const HEADING_COLOR: Rgba<u8> = Rgba([55, 65, 81, 255]);
const BODY_COLOR: Rgba<u8> = Rgba([75, 85, 99, 255]);
const RULE_COLOR: Rgba<u8> = Rgba([243, 244, 246, 255]);
const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([229, 231, 235, 255]);

/// Rendering parameters for [`ComposedSource`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComposeStyle {
    /// Device pixels per CSS pixel.
    pub scale: f32,
}

impl Default for ComposeStyle {
    fn default() -> Self {
        Self { scale: 2.0 }
    }
}

impl ComposeStyle {
    /// Smallest accepted [`ComposeStyle::scale`].
    pub const MIN_SCALE: f32 = 0.25;
    /// Largest accepted [`ComposeStyle::scale`].
    pub const MAX_SCALE: f32 = 8.0;

    /// Sets the device pixel ratio, clamped to `MIN_SCALE..=MAX_SCALE`.
    pub fn with_scale(mut self, scale: f32) -> Self {
        let scale = if scale.is_finite() { scale } else { Self::default().scale };
        self.scale = scale.clamp(Self::MIN_SCALE, Self::MAX_SCALE);
        self
    }
}

/// Draws header and step regions straight from a manual snapshot.
pub struct ComposedSource {
    manual: ManualData,
    schema: FormSchema,
    fonts: FontPair,
    style: ComposeStyle,
}

impl ComposedSource {
    pub fn new(manual: ManualData, schema: FormSchema, fonts: FontPair) -> Self {
        Self {
            manual,
            schema,
            fonts,
            style: ComposeStyle::default(),
        }
    }

    /// Creates a source using the fonts found by [`fonts::default_fonts`].
    pub fn with_default_fonts(manual: ManualData, schema: FormSchema) -> std::io::Result<Self> {
        Ok(Self::new(manual, schema, fonts::default_fonts()?))
    }

    pub fn with_style(mut self, style: ComposeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn manual(&self) -> &ManualData {
        &self.manual
    }

    async fn compose_header(&self) -> Result<RasterBlock, CaptureFailure> {
        let mut sheet = Sheet::new(self.style.scale, &self.fonts);
        sheet.advance(PADDING);

        let title = match self.manual.title().trim() {
            "" => "Manual Title",
            title => title,
        };
        sheet.text(title, TextKind::Title);
        sheet.advance(TITLE_GAP);

        let header_ref = parse_image(self.manual.header_image_url());
        if !header_ref.is_none() {
            let image = load_image(&header_ref).await;
            sheet.image_box(image, HEADER_IMAGE_HEIGHT, Fit::Cover);
            sheet.advance(HEADER_IMAGE_GAP);
        }

        let introduction = self.manual.introduction().trim();
        if self.schema.introduction && !introduction.is_empty() {
            sheet.text(introduction, TextKind::Body);
            sheet.advance(INTRODUCTION_GAP);
        }

        sheet.advance(PADDING);
        sheet.render()
    }

    async fn compose_step(&self, index: usize, step: &ManualStep) -> Result<RasterBlock, CaptureFailure> {
        let mut sheet = Sheet::new(self.style.scale, &self.fonts);
        sheet.rule();
        sheet.advance(PADDING);

        let title = match step.title().trim() {
            "" => "Step Title",
            title => title,
        };
        sheet.text(&format!("Step {}: {}", index + 1, title), TextKind::Heading);
        sheet.advance(HEADING_GAP);

        let step_ref = parse_image(step.image_url());
        if !step_ref.is_none() {
            let image = load_image(&step_ref).await;
            sheet.image_box(image, STEP_IMAGE_HEIGHT, Fit::Contain);
            sheet.advance(STEP_IMAGE_GAP);
        }

        let description = match step.description().trim_end() {
            "" => "Step description goes here.",
            description => description,
        };
        sheet.text(description, TextKind::Body);

        sheet.advance(PADDING);
        sheet.render()
    }
}

#[async_trait]
impl RasterSource for ComposedSource {
    async fn capture(&self, region: &Region) -> Result<RasterBlock, CaptureFailure> {
        match region {
            Region::Header if self.manual.has_header_content(&self.schema) => {
                self.compose_header().await
            }
            Region::Header => Err(CaptureFailure::MissingRegion(region.clone())),
            Region::Step { index, id } => match self.manual.step(id) {
                Some(step) => self.compose_step(*index, step).await,
                None => Err(CaptureFailure::MissingRegion(region.clone())),
            },
        }
    }
}

fn parse_image(value: &str) -> ImageRef {
    ImageRef::parse(value).unwrap_or_else(|err| {
        warn!("ignoring unusable image reference: {err}");
        ImageRef::Remote(value.to_owned())
    })
}

/// Loads a referenced image, or `None` when a placeholder has to be drawn.
async fn load_image(image: &ImageRef) -> Option<RgbaImage> {
    let decoded = match image {
        ImageRef::None => return None,
        ImageRef::Remote(url) => {
            debug!("remote image {url} is drawn as a placeholder");
            return None;
        }
        ImageRef::Embedded { bytes, .. } => image::load_from_memory(bytes),
        ImageRef::File(path) => match read_file(path).await {
            Ok(bytes) => image::load_from_memory(&bytes),
            Err(err) => {
                warn!("could not read image {}: {err}", path.display());
                return None;
            }
        },
    };

    match decoded {
        Ok(image) => Some(image.into_rgba8()),
        Err(err) => {
            warn!("could not decode image: {err}");
            None
        }
    }
}

async fn read_file(path: &Path) -> std::io::Result<Vec<u8>> {
    tokio::fs::read(path).await
}

#[derive(Clone, Copy)]
enum TextKind {
    Title,
    Heading,
    Body,
}

#[derive(Clone, Copy)]
enum Fit {
    Contain,
    Cover,
}

enum Op {
    Glyphs {
        bold: bool,
        size: f32,
        x: f32,
        top: f32,
        text: String,
        color: Rgba<u8>,
    },
    Image {
        x: u32,
        y: u32,
        image: RgbaImage,
    },
    Fill {
        rect: Rect,
        color: Rgba<u8>,
    },
}

/// Two-pass drawing surface: operations are laid out top to bottom first, then
/// painted once the final height is known.
struct Sheet<'a> {
    scale: f32,
    fonts: &'a FontPair,
    cursor: f32,
    ops: Vec<Op>,
}

impl<'a> Sheet<'a> {
    fn new(scale: f32, fonts: &'a FontPair) -> Self {
        Self {
            scale,
            fonts,
            cursor: 0.0,
            ops: Vec::new(),
        }
    }

    fn width(&self) -> f32 {
        SHEET_WIDTH * self.scale
    }

    fn inner_width(&self) -> f32 {
        (SHEET_WIDTH - 2.0 * PADDING) * self.scale
    }

    fn left(&self) -> f32 {
        PADDING * self.scale
    }

    fn advance(&mut self, css_px: f32) {
        self.cursor += css_px * self.scale;
    }

    fn font(&self, bold: bool) -> &'a Font<'static> {
        if bold {
            &self.fonts.bold
        } else {
            &self.fonts.regular
        }
    }

    fn rule(&mut self) {
        let rect = Rect {
            x: 0.0,
            y: f64::from(self.cursor),
            width: f64::from(self.width()),
            height: f64::from(self.scale.max(1.0)),
        };
        self.ops.push(Op::Fill {
            rect,
            color: RULE_COLOR,
        });
    }

    fn text(&mut self, text: &str, kind: TextKind) {
        let (bold, size, line_height, color, centered) = match kind {
            TextKind::Title => (true, TITLE_SIZE, TITLE_LINE_HEIGHT, TITLE_COLOR, true),
            TextKind::Heading => (true, HEADING_SIZE, HEADING_LINE_HEIGHT, HEADING_COLOR, false),
            TextKind::Body => (false, BODY_SIZE, BODY_LINE_HEIGHT, BODY_COLOR, false),
        };
        let size = size * self.scale;
        let line_height = line_height * self.scale;
        let font = self.font(bold);
        let metrics = font.v_metrics(Scale::uniform(size));
        // Centre the glyph box inside the CSS line box.
        let top_offset = ((line_height - (metrics.ascent - metrics.descent)) / 2.0).max(0.0);

        for line in wrap_text(font, size, text, self.inner_width()) {
            let x = if centered {
                self.left() + (self.inner_width() - measure(font, size, &line)).max(0.0) / 2.0
            } else {
                self.left()
            };
            self.ops.push(Op::Glyphs {
                bold,
                size,
                x,
                top: self.cursor + top_offset,
                text: line,
                color,
            });
            self.cursor += line_height;
        }
    }

    fn image_box(&mut self, image: Option<RgbaImage>, css_height: f32, fit: Fit) {
        let bounds = Rect {
            x: f64::from(self.left()),
            y: f64::from(self.cursor),
            width: f64::from(self.inner_width()),
            height: f64::from(css_height * self.scale),
        };
        self.cursor += css_height * self.scale;

        let Some(image) = image else {
            self.ops.push(Op::Fill {
                rect: bounds,
                color: PLACEHOLDER_COLOR,
            });
            return;
        };

        let (width, height) = (f64::from(image.width()), f64::from(image.height()));
        match fit {
            Fit::Contain => {
                let target = contain(width, height, bounds);
                let resized = resize(&image, target.width, target.height);
                self.ops.push(Op::Image {
                    x: target.x.round().max(0.0) as u32,
                    y: target.y.round().max(0.0) as u32,
                    image: resized,
                });
            }
            Fit::Cover => {
                let target = cover(width, height, bounds);
                let resized = resize(&image, target.width, target.height);
                let crop_x = (bounds.x - target.x).round().max(0.0) as u32;
                let crop_y = (bounds.y - target.y).round().max(0.0) as u32;
                let crop_w = (bounds.width.round() as u32).min(resized.width().saturating_sub(crop_x));
                let crop_h = (bounds.height.round() as u32).min(resized.height().saturating_sub(crop_y));
                let cropped = imageops::crop_imm(&resized, crop_x, crop_y, crop_w, crop_h).to_image();
                self.ops.push(Op::Image {
                    x: bounds.x.round() as u32,
                    y: bounds.y.round() as u32,
                    image: cropped,
                });
            }
        }
    }

    fn render(self) -> Result<RasterBlock, CaptureFailure> {
        let (width, height) = canvas_size(self.width(), self.cursor)?;
        let mut canvas = RgbaImage::from_pixel(width, height, WHITE);

        for op in &self.ops {
            match op {
                Op::Fill { rect, color } => fill(&mut canvas, *rect, *color),
                Op::Image { x, y, image } => imageops::overlay(&mut canvas, image, *x, *y),
                Op::Glyphs {
                    bold,
                    size,
                    x,
                    top,
                    text,
                    color,
                } => draw_text_mut(
                    &mut canvas,
                    *color,
                    x.round() as _,
                    top.round() as _,
                    Scale::uniform(*size),
                    self.font(*bold),
                    text,
                ),
            }
        }

        RasterBlock::new(canvas)
    }
}

/// Rounds the laid-out sheet to whole pixels, refusing buffers too large to
/// allocate.
fn canvas_size(width: f32, height: f32) -> Result<(u32, u32), CaptureFailure> {
    let width = width.round().max(0.0);
    let height = height.ceil().max(0.0);
    if f64::from(width) * f64::from(height) > MAX_CANVAS_PIXELS as f64
        || width > u32::MAX as f32
        || height > u32::MAX as f32
    {
        return Err(CaptureFailure::TooLarge {
            width: width as u64,
            height: height as u64,
        });
    }
    Ok((width as u32, height as u32))
}

fn resize(image: &RgbaImage, width: f64, height: f64) -> RgbaImage {
    let width = (width.round() as u32).max(1);
    let height = (height.round() as u32).max(1);
    imageops::resize(image, width, height, FilterType::Triangle)
}

fn fill(canvas: &mut RgbaImage, rect: Rect, color: Rgba<u8>) {
    let width = rect.width.round() as u32;
    let height = rect.height.round() as u32;
    if width == 0 || height == 0 {
        return;
    }
    let area = PixelRect::at(rect.x.round() as i32, rect.y.round() as i32).of_size(width, height);
    draw_filled_rect_mut(canvas, area, color);
}

/// Advance width of a single line of text.
fn measure(font: &Font<'static>, size: f32, text: &str) -> f32 {
    font.layout(text, Scale::uniform(size), point(0.0, 0.0))
        .last()
        .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

/// Greedy word wrap that keeps explicit line breaks and splits words wider
/// than a whole line.
fn wrap_text(font: &Font<'static>, size: f32, text: &str, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let mut current = String::new();

        for word in paragraph.split(' ') {
            let candidate = if current.is_empty() {
                word.to_owned()
            } else {
                format!("{current} {word}")
            };
            if measure(font, size, &candidate) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            for c in word.chars() {
                current.push(c);
                if measure(font, size, &current) > max_width && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::replace(&mut current, c.to_string()));
                }
            }
        }

        lines.push(current);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_ref::to_data_uri;
    use image::{DynamicImage, ImageOutputFormat};

    fn fonts_or_skip(test: &str) -> Option<FontPair> {
        match fonts::default_fonts() {
            Ok(fonts) => Some(fonts),
            Err(err) => {
                eprintln!("Skipping {test}: {err}");
                None
            }
        }
    }

    fn png_data_uri(width: u32, height: u32) -> String {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut bytes, ImageOutputFormat::Png)
            .expect("encode png");
        to_data_uri(&bytes)
    }

    fn step_region(manual: &ManualData, index: usize) -> Region {
        Region::Step {
            index,
            id: manual.steps()[index].id().to_owned(),
        }
    }

    #[tokio::test]
    async fn header_is_sheet_wide() {
        let Some(fonts) = fonts_or_skip("header_is_sheet_wide") else {
            return;
        };
        let manual = ManualData::new("Bike repair").with_header_image(png_data_uri(40, 20));
        let source = ComposedSource::new(manual, FormSchema::default(), fonts)
            .with_style(ComposeStyle::default().with_scale(1.0));

        let block = source.capture(&Region::Header).await.expect("header");
        assert_eq!(block.width(), 794);
        let minimum = (PADDING * 2.0 + TITLE_LINE_HEIGHT + TITLE_GAP + HEADER_IMAGE_HEIGHT) as u32;
        assert!(block.height() >= minimum);
    }

    #[tokio::test]
    async fn longer_descriptions_make_taller_steps() {
        let Some(fonts) = fonts_or_skip("longer_descriptions_make_taller_steps") else {
            return;
        };
        let manual = ManualData::new("Manual")
            .with_step(ManualStep::new("Short", "One line."))
            .with_step(ManualStep::new("Long", "Many words here. ".repeat(200)));
        let source = ComposedSource::new(manual.clone(), FormSchema::default(), fonts);

        let short = source.capture(&step_region(&manual, 0)).await.expect("short");
        let long = source.capture(&step_region(&manual, 1)).await.expect("long");
        assert_eq!(short.width(), long.width());
        assert!(long.height() > short.height());
    }

    #[tokio::test]
    async fn unknown_regions_are_missing() {
        let Some(fonts) = fonts_or_skip("unknown_regions_are_missing") else {
            return;
        };
        let source = ComposedSource::new(ManualData::default(), FormSchema::default(), fonts);
        assert!(matches!(
            source.capture(&Region::Header).await,
            Err(CaptureFailure::MissingRegion(_))
        ));
        let region = Region::Step {
            index: 0,
            id: "gone".into(),
        };
        assert!(matches!(
            source.capture(&region).await,
            Err(CaptureFailure::MissingRegion(_))
        ));
    }

    #[tokio::test]
    async fn broken_images_fall_back_to_placeholders() {
        assert!(load_image(&ImageRef::Remote("https://example.com/x.png".into()))
            .await
            .is_none());
        let broken = ImageRef::Embedded {
            media_type: "image/png".into(),
            bytes: b"broken".to_vec(),
        };
        assert!(load_image(&broken).await.is_none());
        let missing = ImageRef::File("/definitely/not/here.png".into());
        assert!(load_image(&missing).await.is_none());
    }

    #[test]
    fn scale_is_clamped() {
        assert_eq!(ComposeStyle::default().with_scale(1000.0).scale, ComposeStyle::MAX_SCALE);
        assert_eq!(ComposeStyle::default().with_scale(0.0).scale, ComposeStyle::MIN_SCALE);
        assert_eq!(ComposeStyle::default().with_scale(f32::NAN).scale, 2.0);
        assert_eq!(ComposeStyle::default().with_scale(3.0).scale, 3.0);
    }

    #[test]
    fn oversized_canvas_is_refused() {
        assert_eq!(canvas_size(794.4, 100.2).expect("small sheet"), (794, 101));
        assert!(matches!(
            canvas_size(794_000.0, 134_000.0),
            Err(CaptureFailure::TooLarge { width: 794_000, .. })
        ));
    }

    #[tokio::test]
    async fn huge_raw_scale_fails_the_capture_instead_of_allocating() {
        let Some(fonts) = fonts_or_skip("huge_raw_scale_fails_the_capture_instead_of_allocating") else {
            return;
        };
        let manual = ManualData::new("Title");
        let source = ComposedSource::new(manual, FormSchema::default(), fonts)
            .with_style(ComposeStyle { scale: 1000.0 });
        assert!(matches!(
            source.capture(&Region::Header).await,
            Err(CaptureFailure::TooLarge { .. })
        ));
    }

    #[test]
    fn wrapping_respects_width_and_newlines() {
        let Some(fonts) = fonts_or_skip("wrapping_respects_width_and_newlines") else {
            return;
        };
        let font = &fonts.regular;
        let lines = wrap_text(font, 16.0, "alpha beta gamma delta\nepsilon", 80.0);
        assert!(lines.len() >= 3);
        assert_eq!(lines.last().map(String::as_str), Some("epsilon"));
        for line in &lines {
            assert!(measure(font, 16.0, line) <= 80.0 || line.chars().count() == 1);
        }

        let broken = wrap_text(font, 16.0, &"w".repeat(60), 50.0);
        assert!(broken.len() > 1);
        assert_eq!(broken.concat(), "w".repeat(60));
    }
}
