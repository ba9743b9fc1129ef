//! # Slide Backend
//!
//! Projects a [`Document`] onto a presentation slide made of native shapes:
//! text boxes, pictures, tables and plain rectangles. Geometry stays in
//! canvas pixels until the last moment, when a [`RenderContext`] converts it
//! to EMU.
//!
//! ## Slide format and scale
//!
//! | Canvas aspect | Slide                 |
//! |---------------|-----------------------|
//! | > 1.6         | 13.33 in × 7.5 in     |
//! | otherwise     | 10 in × 7.5 in        |
//!
//! The scale `s = min(slideW·96 / canvasW, slideH·96 / canvasH)` maps canvas
//! pixels to slide pixels (96 per inch), and one slide pixel is 9525 EMU.
//!
//! ## Example
//!
//! ```
//! use flotilla::document::Canvas;
//! use flotilla::render::slide::{RenderContext, SlideFormat};
//!
//! let canvas = Canvas { width: 1920, height: 1080, ..Canvas::default() };
//! let ctx = RenderContext::for_canvas(&canvas);
//! assert_eq!(ctx.format, SlideFormat::Widescreen);
//! assert_eq!(ctx.emu(1920.0), 12_192_000);
//! ```

mod package;
mod xml;

pub use package::{Media, Presentation};
pub use xml::Slide;

use image::ImageReader;
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, warn};

use crate::document::style::{FontWeight, Style, TextAlign};
use crate::document::{Canvas, Color, Document, Element, ElementKind, ImageKind, ImageRef, Unit};
use crate::layout::geometry::Rect;
use crate::render::{ElementOutcome, RenderReport, resolve_element_image};
use crate::resource::ResourceResolver;

/// EMU per inch.
pub const EMU_PER_INCH: i64 = 914_400;
/// EMU per (96 dpi) pixel.
pub const EMU_PER_PIXEL: f64 = 9525.0;

const PLACEHOLDER_FILL: Color = Color::rgb(0xF5, 0xF5, 0xF5);
const PLACEHOLDER_LINE: Color = Color::rgb(0xC8, 0xC8, 0xC8);
const PLACEHOLDER_TEXT: Color = Color::rgb(0x80, 0x80, 0x80);

/// Errors assembling the presentation package.
#[derive(Debug, Error)]
pub enum SlideError {
    #[error("presentation has no slides")]
    Empty,

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// FORMAT AND SCALE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFormat {
    /// 10 in × 7.5 in
    Standard,
    /// 13.33 in × 7.5 in
    Widescreen,
}

impl SlideFormat {
    pub fn for_canvas(canvas: &Canvas) -> Self {
        if canvas.aspect_ratio() > 1.6 {
            SlideFormat::Widescreen
        } else {
            SlideFormat::Standard
        }
    }

    pub fn width_emu(self) -> i64 {
        match self {
            SlideFormat::Standard => 10 * EMU_PER_INCH,
            SlideFormat::Widescreen => 12_192_000,
        }
    }

    pub fn height_emu(self) -> i64 {
        7 * EMU_PER_INCH + EMU_PER_INCH / 2
    }

    pub fn width_inches(self) -> f64 {
        self.width_emu() as f64 / EMU_PER_INCH as f64
    }

    pub fn height_inches(self) -> f64 {
        self.height_emu() as f64 / EMU_PER_INCH as f64
    }
}

/// Canvas→slide conversion, computed once per document and passed to every
/// shape builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    pub format: SlideFormat,
    pub scale: f64,
}

impl RenderContext {
    /// Pick the format from the canvas aspect ratio and fit the canvas to it.
    pub fn for_canvas(canvas: &Canvas) -> Self {
        Self::with_format(SlideFormat::for_canvas(canvas), canvas)
    }

    /// Fit `canvas` onto slides of a fixed format.
    pub fn with_format(format: SlideFormat, canvas: &Canvas) -> Self {
        let sx = format.width_inches() * 96.0 / canvas.width.max(1) as f64;
        let sy = format.height_inches() * 96.0 / canvas.height.max(1) as f64;
        Self {
            format,
            scale: sx.min(sy),
        }
    }

    /// Canvas pixels to EMU.
    pub fn emu(&self, px: f32) -> i64 {
        (px as f64 * self.scale * EMU_PER_PIXEL).round() as i64
    }

    /// Canvas pixels to hundredths of a point (font sizes, letter spacing).
    pub fn hundredths_pt(&self, px: f32) -> i64 {
        (px as f64 * self.scale * 75.0).round() as i64
    }
}

// ============================================================================
// DOCUMENT → SLIDE
// ============================================================================

/// Builds slides from documents.
pub struct SlideRenderer<'a> {
    resolver: &'a ResourceResolver,
}

impl<'a> SlideRenderer<'a> {
    pub fn new(resolver: &'a ResourceResolver) -> Self {
        Self { resolver }
    }

    /// Append one slide for `document` to `presentation`.
    pub fn render_document(
        &self,
        presentation: &mut Presentation,
        document: &Document,
        unit: &Unit,
    ) -> RenderReport {
        let canvas = &document.canvas;
        let ctx = RenderContext::with_format(presentation.format(), canvas);
        let mut slide = Slide::new(Some(canvas.background));
        let mut report = RenderReport::default();

        if canvas.border_width > 0 {
            slide.add_box(
                &ctx,
                "Canvas Border",
                canvas.bounds(),
                None,
                Some((canvas.border_color, canvas.border_width as f32)),
                0.0,
            );
        }

        for element in document.effective_elements(unit).iter() {
            let outcome = self.add_element(presentation, &mut slide, &ctx, element, unit);
            report.record(element.id.as_str(), outcome);
        }

        debug!(
            shapes = slide.shape_count(),
            scale = ctx.scale,
            format = ?ctx.format,
            "slide composed"
        );
        presentation.push_slide(slide);
        report
    }

    fn add_element(
        &self,
        presentation: &mut Presentation,
        slide: &mut Slide,
        ctx: &RenderContext,
        element: &Element,
        unit: &Unit,
    ) -> ElementOutcome {
        match &element.kind {
            ElementKind::Text { .. } => {
                let content = element.text_content(unit).unwrap_or_default();
                slide.add_text(ctx, &element.id, element.frame, &element.style, &content);
                ElementOutcome::Rendered
            }
            ElementKind::Image { kind, source } => self.add_image(
                presentation,
                slide,
                ctx,
                &element.id,
                element.frame,
                &element.style,
                *kind,
                source.as_ref(),
                unit,
            ),
            ElementKind::Table {
                rows,
                column_weights,
            } => match slide.add_table(
                ctx,
                &element.id,
                element.frame,
                rows,
                column_weights,
                &element.style,
            ) {
                Ok(()) => ElementOutcome::Rendered,
                Err(reason) => {
                    warn!(element = %element.id, reason = %reason, "table shape unavailable, writing text");
                    let text = rows
                        .iter()
                        .map(|row| row.join(" | "))
                        .collect::<Vec<_>>()
                        .join("\n");
                    slide.add_text(ctx, &element.id, element.frame, &element.style, &text);
                    ElementOutcome::Failed(reason)
                }
            },
        }
    }

    /// Background/border box, then the picture aspect-fit inside it (or a
    /// placeholder shape when the image is unavailable).
    #[allow(clippy::too_many_arguments)]
    pub fn add_image(
        &self,
        presentation: &mut Presentation,
        slide: &mut Slide,
        ctx: &RenderContext,
        name: &str,
        frame: Rect,
        style: &Style,
        kind: ImageKind,
        source: Option<&ImageRef>,
        unit: &Unit,
    ) -> ElementOutcome {
        let border = style.border_width();
        if style.background_color.is_some() || border > 0 {
            slide.add_box(
                ctx,
                name,
                frame,
                style.background_color,
                (border > 0).then(|| (style.border_color(), border as f32)),
                style.border_radius(),
            );
        }

        let bytes = match resolve_element_image(self.resolver, kind, source, unit)
            .and_then(|resolved| resolved.read().map_err(|e| e.to_string()))
        {
            Ok(bytes) => bytes,
            Err(reason) => {
                add_placeholder(slide, ctx, name, frame, &format!("[{}]", kind.label()));
                return ElementOutcome::Placeholder(reason);
            }
        };

        let Some(extension) = media_extension(&bytes, source) else {
            add_placeholder(slide, ctx, name, frame, &format!("[ERROR: {}]", kind.label()));
            return ElementOutcome::Failed("unrecognized image format".to_string());
        };

        let target = frame.inset(border as f32);
        let placed = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok())
            .and_then(|(w, h)| target.fit_contain(w as f32, h as f32));
        if placed.is_none() {
            debug!(element = %name, "image dimensions unknown, stretching to the box");
        }

        let media = presentation.add_media(bytes, &extension);
        slide.add_picture(ctx, name, placed.unwrap_or(target), &media);
        ElementOutcome::Rendered
    }
}

/// Light-gray box with a bold gray label, used where an image is missing.
pub fn add_placeholder(slide: &mut Slide, ctx: &RenderContext, name: &str, frame: Rect, label: &str) {
    let style = Style {
        font_size: Some(16.0),
        font_weight: Some(FontWeight::Bold),
        color: Some(PLACEHOLDER_TEXT),
        text_align: Some(TextAlign::Center),
        background_color: Some(PLACEHOLDER_FILL),
        border_color: Some(PLACEHOLDER_LINE),
        border_width: Some(1.0),
        ..Style::default()
    };
    slide.add_text(ctx, name, frame, &style, label);
}

/// File extension for embedded image bytes: sniffed from the content, or
/// taken from the reference when the content is not a raster format.
fn media_extension(bytes: &[u8], source: Option<&ImageRef>) -> Option<String> {
    if let Ok(format) = image::guess_format(bytes) {
        return format.extensions_str().first().map(|e| e.to_string());
    }
    let from_reference = match source {
        Some(ImageRef::Base64 { format, .. }) => mime_guess::from_ext(format.trim_end_matches("+xml")).first(),
        Some(ImageRef::Remote(path)) | Some(ImageRef::Local(path)) => {
            mime_guess::from_path(path.split('?').next().unwrap_or(path)).first()
        }
        None => None,
    }?;
    (from_reference.type_() == mime_guess::mime::IMAGE)
        .then(|| mime_guess::get_mime_extensions(&from_reference))
        .flatten()
        .and_then(|exts| exts.first())
        .map(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(width: u32, height: u32) -> Canvas {
        Canvas {
            width,
            height,
            ..Canvas::default()
        }
    }

    #[test]
    fn test_format_selection() {
        assert_eq!(SlideFormat::for_canvas(&canvas(1920, 1080)), SlideFormat::Widescreen);
        assert_eq!(SlideFormat::for_canvas(&canvas(1123, 794)), SlideFormat::Standard);
        assert_eq!(SlideFormat::for_canvas(&canvas(1600, 1000)), SlideFormat::Standard);
    }

    #[test]
    fn test_slide_sizes() {
        assert_eq!(SlideFormat::Standard.width_emu(), 9_144_000);
        assert_eq!(SlideFormat::Standard.height_emu(), 6_858_000);
        assert!((SlideFormat::Widescreen.width_inches() - 13.333).abs() < 1e-2);
        assert_eq!(SlideFormat::Widescreen.height_inches(), 7.5);
    }

    #[test]
    fn test_canvas_fits_slide() {
        for (w, h) in [(1920, 1080), (1123, 794), (800, 800), (3000, 500)] {
            let c = canvas(w, h);
            let ctx = RenderContext::for_canvas(&c);
            assert!(ctx.emu(w as f32) <= ctx.format.width_emu() + 1);
            assert!(ctx.emu(h as f32) <= ctx.format.height_emu() + 1);
        }
    }

    #[test]
    fn test_a4_landscape_scale() {
        let ctx = RenderContext::for_canvas(&canvas(1123, 794));
        // Width-bound: 960 / 1123
        assert!((ctx.scale - 960.0 / 1123.0).abs() < 1e-9);
        assert_eq!(ctx.hundredths_pt(16.0), (16.0 * ctx.scale * 75.0).round() as i64);
    }

    #[test]
    fn test_media_extension() {
        let png = {
            let mut out = Vec::new();
            image::RgbImage::new(1, 1)
                .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
                .unwrap();
            out
        };
        assert_eq!(media_extension(&png, None).as_deref(), Some("png"));

        let svg = ImageRef::Base64 {
            format: "svg+xml".into(),
            payload: String::new(),
        };
        assert_eq!(media_extension(b"<svg/>", Some(&svg)).as_deref(), Some("svg"));
        assert_eq!(media_extension(b"garbage", None), None);
        assert_eq!(
            media_extension(b"garbage", Some(&ImageRef::Local("notes.txt".into()))),
            None
        );
    }
}
