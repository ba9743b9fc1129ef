//! # Raster Backend
//!
//! Paints a [`Document`] onto an RGB bitmap the size of its canvas and
//! encodes it as PNG.
//!
//! ```text
//! canvas fill + border
//!   → for each element, in document order:
//!       text   → background, border, laid-out lines, decoration
//!       image  → background, border, decoded + aspect-fit picture
//!                (or a "[LOGO]" / "[ERROR: LOGO]" marker)
//!       table  → banded cells with truncated text
//!   → PNG bytes
//! ```

pub mod paint;

use image::imageops::{self, FilterType};
use image::{ImageEncoder, ImageReader, Rgb, RgbImage, RgbaImage};
use tracing::{debug, warn};

use crate::document::style::{FontStyle, FontWeight, Style, TextAlign};
use crate::document::{Color, Document, Element, ElementKind, ImageKind, ImageRef, Unit};
use crate::error::FlotillaError;
use crate::font::FontResolver;
use crate::layout::geometry::Rect;
use crate::layout::table::{self, CELL_PADDING, DEFAULT_CELL_FONT_SIZE};
use crate::layout::text::layout_text;
use crate::render::{ElementOutcome, RenderReport, resolve_element_image};
use crate::resource::ResourceResolver;

use paint::{fill_rect, stroke_border};

const PLACEHOLDER_COLOR: Color = Color::rgb(128, 128, 128);
const ERROR_COLOR: Color = Color::rgb(220, 38, 38);
const BAND_EVEN: Color = Color::rgb(0xF9, 0xFA, 0xFB);
const BAND_ODD: Color = Color::WHITE;

/// Raster renderer bound to a resolver and a font set.
pub struct RasterRenderer<'a> {
    resolver: &'a ResourceResolver,
    fonts: &'a FontResolver,
}

impl<'a> RasterRenderer<'a> {
    pub fn new(resolver: &'a ResourceResolver, fonts: &'a FontResolver) -> Self {
        Self { resolver, fonts }
    }

    /// Paint the document. Element problems end up in the report; this never
    /// fails once the canvas exists.
    pub fn render(&self, document: &Document, unit: &Unit) -> (RgbImage, RenderReport) {
        let canvas = &document.canvas;
        let mut img = RgbImage::from_pixel(
            canvas.width,
            canvas.height,
            Rgb([canvas.background.r, canvas.background.g, canvas.background.b]),
        );
        stroke_border(
            &mut img,
            canvas.bounds(),
            canvas.border_width,
            0.0,
            canvas.border_color,
        );

        let mut report = RenderReport::default();
        for element in document.effective_elements(unit).iter() {
            let outcome = self.paint_element(&mut img, element, unit);
            report.record(element.id.as_str(), outcome);
        }
        (img, report)
    }

    /// Render and encode.
    pub fn render_png(
        &self,
        document: &Document,
        unit: &Unit,
    ) -> Result<(Vec<u8>, RenderReport), FlotillaError> {
        let (img, report) = self.render(document, unit);
        Ok((encode_png(&img)?, report))
    }

    fn paint_element(&self, img: &mut RgbImage, element: &Element, unit: &Unit) -> ElementOutcome {
        let style = &element.style;
        let frame = element.frame;

        if let Some(bg) = style.background_color {
            fill_rect(img, frame, style.border_radius(), bg);
        }
        stroke_border(
            img,
            frame,
            style.border_width(),
            style.border_radius(),
            style.border_color(),
        );

        match &element.kind {
            ElementKind::Text { .. } => {
                let content = element.text_content(unit).unwrap_or_default();
                self.paint_text(img, &content, style, frame);
                ElementOutcome::Rendered
            }
            ElementKind::Image { kind, source } => {
                self.paint_image(img, element, *kind, source.as_ref(), unit)
            }
            ElementKind::Table {
                rows,
                column_weights,
            } => {
                self.paint_table(img, rows, column_weights, style, frame);
                ElementOutcome::Rendered
            }
        }
    }

    fn paint_text(&self, img: &mut RgbImage, content: &str, style: &Style, frame: Rect) {
        if content.is_empty() {
            return;
        }
        let face = self
            .fonts
            .resolve(style.font_family(), style.font_weight(), style.font_style());
        let px = style.font_size();
        let layout = layout_text(content, style, frame, &*face);

        for line in &layout.lines {
            face.draw(
                img,
                &line.text,
                px,
                style.letter_spacing(),
                line.x,
                line.top,
                style.color(),
            );
            if let Some((y, thickness)) = line.decoration(style.text_decoration(), px) {
                fill_rect(
                    img,
                    Rect::new(line.x, y, line.width, thickness),
                    0.0,
                    style.color(),
                );
            }
        }
    }

    /// Centered marker text such as `[LOGO]`.
    fn paint_marker(&self, img: &mut RgbImage, label: &str, px: f32, color: Color, frame: Rect) {
        let style = Style {
            font_size: Some(px),
            color: Some(color),
            text_align: Some(TextAlign::Center),
            ..Style::default()
        };
        self.paint_text(img, label, &style, frame);
    }

    fn paint_image(
        &self,
        img: &mut RgbImage,
        element: &Element,
        kind: ImageKind,
        source: Option<&ImageRef>,
        unit: &Unit,
    ) -> ElementOutcome {
        let frame = element.frame;
        let resolved = match resolve_element_image(self.resolver, kind, source, unit) {
            Ok(resolved) => resolved,
            Err(reason) => {
                self.paint_marker(img, &format!("[{}]", kind.label()), 12.0, PLACEHOLDER_COLOR, frame);
                return ElementOutcome::Placeholder(reason);
            }
        };

        let decoded = ImageReader::open(resolved.path())
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| e.to_string())
            .and_then(|reader| reader.decode().map_err(|e| e.to_string()));
        let picture = match decoded {
            Ok(picture) => picture,
            Err(reason) => {
                warn!(element = %element.id, error = %reason, "image decode failed");
                self.paint_marker(
                    img,
                    &format!("[ERROR: {}]", kind.label()),
                    10.0,
                    ERROR_COLOR,
                    frame,
                );
                return ElementOutcome::Failed(format!("decode failed: {}", reason));
            }
        };

        let matte = element.style.background_color.unwrap_or(Color::WHITE);
        let flattened = flatten_alpha(&picture.to_rgba8(), matte);

        let target = frame.inset(element.style.border_width() as f32);
        let Some(placed) = target.fit_contain(flattened.width() as f32, flattened.height() as f32)
        else {
            return ElementOutcome::Placeholder("image box has no area".to_string());
        };
        let Some(visible) = visible_part(&flattened, placed, img.width(), img.height()) else {
            debug!(element = %element.id, "image lies outside the canvas");
            return ElementOutcome::Rendered;
        };
        let scaled = imageops::resize(
            &visible.source,
            visible.width,
            visible.height,
            FilterType::Lanczos3,
        );
        imageops::replace(img, &scaled, visible.x, visible.y);

        debug!(
            element = %element.id,
            source_w = flattened.width(),
            source_h = flattened.height(),
            width = visible.width,
            height = visible.height,
            "image placed"
        );
        ElementOutcome::Rendered
    }

    fn paint_table(
        &self,
        img: &mut RgbImage,
        rows: &[Vec<String>],
        weights: &[f32],
        style: &Style,
        frame: Rect,
    ) {
        let Some(header) = rows.first() else {
            return;
        };
        let columns = header.len();
        if columns == 0 {
            return;
        }

        let area = frame.inset(style.border_width() as f32);
        let widths = table::column_widths(columns, weights, area.width);
        let offsets = table::column_offsets(area.x, &widths);
        let row_height = area.height / rows.len() as f32;
        let px = style.font_size.unwrap_or(DEFAULT_CELL_FONT_SIZE);

        let family = style.font_family();
        let header_face = self.fonts.resolve(family, FontWeight::Bold, FontStyle::Normal);
        let body_face = self
            .fonts
            .resolve(family, style.font_weight(), style.font_style());
        let header_bg = style
            .header_background_color
            .unwrap_or(table::HEADER_BACKGROUND);
        let body_color = style.color.unwrap_or(table::BODY_TEXT);

        for (r, row) in rows.iter().enumerate() {
            let is_header = r == 0;
            let top = area.y + r as f32 * row_height;
            let (face, fill, ink) = if is_header {
                (&header_face, header_bg, table::HEADER_TEXT)
            } else {
                (
                    &body_face,
                    table::band_color(r - 1, BAND_EVEN, BAND_ODD),
                    body_color,
                )
            };

            for c in 0..columns {
                let cell = Rect::new(offsets[c], top, widths[c], row_height);
                fill_rect(img, cell, 0.0, fill);
                stroke_border(img, cell, 1, 0.0, table::GRID_LINE);

                let text = row.get(c).map(String::as_str).unwrap_or_default();
                if text.is_empty() {
                    continue;
                }
                let budget = cell.width - CELL_PADDING;
                let fitted = table::truncate_to_fit(text, budget, |s| face.measure(s, px, 0.0));
                let height = face.line_metrics(px).height;
                face.draw(
                    img,
                    &fitted,
                    px,
                    0.0,
                    cell.x + CELL_PADDING / 2.0,
                    cell.y + (cell.height - height) / 2.0,
                    ink,
                );
            }
        }
    }
}

/// The slice of a picture that lands on the canvas once it is scaled into
/// `placed`, with the size it must be resized to.
struct VisiblePart {
    source: RgbImage,
    x: i64,
    y: i64,
    width: u32,
    height: u32,
}

/// Crop `picture` to what survives clipping against a `canvas_w` x
/// `canvas_h` canvas, so resizing never works on pixels that are thrown away.
fn visible_part(
    picture: &RgbImage,
    placed: Rect,
    canvas_w: u32,
    canvas_h: u32,
) -> Option<VisiblePart> {
    let (src_w, src_h) = (picture.width() as f64, picture.height() as f64);
    let left = placed.x.round() as f64;
    let top = placed.y.round() as f64;
    let width = (placed.width.round() as f64).max(1.0);
    let height = (placed.height.round() as f64).max(1.0);

    let x0 = left.max(0.0);
    let y0 = top.max(0.0);
    let x1 = (left + width).min(canvas_w as f64);
    let y1 = (top + height).min(canvas_h as f64);
    if x1 <= x0 || y1 <= y0 || src_w < 1.0 || src_h < 1.0 {
        return None;
    }

    // Source window covering the visible target span
    let sx0 = (((x0 - left) / width) * src_w).floor().clamp(0.0, src_w - 1.0);
    let sy0 = (((y0 - top) / height) * src_h).floor().clamp(0.0, src_h - 1.0);
    let sx1 = (((x1 - left) / width) * src_w).ceil().clamp(sx0 + 1.0, src_w);
    let sy1 = (((y1 - top) / height) * src_h).ceil().clamp(sy0 + 1.0, src_h);
    let source = imageops::crop_imm(
        picture,
        sx0 as u32,
        sy0 as u32,
        (sx1 - sx0) as u32,
        (sy1 - sy0) as u32,
    )
    .to_image();

    Some(VisiblePart {
        source,
        x: x0 as i64,
        y: y0 as i64,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

/// Composite an RGBA picture over a solid matte.
fn flatten_alpha(picture: &RgbaImage, matte: Color) -> RgbImage {
    RgbImage::from_fn(picture.width(), picture.height(), |x, y| {
        let [r, g, b, a] = picture.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        let mix = |src: u8, dst: u8| (src as f32 * alpha + dst as f32 * (1.0 - alpha)).round() as u8;
        Rgb([mix(r, matte.r), mix(g, matte.g), mix(b, matte.b)])
    })
}

/// Encode an RGB bitmap as PNG.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, FlotillaError> {
    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e: image::ImageError| FlotillaError::Image(e.to_string()))?;
    Ok(png_bytes)
}
