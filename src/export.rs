//! # Export
//!
//! Entry points that turn unit sheets into finished artifacts.
//!
//! - [`Exporter::render`]: one sheet to PNG or PPTX
//! - [`Exporter::render_deck`]: a group of units to one PPTX, either one slide
//!   per unit or paged summary grids
//! - [`render_in_background`]: the same work moved onto tokio's blocking pool
//!
//! ## Example
//!
//! ```no_run
//! use flotilla::{ExportFormat, Exporter, RenderConfig, UnitSheet};
//!
//! let config = RenderConfig::default();
//! let exporter = Exporter::new(&config)?;
//! let sheet = UnitSheet::from_json(r#"{"name": "Vespucci", "unit_class": "Training ship"}"#)?;
//! let rendered = exporter.render(&sheet, ExportFormat::Png)?;
//! std::fs::write("vespucci.png", &rendered.bytes)?;
//! # Ok::<(), flotilla::FlotillaError>(())
//! ```

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::config::RenderConfig;
use crate::document::style::{FontWeight, Style, TextAlign};
use crate::document::{
    Canvas, Color, Document, Element, ElementKind, ImageKind, ImageRef, TextRole, Unit, UnitSheet,
};
use crate::error::FlotillaError;
use crate::font::FontResolver;
use crate::layout::geometry::Rect;
use crate::render::raster::RasterRenderer;
use crate::render::slide::{Presentation, SlideFormat, SlideRenderer};
use crate::render::RenderReport;
use crate::resource::ResourceResolver;

/// Deck pages are laid out on a 96 dpi canvas the size of a widescreen slide,
/// so one canvas pixel is one slide pixel.
const DECK_CANVAS_WIDTH: u32 = 1280;
const DECK_CANVAS_HEIGHT: u32 = 720;

// ============================================================================
// FORMATS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Pptx,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Pptx => "pptx",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "pptx" | "powerpoint" => Ok(ExportFormat::Pptx),
            other => Err(format!("unknown export format '{}' (expected png or pptx)", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Output bytes plus what happened to each element.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub report: RenderReport,
}

// ============================================================================
// DECK REQUEST
// ============================================================================

/// How a group deck lays out its units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeckMode {
    /// One full slide per unit.
    #[default]
    Single,
    /// Pages of `rows × cols` summary cells.
    Grid {
        #[serde(default = "default_grid_side")]
        rows: usize,
        #[serde(default = "default_grid_side")]
        cols: usize,
    },
}

fn default_grid_side() -> usize {
    3
}

fn default_true() -> bool {
    true
}

/// A group of units exported as one presentation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeckRequest {
    pub name: String,
    #[serde(default)]
    pub units: Vec<UnitSheet>,
    #[serde(default)]
    pub mode: DeckMode,
    #[serde(default = "default_true")]
    pub title_slide: bool,
    /// Replaces every unit's logo when set.
    #[serde(default)]
    pub logo_override: Option<String>,
    /// Replaces every unit's flag when set.
    #[serde(default)]
    pub flag_override: Option<String>,
}

impl DeckRequest {
    pub fn from_json(json: &str) -> Result<Self, FlotillaError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The units with the group's logo/flag overrides applied.
    fn effective_units(&self) -> Vec<UnitSheet> {
        let logo = self.logo_override.as_deref().filter(|s| !s.trim().is_empty());
        let flag = self.flag_override.as_deref().filter(|s| !s.trim().is_empty());
        self.units
            .iter()
            .cloned()
            .map(|mut sheet| {
                if let Some(logo) = logo {
                    override_image(&mut sheet, ImageKind::Logo, logo);
                }
                if let Some(flag) = flag {
                    override_image(&mut sheet, ImageKind::Flag, flag);
                }
                sheet
            })
            .collect()
    }
}

fn override_image(sheet: &mut UnitSheet, target: ImageKind, path: &str) {
    match target {
        ImageKind::Logo => sheet.unit.logo_path = Some(path.to_string()),
        ImageKind::Flag => sheet.unit.flag_path = Some(path.to_string()),
        ImageKind::Silhouette => sheet.unit.silhouette_path = Some(path.to_string()),
    }
    let replacement = ImageRef::parse(path);
    for element in &mut sheet.document.elements {
        if let ElementKind::Image { kind, source } = &mut element.kind
            && *kind == target
        {
            *source = replacement.clone();
        }
    }
}

// ============================================================================
// EXPORTER
// ============================================================================

/// Owns the resolvers shared by every render it performs.
pub struct Exporter {
    resolver: ResourceResolver,
    fonts: FontResolver,
}

impl Exporter {
    pub fn new(config: &RenderConfig) -> Result<Self, FlotillaError> {
        Ok(Self {
            resolver: ResourceResolver::new(config)?,
            fonts: FontResolver::new(&config.fonts),
        })
    }

    pub fn render(&self, sheet: &UnitSheet, format: ExportFormat) -> Result<Rendered, FlotillaError> {
        match format {
            ExportFormat::Png => self.render_png(sheet),
            ExportFormat::Pptx => self.render_pptx(sheet),
        }
    }

    pub fn render_png(&self, sheet: &UnitSheet) -> Result<Rendered, FlotillaError> {
        sheet.document.validate()?;
        let renderer = RasterRenderer::new(&self.resolver, &self.fonts);
        let (bytes, report) = renderer.render_png(&sheet.document, &sheet.unit)?;
        log_report(&sheet.unit, ExportFormat::Png, &report);
        Ok(Rendered { bytes, report })
    }

    /// One slide, sized from the canvas aspect ratio.
    pub fn render_pptx(&self, sheet: &UnitSheet) -> Result<Rendered, FlotillaError> {
        sheet.document.validate()?;
        let format = SlideFormat::for_canvas(&sheet.document.canvas);
        let mut presentation = Presentation::new(format).with_title(sheet.unit.name.as_str());
        let report = SlideRenderer::new(&self.resolver).render_document(
            &mut presentation,
            &sheet.document,
            &sheet.unit,
        );
        let bytes = presentation.to_bytes()?;
        log_report(&sheet.unit, ExportFormat::Pptx, &report);
        Ok(Rendered { bytes, report })
    }

    /// A widescreen deck for a group of units.
    pub fn render_deck(&self, request: &DeckRequest) -> Result<Rendered, FlotillaError> {
        let units = request.effective_units();
        let renderer = SlideRenderer::new(&self.resolver);
        let mut presentation =
            Presentation::new(SlideFormat::Widescreen).with_title(request.name.as_str());
        let mut report = RenderReport::default();
        let blank = Unit::default();

        if request.title_slide {
            let title = title_page(&request.name, units.len())?;
            let page = renderer.render_document(&mut presentation, &title, &blank);
            report.merge_prefixed("title", page);
        }

        match request.mode {
            DeckMode::Single => {
                for sheet in &units {
                    let slide = presentation.slide_count() + 1;
                    let page = renderer.render_document(&mut presentation, &sheet.document, &sheet.unit);
                    report.merge_prefixed(&format!("slide{}", slide), page);
                }
            }
            DeckMode::Grid { rows, cols } => {
                let rows = rows.max(1);
                let cols = cols.max(1);
                for (i, chunk) in units.chunks(rows * cols).enumerate() {
                    let document = grid_page(&request.name, i + 1, chunk, rows, cols)?;
                    let page = renderer.render_document(&mut presentation, &document, &blank);
                    report.merge_prefixed(&format!("page{}", i + 1), page);
                }
            }
        }

        if presentation.slide_count() == 0 {
            warn!(group = %request.name, "deck has no units and no title slide");
        }
        let bytes = presentation.to_bytes()?;
        info!(
            group = %request.name,
            units = units.len(),
            slides = presentation.slide_count(),
            summary = %report,
            "deck exported"
        );
        Ok(Rendered { bytes, report })
    }
}

fn log_report(unit: &Unit, format: ExportFormat, report: &RenderReport) {
    if report.is_clean() {
        info!(unit = %unit.name, format = %format, summary = %report, "sheet exported");
    } else {
        warn!(unit = %unit.name, format = %format, summary = %report, "sheet exported with degraded elements");
    }
}

/// Render on tokio's blocking pool. The exporter is built inside the task
/// since its HTTP client must not live on an async worker.
pub async fn render_in_background(
    config: RenderConfig,
    sheet: UnitSheet,
    format: ExportFormat,
) -> Result<Rendered, FlotillaError> {
    tokio::task::spawn_blocking(move || Exporter::new(&config)?.render(&sheet, format))
        .await
        .map_err(|e| FlotillaError::Task(e.to_string()))?
}

// ============================================================================
// DECK PAGES
// ============================================================================

fn deck_canvas() -> Canvas {
    Canvas {
        width: DECK_CANVAS_WIDTH,
        height: DECK_CANVAS_HEIGHT,
        ..Canvas::default()
    }
}

fn label(id: String, frame: Rect, content: String, size: f32, bold: bool) -> Element {
    Element {
        id,
        frame,
        style: Style {
            font_size: Some(size),
            font_weight: bold.then_some(FontWeight::Bold),
            text_align: Some(TextAlign::Center),
            padding: Some(0.0),
            ..Style::default()
        },
        kind: ElementKind::Text {
            role: TextRole::Plain,
            content,
        },
    }
}

fn title_page(group: &str, units: usize) -> Result<Document, FlotillaError> {
    let elements = vec![
        label(
            "title".into(),
            Rect::new(96.0, 240.0, 1088.0, 120.0),
            group.to_string(),
            58.0,
            true,
        ),
        label(
            "subtitle".into(),
            Rect::new(96.0, 380.0, 1088.0, 60.0),
            format!("{} naval units", units),
            32.0,
            false,
        ),
    ];
    Ok(Document::new(deck_canvas(), elements)?)
}

/// Silhouette reference shown in a grid cell: the layout's own silhouette
/// element if it has one, otherwise the unit's stored path.
fn grid_silhouette(sheet: &UnitSheet) -> Option<ImageRef> {
    sheet
        .document
        .effective_elements(&sheet.unit)
        .iter()
        .find_map(|e| match &e.kind {
            ElementKind::Image {
                kind: ImageKind::Silhouette,
                source: Some(source),
            } => Some(source.clone()),
            _ => None,
        })
        .or_else(|| sheet.unit.silhouette_path.as_deref().and_then(ImageRef::parse))
}

/// One page of summary cells under a "<group> - Page N" heading.
fn grid_page(
    group: &str,
    page: usize,
    units: &[UnitSheet],
    rows: usize,
    cols: usize,
) -> Result<Document, FlotillaError> {
    let area = Rect::new(48.0, 96.0, 1200.0, 576.0);
    let cell_w = area.width / cols as f32;
    let cell_h = area.height / rows as f32;
    let margin = 9.6;

    let mut elements = vec![label(
        "heading".into(),
        Rect::new(48.0, 19.2, 1184.0, 76.8),
        format!("{} - Page {}", group, page),
        32.0,
        true,
    )];

    for (i, sheet) in units.iter().enumerate() {
        let x = area.x + (i % cols) as f32 * cell_w;
        let y = area.y + (i / cols) as f32 * cell_h;
        let inner_w = (cell_w - 2.0 * margin).max(1.0);
        let class = if sheet.unit.unit_class.is_empty() {
            "N/A"
        } else {
            sheet.unit.unit_class.as_str()
        };

        elements.push(label(
            format!("cell{}_name", i + 1),
            Rect::new(x + margin, y + margin, inner_w, 38.4),
            sheet.unit.name.clone(),
            18.0,
            true,
        ));
        elements.push(label(
            format!("cell{}_class", i + 1),
            Rect::new(x + margin, y + 48.0, inner_w, 28.8),
            format!("Class: {}", class),
            13.0,
            false,
        ));
        elements.push(Element {
            id: format!("cell{}_silhouette", i + 1),
            frame: Rect::new(x + margin, y + 76.8, inner_w, (cell_h - 86.4).max(1.0)),
            style: Style {
                border_color: Some(Color::rgb(0xD1, 0xD5, 0xDB)),
                border_width: Some(1.0),
                ..Style::default()
            },
            kind: ElementKind::Image {
                kind: ImageKind::Silhouette,
                source: grid_silhouette(sheet),
            },
        });
    }

    Ok(Document::new(deck_canvas(), elements)?)
}
