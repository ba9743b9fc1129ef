//! # Layout Model
//!
//! The value types a render call consumes: a [`Document`] (canvas plus an
//! ordered list of positioned [`Element`]s) and the [`Unit`] entity data the
//! document describes.
//!
//! Documents are deserialized from the layout JSON produced by the canvas
//! editor and validated once, up front:
//!
//! ```
//! use flotilla::document::{Document, ElementKind};
//!
//! let doc = Document::from_json(r##"{
//!     "canvas": {"width": 1123, "height": 794, "background": "#ffffff"},
//!     "elements": [
//!         {"id": "t1", "type": "unit_name", "content": "USS Example",
//!          "x": 10, "y": 10, "width": 300, "height": 40,
//!          "style": {"fontSize": 24, "fontWeight": "bold"}}
//!     ]
//! }"##).unwrap();
//!
//! assert_eq!(doc.canvas.width, 1123);
//! assert!(matches!(doc.elements[0].kind, ElementKind::Text { .. }));
//! ```
//!
//! Style values are forgiving (bad values fall back to defaults), structure
//! is not: duplicate ids, unknown element types and impossible geometry are
//! rejected with a [`DocumentError`].

mod defaults;
mod image_ref;
pub mod overlay;
pub mod style;

pub use defaults::default_elements;
pub use image_ref::ImageRef;
pub use overlay::{CanvasPatch, Customization, ElementState};
pub use style::{Color, Style};

use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashSet;
use thiserror::Error;

use crate::layout::geometry::Rect;
use style::RawStyle;

pub const DEFAULT_CANVAS_WIDTH: u32 = 1123;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 794;

/// Structural problems that make a document unrenderable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error("element #{index} has no id")]
    MissingId { index: usize },

    #[error("duplicate element id '{0}'")]
    DuplicateId(String),

    #[error("element '{id}' has unknown type '{kind}'")]
    UnknownType { id: String, kind: String },

    #[error("element '{id}' has invalid geometry")]
    InvalidGeometry { id: String },

    #[error("canvas size {width}x{height} is not renderable")]
    InvalidCanvas { width: u32, height: u32 },

    #[error("layout_config is not valid JSON: {0}")]
    LayoutConfig(String),
}

// ============================================================================
// CANVAS
// ============================================================================

/// Page background, size and border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub background: Color,
    pub border_width: u32,
    pub border_color: Color,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
            background: Color::WHITE,
            border_width: 0,
            border_color: Color::BLACK,
        }
    }
}

impl Canvas {
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f32, self.height as f32)
    }

    fn validate(&self) -> Result<(), DocumentError> {
        // Keeps the bitmap allocation within reason.
        const MAX_SIDE: u32 = 16_384;
        if self.width == 0 || self.height == 0 || self.width > MAX_SIDE || self.height > MAX_SIDE {
            return Err(DocumentError::InvalidCanvas {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

// ============================================================================
// ELEMENTS
// ============================================================================

/// What a text element displays when its own content is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    /// Free text; shows exactly its content.
    Plain,
    /// Falls back to the unit's name.
    UnitName,
    /// Falls back to the unit's class.
    UnitClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Logo,
    Flag,
    Silhouette,
}

impl ImageKind {
    /// Upper-case label used by placeholders, e.g. `LOGO`.
    pub fn label(self) -> &'static str {
        match self {
            ImageKind::Logo => "LOGO",
            ImageKind::Flag => "FLAG",
            ImageKind::Silhouette => "SILHOUETTE",
        }
    }
}

/// Element payload, one variant per primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Text {
        role: TextRole,
        content: String,
    },
    Image {
        kind: ImageKind,
        source: Option<ImageRef>,
    },
    Table {
        /// Row 0 is the header.
        rows: Vec<Vec<String>>,
        /// Relative column widths; empty means equal split.
        column_weights: Vec<f32>,
    },
}

/// One positioned primitive on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: String,
    pub frame: Rect,
    pub style: Style,
    pub kind: ElementKind,
}

impl Element {
    /// Text to draw, with `unit_name`/`unit_class` bound to the entity when
    /// the element carries no content of its own.
    pub fn text_content<'a>(&'a self, unit: &'a Unit) -> Option<Cow<'a, str>> {
        match &self.kind {
            ElementKind::Text { role, content } => Some(match role {
                _ if !content.is_empty() => Cow::Borrowed(content.as_str()),
                TextRole::Plain => Cow::Borrowed(""),
                TextRole::UnitName => Cow::Borrowed(unit.name.as_str()),
                TextRole::UnitClass => Cow::Borrowed(unit.unit_class.as_str()),
            }),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ElementKind::Text { role, .. } => match role {
                TextRole::Plain => "text",
                TextRole::UnitName => "unit_name",
                TextRole::UnitClass => "unit_class",
            },
            ElementKind::Image { kind, .. } => match kind {
                ImageKind::Logo => "logo",
                ImageKind::Flag => "flag",
                ImageKind::Silhouette => "silhouette",
            },
            ElementKind::Table { .. } => "table",
        }
    }
}

// ============================================================================
// DOCUMENT
// ============================================================================

/// A canvas layout: everything rendered in one call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "RawDocument")]
pub struct Document {
    pub canvas: Canvas,
    pub elements: Vec<Element>,
}

impl Document {
    /// Build a document, checking that element ids are unique and the canvas
    /// is renderable.
    pub fn new(canvas: Canvas, elements: Vec<Element>) -> Result<Self, DocumentError> {
        let document = Self { canvas, elements };
        document.validate()?;
        Ok(document)
    }

    /// Re-run the construction checks. The fields are public, so a document
    /// edited in place is checked again before it reaches a backend.
    pub fn validate(&self) -> Result<(), DocumentError> {
        self.canvas.validate()?;
        let mut seen = HashSet::new();
        for element in &self.elements {
            if !seen.insert(element.id.as_str()) {
                return Err(DocumentError::DuplicateId(element.id.clone()));
            }
            let f = element.frame;
            let finite = [f.x, f.y, f.width, f.height].iter().all(|v| v.is_finite());
            if !finite || f.width < 0.0 || f.height < 0.0 {
                return Err(DocumentError::InvalidGeometry {
                    id: element.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Parse layout JSON.
    pub fn from_json(json: &str) -> Result<Self, crate::FlotillaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Elements to paint, in order. An empty layout is replaced by the
    /// default sheet built from the unit's raw fields.
    pub fn effective_elements(&self, unit: &Unit) -> Cow<'_, [Element]> {
        if self.elements.is_empty() {
            Cow::Owned(default_elements(unit))
        } else {
            Cow::Borrowed(&self.elements)
        }
    }
}

// ============================================================================
// JSON DECODING
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCanvas {
    width: Option<f64>,
    height: Option<f64>,
    background: Option<String>,
    border_width: Option<f64>,
    border_color: Option<String>,
}

/// Layout JSON as stored. Accepts both the nested `canvas` object and the
/// older flat `canvasWidth`/`canvasBackground`/... keys.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    canvas: Option<RawCanvas>,
    canvas_width: Option<f64>,
    canvas_height: Option<f64>,
    canvas_background: Option<String>,
    canvas_border_width: Option<f64>,
    canvas_border_color: Option<String>,
    #[serde(default)]
    elements: Vec<RawElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawElement {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    width: Option<f32>,
    height: Option<f32>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    table_data: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    column_weights: Option<Vec<f32>>,
    #[serde(default)]
    style: Option<RawStyle>,
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn canvas_color(value: Option<&str>, default: Color, field: &str) -> Color {
    match value {
        None => default,
        Some(s) => Color::parse(s).unwrap_or_else(|| {
            tracing::warn!(field, value = s, "ignoring unparseable canvas color");
            default
        }),
    }
}

fn canvas_length(value: Option<f64>, default: u32) -> u32 {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u32)
        .unwrap_or(default)
}

impl RawDocument {
    fn canvas(&self) -> Canvas {
        let defaults = Canvas::default();
        let nested = self.canvas.as_ref();
        Canvas {
            width: canvas_length(
                nested.and_then(|c| c.width).or(self.canvas_width),
                defaults.width,
            ),
            height: canvas_length(
                nested.and_then(|c| c.height).or(self.canvas_height),
                defaults.height,
            ),
            background: canvas_color(
                nested
                    .and_then(|c| c.background.as_deref())
                    .or(self.canvas_background.as_deref()),
                defaults.background,
                "background",
            ),
            border_width: canvas_length(
                nested
                    .and_then(|c| c.border_width)
                    .or(self.canvas_border_width),
                defaults.border_width,
            ),
            border_color: canvas_color(
                nested
                    .and_then(|c| c.border_color.as_deref())
                    .or(self.canvas_border_color.as_deref()),
                defaults.border_color,
                "borderColor",
            ),
        }
    }
}

impl RawElement {
    pub(crate) fn into_element(self, index: usize) -> Result<Element, DocumentError> {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(DocumentError::MissingId { index })?;

        let (style, legacy_widths) = match &self.style {
            Some(raw) => Style::from_raw(raw, &id),
            None => (Style::default(), None),
        };

        let content = self.content.unwrap_or_default();
        let kind = match self.kind.as_str() {
            "text" => ElementKind::Text {
                role: TextRole::Plain,
                content,
            },
            "unit_name" => ElementKind::Text {
                role: TextRole::UnitName,
                content,
            },
            "unit_class" => ElementKind::Text {
                role: TextRole::UnitClass,
                content,
            },
            "logo" | "flag" | "silhouette" => ElementKind::Image {
                kind: match self.kind.as_str() {
                    "logo" => ImageKind::Logo,
                    "flag" => ImageKind::Flag,
                    _ => ImageKind::Silhouette,
                },
                source: self.image.as_deref().and_then(ImageRef::parse),
            },
            "table" => ElementKind::Table {
                rows: self
                    .table_data
                    .unwrap_or_default()
                    .iter()
                    .map(|row| row.iter().map(cell_text).collect())
                    .collect(),
                column_weights: self
                    .column_weights
                    .or(legacy_widths)
                    .unwrap_or_default(),
            },
            other => {
                return Err(DocumentError::UnknownType {
                    id,
                    kind: other.to_string(),
                });
            }
        };

        Ok(Element {
            frame: Rect::new(
                self.x,
                self.y,
                self.width.unwrap_or(100.0),
                self.height.unwrap_or(30.0),
            ),
            id,
            style,
            kind,
        })
    }
}

impl TryFrom<RawDocument> for Document {
    type Error = DocumentError;

    fn try_from(raw: RawDocument) -> Result<Self, Self::Error> {
        let canvas = raw.canvas();
        let elements = raw
            .elements
            .into_iter()
            .enumerate()
            .map(|(i, e)| e.into_element(i))
            .collect::<Result<Vec<_>, _>>()?;
        Document::new(canvas, elements)
    }
}

// ============================================================================
// UNIT ENTITY
// ============================================================================

/// Raw entity fields supplied by the unit store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Unit {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unit_class: String,
    #[serde(default)]
    pub nation: String,
    #[serde(default)]
    pub logo_path: Option<String>,
    #[serde(default)]
    pub flag_path: Option<String>,
    #[serde(default)]
    pub silhouette_path: Option<String>,
}

/// A unit together with the layout it is rendered with.
///
/// Deserializes from the entity record shape, where `layout_config` is either
/// a layout object, a JSON string holding one, or absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "RawUnitSheet")]
pub struct UnitSheet {
    pub unit: Unit,
    pub document: Document,
}

#[derive(Deserialize)]
struct RawUnitSheet {
    #[serde(flatten)]
    unit: Unit,
    #[serde(default)]
    layout_config: Option<Value>,
}

impl TryFrom<RawUnitSheet> for UnitSheet {
    type Error = DocumentError;

    fn try_from(raw: RawUnitSheet) -> Result<Self, Self::Error> {
        let layout = match raw.layout_config {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(
                serde_json::from_str::<Value>(&s)
                    .map_err(|e| DocumentError::LayoutConfig(e.to_string()))?,
            ),
            Some(v) => Some(v),
        };
        let document = match layout {
            None => Document::default(),
            Some(v) => {
                let raw_doc: RawDocument = serde_json::from_value(v)
                    .map_err(|e| DocumentError::LayoutConfig(e.to_string()))?;
                Document::try_from(raw_doc)?
            }
        };
        Ok(UnitSheet {
            unit: raw.unit,
            document,
        })
    }
}

impl UnitSheet {
    pub fn new(unit: Unit, document: Document) -> Self {
        Self { unit, document }
    }

    /// Render a unit through a template with its per-unit customization
    /// applied on top.
    pub fn from_template(
        unit: Unit,
        template: &Document,
        customization: &Customization,
    ) -> Result<Self, DocumentError> {
        Ok(Self {
            unit,
            document: overlay::apply(template, customization)?,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, crate::FlotillaError> {
        Ok(serde_json::from_str(json)?)
    }
}
