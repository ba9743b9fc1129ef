//! Typed element style.
//!
//! Layout JSON carries CSS-flavoured style dictionaries written by a browser
//! editor: numbers arrive as `16`, `"16px"` or `"1.2em"`, weights as `"bold"`
//! or `700`, colors as hex or `rgb(...)`. [`Style::from_raw`] normalizes all
//! of that once, at document construction. Values that cannot be understood
//! are dropped (with a warning) so the renderer falls back to defaults
//! instead of failing the whole sheet.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

// ============================================================================
// DEFAULTS
// ============================================================================

pub const DEFAULT_FONT_FAMILY: &str = "Arial";
pub const DEFAULT_FONT_SIZE: f32 = 16.0;
pub const DEFAULT_LINE_HEIGHT: f32 = 1.2;
pub const DEFAULT_PADDING: f32 = 8.0;
/// Font sizes above this are clamped; glyphs larger than the biggest canvas
/// are never useful.
pub const MAX_FONT_SIZE: f32 = 2048.0;

// ============================================================================
// COLOR
// ============================================================================

/// An opaque sRGB color. Alpha components in the input are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`, `rgba(...)` or a
    /// handful of common names.
    pub fn parse(input: &str) -> Option<Color> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<&str> = args.split(',').map(str::trim).collect();
            if parts.len() < 3 {
                return None;
            }
            let channel = |p: &str| p.parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0) as u8);
            return Some(Color::rgb(
                channel(parts[0])?,
                channel(parts[1])?,
                channel(parts[2])?,
            ));
        }
        match lower.as_str() {
            "white" => Some(Color::WHITE),
            "black" => Some(Color::BLACK),
            "red" => Some(Color::rgb(255, 0, 0)),
            "green" => Some(Color::rgb(0, 128, 0)),
            "blue" => Some(Color::rgb(0, 0, 255)),
            "gray" | "grey" => Some(Color::rgb(128, 128, 128)),
            "navy" => Some(Color::rgb(0, 0, 128)),
            _ => None,
        }
    }

    fn parse_hex(hex: &str) -> Option<Color> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 | 4 => {
                let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 | 8 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            _ => None,
        }
    }

    /// Uppercase `RRGGBB`, the form OOXML `srgbClr` expects.
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

// ============================================================================
// KEYWORD ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

impl FontWeight {
    /// Keywords `bold`/`bolder` and numeric weights of 600 or more are bold.
    pub fn parse(value: &Value) -> Option<FontWeight> {
        match value {
            Value::Number(n) => n.as_f64().map(Self::from_numeric),
            Value::String(s) => {
                let s = s.trim().to_ascii_lowercase();
                match s.as_str() {
                    "bold" | "bolder" => Some(FontWeight::Bold),
                    "normal" | "lighter" => Some(FontWeight::Normal),
                    other => other.parse::<f64>().ok().map(Self::from_numeric),
                }
            }
            _ => None,
        }
    }

    fn from_numeric(weight: f64) -> FontWeight {
        if weight >= 600.0 {
            FontWeight::Bold
        } else {
            FontWeight::Normal
        }
    }

    pub fn is_bold(self) -> bool {
        self == FontWeight::Bold
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

impl FontStyle {
    pub fn parse(s: &str) -> FontStyle {
        match s.trim().to_ascii_lowercase().as_str() {
            "italic" | "oblique" => FontStyle::Italic,
            _ => FontStyle::Normal,
        }
    }

    pub fn is_italic(self) -> bool {
        self == FontStyle::Italic
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn parse(s: &str) -> Option<TextAlign> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "start" | "justify" => Some(TextAlign::Left),
            "center" => Some(TextAlign::Center),
            "right" | "end" => Some(TextAlign::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextDecoration {
    #[default]
    None,
    Underline,
    LineThrough,
}

impl TextDecoration {
    pub fn parse(s: &str) -> Option<TextDecoration> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Some(TextDecoration::None),
            "underline" => Some(TextDecoration::Underline),
            "line-through" => Some(TextDecoration::LineThrough),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextTransform {
    #[default]
    None,
    Upper,
    Lower,
    Capitalize,
}

impl TextTransform {
    pub fn parse(s: &str) -> Option<TextTransform> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Some(TextTransform::None),
            "upper" | "uppercase" => Some(TextTransform::Upper),
            "lower" | "lowercase" => Some(TextTransform::Lower),
            "capitalize" => Some(TextTransform::Capitalize),
            _ => None,
        }
    }

    /// Apply the transform. `Capitalize` uppercases the first letter of each
    /// whitespace-separated word and lowercases the rest.
    pub fn apply(self, text: &str) -> String {
        match self {
            TextTransform::None => text.to_string(),
            TextTransform::Upper => text.to_uppercase(),
            TextTransform::Lower => text.to_lowercase(),
            TextTransform::Capitalize => {
                let mut out = String::with_capacity(text.len());
                let mut at_word_start = true;
                for ch in text.chars() {
                    if ch.is_whitespace() {
                        at_word_start = true;
                        out.push(ch);
                    } else if at_word_start {
                        out.extend(ch.to_uppercase());
                        at_word_start = false;
                    } else {
                        out.extend(ch.to_lowercase());
                    }
                }
                out
            }
        }
    }
}

// ============================================================================
// STYLE
// ============================================================================

/// Style dictionary as it appears in layout JSON.
///
/// Every field is kept as a raw JSON value; [`Style::from_raw`] does the
/// interpretation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStyle {
    pub font_family: Option<Value>,
    pub font_size: Option<Value>,
    pub font_weight: Option<Value>,
    pub font_style: Option<Value>,
    pub color: Option<Value>,
    pub text_align: Option<Value>,
    pub text_decoration: Option<Value>,
    pub text_transform: Option<Value>,
    pub letter_spacing: Option<Value>,
    pub line_height: Option<Value>,
    pub background_color: Option<Value>,
    pub border_width: Option<Value>,
    pub border_color: Option<Value>,
    pub border_radius: Option<Value>,
    pub padding: Option<Value>,
    pub header_background_color: Option<Value>,
    pub column_widths: Option<Vec<Value>>,
}

/// Validated element style. `None` means "not set, use the default".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub font_weight: Option<FontWeight>,
    pub font_style: Option<FontStyle>,
    pub color: Option<Color>,
    pub text_align: Option<TextAlign>,
    pub text_decoration: Option<TextDecoration>,
    pub text_transform: Option<TextTransform>,
    pub letter_spacing: Option<f32>,
    pub line_height: Option<f32>,
    pub background_color: Option<Color>,
    pub border_width: Option<f32>,
    pub border_color: Option<Color>,
    pub border_radius: Option<f32>,
    pub padding: Option<f32>,
    pub header_background_color: Option<Color>,
}

/// Split a CSS-ish value into its number and unit suffix (`""` when bare).
/// Negative and non-finite values are rejected.
fn css_value(value: &Value) -> Option<(f32, &'static str)> {
    let (n, unit) = match value {
        Value::Number(n) => (n.as_f64()?, ""),
        Value::String(s) => {
            let s = s.trim();
            let (number, unit) = ["rem", "px", "pt", "em"]
                .iter()
                .find_map(|unit| s.strip_suffix(unit).map(|n| (n, *unit)))
                .unwrap_or((s, ""));
            (number.trim().parse::<f64>().ok()?, unit)
        }
        _ => return None,
    };
    (n.is_finite() && n >= 0.0).then_some((n as f32, unit))
}

/// Parse a CSS-ish length in pixels. `em`/`rem` are relative to the default
/// font size.
pub(crate) fn css_number(value: &Value) -> Option<f32> {
    css_value(value).map(|(n, unit)| match unit {
        "em" | "rem" => n * DEFAULT_FONT_SIZE,
        _ => n,
    })
}

fn as_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

impl Style {
    /// Interpret a raw style dictionary. Returns the style plus the legacy
    /// `columnWidths` list, which belongs to the table payload.
    pub fn from_raw(raw: &RawStyle, element_id: &str) -> (Style, Option<Vec<f32>>) {
        let mut bad = Vec::new();

        macro_rules! field {
            ($name:literal, $value:expr, $parse:expr) => {
                match $value.as_ref() {
                    None | Some(Value::Null) => None,
                    Some(v) => {
                        let parsed = $parse(v);
                        if parsed.is_none() {
                            bad.push($name);
                        }
                        parsed
                    }
                }
            };
        }

        let color = |v: &Value| as_str(v).and_then(Color::parse);

        let font_size = field!("fontSize", raw.font_size, css_number)
            .filter(|s| *s > 0.0)
            .map(|s| s.min(MAX_FONT_SIZE));
        let mut style = Style {
            font_family: field!("fontFamily", raw.font_family, |v: &Value| as_str(v)
                .map(str::to_string)),
            font_size,
            font_weight: field!("fontWeight", raw.font_weight, FontWeight::parse),
            font_style: field!("fontStyle", raw.font_style, |v: &Value| as_str(v)
                .map(FontStyle::parse)),
            color: field!("color", raw.color, color),
            text_align: field!("textAlign", raw.text_align, |v: &Value| as_str(v)
                .and_then(TextAlign::parse)),
            text_decoration: field!("textDecoration", raw.text_decoration, |v: &Value| {
                as_str(v).and_then(TextDecoration::parse)
            }),
            text_transform: field!("textTransform", raw.text_transform, |v: &Value| {
                as_str(v).and_then(TextTransform::parse)
            }),
            letter_spacing: field!("letterSpacing", raw.letter_spacing, |v: &Value| {
                as_str(v)
                    .filter(|s| *s == "normal")
                    .map(|_| 0.0)
                    .or_else(|| css_number(v))
            }),
            line_height: None,
            background_color: field!("backgroundColor", raw.background_color, |v: &Value| {
                as_str(v)
                    .filter(|s| s.eq_ignore_ascii_case("transparent"))
                    .map(|_| None)
                    .or_else(|| Some(color(v)).filter(Option::is_some))
            })
            .flatten(),
            border_width: field!("borderWidth", raw.border_width, css_number),
            border_color: field!("borderColor", raw.border_color, color),
            border_radius: field!("borderRadius", raw.border_radius, css_number),
            padding: field!("padding", raw.padding, css_number),
            header_background_color: field!(
                "headerBackgroundColor",
                raw.header_background_color,
                color
            ),
        };

        // A pixel line height is relative to the font size; anything else is
        // already a multiplier.
        style.line_height = field!("lineHeight", raw.line_height, |v: &Value| {
            css_value(v)
                .map(|(n, unit)| match unit {
                    "px" => n / font_size.unwrap_or(DEFAULT_FONT_SIZE),
                    _ => n,
                })
                .filter(|m| *m > 0.0)
        });

        let column_widths = raw
            .column_widths
            .as_ref()
            .map(|list| list.iter().filter_map(css_number).collect::<Vec<_>>());

        if !bad.is_empty() {
            warn!(element = element_id, fields = ?bad, "ignoring unparseable style values");
        }
        (style, column_widths)
    }

    /// Overwrite every field that is set in `patch`.
    pub fn overlay(&mut self, patch: &Style) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if patch.$field.is_some() { self.$field = patch.$field.clone(); })*
            };
        }
        take!(
            font_family,
            font_size,
            font_weight,
            font_style,
            color,
            text_align,
            text_decoration,
            text_transform,
            letter_spacing,
            line_height,
            background_color,
            border_width,
            border_color,
            border_radius,
            padding,
            header_background_color
        );
    }

    pub fn font_family(&self) -> &str {
        self.font_family.as_deref().unwrap_or(DEFAULT_FONT_FAMILY)
    }

    pub fn font_size(&self) -> f32 {
        self.font_size.unwrap_or(DEFAULT_FONT_SIZE)
    }

    pub fn font_weight(&self) -> FontWeight {
        self.font_weight.unwrap_or_default()
    }

    pub fn font_style(&self) -> FontStyle {
        self.font_style.unwrap_or_default()
    }

    pub fn color(&self) -> Color {
        self.color.unwrap_or(Color::BLACK)
    }

    pub fn text_align(&self) -> TextAlign {
        self.text_align.unwrap_or_default()
    }

    pub fn text_decoration(&self) -> TextDecoration {
        self.text_decoration.unwrap_or_default()
    }

    pub fn text_transform(&self) -> TextTransform {
        self.text_transform.unwrap_or_default()
    }

    pub fn letter_spacing(&self) -> f32 {
        self.letter_spacing.unwrap_or(0.0)
    }

    pub fn line_height(&self) -> f32 {
        self.line_height.unwrap_or(DEFAULT_LINE_HEIGHT)
    }

    pub fn padding(&self) -> f32 {
        self.padding.unwrap_or(DEFAULT_PADDING)
    }

    /// Border width in whole pixels; borders are stroked as concentric rings.
    pub fn border_width(&self) -> u32 {
        self.border_width.map(|w| w.round() as u32).unwrap_or(0)
    }

    pub fn border_color(&self) -> Color {
        self.border_color.unwrap_or(Color::BLACK)
    }

    pub fn border_radius(&self) -> f32 {
        self.border_radius.unwrap_or(0.0)
    }
}
