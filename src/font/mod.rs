//! # Font Resolver
//!
//! Maps a requested (family, weight, style) to a face that can measure and
//! paint text. Lookup walks a fixed chain and stops at the first hit:
//!
//! 1. the exact face (family + bold/regular + italic/upright)
//! 2. the family's regular face
//! 3. each configured fallback family, in order
//! 4. the built-in Spleen bitmap face, which always succeeds
//!
//! System faces come from a `fontdb` database and are rendered with
//! `ab_glyph`. Resolved faces are cached per normalized (family, bold,
//! italic), so a sheet full of identical text elements loads one face.

pub mod builtin;

use ab_glyph::{Font, FontArc, FontVec, PxScale, ScaleFont, point};
use image::RgbImage;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::config::FontConfig;
use crate::document::Color;
use crate::document::style::{DEFAULT_FONT_FAMILY, FontStyle, FontWeight};
pub use builtin::BuiltinFace;

// ============================================================================
// FACES
// ============================================================================

/// Which step of the chain produced a face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceOrigin {
    Exact,
    FamilyRegular,
    Fallback(String),
    Builtin,
}

/// A loaded face.
#[derive(Clone)]
pub enum Face {
    Outline(FontArc),
    Builtin(BuiltinFace),
}

impl std::fmt::Debug for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Face::Outline(_) => f.write_str("Face::Outline"),
            Face::Builtin(_) => f.write_str("Face::Builtin"),
        }
    }
}

/// A face plus how it was found.
#[derive(Debug, Clone)]
pub struct ResolvedFace {
    pub face: Face,
    pub origin: FaceOrigin,
    /// Bold was requested but the face is regular; strokes are doubled.
    pub synthetic_bold: bool,
}

/// Vertical metrics of one line of text at a given size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    /// Ascent minus descent: the glyph box height.
    pub height: f32,
}

impl ResolvedFace {
    pub fn builtin(bold: bool) -> Self {
        Self {
            face: Face::Builtin(BuiltinFace),
            origin: FaceOrigin::Builtin,
            synthetic_bold: bold,
        }
    }

    fn bold_offset(&self, px: f32) -> f32 {
        if self.synthetic_bold {
            (px / 24.0).round().max(1.0)
        } else {
            0.0
        }
    }

    pub fn line_metrics(&self, px: f32) -> LineMetrics {
        match &self.face {
            Face::Outline(font) => {
                let scaled = font.as_scaled(PxScale::from(px));
                LineMetrics {
                    ascent: scaled.ascent(),
                    height: scaled.ascent() - scaled.descent(),
                }
            }
            Face::Builtin(face) => LineMetrics {
                ascent: face.height(px),
                height: face.height(px),
            },
        }
    }

    /// Advance width of `text`, with `letter_spacing` between glyphs.
    pub fn measure(&self, text: &str, px: f32, letter_spacing: f32) -> f32 {
        let count = text.chars().count();
        if count == 0 {
            return 0.0;
        }
        let advances: f32 = match &self.face {
            Face::Outline(font) => {
                let scaled = font.as_scaled(PxScale::from(px));
                text.chars().map(|ch| scaled.h_advance(font.glyph_id(ch))).sum()
            }
            Face::Builtin(face) => face.advance(px) * count as f32,
        };
        advances + letter_spacing * (count - 1) as f32 + self.bold_offset(px)
    }

    /// Paint `text` with the top of its glyph box at `top`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &self,
        img: &mut RgbImage,
        text: &str,
        px: f32,
        letter_spacing: f32,
        x: f32,
        top: f32,
        color: Color,
    ) {
        let passes: &[f32] = if self.synthetic_bold {
            &[0.0, 1.0]
        } else {
            &[0.0]
        };
        let offset = self.bold_offset(px);
        for pass in passes {
            let dx = pass * offset;
            match &self.face {
                Face::Outline(font) => {
                    draw_outline(font, img, text, px, letter_spacing, x + dx, top, color)
                }
                Face::Builtin(face) => face.draw(img, text, px, letter_spacing, x + dx, top, color),
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_outline(
    font: &FontArc,
    img: &mut RgbImage,
    text: &str,
    px: f32,
    letter_spacing: f32,
    x: f32,
    top: f32,
    color: Color,
) {
    let scale = PxScale::from(px);
    let scaled = font.as_scaled(scale);
    let baseline = top + scaled.ascent();
    let mut caret = x;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        let glyph = glyph_id.with_scale_and_position(scale, point(caret, baseline));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            let visible = bounds.max.x > 0.0
                && bounds.max.y > 0.0
                && bounds.min.x < img.width() as f32
                && bounds.min.y < img.height() as f32;
            if !visible {
                caret += scaled.h_advance(glyph_id) + letter_spacing;
                continue;
            }
            outlined.draw(|gx, gy, coverage| {
                blend_pixel(
                    img,
                    bounds.min.x as i32 + gx as i32,
                    bounds.min.y as i32 + gy as i32,
                    color,
                    coverage,
                );
            });
        }
        caret += scaled.h_advance(glyph_id) + letter_spacing;
    }
}

/// Mix `color` into one pixel by `coverage`. Out-of-bounds writes are dropped.
pub(crate) fn blend_pixel(img: &mut RgbImage, x: i32, y: i32, color: Color, coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
        return;
    }
    let alpha = coverage.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let pixel = img.get_pixel_mut(x as u32, y as u32);
    for (channel, target) in pixel.0.iter_mut().zip([color.r, color.g, color.b]) {
        *channel = (*channel as f32 * (1.0 - alpha) + target as f32 * alpha).round() as u8;
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Strip quotes, take the first entry of a CSS family list and map generic
/// families onto concrete ones.
pub fn normalize_family(family: &str) -> String {
    let first = family
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    match first.to_ascii_lowercase().as_str() {
        "" => DEFAULT_FONT_FAMILY.to_string(),
        "sans-serif" | "system-ui" => "Arial".to_string(),
        "serif" => "Times New Roman".to_string(),
        "monospace" => "Courier New".to_string(),
        _ => first.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FaceKey {
    family: String,
    bold: bool,
    italic: bool,
}

pub struct FontResolver {
    db: fontdb::Database,
    fallback_families: Vec<String>,
    cache: RwLock<HashMap<FaceKey, Arc<ResolvedFace>>>,
}

impl FontResolver {
    pub fn new(config: &FontConfig) -> Self {
        let mut db = fontdb::Database::new();
        if config.system_fonts {
            db.load_system_fonts();
        }
        for dir in &config.font_dirs {
            db.load_fonts_dir(dir);
        }
        debug!(faces = db.len(), "font database loaded");
        Self {
            db,
            fallback_families: config.fallback_families.clone(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// A resolver with no system faces: everything lands on the built-in face.
    pub fn builtin_only() -> Self {
        Self {
            db: fontdb::Database::new(),
            fallback_families: Vec::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Register an in-memory font file.
    pub fn add_font_data(&mut self, data: Vec<u8>) {
        self.db.load_font_data(data);
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    pub fn resolve(&self, family: &str, weight: FontWeight, style: FontStyle) -> Arc<ResolvedFace> {
        let key = FaceKey {
            family: normalize_family(family).to_lowercase(),
            bold: weight.is_bold(),
            italic: style.is_italic(),
        };
        if let Some(hit) = self.cache.read().ok().and_then(|c| c.get(&key).cloned()) {
            return hit;
        }

        let resolved = Arc::new(self.lookup(&normalize_family(family), key.bold, key.italic));
        debug!(
            family = %key.family,
            bold = key.bold,
            italic = key.italic,
            origin = ?resolved.origin,
            "font resolved"
        );
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, resolved.clone());
        }
        resolved
    }

    fn lookup(&self, family: &str, bold: bool, italic: bool) -> ResolvedFace {
        if let Some(name) = self.canonical_family(family) {
            if let Some((face, true)) = self.query(&name, bold, italic) {
                return ResolvedFace {
                    face,
                    origin: FaceOrigin::Exact,
                    synthetic_bold: false,
                };
            }
            if let Some((face, _)) = self.query(&name, false, false) {
                return ResolvedFace {
                    face,
                    origin: FaceOrigin::FamilyRegular,
                    synthetic_bold: bold,
                };
            }
        }

        for fallback in &self.fallback_families {
            let Some(name) = self.canonical_family(fallback) else {
                continue;
            };
            if let Some((face, exact)) = self.query(&name, bold, italic) {
                return ResolvedFace {
                    face,
                    origin: FaceOrigin::Fallback(name),
                    synthetic_bold: bold && !exact,
                };
            }
        }

        ResolvedFace::builtin(bold)
    }

    /// The database's spelling of a family name, matched case-insensitively.
    fn canonical_family(&self, family: &str) -> Option<String> {
        self.db
            .faces()
            .flat_map(|face| face.families.iter())
            .find(|(name, _)| name.eq_ignore_ascii_case(family))
            .map(|(name, _)| name.clone())
    }

    /// Best face of `family` for the request, and whether it matches it.
    fn query(&self, family: &str, bold: bool, italic: bool) -> Option<(Face, bool)> {
        let families = [fontdb::Family::Name(family)];
        let query = fontdb::Query {
            families: &families,
            weight: if bold {
                fontdb::Weight::BOLD
            } else {
                fontdb::Weight::NORMAL
            },
            stretch: fontdb::Stretch::Normal,
            style: if italic {
                fontdb::Style::Italic
            } else {
                fontdb::Style::Normal
            },
        };
        let id = self.db.query(&query)?;
        let info = self.db.face(id)?;
        let exact = (info.weight.0 >= 600) == bold && (info.style != fontdb::Style::Normal) == italic;

        let font = self
            .db
            .with_face_data(id, |data, index| {
                FontVec::try_from_vec_and_index(data.to_vec(), index).ok()
            })
            .flatten()?;
        Some((Face::Outline(FontArc::new(font)), exact))
    }
}

impl Default for FontResolver {
    fn default() -> Self {
        Self::new(&FontConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_family() {
        assert_eq!(normalize_family("'Helvetica Neue', Arial, sans-serif"), "Helvetica Neue");
        assert_eq!(normalize_family("\"Georgia\""), "Georgia");
        assert_eq!(normalize_family("sans-serif"), "Arial");
        assert_eq!(normalize_family("system-ui"), "Arial");
        assert_eq!(normalize_family("serif"), "Times New Roman");
        assert_eq!(normalize_family("monospace"), "Courier New");
        assert_eq!(normalize_family("  "), "Arial");
    }

    #[test]
    fn test_empty_database_lands_on_builtin() {
        let fonts = FontResolver::builtin_only();
        let face = fonts.resolve("Arial", FontWeight::Bold, FontStyle::Italic);
        assert_eq!(face.origin, FaceOrigin::Builtin);
        assert!(face.synthetic_bold);
        assert!(matches!(face.face, Face::Builtin(_)));
    }

    #[test]
    fn test_faces_are_cached_per_normalized_key() {
        let fonts = FontResolver::builtin_only();
        let a = fonts.resolve("'Arial'", FontWeight::Normal, FontStyle::Normal);
        let b = fonts.resolve("arial, sans-serif", FontWeight::Normal, FontStyle::Normal);
        let c = fonts.resolve("Arial", FontWeight::Bold, FontStyle::Normal);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_measure_includes_letter_spacing() {
        let face = ResolvedFace::builtin(false);
        assert_eq!(face.measure("abc", 24.0, 0.0), 36.0);
        assert_eq!(face.measure("abc", 24.0, 2.0), 40.0);
        assert_eq!(face.measure("", 24.0, 2.0), 0.0);
    }

    #[test]
    fn test_synthetic_bold_widens_and_darkens() {
        let regular = ResolvedFace::builtin(false);
        let bold = ResolvedFace::builtin(true);
        assert_eq!(bold.measure("A", 24.0, 0.0), regular.measure("A", 24.0, 0.0) + 1.0);

        let ink = |face: &ResolvedFace| {
            let mut img = RgbImage::from_pixel(40, 30, image::Rgb([255, 255, 255]));
            face.draw(&mut img, "H", 24.0, 0.0, 2.0, 2.0, Color::BLACK);
            img.pixels().filter(|p| p.0 != [255, 255, 255]).count()
        };
        assert!(ink(&bold) > ink(&regular));
    }

    #[test]
    fn test_blend_pixel_mixes_and_clips() {
        let mut img = RgbImage::from_pixel(2, 2, image::Rgb([255, 255, 255]));
        blend_pixel(&mut img, 0, 0, Color::BLACK, 0.5);
        blend_pixel(&mut img, 5, 5, Color::BLACK, 1.0);
        assert_eq!(img.get_pixel(0, 0).0, [128, 128, 128]);
        assert_eq!(img.get_pixel(1, 1).0, [255, 255, 255]);
    }
}
