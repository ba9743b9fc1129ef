//! Built-in bitmap face.
//!
//! Spleen 12×24 scaled (nearest neighbor) to the requested pixel size. It is
//! compiled into the binary, so it is the one face that is always available.

use image::RgbImage;
use spleen_font::{FONT_12X24, PSF2Font};

use super::blend_pixel;
use crate::document::Color;

const CELL_WIDTH: usize = 12;
const CELL_HEIGHT: usize = 24;

/// Glyph bitmap, row-major, `CELL_WIDTH * CELL_HEIGHT` entries.
type Bitmap = Vec<bool>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuiltinFace;

impl BuiltinFace {
    fn scale(px: f32) -> f32 {
        (px / CELL_HEIGHT as f32).max(0.01)
    }

    pub fn advance(&self, px: f32) -> f32 {
        CELL_WIDTH as f32 * Self::scale(px)
    }

    /// Line height in pixels; the bitmap cell is exactly one em.
    pub fn height(&self, px: f32) -> f32 {
        CELL_HEIGHT as f32 * Self::scale(px)
    }

    fn glyphs(text: &str) -> Vec<Bitmap> {
        let Ok(mut font) = PSF2Font::new(FONT_12X24) else {
            return text.chars().map(|_| hollow_box()).collect();
        };
        let mut utf8 = [0u8; 4];
        text.chars()
            .map(|ch| {
                let bytes = ch.encode_utf8(&mut utf8).as_bytes();
                match font.glyph_for_utf8(bytes) {
                    Some(glyph) => {
                        let mut bitmap = vec![false; CELL_WIDTH * CELL_HEIGHT];
                        for (row_y, row) in glyph.enumerate() {
                            for (col_x, on) in row.enumerate() {
                                let idx = row_y * CELL_WIDTH + col_x;
                                if col_x < CELL_WIDTH && idx < bitmap.len() {
                                    bitmap[idx] = on;
                                }
                            }
                        }
                        bitmap
                    }
                    None => hollow_box(),
                }
            })
            .collect()
    }

    /// Paint `text` with its top-left corner at `(x, top)`. Only the cell
    /// pixels that land inside `img` are visited.
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
        let scale = Self::scale(px);
        let (img_w, img_h) = (img.width() as i64, img.height() as i64);
        let cell_w = (CELL_WIDTH as f32 * scale).ceil() as i64;
        let cell_h = (CELL_HEIGHT as f32 * scale).ceil() as i64;
        let origin_y = top.round() as i64;
        let rows = origin_y.max(0)..origin_y.saturating_add(cell_h).min(img_h);
        if rows.is_empty() {
            return;
        }
        let mut caret = x;

        for bitmap in Self::glyphs(text) {
            let origin_x = caret.round() as i64;
            caret += self.advance(px) + letter_spacing;
            let cols = origin_x.max(0)..origin_x.saturating_add(cell_w).min(img_w);
            if cols.is_empty() {
                continue;
            }
            for py in rows.clone() {
                let sy = (((py - origin_y) as f32 / scale) as usize).min(CELL_HEIGHT - 1);
                for px_x in cols.clone() {
                    let sx = (((px_x - origin_x) as f32 / scale) as usize).min(CELL_WIDTH - 1);
                    if bitmap[sy * CELL_WIDTH + sx] {
                        blend_pixel(img, px_x as i32, py as i32, color, 1.0);
                    }
                }
            }
        }
    }
}

/// Outline drawn for characters the bitmap font lacks.
fn hollow_box() -> Bitmap {
    let mut bitmap = vec![false; CELL_WIDTH * CELL_HEIGHT];
    for y in 4..CELL_HEIGHT - 2 {
        for x in 1..CELL_WIDTH - 1 {
            let edge = y == 4 || y == CELL_HEIGHT - 3 || x == 1 || x == CELL_WIDTH - 2;
            bitmap[y * CELL_WIDTH + x] = edge;
        }
    }
    bitmap
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ink(img: &RgbImage) -> usize {
        img.pixels().filter(|p| p.0 != [255, 255, 255]).count()
    }

    #[test]
    fn test_metrics_scale_with_size() {
        let face = BuiltinFace;
        assert_eq!(face.advance(24.0), 12.0);
        assert_eq!(face.height(24.0), 24.0);
        assert_eq!(face.advance(48.0), 24.0);
        assert_eq!(face.height(12.0), 12.0);
    }

    #[test]
    fn test_draw_produces_ink_inside_cell() {
        let mut img = RgbImage::from_pixel(100, 40, image::Rgb([255, 255, 255]));
        BuiltinFace.draw(&mut img, "AB", 24.0, 0.0, 10.0, 5.0, Color::BLACK);
        assert!(ink(&img) > 20);
        for (x, y, p) in img.enumerate_pixels() {
            if p.0 != [255, 255, 255] {
                assert!((10..34).contains(&x) && (5..29).contains(&y), "ink at {},{}", x, y);
            }
        }
    }

    #[test]
    fn test_space_draws_nothing() {
        let mut img = RgbImage::from_pixel(40, 40, image::Rgb([255, 255, 255]));
        BuiltinFace.draw(&mut img, "  ", 24.0, 0.0, 0.0, 0.0, Color::BLACK);
        assert_eq!(ink(&img), 0);
    }

    #[test]
    fn test_unknown_glyph_draws_box() {
        let mut img = RgbImage::from_pixel(40, 40, image::Rgb([255, 255, 255]));
        BuiltinFace.draw(&mut img, "\u{1F6A2}", 24.0, 0.0, 0.0, 0.0, Color::BLACK);
        assert!(ink(&img) > 0);
    }

    #[test]
    fn test_huge_glyphs_only_touch_the_image() {
        // Cells millions of pixels wide: the work is bounded by the image
        let mut img = RgbImage::from_pixel(16, 16, image::Rgb([255, 255, 255]));
        BuiltinFace.draw(&mut img, "MMMM", 1.0e7, 0.0, -1.0e8, 0.0, Color::BLACK);
        BuiltinFace.draw(&mut img, "M", 1.0e7, 0.0, 100.0, 0.0, Color::BLACK);
        assert_eq!(ink(&img), 0);

        BuiltinFace.draw(&mut img, "\u{1F6A2}", 1.0e7, 0.0, -4.0e6, -1.0e6, Color::BLACK);
        assert_eq!(img.dimensions(), (16, 16));
    }

    #[test]
    fn test_draw_clips_at_image_edge() {
        let mut img = RgbImage::from_pixel(20, 20, image::Rgb([255, 255, 255]));
        BuiltinFace.draw(&mut img, "WWW", 48.0, 0.0, -5.0, -5.0, Color::BLACK);
        assert!(ink(&img) > 0);
    }
}
