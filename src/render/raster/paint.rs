//! Pixel primitives for the raster backend.
//!
//! Rectangles are snapped to whole pixels by rounding their edges; a pixel
//! belongs to a shape when its center does.

use image::{Rgb, RgbImage};

use crate::document::Color;
use crate::layout::geometry::Rect;

fn pixel_span(start: f32, end: f32, limit: u32) -> std::ops::Range<u32> {
    let lo = start.round().max(0.0) as u32;
    let hi = (end.round().max(0.0) as u32).min(limit);
    lo.min(hi)..hi
}

/// True when `(px, py)` lies inside `rect` with corners rounded by `radius`.
fn inside_rounded(rect: &Rect, radius: f32, px: f32, py: f32) -> bool {
    if px < rect.x || py < rect.y || px > rect.right() || py > rect.bottom() {
        return false;
    }
    let r = radius.min(rect.width / 2.0).min(rect.height / 2.0);
    if r <= 0.0 {
        return true;
    }
    let cx = px.clamp(rect.x + r, rect.right() - r);
    let cy = py.clamp(rect.y + r, rect.bottom() - r);
    let (dx, dy) = (px - cx, py - cy);
    dx * dx + dy * dy <= r * r
}

/// Fill `rect`, optionally with rounded corners.
pub fn fill_rect(img: &mut RgbImage, rect: Rect, radius: f32, color: Color) {
    let rgb = Rgb([color.r, color.g, color.b]);
    for y in pixel_span(rect.y, rect.bottom(), img.height()) {
        for x in pixel_span(rect.x, rect.right(), img.width()) {
            if radius <= 0.0 || inside_rounded(&rect, radius, x as f32 + 0.5, y as f32 + 0.5) {
                img.put_pixel(x, y, rgb);
            }
        }
    }
}

/// Stroke a border of `width` pixels inside the edge of `rect`: the pixels in
/// the outer shape that are not in the shape inset by `width`.
pub fn stroke_border(img: &mut RgbImage, rect: Rect, width: u32, radius: f32, color: Color) {
    if width == 0 || rect.is_empty() {
        return;
    }
    let inner = rect.inset(width as f32);
    let inner_radius = (radius - width as f32).max(0.0);
    let rgb = Rgb([color.r, color.g, color.b]);

    for y in pixel_span(rect.y, rect.bottom(), img.height()) {
        for x in pixel_span(rect.x, rect.right(), img.width()) {
            let (cx, cy) = (x as f32 + 0.5, y as f32 + 0.5);
            let in_outer = radius <= 0.0 || inside_rounded(&rect, radius, cx, cy);
            let in_inner = !inner.is_empty() && inside_rounded(&inner, inner_radius, cx, cy);
            if in_outer && !in_inner {
                img.put_pixel(x, y, rgb);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    fn count(img: &RgbImage, color: Color) -> usize {
        img.pixels()
            .filter(|p| p.0 == [color.r, color.g, color.b])
            .count()
    }

    #[test]
    fn test_fill_snaps_and_clips() {
        let mut img = white(10, 10);
        fill_rect(&mut img, Rect::new(-5.0, 2.0, 9.0, 3.0), 0.0, Color::BLACK);
        assert_eq!(count(&img, Color::BLACK), 4 * 3);
        assert_eq!(img.get_pixel(3, 2).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(4, 2).0, [255, 255, 255]);
    }

    #[test]
    fn test_rounded_fill_skips_corners() {
        let mut img = white(20, 20);
        fill_rect(&mut img, Rect::new(0.0, 0.0, 20.0, 20.0), 8.0, Color::BLACK);
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(10, 10).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(10, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_border_is_concentric_rings() {
        let mut img = white(10, 10);
        stroke_border(&mut img, Rect::new(0.0, 0.0, 10.0, 10.0), 2, 0.0, Color::BLACK);
        // 100 pixels minus the 6x6 interior
        assert_eq!(count(&img, Color::BLACK), 64);
        assert_eq!(img.get_pixel(1, 5).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(2, 5).0, [255, 255, 255]);
    }

    #[test]
    fn test_thick_border_fills_small_box() {
        let mut img = white(6, 6);
        stroke_border(&mut img, Rect::new(0.0, 0.0, 6.0, 6.0), 4, 0.0, Color::BLACK);
        assert_eq!(count(&img, Color::BLACK), 36);
    }
}
