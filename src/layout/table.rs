//! Table column allocation and cell fitting.

use crate::document::Color;

/// Horizontal space reserved inside each raster cell.
pub const CELL_PADDING: f32 = 8.0;
/// Appended to truncated cell text.
pub const ELLIPSIS: &str = "...";
/// Cell font size when the element style does not set one.
pub const DEFAULT_CELL_FONT_SIZE: f32 = 12.0;

pub const HEADER_BACKGROUND: Color = Color::rgb(0x1F, 0x49, 0x7D);
pub const HEADER_TEXT: Color = Color::WHITE;
pub const BODY_TEXT: Color = Color::rgb(0x37, 0x41, 0x51);
pub const GRID_LINE: Color = Color::rgb(0xD1, 0xD5, 0xDB);

/// Split `available` width across `columns` according to `weights`.
///
/// Missing weights take the mean of the given ones; extra weights are
/// ignored. Without usable weights the split is equal.
pub fn column_widths(columns: usize, weights: &[f32], available: f32) -> Vec<f32> {
    if columns == 0 {
        return Vec::new();
    }
    let equal = vec![available / columns as f32; columns];

    let given: Vec<f32> = weights
        .iter()
        .take(columns)
        .map(|w| if w.is_finite() && *w > 0.0 { *w } else { 0.0 })
        .collect();
    if given.is_empty() {
        return equal;
    }
    let mean = given.iter().sum::<f32>() / given.len() as f32;
    let mut full = given;
    full.resize(columns, mean);

    let total: f32 = full.iter().sum();
    if total <= 0.0 {
        return equal;
    }
    full.iter().map(|w| w * available / total).collect()
}

/// Left edges of each column, starting at `x`.
pub fn column_offsets(x: f32, widths: &[f32]) -> Vec<f32> {
    widths
        .iter()
        .scan(x, |edge, w| {
            let left = *edge;
            *edge += w;
            Some(left)
        })
        .collect()
}

/// Shorten `text` until it fits `budget`, marking the cut with `...`.
///
/// Text that already fits is returned unchanged. When not even the ellipsis
/// fits, the result is empty.
pub fn truncate_to_fit(text: &str, budget: f32, measure: impl Fn(&str) -> f32) -> String {
    if measure(text) <= budget {
        return text.to_string();
    }
    if measure(ELLIPSIS) > budget {
        return String::new();
    }
    let mut chars: Vec<char> = text.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let candidate: String = chars.iter().collect::<String>() + ELLIPSIS;
        if measure(&candidate) <= budget {
            return candidate;
        }
    }
    ELLIPSIS.to_string()
}

/// Background of a body row; `index` counts from the first row after the header.
pub fn band_color(index: usize, even: Color, odd: Color) -> Color {
    if index % 2 == 0 { even } else { odd }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(s: &str) -> f32 {
        s.chars().count() as f32 * 6.0
    }

    #[test]
    fn test_equal_split_without_weights() {
        assert_eq!(column_widths(4, &[], 400.0), vec![100.0; 4]);
        assert!(column_widths(0, &[1.0], 400.0).is_empty());
    }

    #[test]
    fn test_weighted_split() {
        assert_eq!(column_widths(2, &[1.0, 3.0], 400.0), vec![100.0, 300.0]);
        assert_eq!(column_widths(2, &[25.0, 75.0, 99.0], 200.0), vec![50.0, 150.0]);
    }

    #[test]
    fn test_missing_weights_take_mean() {
        let widths = column_widths(3, &[2.0, 4.0], 900.0);
        assert_eq!(widths, vec![200.0, 400.0, 300.0]);
    }

    #[test]
    fn test_non_positive_total_falls_back_to_equal() {
        assert_eq!(column_widths(2, &[0.0, -1.0], 100.0), vec![50.0, 50.0]);
        assert_eq!(column_widths(2, &[f32::NAN], 100.0), vec![50.0, 50.0]);
    }

    #[test]
    fn test_widths_sum_to_available() {
        let widths = column_widths(5, &[1.0, 7.0, 2.5], 1083.0);
        assert!((widths.iter().sum::<f32>() - 1083.0).abs() < 1e-2);
    }

    #[test]
    fn test_offsets() {
        assert_eq!(column_offsets(10.0, &[5.0, 7.0, 1.0]), vec![10.0, 15.0, 22.0]);
    }

    #[test]
    fn test_truncation_fits_budget() {
        let text = "Displacement (full load)";
        for budget in [30.0, 50.0, 77.0, 100.0] {
            let out = truncate_to_fit(text, budget, mono);
            assert!(out.ends_with(ELLIPSIS), "{:?}", out);
            assert!(mono(&out) <= budget);
        }
    }

    #[test]
    fn test_fitting_text_untouched() {
        assert_eq!(truncate_to_fit("short", 100.0, mono), "short");
    }

    #[test]
    fn test_no_room_for_ellipsis_gives_empty_cell() {
        assert_eq!(truncate_to_fit("anything", 10.0, mono), "");
    }

    #[test]
    fn test_band_colors_alternate() {
        let (a, b) = (Color::WHITE, Color::BLACK);
        assert_eq!(band_color(0, a, b), a);
        assert_eq!(band_color(1, a, b), b);
        assert_eq!(band_color(2, a, b), a);
    }
}
