//! Text placement inside an element box.
//!
//! Text never wraps: lines break only at explicit newlines and may overflow
//! the box horizontally. The block of lines is always centered vertically.

use super::geometry::Rect;
use crate::document::style::{Style, TextAlign, TextDecoration};
use crate::font::ResolvedFace;

/// Anything that can measure a single line of text.
pub trait TextMeasure {
    /// Glyph box height (ascent minus descent) at `px`.
    fn line_height(&self, px: f32) -> f32;
    /// Advance width of `line`, including letter spacing between glyphs.
    fn line_width(&self, line: &str, px: f32, letter_spacing: f32) -> f32;
}

impl TextMeasure for ResolvedFace {
    fn line_height(&self, px: f32) -> f32 {
        self.line_metrics(px).height
    }

    fn line_width(&self, line: &str, px: f32, letter_spacing: f32) -> f32 {
        self.measure(line, px, letter_spacing)
    }
}

/// One positioned line. `top` is the top of the glyph box.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl PlacedLine {
    /// Vertical position and thickness of a decoration stroke.
    pub fn decoration(&self, decoration: TextDecoration, px: f32) -> Option<(f32, f32)> {
        let thickness = (px / 15.0).round().max(1.0);
        match decoration {
            TextDecoration::None => None,
            _ if self.text.is_empty() => None,
            TextDecoration::Underline => Some((self.top + self.height - thickness, thickness)),
            TextDecoration::LineThrough => Some((self.top + self.height / 2.0, thickness)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<PlacedLine>,
    pub block_height: f32,
}

/// Place `content` inside `frame` according to `style`.
///
/// The transform is applied before splitting. Each line occupies
/// `height * lineHeight`; the glyph box sits in the middle of that slot.
pub fn layout_text(content: &str, style: &Style, frame: Rect, measure: &dyn TextMeasure) -> TextLayout {
    let px = style.font_size();
    let spacing = style.letter_spacing();
    let padding = style.padding();
    let transformed = style.text_transform().apply(content);

    let height = measure.line_height(px);
    let advance = height * style.line_height();
    let leading = (advance - height) / 2.0;

    let raw_lines: Vec<&str> = transformed
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    let block_height = advance * raw_lines.len() as f32;
    let start_y = frame.y + (frame.height - block_height) / 2.0;

    let lines = raw_lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let width = measure.line_width(line, px, spacing);
            let x = match style.text_align() {
                TextAlign::Left => frame.x + padding,
                TextAlign::Center => frame.x + (frame.width - width) / 2.0,
                TextAlign::Right => frame.x + frame.width - width - padding,
            };
            PlacedLine {
                text: line.to_string(),
                x,
                top: start_y + i as f32 * advance + leading,
                width,
                height,
            }
        })
        .collect();

    TextLayout {
        lines,
        block_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::style::TextTransform;

    /// Fixed-pitch measurer: every glyph is 10 px wide, lines are 20 px tall.
    struct Mono;

    impl TextMeasure for Mono {
        fn line_height(&self, _px: f32) -> f32 {
            20.0
        }
        fn line_width(&self, line: &str, _px: f32, spacing: f32) -> f32 {
            let n = line.chars().count() as f32;
            if n == 0.0 { 0.0 } else { n * 10.0 + spacing * (n - 1.0) }
        }
    }

    fn style(align: TextAlign) -> Style {
        Style {
            text_align: Some(align),
            line_height: Some(1.0),
            ..Style::default()
        }
    }

    #[test]
    fn test_alignment_positions() {
        let frame = Rect::new(100.0, 0.0, 200.0, 20.0);
        let x = |align| layout_text("abcd", &style(align), frame, &Mono).lines[0].x;
        assert_eq!(x(TextAlign::Left), 108.0);
        assert_eq!(x(TextAlign::Center), 180.0);
        assert_eq!(x(TextAlign::Right), 252.0);
    }

    #[test]
    fn test_block_is_vertically_centered() {
        let frame = Rect::new(0.0, 50.0, 100.0, 100.0);
        let layout = layout_text("a\nb", &style(TextAlign::Left), frame, &Mono);
        assert_eq!(layout.block_height, 40.0);
        assert_eq!(layout.lines[0].top, 80.0);
        assert_eq!(layout.lines[1].top, 100.0);
    }

    #[test]
    fn test_line_height_multiplier_spreads_lines() {
        let s = Style {
            line_height: Some(1.5),
            ..Style::default()
        };
        let layout = layout_text("a\nb", &s, Rect::new(0.0, 0.0, 100.0, 60.0), &Mono);
        assert_eq!(layout.block_height, 60.0);
        assert_eq!(layout.lines[0].top, 5.0);
        assert_eq!(layout.lines[1].top - layout.lines[0].top, 30.0);
    }

    #[test]
    fn test_overflow_still_centers() {
        let layout = layout_text(
            "a\nb\nc\nd",
            &style(TextAlign::Left),
            Rect::new(0.0, 0.0, 100.0, 20.0),
            &Mono,
        );
        assert_eq!(layout.lines[0].top, -30.0);
    }

    #[test]
    fn test_transform_before_measure() {
        let s = Style {
            text_transform: Some(TextTransform::Upper),
            letter_spacing: Some(2.0),
            ..Style::default()
        };
        let layout = layout_text("ab", &s, Rect::new(0.0, 0.0, 100.0, 20.0), &Mono);
        assert_eq!(layout.lines[0].text, "AB");
        assert_eq!(layout.lines[0].width, 22.0);
    }

    #[test]
    fn test_crlf_and_no_wrapping() {
        let layout = layout_text(
            "a very long line that will not wrap\r\nnext",
            &style(TextAlign::Left),
            Rect::new(0.0, 0.0, 10.0, 10.0),
            &Mono,
        );
        assert_eq!(layout.lines.len(), 2);
        assert_eq!(layout.lines[0].text, "a very long line that will not wrap");
        assert_eq!(layout.lines[1].text, "next");
    }

    #[test]
    fn test_decoration_positions() {
        let line = PlacedLine {
            text: "x".into(),
            x: 0.0,
            top: 10.0,
            width: 10.0,
            height: 20.0,
        };
        assert_eq!(line.decoration(TextDecoration::Underline, 15.0), Some((29.0, 1.0)));
        assert_eq!(line.decoration(TextDecoration::LineThrough, 15.0), Some((20.0, 1.0)));
        assert_eq!(line.decoration(TextDecoration::None, 15.0), None);
    }
}
