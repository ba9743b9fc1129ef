//! Rectangles in canvas pixel space.

/// An axis-aligned box. All element geometry is expressed in canvas pixels,
/// whichever backend ends up drawing it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Shrink by `amount` on every side. Never produces a negative size.
    pub fn inset(&self, amount: f32) -> Rect {
        let width = (self.width - 2.0 * amount).max(0.0);
        let height = (self.height - 2.0 * amount).max(0.0);
        Rect::new(self.x + amount, self.y + amount, width, height)
    }

    pub fn contains(&self, other: &Rect) -> bool {
        const EPS: f32 = 1e-3;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Largest box with the source aspect ratio that fits inside `self`,
    /// centered on both axes. Scales up as well as down.
    ///
    /// Returns `None` when the source or the box is degenerate.
    pub fn fit_contain(&self, source_width: f32, source_height: f32) -> Option<Rect> {
        if source_width <= 0.0 || source_height <= 0.0 || self.is_empty() {
            return None;
        }
        let source_aspect = source_width / source_height;
        let box_aspect = self.width / self.height;

        let (width, height) = if source_aspect > box_aspect {
            (self.width, self.width / source_aspect)
        } else {
            (self.height * source_aspect, self.height)
        };

        Some(Rect::new(
            self.x + (self.width - width) / 2.0,
            self.y + (self.height - height) / 2.0,
            width,
            height,
        ))
    }
}
