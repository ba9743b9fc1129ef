//! Backend-independent layout: geometry, text placement and table columns.
//!
//! Everything here works in canvas pixels. Backends convert to their own
//! units at the last moment.

pub mod geometry;
pub mod table;
pub mod text;

pub use geometry::Rect;
pub use text::{PlacedLine, TextLayout, TextMeasure, layout_text};
