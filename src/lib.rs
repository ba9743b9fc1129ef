//! # Flotilla - Naval Unit Sheet Renderer
//!
//! Flotilla renders information sheets for naval units from canvas layouts
//! built in a visual editor. One layout produces either:
//!
//! - **PNG**: a bitmap the exact size of the canvas
//! - **PPTX**: a slide of native, editable shapes scaled to fit
//!
//! Groups of units export to one deck, either a slide per unit or paged grids
//! of summary cells.
//!
//! ## Quick Start
//!
//! ```no_run
//! use flotilla::{ExportFormat, Exporter, RenderConfig, UnitSheet};
//!
//! let config = RenderConfig::default();
//! let exporter = Exporter::new(&config)?;
//!
//! let sheet = UnitSheet::from_json(r##"{
//!     "name": "Amerigo Vespucci",
//!     "unit_class": "Training ship",
//!     "silhouette_path": "silhouettes/vespucci.png",
//!     "layout_config": {
//!         "canvas": {"width": 1123, "height": 794, "background": "#ffffff"},
//!         "elements": [
//!             {"id": "name", "type": "unit_name", "x": 40, "y": 40, "width": 600, "height": 60,
//!              "style": {"fontSize": 32, "fontWeight": "bold"}},
//!             {"id": "sil", "type": "silhouette", "x": 40, "y": 200, "width": 1043, "height": 400}
//!         ]
//!     }
//! }"##)?;
//!
//! let png = exporter.render(&sheet, ExportFormat::Png)?;
//! println!("{}", png.report);
//! std::fs::write("vespucci.png", &png.bytes)?;
//! # Ok::<(), flotilla::FlotillaError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`document`] | Layout model, JSON decoding, overlay merge, default sheet |
//! | [`resource`] | Image references to local files, temp file sweep |
//! | [`font`] | Font lookup with fallback chain and built-in face |
//! | [`layout`] | Geometry, text line layout, table column math |
//! | [`render`] | Raster (PNG) and slide (PPTX) backends |
//! | [`export`] | Single sheets, group decks, async offload |
//! | [`config`] | Render configuration |
//! | [`error`] | Error types |

pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod font;
pub mod layout;
pub mod logging;
pub mod render;
pub mod resource;

// Re-exports for convenience
pub use config::RenderConfig;
pub use document::{Document, UnitSheet};
pub use error::FlotillaError;
pub use export::{DeckMode, DeckRequest, ExportFormat, Exporter, Rendered};
pub use render::RenderReport;
