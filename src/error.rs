//! # Error Types
//!
//! This module defines the error types used throughout the flotilla library.
//!
//! Only whole-render failures surface as [`FlotillaError`]. Problems scoped to
//! a single element or resource are absorbed by the backends and recorded in
//! the [`RenderReport`](crate::render::RenderReport) instead.

use thiserror::Error;

use crate::document::DocumentError;
use crate::render::slide::SlideError;

/// Main error type for flotilla operations
#[derive(Debug, Error)]
pub enum FlotillaError {
    /// Structurally invalid document (duplicate ids, unknown element type, ...)
    #[error("Invalid document: {0}")]
    Document(#[from] DocumentError),

    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shared infrastructure (HTTP client, temp directory) could not be set up
    #[error("Resource setup error: {0}")]
    Resource(String),

    /// Image encoding error while producing the raster output
    #[error("Image error: {0}")]
    Image(String),

    /// Slide package could not be assembled
    #[error("Presentation error: {0}")]
    Slide(#[from] SlideError),

    /// JSON input could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Background render task failed to complete
    #[error("Render task failed: {0}")]
    Task(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
