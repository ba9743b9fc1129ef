//! # Rendering Backends
//!
//! Two backends consume the same [`Document`](crate::document::Document):
//!
//! - [`raster`]: paints onto an RGB bitmap and encodes PNG
//! - [`slide`]: emits native presentation shapes and packages a PPTX
//!
//! Neither backend lets a single element abort the render. Every element
//! yields an [`ElementOutcome`], and the outcomes are returned alongside the
//! output bytes as a [`RenderReport`].

pub mod raster;
pub mod slide;

use std::fmt;
use tracing::debug;

use crate::document::{ImageKind, ImageRef, Unit};
use crate::resource::{ResolvedImage, ResourceResolver};

/// What happened to one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementOutcome {
    /// Drawn as specified.
    Rendered,
    /// A resource was unavailable; a placeholder was drawn instead.
    Placeholder(String),
    /// The element could not be drawn; an error marker (or fallback) was drawn.
    Failed(String),
}

impl ElementOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, ElementOutcome::Rendered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementReport {
    pub id: String,
    pub outcome: ElementOutcome,
}

/// Per-element outcomes of one render call, in paint order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub elements: Vec<ElementReport>,
}

impl RenderReport {
    pub fn record(&mut self, id: impl Into<String>, outcome: ElementOutcome) {
        let id = id.into();
        match &outcome {
            ElementOutcome::Rendered => debug!(element = %id, "element rendered"),
            ElementOutcome::Placeholder(reason) => {
                debug!(element = %id, reason = %reason, "element replaced by placeholder")
            }
            ElementOutcome::Failed(reason) => debug!(element = %id, reason = %reason, "element failed"),
        }
        self.elements.push(ElementReport { id, outcome });
    }

    /// Append another report, prefixing its ids (e.g. with the slide name).
    pub fn merge_prefixed(&mut self, prefix: &str, other: RenderReport) {
        self.elements
            .extend(other.elements.into_iter().map(|e| ElementReport {
                id: format!("{}/{}", prefix, e.id),
                outcome: e.outcome,
            }));
    }

    pub fn outcome(&self, id: &str) -> Option<&ElementOutcome> {
        self.elements.iter().find(|e| e.id == id).map(|e| &e.outcome)
    }

    pub fn rendered(&self) -> usize {
        self.elements.iter().filter(|e| e.outcome.is_rendered()).count()
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &ElementReport> {
        self.elements
            .iter()
            .filter(|e| matches!(e.outcome, ElementOutcome::Placeholder(_)))
    }

    pub fn failures(&self) -> impl Iterator<Item = &ElementReport> {
        self.elements
            .iter()
            .filter(|e| matches!(e.outcome, ElementOutcome::Failed(_)))
    }

    /// True when every element rendered as specified.
    pub fn is_clean(&self) -> bool {
        self.elements.iter().all(|e| e.outcome.is_rendered())
    }
}

impl fmt::Display for RenderReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} elements: {} rendered, {} placeholders, {} failed",
            self.elements.len(),
            self.rendered(),
            self.placeholders().count(),
            self.failures().count()
        )
    }
}

/// Resolve an image element's source.
///
/// A silhouette whose own reference is missing or unresolvable retries the
/// unit's stored silhouette path before giving up.
pub(crate) fn resolve_element_image(
    resolver: &ResourceResolver,
    kind: ImageKind,
    source: Option<&ImageRef>,
    unit: &Unit,
) -> Result<ResolvedImage, String> {
    let primary = match source {
        Some(reference) => resolver.resolve(reference).map_err(|e| e.to_string()),
        None => Err("no image reference".to_string()),
    };
    match primary {
        Err(reason) if kind == ImageKind::Silhouette => {
            let fallback = unit
                .silhouette_path
                .as_deref()
                .and_then(ImageRef::parse)
                .filter(|f| Some(f) != source);
            let Some(fallback) = fallback else {
                return Err(reason);
            };
            debug!(fallback = %fallback, "retrying silhouette with the unit's stored path");
            resolver
                .resolve(&fallback)
                .map_err(|e| format!("{}; unit silhouette: {}", reason, e))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;

    #[test]
    fn test_report_counts() {
        let mut report = RenderReport::default();
        report.record("a", ElementOutcome::Rendered);
        report.record("b", ElementOutcome::Placeholder("missing".into()));
        report.record("c", ElementOutcome::Failed("decode".into()));
        assert_eq!(report.rendered(), 1);
        assert_eq!(report.placeholders().count(), 1);
        assert_eq!(report.failures().count(), 1);
        assert!(!report.is_clean());
        assert_eq!(
            report.to_string(),
            "3 elements: 1 rendered, 1 placeholders, 1 failed"
        );
    }

    #[test]
    fn test_merge_prefixed() {
        let mut deck = RenderReport::default();
        let mut slide = RenderReport::default();
        slide.record("logo", ElementOutcome::Rendered);
        deck.merge_prefixed("slide2", slide);
        assert_eq!(deck.outcome("slide2/logo"), Some(&ElementOutcome::Rendered));
    }

    #[test]
    fn test_silhouette_falls_back_to_unit_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = RenderConfig::isolated(dir.path());
        std::fs::create_dir_all(config.storage_root.join("silhouettes")).unwrap();
        std::fs::write(config.storage_root.join("silhouettes/real.png"), b"x").unwrap();
        let resolver = ResourceResolver::new(&config).unwrap();
        let unit = Unit {
            silhouette_path: Some("silhouettes/real.png".into()),
            ..Default::default()
        };
        let stale = ImageRef::Local("silhouettes/gone.png".into());

        let found =
            resolve_element_image(&resolver, ImageKind::Silhouette, Some(&stale), &unit).unwrap();
        assert!(found.path().ends_with("silhouettes/real.png"));

        let err = resolve_element_image(&resolver, ImageKind::Logo, Some(&stale), &unit).unwrap_err();
        assert!(err.contains("gone.png"));
    }
}
