//! Template + customization merge.
//!
//! A template is a shared [`Document`]. A unit may carry a [`Customization`]
//! that patches individual template elements by id and overrides canvas
//! fields. The merge happens once, before rendering; backends only ever see
//! the merged document.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::style::RawStyle;
use super::{Canvas, Color, Document, DocumentError, ElementKind, ImageRef, Style};

/// Per-element customization. Every field is optional; absent fields keep
/// the template value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementState {
    pub content: Option<String>,
    /// Replacement image reference. An empty string clears the image.
    pub image: Option<String>,
    pub style: Option<RawStyle>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    /// `false` drops the element from the merged document.
    pub visible: Option<bool>,
}

/// Canvas-level overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasPatch {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub background: Option<String>,
    pub border_width: Option<u32>,
    pub border_color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Customization {
    #[serde(default)]
    pub element_states: HashMap<String, ElementState>,
    #[serde(default)]
    pub canvas_config: CanvasPatch,
}

impl Customization {
    pub fn is_empty(&self) -> bool {
        let c = &self.canvas_config;
        self.element_states.is_empty()
            && c.width.is_none()
            && c.height.is_none()
            && c.background.is_none()
            && c.border_width.is_none()
            && c.border_color.is_none()
    }
}

impl CanvasPatch {
    fn apply_to(&self, canvas: &mut Canvas) {
        if let Some(w) = self.width.filter(|w| *w > 0) {
            canvas.width = w;
        }
        if let Some(h) = self.height.filter(|h| *h > 0) {
            canvas.height = h;
        }
        if let Some(c) = self.background.as_deref().and_then(Color::parse) {
            canvas.background = c;
        }
        if let Some(w) = self.border_width {
            canvas.border_width = w;
        }
        if let Some(c) = self.border_color.as_deref().and_then(Color::parse) {
            canvas.border_color = c;
        }
    }
}

/// Merge a customization into a template.
///
/// Template order is preserved. Customization ids that do not name a
/// template element are ignored. The merged document goes through the same
/// checks as a parsed one, so a patched canvas or frame can still be rejected.
pub fn apply(
    template: &Document,
    customization: &Customization,
) -> Result<Document, DocumentError> {
    let mut canvas = template.canvas;
    customization.canvas_config.apply_to(&mut canvas);

    for id in customization.element_states.keys() {
        if template.element(id).is_none() {
            debug!(element = %id, "customization for unknown element ignored");
        }
    }

    let elements = template
        .elements
        .iter()
        .filter_map(|element| {
            let Some(state) = customization.element_states.get(&element.id) else {
                return Some(element.clone());
            };
            if state.visible == Some(false) {
                return None;
            }

            let mut merged = element.clone();
            if let Some(x) = state.x {
                merged.frame.x = x;
            }
            if let Some(y) = state.y {
                merged.frame.y = y;
            }
            if let Some(w) = state.width.filter(|w| w.is_finite() && *w >= 0.0) {
                merged.frame.width = w;
            }
            if let Some(h) = state.height.filter(|h| h.is_finite() && *h >= 0.0) {
                merged.frame.height = h;
            }
            if let Some(raw) = &state.style {
                let (patch, _) = Style::from_raw(raw, &element.id);
                merged.style.overlay(&patch);
            }
            match &mut merged.kind {
                ElementKind::Text { content, .. } => {
                    if let Some(c) = &state.content {
                        *content = c.clone();
                    }
                }
                ElementKind::Image { source, .. } => {
                    if let Some(image) = &state.image {
                        *source = ImageRef::parse(image);
                    }
                }
                ElementKind::Table { .. } => {}
            }
            Some(merged)
        })
        .collect();

    Document::new(canvas, elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::geometry::Rect;
    use pretty_assertions::assert_eq;

    fn template() -> Document {
        Document::from_json(
            r##"{
            "canvas": {"width": 1123, "height": 794},
            "elements": [
                {"id": "title", "type": "text", "content": "Template", "x": 10, "y": 10,
                 "width": 200, "height": 40, "style": {"fontSize": 20, "color": "#111111"}},
                {"id": "logo", "type": "logo", "image": "logos/default.png",
                 "x": 20, "y": 20, "width": 120, "height": 120},
                {"id": "flag", "type": "flag", "image": "flags/it.png",
                 "x": 983, "y": 20, "width": 120, "height": 80}
            ]
        }"##,
        )
        .unwrap()
    }

    fn customization(json: &str) -> Customization {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_customized_fields_win() {
        let merged = apply(
            &template(),
            &customization(
                r##"{"element_states": {
                    "title": {"content": "Custom", "x": 50, "style": {"color": "#ff0000"}},
                    "logo": {"image": "logos/unit.png"}
                }}"##,
            ),
        )
        .unwrap();
        let title = merged.element("title").unwrap();
        assert_eq!(
            title.kind,
            ElementKind::Text {
                role: crate::document::TextRole::Plain,
                content: "Custom".into()
            }
        );
        assert_eq!(title.frame, Rect::new(50.0, 10.0, 200.0, 40.0));
        assert_eq!(title.style.color, Some(Color::rgb(255, 0, 0)));
        assert_eq!(title.style.font_size, Some(20.0));

        let logo = merged.element("logo").unwrap();
        assert_eq!(
            logo.kind,
            ElementKind::Image {
                kind: crate::document::ImageKind::Logo,
                source: Some(ImageRef::Local("logos/unit.png".into())),
            }
        );
    }

    #[test]
    fn test_template_only_elements_unchanged() {
        let tpl = template();
        let merged = apply(
            &tpl,
            &customization(r#"{"element_states": {"title": {"content": "x"}}}"#),
        )
        .unwrap();
        assert_eq!(merged.element("flag"), tpl.element("flag"));
        assert_eq!(merged.element("logo"), tpl.element("logo"));
    }

    #[test]
    fn test_hidden_elements_removed() {
        let merged = apply(
            &template(),
            &customization(r#"{"element_states": {"logo": {"visible": false}}}"#),
        )
        .unwrap();
        let ids: Vec<_> = merged.elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["title", "flag"]);
    }

    #[test]
    fn test_unknown_ids_ignored() {
        let tpl = template();
        let merged = apply(
            &tpl,
            &customization(r#"{"element_states": {"ghost": {"content": "boo"}}}"#),
        )
        .unwrap();
        assert_eq!(merged, tpl);
    }

    #[test]
    fn test_canvas_fields_override() {
        let merged = apply(
            &template(),
            &customization(r##"{"canvas_config": {"width": 800, "background": "#000000"}}"##),
        )
        .unwrap();
        assert_eq!(merged.canvas.width, 800);
        assert_eq!(merged.canvas.height, 794);
        assert_eq!(merged.canvas.background, Color::BLACK);
    }

    #[test]
    fn test_empty_image_clears_reference() {
        let merged = apply(
            &template(),
            &customization(r#"{"element_states": {"flag": {"image": ""}}}"#),
        )
        .unwrap();
        match &merged.element("flag").unwrap().kind {
            ElementKind::Image { source, .. } => assert_eq!(source, &None),
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_canvas_patch_rejected() {
        let err = apply(
            &template(),
            &customization(r#"{"canvas_config": {"width": 4294967295, "height": 4294967295}}"#),
        )
        .unwrap_err();
        assert_eq!(
            err,
            DocumentError::InvalidCanvas {
                width: 4_294_967_295,
                height: 4_294_967_295
            }
        );
    }

    #[test]
    fn test_non_finite_frame_patch_rejected() {
        let mut custom = Customization::default();
        custom.element_states.insert(
            "title".into(),
            ElementState {
                x: Some(f32::INFINITY),
                ..Default::default()
            },
        );
        assert_eq!(
            apply(&template(), &custom).unwrap_err(),
            DocumentError::InvalidGeometry { id: "title".into() }
        );
    }

    #[test]
    fn test_empty_customization() {
        assert!(Customization::default().is_empty());
        assert!(!customization(r#"{"canvas_config": {"height": 10}}"#).is_empty());
    }
}
