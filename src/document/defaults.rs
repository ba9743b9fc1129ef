//! Default sheet for units that have no stored layout.

use super::style::{FontWeight, Style};
use super::{Color, Element, ElementKind, ImageKind, ImageRef, TextRole, Unit};
use crate::layout::geometry::Rect;

fn image(id: &str, kind: ImageKind, path: Option<&str>, frame: Rect) -> Element {
    Element {
        id: id.to_string(),
        frame,
        style: Style {
            background_color: Some(Color::WHITE),
            border_radius: Some(8.0),
            ..Style::default()
        },
        kind: ElementKind::Image {
            kind,
            source: path.and_then(ImageRef::parse),
        },
    }
}

fn text(id: &str, role: TextRole, frame: Rect, size: f32, bold: bool) -> Element {
    Element {
        id: id.to_string(),
        frame,
        style: Style {
            font_size: Some(size),
            font_weight: bold.then_some(FontWeight::Bold),
            ..Style::default()
        },
        kind: ElementKind::Text {
            role,
            content: String::new(),
        },
    }
}

/// Logo and flag along the top edge, name and class between them, the
/// silhouette across the middle. Text elements bind to the unit's fields.
pub fn default_elements(unit: &Unit) -> Vec<Element> {
    vec![
        image(
            "logo",
            ImageKind::Logo,
            unit.logo_path.as_deref(),
            Rect::new(20.0, 20.0, 120.0, 120.0),
        ),
        image(
            "flag",
            ImageKind::Flag,
            unit.flag_path.as_deref(),
            Rect::new(983.0, 20.0, 120.0, 80.0),
        ),
        image(
            "silhouette",
            ImageKind::Silhouette,
            unit.silhouette_path.as_deref(),
            Rect::new(20.0, 180.0, 1083.0, 300.0),
        ),
        text(
            "unit_name",
            TextRole::UnitName,
            Rect::new(160.0, 30.0, 400.0, 40.0),
            24.0,
            true,
        ),
        text(
            "unit_class",
            TextRole::UnitClass,
            Rect::new(160.0, 80.0, 400.0, 40.0),
            20.0,
            false,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn test_empty_layout_synthesizes_defaults() {
        let unit = Unit {
            name: "Amerigo".into(),
            unit_class: "Sail".into(),
            silhouette_path: Some("silhouettes/a.png".into()),
            ..Default::default()
        };
        let doc = Document::default();
        let elements = doc.effective_elements(&unit);
        let ids: Vec<_> = elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["logo", "flag", "silhouette", "unit_name", "unit_class"]);

        let name = &elements[3];
        assert_eq!(name.style.font_size(), 24.0);
        assert!(name.style.font_weight().is_bold());
        assert_eq!(name.text_content(&unit).unwrap(), "Amerigo");

        assert_eq!(
            elements[2].kind,
            ElementKind::Image {
                kind: ImageKind::Silhouette,
                source: Some(ImageRef::Local("silhouettes/a.png".into())),
            }
        );
        assert_eq!(
            elements[0].kind,
            ElementKind::Image {
                kind: ImageKind::Logo,
                source: None
            }
        );
    }

    #[test]
    fn test_defaults_fit_default_canvas() {
        let canvas = crate::document::Canvas::default().bounds();
        for element in default_elements(&Unit::default()) {
            assert!(canvas.contains(&element.frame), "{} overflows", element.id);
        }
    }
}
