//! DrawingML shape markup for one slide.

use quick_xml::escape::escape;
use std::fmt::Write as _;
use tracing::warn;

use super::RenderContext;
use crate::document::Color;
use crate::document::style::{Style, TextAlign, TextDecoration};
use crate::font::normalize_family;
use crate::layout::geometry::Rect;
use crate::layout::table::{self, DEFAULT_CELL_FONT_SIZE};

pub(crate) const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(crate) const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub(crate) const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

const BAND_EVEN: Color = Color::rgb(0xF2, 0xF2, 0xF2);
const BAND_ODD: Color = Color::WHITE;

/// Escape text for element content, dropping characters XML 1.0 forbids.
pub(crate) fn xml_text(text: &str) -> String {
    let clean: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .collect();
    escape(clean.as_str()).into_owned()
}

fn solid_fill(color: Color) -> String {
    format!(
        r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#,
        color.to_hex()
    )
}

/// A slide under construction: its background, shapes in z-order, and the
/// media it references.
#[derive(Debug, Clone)]
pub struct Slide {
    background: Option<Color>,
    shapes: Vec<String>,
    media: Vec<String>,
    next_id: u32,
}

impl Slide {
    pub fn new(background: Option<Color>) -> Self {
        Self {
            background,
            shapes: Vec::new(),
            media: Vec::new(),
            // id 1 is the shape tree itself
            next_id: 2,
        }
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub(crate) fn media_targets(&self) -> &[String] {
        &self.media
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn xfrm(ctx: &RenderContext, frame: Rect) -> String {
        format!(
            r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
            ctx.emu(frame.x),
            ctx.emu(frame.y),
            ctx.emu(frame.width).max(0),
            ctx.emu(frame.height).max(0)
        )
    }

    fn geometry(frame: Rect, radius: f32) -> String {
        let short = frame.width.min(frame.height);
        if radius > 0.0 && short > 0.0 {
            let adj = ((radius / short) * 100_000.0).clamp(0.0, 50_000.0).round() as i64;
            format!(
                r#"<a:prstGeom prst="roundRect"><a:avLst><a:gd name="adj" fmla="val {}"/></a:avLst></a:prstGeom>"#,
                adj
            )
        } else {
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#.to_string()
        }
    }

    fn line(ctx: &RenderContext, outline: Option<(Color, f32)>) -> String {
        match outline {
            Some((color, width)) if width > 0.0 => format!(
                r#"<a:ln w="{}">{}</a:ln>"#,
                ctx.emu(width).max(1),
                solid_fill(color)
            ),
            _ => "<a:ln><a:noFill/></a:ln>".to_string(),
        }
    }

    fn shape_properties(
        ctx: &RenderContext,
        frame: Rect,
        fill: Option<Color>,
        outline: Option<(Color, f32)>,
        radius: f32,
    ) -> String {
        format!(
            "<p:spPr>{}{}{}{}</p:spPr>",
            Self::xfrm(ctx, frame),
            Self::geometry(frame, radius),
            fill.map(solid_fill).unwrap_or_else(|| "<a:noFill/>".to_string()),
            Self::line(ctx, outline)
        )
    }

    /// A plain rectangle: element backgrounds, borders and the canvas frame.
    pub fn add_box(
        &mut self,
        ctx: &RenderContext,
        name: &str,
        frame: Rect,
        fill: Option<Color>,
        outline: Option<(Color, f32)>,
        radius: f32,
    ) {
        let id = self.alloc_id();
        let xml = format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>{}</p:sp>"#,
            id,
            xml_text(name),
            Self::shape_properties(ctx, frame, fill, outline, radius)
        );
        self.shapes.push(xml);
    }

    /// A non-wrapping text box, vertically centered, one paragraph per line.
    pub fn add_text(
        &mut self,
        ctx: &RenderContext,
        name: &str,
        frame: Rect,
        style: &Style,
        content: &str,
    ) {
        let id = self.alloc_id();
        let border = style.border_width();
        let outline = (border > 0).then(|| (style.border_color(), border as f32));
        let inset = ctx.emu(style.padding());

        let transformed = style.text_transform().apply(content);
        let mut paragraphs = String::new();
        for line in transformed.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            paragraphs.push_str(&paragraph(ctx, style, line));
        }

        let xml = format!(
            concat!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
                "{sp_pr}",
                r#"<p:txBody><a:bodyPr wrap="none" lIns="{inset}" tIns="0" rIns="{inset}" bIns="0" anchor="ctr" rtlCol="0"><a:noAutofit/></a:bodyPr><a:lstStyle/>"#,
                "{paragraphs}</p:txBody></p:sp>"
            ),
            id = id,
            name = xml_text(name),
            sp_pr = Self::shape_properties(
                ctx,
                frame,
                style.background_color,
                outline,
                style.border_radius()
            ),
            inset = inset,
            paragraphs = paragraphs,
        );
        self.shapes.push(xml);
    }

    /// A picture filling `frame`. `media_target` is the package path returned
    /// by [`Presentation::add_media`](super::Presentation::add_media).
    pub fn add_picture(&mut self, ctx: &RenderContext, name: &str, frame: Rect, media_target: &str) {
        let id = self.alloc_id();
        self.media.push(media_target.to_string());
        // rId1 is the slide layout
        let rel = self.media.len() + 1;
        let xml = format!(
            concat!(
                r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="{name}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#,
                r#"<p:blipFill><a:blip r:embed="rId{rel}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
                r#"<p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
            ),
            id = id,
            name = xml_text(name),
            rel = rel,
            xfrm = Self::xfrm(ctx, frame),
        );
        self.shapes.push(xml);
    }

    /// A native table. Row 0 is the header and fixes the column count; cells
    /// past it are dropped. Fails when the header has no columns.
    pub fn add_table(
        &mut self,
        ctx: &RenderContext,
        name: &str,
        frame: Rect,
        rows: &[Vec<String>],
        weights: &[f32],
        style: &Style,
    ) -> Result<(), String> {
        let columns = rows.first().map(Vec::len).unwrap_or(0);
        if columns == 0 {
            return Err("table has no header columns".to_string());
        }
        for (i, row) in rows.iter().enumerate().filter(|(_, r)| r.len() > columns) {
            warn!(
                table = %name,
                row = i,
                cells = row.len(),
                columns,
                "extra table cells dropped"
            );
        }

        let widths = table::column_widths(columns, weights, frame.width);
        let row_height = frame.height / rows.len() as f32;
        let px = style.font_size.unwrap_or(DEFAULT_CELL_FONT_SIZE);
        let size = ctx.hundredths_pt(px).clamp(100, 400_000);
        let header_fill = style
            .header_background_color
            .unwrap_or(table::HEADER_BACKGROUND);
        let body_ink = style.color.unwrap_or(table::BODY_TEXT);
        let typeface = xml_text(&normalize_family(style.font_family()));
        let grid_line = solid_fill(table::GRID_LINE);

        let mut grid = String::new();
        for w in &widths {
            let _ = write!(grid, r#"<a:gridCol w="{}"/>"#, ctx.emu(*w));
        }

        let mut body = String::new();
        for (r, row) in rows.iter().enumerate() {
            let header = r == 0;
            let (fill, ink) = if header {
                (header_fill, table::HEADER_TEXT)
            } else {
                (table::band_color(r - 1, BAND_EVEN, BAND_ODD), body_ink)
            };
            let _ = write!(body, r#"<a:tr h="{}">"#, ctx.emu(row_height));
            for c in 0..columns {
                let text = row.get(c).map(String::as_str).unwrap_or_default();
                let run = if text.is_empty() {
                    format!(r#"<a:endParaRPr lang="en-US" sz="{}"/>"#, size)
                } else {
                    format!(
                        r#"<a:r><a:rPr lang="en-US" sz="{}" b="{}" dirty="0">{}<a:latin typeface="{}"/></a:rPr><a:t>{}</a:t></a:r>"#,
                        size,
                        if header || style.font_weight().is_bold() { 1 } else { 0 },
                        solid_fill(ink),
                        typeface,
                        xml_text(text)
                    )
                };
                let edges: String = ["lnL", "lnR", "lnT", "lnB"]
                    .iter()
                    .map(|edge| format!(r#"<a:{edge} w="12700">{grid_line}</a:{edge}>"#))
                    .collect();
                let _ = write!(
                    body,
                    r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/><a:p>{}</a:p></a:txBody><a:tcPr anchor="ctr">{}{}</a:tcPr></a:tc>"#,
                    run,
                    edges,
                    solid_fill(fill)
                );
            }
            body.push_str("</a:tr>");
        }

        let id = self.alloc_id();
        let xml = format!(
            concat!(
                r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{id}" name="{name}"/><p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr>"#,
                r#"<p:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></p:xfrm>"#,
                r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table">"#,
                r#"<a:tbl><a:tblPr firstRow="1" bandRow="1"/><a:tblGrid>{grid}</a:tblGrid>{body}</a:tbl>"#,
                r#"</a:graphicData></a:graphic></p:graphicFrame>"#
            ),
            id = id,
            name = xml_text(name),
            x = ctx.emu(frame.x),
            y = ctx.emu(frame.y),
            cx = ctx.emu(frame.width).max(0),
            cy = ctx.emu(frame.height).max(0),
            grid = grid,
            body = body,
        );
        self.shapes.push(xml);
        Ok(())
    }

    pub(crate) fn to_xml(&self) -> String {
        let background = self
            .background
            .map(|c| {
                format!(
                    "<p:bg><p:bgPr>{}<a:effectLst/></p:bgPr></p:bg>",
                    solid_fill(c)
                )
            })
            .unwrap_or_default();
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<p:sld xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}"><p:cSld>{bg}<p:spTree>"#,
                r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
                r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
                r#"{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
            ),
            a = NS_A,
            r = NS_R,
            p = NS_P,
            bg = background,
            shapes = self.shapes.concat(),
        )
    }
}

/// One `<a:p>` for a single line of text.
fn paragraph(ctx: &RenderContext, style: &Style, line: &str) -> String {
    let align = match style.text_align() {
        TextAlign::Left => "l",
        TextAlign::Center => "ctr",
        TextAlign::Right => "r",
    };
    let size = ctx.hundredths_pt(style.font_size()).clamp(100, 400_000);
    let line_spacing = (style.line_height() * 100_000.0).round() as i64;
    let p_pr = format!(
        r#"<a:pPr algn="{}"><a:lnSpc><a:spcPct val="{}"/></a:lnSpc></a:pPr>"#,
        align, line_spacing
    );
    if line.is_empty() {
        return format!(r#"<a:p>{}<a:endParaRPr lang="en-US" sz="{}"/></a:p>"#, p_pr, size);
    }

    let mut attrs = format!(r#"lang="en-US" sz="{}""#, size);
    if style.font_weight().is_bold() {
        attrs.push_str(r#" b="1""#);
    }
    if style.font_style().is_italic() {
        attrs.push_str(r#" i="1""#);
    }
    match style.text_decoration() {
        TextDecoration::Underline => attrs.push_str(r#" u="sng""#),
        TextDecoration::LineThrough => attrs.push_str(r#" strike="sngStrike""#),
        TextDecoration::None => {}
    }
    let spacing = ctx.hundredths_pt(style.letter_spacing());
    if spacing != 0 {
        let _ = write!(attrs, r#" spc="{}""#, spacing);
    }

    format!(
        r#"<a:p>{}<a:r><a:rPr {} dirty="0">{}<a:latin typeface="{}"/></a:rPr><a:t>{}</a:t></a:r></a:p>"#,
        p_pr,
        attrs,
        solid_fill(style.color()),
        xml_text(&normalize_family(style.font_family())),
        xml_text(line)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Canvas;
    use crate::document::style::{FontWeight, TextTransform};

    fn ctx() -> RenderContext {
        // 960x720 canvas on a standard slide: scale 1
        RenderContext::for_canvas(&Canvas {
            width: 960,
            height: 720,
            ..Canvas::default()
        })
    }

    #[test]
    fn test_text_box_markup() {
        let mut slide = Slide::new(None);
        let style = Style {
            font_size: Some(24.0),
            font_weight: Some(FontWeight::Bold),
            text_align: Some(TextAlign::Center),
            text_decoration: Some(TextDecoration::Underline),
            text_transform: Some(TextTransform::Upper),
            color: Some(Color::rgb(0x12, 0x34, 0x56)),
            background_color: Some(Color::WHITE),
            border_radius: Some(8.0),
            ..Style::default()
        };
        slide.add_text(&ctx(), "name", Rect::new(10.0, 20.0, 100.0, 40.0), &style, "a & b\nc");
        let xml = slide.to_xml();

        assert!(xml.contains(r#"<a:off x="95250" y="190500"/><a:ext cx="952500" cy="381000"/>"#));
        assert!(xml.contains(r#"prst="roundRect""#));
        assert!(xml.contains(r#"fmla="val 20000""#));
        assert!(xml.contains(r#"wrap="none""#));
        assert!(xml.contains(r#"anchor="ctr""#));
        assert!(xml.contains(r#"algn="ctr""#));
        assert!(xml.contains(r#"sz="1800" b="1" u="sng""#));
        assert!(xml.contains(r#"<a:srgbClr val="123456"/>"#));
        assert!(xml.contains("<a:t>A &amp; B</a:t>"));
        assert_eq!(xml.matches("<a:p>").count(), 2);
    }

    #[test]
    fn test_picture_relationship_ids() {
        let mut slide = Slide::new(Some(Color::BLACK));
        slide.add_picture(&ctx(), "a", Rect::new(0.0, 0.0, 10.0, 10.0), "../media/image1.png");
        slide.add_picture(&ctx(), "b", Rect::new(0.0, 0.0, 10.0, 10.0), "../media/image2.png");
        let xml = slide.to_xml();
        assert!(xml.contains(r#"r:embed="rId2""#));
        assert!(xml.contains(r#"r:embed="rId3""#));
        assert!(xml.contains(r#"<p:bg><p:bgPr><a:solidFill><a:srgbClr val="000000"/>"#));
        assert_eq!(slide.media_targets().len(), 2);
    }

    #[test]
    fn test_table_markup() {
        let mut slide = Slide::new(None);
        let rows = vec![
            vec!["Name".to_string(), "Value".to_string()],
            vec!["Length".to_string(), "150 m".to_string()],
            vec!["Beam".to_string()],
        ];
        slide
            .add_table(
                &ctx(),
                "t",
                Rect::new(0.0, 0.0, 400.0, 90.0),
                &rows,
                &[1.0, 3.0],
                &Style::default(),
            )
            .unwrap();
        let xml = slide.to_xml();
        assert!(xml.contains(r#"<a:gridCol w="952500"/><a:gridCol w="2857500"/>"#));
        assert_eq!(xml.matches("<a:tr ").count(), 3);
        assert_eq!(xml.matches("<a:tc>").count(), 6);
        assert!(xml.contains("1F497D"));
        assert!(xml.contains("F2F2F2"));
    }

    #[test]
    fn test_table_drops_cells_past_header() {
        let mut slide = Slide::new(None);
        let rows = vec![
            vec!["Name".to_string(), "Value".to_string()],
            vec!["Length".to_string(), "150 m".to_string(), "stray".to_string()],
            vec!["Beam".to_string(), "20 m".to_string()],
        ];
        slide
            .add_table(&ctx(), "t", Rect::new(0.0, 0.0, 200.0, 90.0), &rows, &[], &Style::default())
            .unwrap();
        let xml = slide.to_xml();
        assert_eq!(slide.shape_count(), 1);
        assert_eq!(xml.matches("<a:tc>").count(), 6);
        assert!(xml.contains("<a:t>150 m</a:t>"));
        assert!(!xml.contains("stray"));
    }

    #[test]
    fn test_table_rejects_empty_header() {
        let mut slide = Slide::new(None);
        assert!(slide
            .add_table(&ctx(), "t", Rect::new(0.0, 0.0, 10.0, 10.0), &[], &[], &Style::default())
            .is_err());
        let headless = vec![Vec::new(), vec!["a".to_string()]];
        assert!(slide
            .add_table(&ctx(), "t", Rect::new(0.0, 0.0, 10.0, 10.0), &headless, &[], &Style::default())
            .is_err());
        assert_eq!(slide.shape_count(), 0);
    }

    #[test]
    fn test_table_font_size_clamped() {
        let mut slide = Slide::new(None);
        let style = Style {
            font_size: Some(1.0),
            ..Style::default()
        };
        let rows = vec![vec!["H".to_string(), String::new()]];
        slide
            .add_table(&ctx(), "t", Rect::new(0.0, 0.0, 100.0, 30.0), &rows, &[], &style)
            .unwrap();
        let xml = slide.to_xml();
        assert!(xml.contains(r#"sz="100" b="1""#));
        assert!(xml.contains(r#"<a:endParaRPr lang="en-US" sz="100"/>"#));
        assert!(!xml.contains(r#"sz="75""#));
    }

    #[test]
    fn test_xml_text_strips_control_characters() {
        assert_eq!(xml_text("a\u{0}b<c>\t"), "ab&lt;c&gt;\t");
    }
}
