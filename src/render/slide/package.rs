//! OOXML packaging: slides, media and the fixed parts a presentation needs,
//! zipped into a `.pptx`.

use chrono::Utc;
use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;

use super::xml::{NS_A, NS_P, NS_R, xml_text};
use super::{Slide, SlideError, SlideFormat};

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const CT_BASE: &str = "application/vnd.openxmlformats-officedocument.presentationml";

/// First slide master id; the format requires ids at or above 2^31.
const MASTER_ID: u64 = 2_147_483_648;
const FIRST_SLIDE_ID: u32 = 256;

/// One embedded media part.
#[derive(Debug, Clone)]
pub struct Media {
    /// File name under `ppt/media/`, e.g. `image1.png`.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Media {
    fn extension(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or_default()
    }
}

/// A presentation being assembled. All slides share one format.
#[derive(Debug)]
pub struct Presentation {
    format: SlideFormat,
    title: String,
    slides: Vec<Slide>,
    media: Vec<Media>,
}

impl Presentation {
    pub fn new(format: SlideFormat) -> Self {
        Self {
            format,
            title: String::new(),
            slides: Vec::new(),
            media: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn format(&self) -> SlideFormat {
        self.format
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn push_slide(&mut self, slide: Slide) {
        self.slides.push(slide);
    }

    /// Store `bytes` as a new media part and return the target a slide uses
    /// to reference it.
    pub fn add_media(&mut self, bytes: Vec<u8>, extension: &str) -> String {
        let name = format!(
            "image{}.{}",
            self.media.len() + 1,
            extension.to_ascii_lowercase()
        );
        let target = format!("../media/{}", name);
        self.media.push(Media { name, bytes });
        target
    }

    pub fn media(&self) -> &[Media] {
        &self.media
    }

    /// Zip every part into a `.pptx` byte stream.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SlideError> {
        if self.slides.is_empty() {
            return Err(SlideError::Empty);
        }

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut put = |name: &str, data: &[u8]| -> Result<(), SlideError> {
            zip.start_file(name, options)?;
            zip.write_all(data)?;
            Ok(())
        };

        put("[Content_Types].xml", self.content_types().as_bytes())?;
        put("_rels/.rels", root_rels().as_bytes())?;
        put("docProps/app.xml", self.app_xml().as_bytes())?;
        put("docProps/core.xml", self.core_xml().as_bytes())?;
        put("ppt/presentation.xml", self.presentation_xml().as_bytes())?;
        put(
            "ppt/_rels/presentation.xml.rels",
            self.presentation_rels().as_bytes(),
        )?;
        put("ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER.as_bytes())?;
        put(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            relationships(&[
                ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
                ("rId2", "theme", "../theme/theme1.xml"),
            ])
            .as_bytes(),
        )?;
        put("ppt/slideLayouts/slideLayout1.xml", SLIDE_LAYOUT.as_bytes())?;
        put(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            relationships(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]).as_bytes(),
        )?;
        put("ppt/theme/theme1.xml", THEME.as_bytes())?;
        put("ppt/presProps.xml", PRES_PROPS.as_bytes())?;
        put("ppt/viewProps.xml", VIEW_PROPS.as_bytes())?;
        put("ppt/tableStyles.xml", TABLE_STYLES.as_bytes())?;

        for (i, slide) in self.slides.iter().enumerate() {
            let n = i + 1;
            put(&format!("ppt/slides/slide{}.xml", n), slide.to_xml().as_bytes())?;
            put(
                &format!("ppt/slides/_rels/slide{}.xml.rels", n),
                slide_rels(slide).as_bytes(),
            )?;
        }
        for media in &self.media {
            put(&format!("ppt/media/{}", media.name), &media.bytes)?;
        }

        let bytes = zip.finish()?.into_inner();
        debug!(
            slides = self.slides.len(),
            media = self.media.len(),
            bytes = bytes.len(),
            "presentation packaged"
        );
        Ok(bytes)
    }

    fn content_types(&self) -> String {
        let mut defaults = String::new();
        let extensions: BTreeSet<&str> = self.media.iter().map(Media::extension).collect();
        for ext in extensions {
            let mime = mime_guess::from_ext(ext).first_or_octet_stream();
            defaults.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                xml_text(ext),
                mime.essence_str()
            ));
        }

        let mut overrides = vec![
            ("/ppt/presentation.xml", format!("{}.presentation.main+xml", CT_BASE)),
            ("/ppt/slideMasters/slideMaster1.xml", format!("{}.slideMaster+xml", CT_BASE)),
            ("/ppt/slideLayouts/slideLayout1.xml", format!("{}.slideLayout+xml", CT_BASE)),
            (
                "/ppt/theme/theme1.xml",
                "application/vnd.openxmlformats-officedocument.theme+xml".to_string(),
            ),
            ("/ppt/presProps.xml", format!("{}.presProps+xml", CT_BASE)),
            ("/ppt/viewProps.xml", format!("{}.viewProps+xml", CT_BASE)),
            ("/ppt/tableStyles.xml", format!("{}.tableStyles+xml", CT_BASE)),
            (
                "/docProps/core.xml",
                "application/vnd.openxmlformats-package.core-properties+xml".to_string(),
            ),
            (
                "/docProps/app.xml",
                "application/vnd.openxmlformats-officedocument.extended-properties+xml".to_string(),
            ),
        ]
        .into_iter()
        .map(|(part, ct)| (part.to_string(), ct))
        .collect::<Vec<_>>();
        for n in 1..=self.slides.len() {
            overrides.push((
                format!("/ppt/slides/slide{}.xml", n),
                format!("{}.slide+xml", CT_BASE),
            ));
        }

        let overrides: String = overrides
            .iter()
            .map(|(part, ct)| format!(r#"<Override PartName="{}" ContentType="{}"/>"#, part, ct))
            .collect();

        format!(
            concat!(
                "{decl}\n",
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
                r#"<Default Extension="xml" ContentType="application/xml"/>"#,
                "{defaults}{overrides}</Types>"
            ),
            decl = XML_DECL,
            defaults = defaults,
            overrides = overrides,
        )
    }

    fn presentation_xml(&self) -> String {
        let slide_ids: String = (0..self.slides.len())
            .map(|i| {
                format!(
                    r#"<p:sldId id="{}" r:id="rId{}"/>"#,
                    FIRST_SLIDE_ID + i as u32,
                    i + 2
                )
            })
            .collect();
        let size_type = match self.format {
            SlideFormat::Standard => r#" type="screen4x3""#,
            SlideFormat::Widescreen => "",
        };
        format!(
            concat!(
                "{decl}\n",
                r#"<p:presentation xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}" saveSubsetFonts="1">"#,
                r#"<p:sldMasterIdLst><p:sldMasterId id="{master}" r:id="rId1"/></p:sldMasterIdLst>"#,
                r#"<p:sldIdLst>{slides}</p:sldIdLst>"#,
                r#"<p:sldSz cx="{cx}" cy="{cy}"{size_type}/>"#,
                r#"<p:notesSz cx="6858000" cy="9144000"/>"#,
                r#"<p:defaultTextStyle><a:defPPr><a:defRPr lang="en-US"/></a:defPPr></p:defaultTextStyle>"#,
                "</p:presentation>"
            ),
            decl = XML_DECL,
            a = NS_A,
            r = NS_R,
            p = NS_P,
            master = MASTER_ID,
            slides = slide_ids,
            cx = self.format.width_emu(),
            cy = self.format.height_emu(),
            size_type = size_type,
        )
    }

    fn presentation_rels(&self) -> String {
        let slide_count = self.slides.len();
        let mut entries: Vec<(String, &str, String)> = vec![(
            "rId1".to_string(),
            "slideMaster",
            "slideMasters/slideMaster1.xml".to_string(),
        )];
        for n in 1..=slide_count {
            entries.push((format!("rId{}", n + 1), "slide", format!("slides/slide{}.xml", n)));
        }
        for (offset, (kind, target)) in [
            ("presProps", "presProps.xml"),
            ("viewProps", "viewProps.xml"),
            ("theme", "theme/theme1.xml"),
            ("tableStyles", "tableStyles.xml"),
        ]
        .into_iter()
        .enumerate()
        {
            entries.push((
                format!("rId{}", slide_count + 2 + offset),
                kind,
                target.to_string(),
            ));
        }
        let borrowed: Vec<(&str, &str, &str)> = entries
            .iter()
            .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
            .collect();
        relationships(&borrowed)
    }

    fn app_xml(&self) -> String {
        format!(
            concat!(
                "{decl}\n",
                r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" "#,
                r#"xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">"#,
                "<Application>{app}</Application><Slides>{slides}</Slides><PresentationFormat>{format}</PresentationFormat>",
                "</Properties>"
            ),
            decl = XML_DECL,
            app = env!("CARGO_PKG_NAME"),
            slides = self.slides.len(),
            format = match self.format {
                SlideFormat::Standard => "On-screen Show (4:3)",
                SlideFormat::Widescreen => "Widescreen",
            },
        )
    }

    fn core_xml(&self) -> String {
        let now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        format!(
            concat!(
                "{decl}\n",
                r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
                r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
                r#"xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
                "<dc:title>{title}</dc:title><dc:creator>{app}</dc:creator>",
                r#"<dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created>"#,
                r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified>"#,
                "</cp:coreProperties>"
            ),
            decl = XML_DECL,
            title = xml_text(&self.title),
            app = env!("CARGO_PKG_NAME"),
            now = now,
        )
    }
}

fn relationships(entries: &[(&str, &str, &str)]) -> String {
    let body: String = entries
        .iter()
        .map(|(id, kind, target)| {
            format!(
                r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
                id, REL_BASE, kind, target
            )
        })
        .collect();
    format!(
        r#"{}{}<Relationships xmlns="{}">{}</Relationships>"#,
        XML_DECL, "\n", NS_PKG_REL, body
    )
}

fn root_rels() -> String {
    let body = format!(
        concat!(
            r#"<Relationship Id="rId1" Type="{base}/officeDocument" Target="ppt/presentation.xml"/>"#,
            r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
            r#"<Relationship Id="rId3" Type="{base}/extended-properties" Target="docProps/app.xml"/>"#
        ),
        base = REL_BASE
    );
    format!(
        r#"{}{}<Relationships xmlns="{}">{}</Relationships>"#,
        XML_DECL, "\n", NS_PKG_REL, body
    )
}

/// rId1 is the layout; pictures follow in the order they were added.
fn slide_rels(slide: &Slide) -> String {
    let ids: Vec<String> = (0..slide.media_targets().len())
        .map(|i| format!("rId{}", i + 2))
        .collect();
    let mut entries = vec![("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")];
    for (id, target) in ids.iter().zip(slide.media_targets()) {
        entries.push((id.as_str(), "image", target.as_str()));
    }
    relationships(&entries)
}

// ============================================================================
// FIXED PARTS
// ============================================================================

const SLIDE_MASTER: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
    r#"<p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>"#,
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
    r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
    r#"</p:spTree></p:cSld>"#,
    r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" "#,
    r#"accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#,
    r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>"#,
    r#"</p:sldMaster>"#
);

const SLIDE_LAYOUT: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" type="blank" preserve="1">"#,
    r#"<p:cSld name="Blank"><p:spTree>"#,
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
    r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
    r#"</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
);

const THEME: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Flotilla">"#,
    r#"<a:themeElements>"#,
    r#"<a:clrScheme name="Flotilla">"#,
    r#"<a:dk1><a:srgbClr val="000000"/></a:dk1><a:lt1><a:srgbClr val="FFFFFF"/></a:lt1>"#,
    r#"<a:dk2><a:srgbClr val="1F497D"/></a:dk2><a:lt2><a:srgbClr val="EEECE1"/></a:lt2>"#,
    r#"<a:accent1><a:srgbClr val="4F81BD"/></a:accent1><a:accent2><a:srgbClr val="C0504D"/></a:accent2>"#,
    r#"<a:accent3><a:srgbClr val="9BBB59"/></a:accent3><a:accent4><a:srgbClr val="8064A2"/></a:accent4>"#,
    r#"<a:accent5><a:srgbClr val="4BACC6"/></a:accent5><a:accent6><a:srgbClr val="F79646"/></a:accent6>"#,
    r#"<a:hlink><a:srgbClr val="0000FF"/></a:hlink><a:folHlink><a:srgbClr val="800080"/></a:folHlink>"#,
    r#"</a:clrScheme>"#,
    r#"<a:fontScheme name="Flotilla">"#,
    r#"<a:majorFont><a:latin typeface="Arial"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
    r#"<a:minorFont><a:latin typeface="Arial"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>"#,
    r#"</a:fontScheme>"#,
    r#"<a:fmtScheme name="Flotilla">"#,
    r#"<a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#,
    r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst>"#,
    r#"<a:lnStyleLst><a:ln w="9525"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#,
    r#"<a:ln w="25400"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#,
    r#"<a:ln w="38100"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst>"#,
    r#"<a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle>"#,
    r#"<a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst>"#,
    r#"<a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#,
    r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst>"#,
    r#"</a:fmtScheme>"#,
    r#"</a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>"#
);

const PRES_PROPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<p:presentationPr xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#
);

const VIEW_PROPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<p:viewPr xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
    r#"<p:normalViewPr><p:restoredLeft sz="15620"/><p:restoredTop sz="94660"/></p:normalViewPr>"#,
    r#"<p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#
);

const TABLE_STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<a:tblStyleLst xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"def="{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}"/>"#
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Color;
    use quick_xml::Reader;
    use quick_xml::events::Event;
    use std::io::Read;

    fn archive(bytes: Vec<u8>) -> zip::ZipArchive<Cursor<Vec<u8>>> {
        zip::ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    fn part(zip: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut out = String::new();
        zip.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    fn assert_well_formed(name: &str, xml: &str) {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("{} is not well-formed: {}", name, e),
            }
        }
    }

    #[test]
    fn test_empty_presentation_is_an_error() {
        let pres = Presentation::new(SlideFormat::Standard);
        assert!(matches!(pres.to_bytes(), Err(SlideError::Empty)));
    }

    #[test]
    fn test_package_parts() {
        let mut pres = Presentation::new(SlideFormat::Widescreen).with_title("Fleet & Co");
        let target = pres.add_media(vec![1, 2, 3], "PNG");
        assert_eq!(target, "../media/image1.png");

        let mut first = Slide::new(Some(Color::WHITE));
        let ctx = super::super::RenderContext::with_format(
            SlideFormat::Widescreen,
            &crate::document::Canvas::default(),
        );
        first.add_picture(&ctx, "logo", crate::layout::geometry::Rect::new(0.0, 0.0, 5.0, 5.0), &target);
        pres.push_slide(first);
        pres.push_slide(Slide::new(None));
        assert_eq!(pres.slide_count(), 2);

        let mut zip = archive(pres.to_bytes().unwrap());
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/core.xml",
            "ppt/presentation.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/slide2.xml",
            "ppt/slides/_rels/slide1.xml.rels",
            "ppt/theme/theme1.xml",
        ] {
            let xml = part(&mut zip, name);
            assert_well_formed(name, &xml);
        }
        assert!(zip.by_name("ppt/media/image1.png").is_ok());

        let presentation = part(&mut zip, "ppt/presentation.xml");
        assert!(presentation.contains(r#"<p:sldSz cx="12192000" cy="6858000"/>"#));
        assert!(presentation.contains(r#"<p:sldId id="257" r:id="rId3"/>"#));

        let types = part(&mut zip, "[Content_Types].xml");
        assert!(types.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        assert!(types.contains("/ppt/slides/slide2.xml"));

        let rels = part(&mut zip, "ppt/slides/_rels/slide1.xml.rels");
        assert!(rels.contains(r#"Id="rId2""#));
        assert!(rels.contains("../media/image1.png"));

        assert!(part(&mut zip, "docProps/core.xml").contains("Fleet &amp; Co"));
    }

    #[test]
    fn test_standard_size_is_marked_4x3() {
        let mut pres = Presentation::new(SlideFormat::Standard);
        pres.push_slide(Slide::new(None));
        let mut zip = archive(pres.to_bytes().unwrap());
        let xml = part(&mut zip, "ppt/presentation.xml");
        assert!(xml.contains(r#"<p:sldSz cx="9144000" cy="6858000" type="screen4x3"/>"#));
    }
}
