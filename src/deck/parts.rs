//! OOXML parts for the presentation package.
//!
//! Every function returns one complete XML part. Parts whose content depends
//! on the deck are built with `xmlwriter`; fixed boilerplate stays literal.
//! Relationship ids are fixed:
//!
//! | Part | Ids |
//! |------|-----|
//! | `presentation.xml.rels` | `rId1` master, `rId2`–`rId5` props/theme, `rId6` notes master, `rId{7+i}` slide *i* |
//! | `slideN.xml.rels` | `rId1` layout, `rId2` picture, `rId3` notes slide |
//! | `notesSlideN.xml.rels` | `rId1` notes master, `rId2` slide |

use super::CanvasSize;
use xmlwriter::{Indent, Options, XmlWriter};

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Notes page size (portrait letter), fixed by the format.
const NOTES_CX: u64 = 6_858_000;
const NOTES_CY: u64 = 9_144_000;

const FIRST_SLIDE_ID: usize = 256;
const FIRST_SLIDE_REL: usize = 7;

// ── Package-level parts ──────────────────────────────────────────────────

pub fn content_types(slide_count: usize, notes_slides: &[usize]) -> String {
    let ct = |kind: &str| format!("application/vnd.openxmlformats-officedocument.presentationml.{kind}+xml");
    let theme_ct = || "application/vnd.openxmlformats-officedocument.theme+xml".to_string();

    let mut overrides = vec![
        ("/ppt/presentation.xml".to_string(), ct("presentation.main")),
        ("/ppt/slideMasters/slideMaster1.xml".into(), ct("slideMaster")),
        ("/ppt/slideLayouts/slideLayout1.xml".into(), ct("slideLayout")),
        ("/ppt/theme/theme1.xml".into(), theme_ct()),
        ("/ppt/presProps.xml".into(), ct("presProps")),
        ("/ppt/viewProps.xml".into(), ct("viewProps")),
        ("/ppt/tableStyles.xml".into(), ct("tableStyles")),
        (
            "/docProps/core.xml".into(),
            "application/vnd.openxmlformats-package.core-properties+xml".into(),
        ),
        (
            "/docProps/app.xml".into(),
            "application/vnd.openxmlformats-officedocument.extended-properties+xml".into(),
        ),
    ];
    if !notes_slides.is_empty() {
        overrides.push(("/ppt/notesMasters/notesMaster1.xml".into(), ct("notesMaster")));
        overrides.push(("/ppt/theme/theme2.xml".into(), theme_ct()));
    }
    for n in 1..=slide_count {
        overrides.push((format!("/ppt/slides/slide{n}.xml"), ct("slide")));
    }
    for &n in notes_slides {
        overrides.push((format!("/ppt/notesSlides/notesSlide{n}.xml"), ct("notesSlide")));
    }

    let mut xml = writer();
    xml.start_element("Types");
    xml.write_attribute("xmlns", NS_CONTENT_TYPES);
    for (ext, ty) in [
        ("rels", "application/vnd.openxmlformats-package.relationships+xml"),
        ("xml", "application/xml"),
        ("png", "image/png"),
    ] {
        empty_element(&mut xml, "Default", &[("Extension", ext), ("ContentType", ty)]);
    }
    for (part, ty) in &overrides {
        empty_element(
            &mut xml,
            "Override",
            &[("PartName", part.as_str()), ("ContentType", ty.as_str())],
        );
    }
    finish(xml)
}

pub fn root_rels() -> String {
    relationships(&[
        ("rId1", "officeDocument", "ppt/presentation.xml"),
        (
            "rId2",
            "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties",
            "docProps/core.xml",
        ),
        ("rId3", "extended-properties", "docProps/app.xml"),
    ])
}

pub fn app_props(slide_count: usize, notes_count: usize) -> String {
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes"><Application>noteppt</Application><PresentationFormat>On-screen Show (16:9)</PresentationFormat><Slides>{slide_count}</Slides><Notes>{notes_count}</Notes><AppVersion>{}</AppVersion></Properties>"#,
        app_version()
    )
}

pub fn core_props(title: &str) -> String {
    let mut xml = writer();
    xml.start_element("cp:coreProperties");
    xml.write_attribute(
        "xmlns:cp",
        "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
    );
    xml.write_attribute("xmlns:dc", "http://purl.org/dc/elements/1.1/");
    xml.write_attribute("xmlns:dcterms", "http://purl.org/dc/terms/");
    xml.write_attribute("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance");
    text_element(&mut xml, "dc:title", title);
    text_element(&mut xml, "dc:creator", "noteppt");
    finish(xml)
}

/// `MM.mmmm` style version string; Office only accepts digits and one dot.
fn app_version() -> String {
    let major: u32 = env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0);
    let minor: u32 = env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0);
    format!("{major:02}.{minor:04}")
}

// ── Presentation ─────────────────────────────────────────────────────────

pub fn presentation(slide_count: usize, canvas: CanvasSize, has_notes: bool) -> String {
    let mut xml = writer();
    xml.start_element("p:presentation");
    write_namespaces(&mut xml);
    xml.write_attribute("saveSubsetFonts", "1");

    xml.start_element("p:sldMasterIdLst");
    empty_element(&mut xml, "p:sldMasterId", &[("id", "2147483648"), ("r:id", "rId1")]);
    xml.end_element();

    if has_notes {
        xml.start_element("p:notesMasterIdLst");
        empty_element(&mut xml, "p:notesMasterId", &[("r:id", "rId6")]);
        xml.end_element();
    }

    // An empty sldIdLst is a schema error; zero-slide decks omit it.
    if slide_count > 0 {
        xml.start_element("p:sldIdLst");
        for i in 0..slide_count {
            xml.start_element("p:sldId");
            xml.write_attribute("id", &(FIRST_SLIDE_ID + i));
            xml.write_attribute_fmt("r:id", format_args!("rId{}", FIRST_SLIDE_REL + i));
            xml.end_element();
        }
        xml.end_element();
    }

    xml.start_element("p:sldSz");
    xml.write_attribute("cx", &canvas.cx);
    xml.write_attribute("cy", &canvas.cy);
    xml.end_element();
    xml.start_element("p:notesSz");
    xml.write_attribute("cx", &NOTES_CX);
    xml.write_attribute("cy", &NOTES_CY);
    xml.end_element();

    xml.start_element("p:defaultTextStyle");
    xml.start_element("a:defPPr");
    empty_element(&mut xml, "a:defRPr", &[("lang", "en-US")]);
    xml.end_element();
    xml.end_element();

    finish(xml)
}

pub fn presentation_rels(slide_count: usize, has_notes: bool) -> String {
    let mut rels: Vec<(String, &str, String)> = vec![
        ("rId1".into(), "slideMaster", "slideMasters/slideMaster1.xml".into()),
        ("rId2".into(), "presProps", "presProps.xml".into()),
        ("rId3".into(), "viewProps", "viewProps.xml".into()),
        ("rId4".into(), "theme", "theme/theme1.xml".into()),
        ("rId5".into(), "tableStyles", "tableStyles.xml".into()),
    ];
    if has_notes {
        rels.push(("rId6".into(), "notesMaster", "notesMasters/notesMaster1.xml".into()));
    }
    for i in 0..slide_count {
        rels.push((
            format!("rId{}", FIRST_SLIDE_REL + i),
            "slide",
            format!("slides/slide{}.xml", i + 1),
        ));
    }
    let borrowed: Vec<(&str, &str, &str)> = rels
        .iter()
        .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
        .collect();
    relationships(&borrowed)
}

pub fn pres_props() -> String {
    format!(r#"{XML_DECL}<p:presentationPr xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"/>"#)
}

pub fn view_props() -> String {
    format!(
        r#"{XML_DECL}<p:viewPr xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:normalViewPr horzBarState="maximized"><p:restoredLeft sz="15987" autoAdjust="0"/><p:restoredTop sz="94660"/></p:normalViewPr><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#
    )
}

pub fn table_styles() -> String {
    format!(
        r#"{XML_DECL}<a:tblStyleLst xmlns:a="{NS_A}" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#
    )
}

// ── Master, layout, theme ────────────────────────────────────────────────

const CLR_MAP: &str = r#"bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink""#;

fn empty_sp_tree() -> &'static str {
    r#"<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree>"#
}

pub fn slide_master() -> String {
    format!(
        r#"{XML_DECL}<p:sldMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>{tree}</p:cSld><p:clrMap {CLR_MAP}/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle><a:lvl1pPr><a:defRPr sz="4400"/></a:lvl1pPr></p:titleStyle><p:bodyStyle><a:lvl1pPr><a:defRPr sz="2800"/></a:lvl1pPr></p:bodyStyle><p:otherStyle><a:lvl1pPr><a:defRPr sz="1800"/></a:lvl1pPr></p:otherStyle></p:txStyles></p:sldMaster>"#,
        tree = empty_sp_tree()
    )
}

pub fn slide_master_rels() -> String {
    relationships(&[
        ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
        ("rId2", "theme", "../theme/theme1.xml"),
    ])
}

pub fn slide_layout() -> String {
    format!(
        r#"{XML_DECL}<p:sldLayout xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" type="blank" preserve="1"><p:cSld name="Blank">{tree}</p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        tree = empty_sp_tree()
    )
}

pub fn slide_layout_rels() -> String {
    relationships(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")])
}

pub fn slide_theme() -> String {
    theme("Office Theme")
}

pub fn notes_theme() -> String {
    theme("Notes Theme")
}

fn theme(name: &'static str) -> String {
    let accents = ["4472C4", "ED7D31", "A5A5A5", "FFC000", "5B9BD5", "70AD47"];
    let accent_xml: String = accents
        .iter()
        .enumerate()
        .map(|(i, rgb)| format!(r#"<a:accent{n}><a:srgbClr val="{rgb}"/></a:accent{n}>"#, n = i + 1))
        .collect();
    let solid = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let fills = solid.repeat(3);
    let lines: String = [6350, 12700, 19050]
        .iter()
        .map(|w| format!(r#"<a:ln w="{w}">{solid}</a:ln>"#))
        .collect();
    let effects = "<a:effectStyle><a:effectLst/></a:effectStyle>".repeat(3);

    format!(
        r#"{XML_DECL}<a:theme xmlns:a="{NS_A}" name="{name}"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2>{accent_xml}<a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst>{fills}</a:fillStyleLst><a:lnStyleLst>{lines}</a:lnStyleLst><a:effectStyleLst>{effects}</a:effectStyleLst><a:bgFillStyleLst>{fills}</a:bgFillStyleLst></a:fmtScheme></a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>"#
    )
}

// ── Slides ───────────────────────────────────────────────────────────────

/// A slide holding exactly one picture stretched over the whole canvas.
pub fn slide(n: usize, canvas: CanvasSize) -> String {
    format!(
        r#"{XML_DECL}<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr><p:pic><p:nvPicPr><p:cNvPr id="2" name="Slide Image {n}" descr="Page {n}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        cx = canvas.cx,
        cy = canvas.cy,
    )
}

pub fn slide_rels(n: usize, has_notes: bool) -> String {
    let media = format!("../media/image{n}.png");
    let notes_target = format!("../notesSlides/notesSlide{n}.xml");

    let mut rels = vec![
        ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
        ("rId2", "image", media.as_str()),
    ];
    if has_notes {
        rels.push(("rId3", "notesSlide", notes_target.as_str()));
    }
    relationships(&rels)
}

// ── Notes ────────────────────────────────────────────────────────────────

pub fn notes_master() -> String {
    format!(
        r#"{XML_DECL}<p:notesMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld>{tree}</p:cSld><p:clrMap {CLR_MAP}/></p:notesMaster>"#,
        tree = empty_sp_tree()
    )
}

pub fn notes_master_rels() -> String {
    relationships(&[("rId1", "theme", "../theme/theme2.xml")])
}

/// Notes page whose body placeholder holds `notes`, one paragraph per line.
pub fn notes_slide(notes: &str) -> String {
    let mut xml = writer();
    xml.start_element("p:notes");
    write_namespaces(&mut xml);
    xml.start_element("p:cSld");
    xml.start_element("p:spTree");

    xml.start_element("p:nvGrpSpPr");
    empty_element(&mut xml, "p:cNvPr", &[("id", "1"), ("name", "")]);
    empty_element(&mut xml, "p:cNvGrpSpPr", &[]);
    empty_element(&mut xml, "p:nvPr", &[]);
    xml.end_element();
    empty_element(&mut xml, "p:grpSpPr", &[]);

    xml.start_element("p:sp");
    placeholder_header(
        &mut xml,
        ("2", "Slide Image Placeholder 1"),
        &[("noGrp", "1"), ("noRot", "1"), ("noChangeAspect", "1")],
        &[("type", "sldImg")],
    );
    xml.end_element();

    xml.start_element("p:sp");
    placeholder_header(
        &mut xml,
        ("3", "Notes Placeholder 2"),
        &[("noGrp", "1")],
        &[("type", "body"), ("idx", "1")],
    );
    xml.start_element("p:txBody");
    empty_element(&mut xml, "a:bodyPr", &[]);
    empty_element(&mut xml, "a:lstStyle", &[]);
    let mut lines = notes.lines().peekable();
    if lines.peek().is_none() {
        empty_element(&mut xml, "a:p", &[]);
    }
    for line in lines {
        xml.start_element("a:p");
        if line.is_empty() {
            empty_element(&mut xml, "a:endParaRPr", &[("lang", "en-US")]);
        } else {
            xml.start_element("a:r");
            empty_element(&mut xml, "a:rPr", &[("lang", "en-US"), ("dirty", "0")]);
            text_element(&mut xml, "a:t", line);
            xml.end_element();
        }
        xml.end_element();
    }
    xml.end_element(); // p:txBody
    xml.end_element(); // p:sp

    xml.end_element(); // p:spTree
    xml.end_element(); // p:cSld
    xml.start_element("p:clrMapOvr");
    empty_element(&mut xml, "a:masterClrMapping", &[]);
    xml.end_element();

    finish(xml)
}

/// `p:nvSpPr` and an empty `p:spPr` for a notes-page placeholder shape.
fn placeholder_header(
    xml: &mut XmlWriter,
    (id, name): (&str, &str),
    locks: &[(&str, &str)],
    placeholder: &[(&str, &str)],
) {
    xml.start_element("p:nvSpPr");
    empty_element(xml, "p:cNvPr", &[("id", id), ("name", name)]);
    xml.start_element("p:cNvSpPr");
    empty_element(xml, "a:spLocks", locks);
    xml.end_element();
    xml.start_element("p:nvPr");
    empty_element(xml, "p:ph", placeholder);
    xml.end_element();
    xml.end_element();
    empty_element(xml, "p:spPr", &[]);
}

pub fn notes_slide_rels(n: usize) -> String {
    let slide = format!("../slides/slide{n}.xml");
    relationships(&[
        ("rId1", "notesMaster", "../notesMasters/notesMaster1.xml"),
        ("rId2", "slide", slide.as_str()),
    ])
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn writer() -> XmlWriter {
    XmlWriter::new(Options {
        indent: Indent::None,
        ..Options::default()
    })
}

fn finish(xml: XmlWriter) -> String {
    format!("{XML_DECL}{}", xml.end_document())
}

fn write_namespaces(xml: &mut XmlWriter) {
    xml.write_attribute("xmlns:a", NS_A);
    xml.write_attribute("xmlns:r", NS_R);
    xml.write_attribute("xmlns:p", NS_P);
}

fn empty_element(xml: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) {
    xml.start_element(name);
    for &(key, value) in attrs {
        xml.write_attribute(key, value);
    }
    xml.end_element();
}

fn text_element(xml: &mut XmlWriter, name: &str, text: &str) {
    xml.start_element(name);
    xml.write_text(&text_content(text));
    xml.end_element();
}

/// Prepares text for `XmlWriter::write_text`, which escapes `<` only.
/// `&` and `>` are escaped here and characters XML 1.0 cannot carry are
/// dropped.
fn text_content(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '>' => out.push_str("&gt;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || !(c < '\u{20}' || c == '\u{FFFE}' || c == '\u{FFFF}')
}

/// Relationships part. `kind` is a suffix of the officeDocument relationship
/// namespace unless it is already an absolute URI.
fn relationships(rels: &[(&str, &str, &str)]) -> String {
    let mut xml = writer();
    xml.start_element("Relationships");
    xml.write_attribute("xmlns", NS_PKG_RELS);
    for &(id, kind, target) in rels {
        xml.start_element("Relationship");
        xml.write_attribute("Id", id);
        if kind.contains("://") {
            xml.write_attribute("Type", kind);
        } else {
            xml.write_attribute_fmt("Type", format_args!("{REL_BASE}/{kind}"));
        }
        xml.write_attribute("Target", target);
        xml.end_element();
    }
    finish(xml)
}
