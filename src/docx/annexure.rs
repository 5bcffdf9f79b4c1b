//! Evidence screenshots placed as numbered annexures.

use std::collections::BTreeMap;

use rust_xlsxwriter::Image;
use tracing::{info, warn};

use super::document::{DOCUMENT_PART, DocxPackage, RunStyle, find_paragraph, page_break_xml, paragraph_xml};
use crate::errors::Result;
use crate::package::{parse_relationships, rels_path_for, xml_escape};

/// Rendered height of every annexure picture.
pub const PICTURE_HEIGHT_PX: f64 = 430.0;
/// EMUs per pixel at 96 DPI.
const EMU_PER_PX: f64 = 9525.0;
/// 1 pt picture border.
const BORDER_EMU: u32 = 12_700;
/// Sort key of files without a leading number.
const UNNUMBERED: u64 = 999;
const FIRST_PICTURE_ID: usize = 5000;

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const IMAGE_REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const EMPTY_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#;

/// An evidence image to place as an annexure.
#[derive(Debug, Clone)]
pub struct AnnexureImage {
    /// File name inside the archive, e.g. `12_Firewall rules.png`.
    pub file_name: String,
    pub extension: String,
    pub data: Vec<u8>,
}

/// Ordering data parsed from an evidence file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnexureKey {
    /// The leading number cut to its first two digits.
    pub group: u64,
    /// The whole leading number, i.e. the checklist question.
    pub number: u64,
    /// Text after the number and an optional underscore.
    pub rest: String,
}

/// Parses `12_Firewall rules.png` into group 12, number 12 and `Firewall rules`.
///
/// # Examples
///
/// ```
/// use audit_reports::docx::annexure::annexure_key;
///
/// let key = annexure_key("1201_Backup log.png");
/// assert_eq!((key.group, key.number, key.rest.as_str()), (12, 1201, "Backup log"));
/// assert_eq!(annexure_key("cover.jpg").group, 999);
/// ```
#[must_use]
pub fn annexure_key(file_name: &str) -> AnnexureKey {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    };
    let digits: String = stem.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return AnnexureKey {
            group: UNNUMBERED,
            number: UNNUMBERED,
            rest: stem.trim().to_string(),
        };
    }
    let number = digits.parse::<u64>().unwrap_or(u64::MAX);
    let group = if digits.len() >= 2 {
        digits[..2].parse::<u64>().unwrap_or(number)
    } else {
        number
    };
    let rest = stem[digits.len()..].strip_prefix('_').unwrap_or(&stem[digits.len()..]);
    AnnexureKey {
        group,
        number,
        rest: rest.trim().to_string(),
    }
}

/// Indices of `names` in annexure order: by two-digit group, then by the full
/// number. Ties keep their input order.
#[must_use]
pub fn annexure_order<S: AsRef<str>>(names: &[S]) -> Vec<usize> {
    let keys: Vec<AnnexureKey> = names.iter().map(|n| annexure_key(n.as_ref())).collect();
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by_key(|&i| (keys[i].group, keys[i].number));
    order
}

fn picture_xml(rel_id: &str, picture_id: usize, name: &str, width_px: f64) -> String {
    let cx = (width_px * EMU_PER_PX).round() as u64;
    let cy = (PICTURE_HEIGHT_PX * EMU_PER_PX).round() as u64;
    let name = xml_escape(name);
    format!(
        concat!(
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:drawing>"#,
            r#"<wp:inline xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{id}" name="{name}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#,
            r#"<a:ln w="{border}"><a:solidFill><a:srgbClr val="000000"/></a:solidFill></a:ln></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
        ),
        cx = cx,
        cy = cy,
        id = picture_id,
        name = name,
        rel = rel_id,
        border = BORDER_EMU,
    )
}

/// Stores `data` as a media part and returns its relationship id.
fn add_media(doc: &mut DocxPackage, media_name: &str, extension: &str, data: Vec<u8>) -> Result<String> {
    let rels_path = rels_path_for(DOCUMENT_PART);
    let pkg = doc.package_mut();

    let rels = if pkg.contains(&rels_path) {
        pkg.text(&rels_path)?
    } else {
        EMPTY_RELS.to_string()
    };
    let next = parse_relationships(&rels)
        .iter()
        .filter_map(|r| r.id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
        .max()
        .unwrap_or(0)
        + 1;
    let rel_id = format!("rId{}", next);
    let entry = format!(
        r#"<Relationship Id="{}" Type="{}" Target="media/{}"/>"#,
        rel_id, IMAGE_REL_TYPE, media_name
    );
    let rels = match rels.rfind("</Relationships>") {
        Some(at) => format!("{}{}{}", &rels[..at], entry, &rels[at..]),
        None => format!("{}{}", rels, entry),
    };
    pkg.set_part(&rels_path, rels.into_bytes());

    let types = pkg.text(CONTENT_TYPES_PART)?;
    let declared = format!(r#"extension="{}""#, extension.to_lowercase());
    if !types.to_lowercase().contains(&declared) {
        let mime = mime_guess::from_ext(extension).first_or_octet_stream();
        let default = format!(r#"<Default Extension="{}" ContentType="{}"/>"#, extension, mime.essence_str());
        let types = match types.rfind("</Types>") {
            Some(at) => format!("{}{}{}", &types[..at], default, &types[at..]),
            None => format!("{}{}", types, default),
        };
        pkg.set_part(CONTENT_TYPES_PART, types.into_bytes());
    }

    pkg.set_part(&format!("word/media/{}", media_name), data);
    Ok(rel_id)
}

/// Replaces the paragraph holding `token` with the annexure pages.
///
/// A new `Annexure n (<rest>)` title starts whenever the leading number of
/// the file changes; further images for the same number only carry their
/// own `<rest>`. Images that cannot be decoded are skipped.
///
/// Returns the annexure number of every question that got one, keyed by the
/// question number as text.
#[tracing::instrument(level = "info", skip_all, fields(images = images.len()))]
pub fn insert_annexures(doc: &mut DocxPackage, token: &str, images: &[AnnexureImage]) -> Result<BTreeMap<String, usize>> {
    let mut annexures = BTreeMap::new();
    let xml = doc.document_xml()?;
    if find_paragraph(&xml, |text| text.contains(token)).is_none() {
        warn!(token, "Annexure placeholder not found in template");
        return Ok(annexures);
    }
    let names: Vec<&str> = images.iter().map(|i| i.file_name.as_str()).collect();

    let mut blocks: Vec<String> = Vec::new();
    let mut annexure = 0;
    let mut previous: Option<u64> = None;

    for index in annexure_order(&names) {
        let image = &images[index];
        let (width, height) = match Image::new_from_buffer(&image.data) {
            Ok(decoded) if decoded.height() > 0.0 => (decoded.width(), decoded.height()),
            _ => {
                warn!(file = %image.file_name, "Skipping annexure image that could not be decoded");
                continue;
            }
        };
        let key = annexure_key(&image.file_name);

        let title = if previous == Some(key.number) {
            key.rest.clone()
        } else {
            annexure += 1;
            previous = Some(key.number);
            annexures.insert(key.number.to_string(), annexure);
            if key.rest.is_empty() {
                format!("Annexure {}", annexure)
            } else {
                format!("Annexure {} ({})", annexure, key.rest)
            }
        };

        let seq = blocks.len() + 1;
        let extension = image.extension.to_lowercase();
        let media_name = format!("annexure_{}.{}", seq, extension);
        let rel_id = add_media(doc, &media_name, &extension, image.data.clone())?;

        let mut block = String::new();
        block.push_str(&paragraph_xml(&title, RunStyle::BOLD, None));
        block.push_str(&paragraph_xml("", RunStyle::PLAIN, None));
        block.push_str(&picture_xml(
            &rel_id,
            FIRST_PICTURE_ID + seq,
            &image.file_name,
            PICTURE_HEIGHT_PX * width / height,
        ));
        blocks.push(block);
    }

    let fragment = blocks.join(page_break_xml());
    doc.replace_paragraph_containing(token, &fragment)?;
    info!(annexures = annexures.len(), pictures = blocks.len(), "Inserted annexures");
    Ok(annexures)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_cut_to_two_digits() {
        assert_eq!(annexure_key("7_Antivirus.png").group, 7);
        assert_eq!(annexure_key("111_Patch.png").group, 11);
        let key = annexure_key("28 Logs.jpeg");
        assert_eq!((key.group, key.number, key.rest.as_str()), (28, 28, "Logs"));
    }

    #[test]
    fn order_groups_then_numbers() {
        let names = ["12_b.png", "cover.png", "1201_a.png", "3_c.png", "12_a.png"];
        let order: Vec<&str> = annexure_order(&names).into_iter().map(|i| names[i]).collect();
        assert_eq!(order, vec!["3_c.png", "12_b.png", "12_a.png", "1201_a.png", "cover.png"]);
    }
}
