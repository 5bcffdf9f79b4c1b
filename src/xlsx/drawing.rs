//! Pictures anchored in an uploaded workbook.
//!
//! calamine only reads values, so images are located by walking the package:
//! workbook sheet list → sheet part → drawing part → media part.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::{Image, Worksheet};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::package::{Package, attribute, parse_relationships, rels_path_for, resolve_target};

const EMU_PER_PIXEL: f64 = 9525.0;

/// A picture and the cell its top-left corner is anchored to.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoredImage {
    /// 0-based anchor row.
    pub row: u32,
    /// 0-based anchor column.
    pub col: u16,
    pub x_offset: u32,
    pub y_offset: u32,
    /// Displayed size in pixels, when the drawing records one.
    pub width_px: Option<f64>,
    pub height_px: Option<f64>,
    pub extension: String,
    pub data: Vec<u8>,
}

impl AnchoredImage {
    /// Builds the `rust_xlsxwriter` image at its recorded display size.
    pub fn to_image(&self) -> Result<Image> {
        let mut image = Image::new_from_buffer(&self.data)?;
        if let (Some(w), Some(h)) = (self.width_px, self.height_px) {
            let (natural_w, natural_h) = (image.width(), image.height());
            if natural_w > 0.0 && natural_h > 0.0 && w > 0.0 && h > 0.0 {
                image = image.set_scale_width(w / natural_w).set_scale_height(h / natural_h);
            }
        }
        Ok(image)
    }

    /// Inserts the picture at `(row, col)` keeping its offsets and size.
    pub fn insert_at(&self, sheet: &mut Worksheet, row: u32, col: u16) -> Result<()> {
        let image = self.to_image()?;
        sheet.insert_image_with_offset(row, col, &image, self.x_offset, self.y_offset)?;
        Ok(())
    }
}

static SHEET_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:\w+:)?sheet\b[^>]*>").expect("static regex compile"));

static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(?:\w+:)?(twoCellAnchor|oneCellAnchor)\b[^>]*>(.*?)</(?:\w+:)?(?:twoCellAnchor|oneCellAnchor)>")
        .expect("static regex compile")
});

static FROM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(?:\w+:)?from>(.*?)</(?:\w+:)?from>").expect("static regex compile")
});

static BLIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:\w+:)?blip\b[^>]*>").expect("static regex compile"));

static EXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<(?:\w+:)?ext\s+cx="(\d+)"\s+cy="(\d+)""#).expect("static regex compile")
});

fn element_number(xml: &str, element: &str) -> Option<u64> {
    let pattern = format!(r"<(?:\w+:)?{0}>\s*(\d+)\s*</(?:\w+:)?{0}>", element);
    let re = Regex::new(&pattern).ok()?;
    re.captures(xml)?.get(1)?.as_str().parse().ok()
}

/// Maps sheet names to their worksheet part paths.
fn sheet_parts(package: &Package) -> Result<Vec<(String, String)>> {
    let workbook_xml = package.text("xl/workbook.xml")?;
    let rels = package
        .text(&rels_path_for("xl/workbook.xml"))
        .map(|xml| parse_relationships(&xml))
        .unwrap_or_default();

    let mut out = Vec::new();
    for tag in SHEET_TAG_RE.find_iter(&workbook_xml) {
        let tag = tag.as_str();
        let (Some(name), Some(rid)) = (attribute(tag, "name"), attribute(tag, "r:id")) else {
            continue;
        };
        let Some(rel) = rels.iter().find(|r| r.id == rid) else {
            warn!(sheet = %name, "Workbook relationship for sheet not found");
            continue;
        };
        out.push((name, resolve_target("xl/workbook.xml", &rel.target)));
    }
    Ok(out)
}

fn parse_drawing(package: &Package, drawing_part: &str) -> Vec<AnchoredImage> {
    let Ok(xml) = package.text(drawing_part) else {
        warn!(part = %drawing_part, "Drawing part missing");
        return Vec::new();
    };
    let rels = package
        .text(&rels_path_for(drawing_part))
        .map(|x| parse_relationships(&x))
        .unwrap_or_default();

    let mut images = Vec::new();
    for anchor in ANCHOR_RE.captures_iter(&xml) {
        let body = &anchor[2];
        let Some(from) = FROM_RE.captures(body) else {
            debug!("Anchor without a from-cell, skipping");
            continue;
        };
        let from = &from[1];
        let (Some(col), Some(row)) = (element_number(from, "col"), element_number(from, "row"))
        else {
            continue;
        };
        let col_off = element_number(from, "colOff").unwrap_or(0);
        let row_off = element_number(from, "rowOff").unwrap_or(0);

        let Some(blip) = BLIP_RE.find(body) else {
            // Shapes and charts carry no picture.
            continue;
        };
        let Some(embed) = attribute(blip.as_str(), "r:embed") else {
            continue;
        };
        let Some(rel) = rels.iter().find(|r| r.id == embed) else {
            warn!(part = %drawing_part, rid = %embed, "Image relationship not found");
            continue;
        };
        let media_part = resolve_target(drawing_part, &rel.target);
        let Some(data) = package.part(&media_part) else {
            warn!(part = %media_part, "Image media part missing");
            continue;
        };

        let (width_px, height_px) = EXT_RE
            .captures_iter(body)
            .last()
            .and_then(|c| {
                let cx: f64 = c[1].parse().ok()?;
                let cy: f64 = c[2].parse().ok()?;
                Some((Some(cx / EMU_PER_PIXEL), Some(cy / EMU_PER_PIXEL)))
            })
            .unwrap_or((None, None));

        let extension = media_part
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();

        images.push(AnchoredImage {
            row: u32::try_from(row).unwrap_or(u32::MAX),
            col: u16::try_from(col).unwrap_or(u16::MAX),
            x_offset: (col_off as f64 / EMU_PER_PIXEL).round() as u32,
            y_offset: (row_off as f64 / EMU_PER_PIXEL).round() as u32,
            width_px,
            height_px,
            extension,
            data: data.to_vec(),
        });
    }
    images
}

/// Reads every picture of an `.xlsx` buffer, grouped by sheet name.
///
/// Sheets without drawings are absent from the map. Parts that cannot be
/// resolved are logged and skipped rather than failing the whole read.
///
/// # Errors
///
/// Fails only when the buffer is not a ZIP package or has no
/// `xl/workbook.xml`.
pub fn read_anchored_images(bytes: &[u8]) -> Result<HashMap<String, Vec<AnchoredImage>>> {
    let package = Package::from_bytes(bytes)?;
    let mut out: HashMap<String, Vec<AnchoredImage>> = HashMap::new();

    for (sheet_name, sheet_part) in sheet_parts(&package)? {
        let Ok(rels_xml) = package.text(&rels_path_for(&sheet_part)) else {
            continue;
        };
        for rel in parse_relationships(&rels_xml) {
            if !rel.rel_type.ends_with("/drawing") {
                continue;
            }
            let drawing_part = resolve_target(&sheet_part, &rel.target);
            let images = parse_drawing(&package, &drawing_part);
            if !images.is_empty() {
                debug!(sheet = %sheet_name, count = images.len(), "Found anchored images");
                out.entry(sheet_name.clone()).or_default().extend(images);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_number_handles_prefixes() {
        let from = "<xdr:col>8</xdr:col><xdr:colOff>9525</xdr:colOff><xdr:row>4</xdr:row>";
        assert_eq!(element_number(from, "col"), Some(8));
        assert_eq!(element_number(from, "colOff"), Some(9525));
        assert_eq!(element_number(from, "row"), Some(4));
        assert_eq!(element_number(from, "rowOff"), None);
    }
}
