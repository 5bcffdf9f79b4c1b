//! Checklist tables rendered into Word and the `POC Attached` column.

use std::collections::BTreeMap;
use std::ops::Range;

use tracing::{info, warn};

use super::document::{
    Align, CELL_PROPS_RE, CELL_RE, DocxPackage, ROW_RE, RunStyle, TABLE_RE, fragment_text, paragraph_xml, splice,
};
use crate::errors::Result;

pub const SERIAL_HEADER: &str = "Sr. No.";
pub const REQUIREMENTS_HEADER: &str = "Requirements";
pub const REMARK_HEADER: &str = "Auditor's Remark";
pub const COMPLIED_HEADER_PREFIX: &str = "Complied Status";
pub const POC_HEADER: &str = "POC Attached";

const HEADER_FILL: &str = "00008B";
const HEADER_FONT: &str = "FFFFFF";
const ANNEXURE_COLOR: &str = "FF0000";

/// Column widths in tenths of an inch, keyed by a header fragment.
const COLUMN_WIDTHS: [(&str, u32); 5] = [
    (SERIAL_HEADER, 20),
    (REQUIREMENTS_HEADER, 60),
    (COMPLIED_HEADER_PREFIX, 25),
    (REMARK_HEADER, 80),
    (POC_HEADER, 25),
];

/// Twips per tenth of an inch.
const TWIPS_PER_UNIT: u32 = 144;

fn is_left_column(header: &str) -> bool {
    header == REQUIREMENTS_HEADER || header == REMARK_HEADER
}

fn column_width(header: &str) -> Option<u32> {
    COLUMN_WIDTHS
        .iter()
        .find(|(key, _)| header.contains(key))
        .map(|(_, w)| w * TWIPS_PER_UNIT)
}

fn cell_xml(text: &str, width: Option<u32>, header: bool, align: Align) -> String {
    let mut props = String::from("<w:tcPr>");
    if let Some(w) = width {
        props.push_str(&format!(r#"<w:tcW w:w="{}" w:type="dxa"/>"#, w));
    }
    if header {
        props.push_str(&format!(
            r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#,
            HEADER_FILL
        ));
    }
    props.push_str(r#"<w:vAlign w:val="center"/></w:tcPr>"#);
    let style = if header {
        RunStyle {
            bold: true,
            color: Some(HEADER_FONT),
        }
    } else {
        RunStyle::PLAIN
    };
    format!("<w:tc>{}{}</w:tc>", props, paragraph_xml(text, style, Some(align)))
}

/// `Table Grid` markup for `rows`; the first `header_rows` rows are headers.
///
/// Requirement and remark columns are left-aligned below the header; every
/// other cell is centered.
#[must_use]
pub fn table_xml(rows: &[Vec<String>], header_rows: usize) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let titles: Vec<String> = (0..columns)
        .map(|c| {
            rows.first()
                .and_then(|r| r.get(c))
                .map_or_else(String::new, |s| s.trim().to_string())
        })
        .collect();
    let widths: Vec<Option<u32>> = titles.iter().map(|t| column_width(t)).collect();

    let border = r#"w:val="single" w:sz="4" w:space="0" w:color="auto""#;
    let mut xml = format!(
        r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0" w:type="auto"/><w:tblBorders><w:top {b}/><w:left {b}/><w:bottom {b}/><w:right {b}/><w:insideH {b}/><w:insideV {b}/></w:tblBorders><w:tblLook w:val="04A0"/></w:tblPr><w:tblGrid>"#,
        b = border
    );
    for width in &widths {
        xml.push_str(&format!(r#"<w:gridCol w:w="{}"/>"#, width.unwrap_or(2 * 1440)));
    }
    xml.push_str("</w:tblGrid>");

    for (r, row) in rows.iter().enumerate() {
        let header = r < header_rows;
        xml.push_str("<w:tr>");
        if header {
            xml.push_str("<w:trPr><w:tblHeader/></w:trPr>");
        }
        for c in 0..columns {
            let text = row.get(c).map_or("", String::as_str);
            let align = if !header && is_left_column(&titles[c]) {
                Align::Left
            } else {
                Align::Center
            };
            xml.push_str(&cell_xml(text, widths[c], header, align));
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    xml
}

/// Replaces the paragraph holding `token` with a table of `rows`.
///
/// Returns `false` when the template lacks the token.
#[tracing::instrument(level = "info", skip_all, fields(token = token, rows = rows.len()))]
pub fn insert_table(doc: &mut DocxPackage, token: &str, rows: &[Vec<String>], header_rows: usize) -> Result<bool> {
    let inserted = doc.replace_paragraph_containing(token, &table_xml(rows, header_rows))?;
    if inserted {
        info!("Inserted checklist table");
    }
    Ok(inserted)
}

fn cell_text(cell: &str) -> String {
    fragment_text(cell).trim().to_string()
}

fn annexure_cell(existing: &str, annexure: usize) -> String {
    let props = CELL_PROPS_RE
        .find(existing)
        .map_or(r#"<w:tcPr><w:vAlign w:val="center"/></w:tcPr>"#, |m| m.as_str());
    let text = format!("Annexure {}", annexure);
    let style = RunStyle {
        bold: false,
        color: Some(ANNEXURE_COLOR),
    };
    format!(
        "<w:tc>{}{}</w:tc>",
        props,
        paragraph_xml(&text, style, Some(Align::Center))
    )
}

/// Writes `Annexure n` into the `POC Attached` cell of every row whose
/// serial number has an annexure.
///
/// Only the first table with both `Sr. No.` and `Requirements` headers is
/// touched. Returns the number of cells written.
#[tracing::instrument(level = "info", skip_all)]
pub fn set_poc_attached(doc: &mut DocxPackage, annexures: &BTreeMap<String, usize>) -> Result<usize> {
    let xml = doc.document_xml()?;
    for table in TABLE_RE.find_iter(&xml) {
        let rows: Vec<_> = ROW_RE.find_iter(table.as_str()).collect();
        let Some(header) = rows.first() else {
            continue;
        };
        let titles: Vec<String> = CELL_RE.find_iter(header.as_str()).map(|c| cell_text(c.as_str())).collect();
        if !titles.iter().any(|t| t == SERIAL_HEADER) || !titles.iter().any(|t| t == REQUIREMENTS_HEADER) {
            continue;
        }
        let Some(poc_col) = titles.iter().position(|t| t.contains(POC_HEADER)) else {
            warn!("Checklist table has no POC Attached column");
            return Ok(0);
        };

        let mut edits: Vec<(Range<usize>, String)> = Vec::new();
        for row in rows.iter().skip(1) {
            let cells: Vec<_> = CELL_RE.find_iter(row.as_str()).collect();
            let Some(serial) = cells.first().map(|c| cell_text(c.as_str())) else {
                continue;
            };
            let (Some(annexure), Some(cell)) = (annexures.get(&serial), cells.get(poc_col)) else {
                continue;
            };
            let start = table.start() + row.start() + cell.start();
            let end = table.start() + row.start() + cell.end();
            edits.push((start..end, annexure_cell(cell.as_str(), *annexure)));
        }

        let written = edits.len();
        info!(written, "Updated POC Attached column");
        doc.set_document_xml(splice(&xml, edits));
        return Ok(written);
    }
    warn!("No checklist table found for POC Attached update");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Vec<String>> {
        [
            vec!["Sr. No.", "Requirements", "Complied Status (Fully Complied)", "Auditor's Remark", "POC Attached"],
            vec!["1", "Firewall in place", "Complied", "Checked", ""],
        ]
        .iter()
        .map(|r| r.iter().map(|s| s.to_string()).collect())
        .collect()
    }

    #[test]
    fn header_row_is_shaded_and_bold() {
        let xml = table_xml(&rows(), 1);
        assert!(xml.contains(r#"<w:tblStyle w:val="TableGrid"/>"#));
        assert_eq!(xml.matches(r#"w:fill="00008B""#).count(), 5);
        assert!(xml.contains(r#"<w:tcW w:w="2880" w:type="dxa"/>"#));
        assert_eq!(ROW_RE.find_iter(&xml).count(), 2);
    }

    #[test]
    fn requirements_column_is_left_aligned() {
        let xml = table_xml(&rows(), 1);
        let data_row = ROW_RE.find_iter(&xml).nth(1).unwrap();
        let cells: Vec<_> = CELL_RE.find_iter(data_row.as_str()).collect();
        assert!(cells[1].as_str().contains(r#"<w:jc w:val="left"/>"#));
        assert!(cells[0].as_str().contains(r#"<w:jc w:val="center"/>"#));
    }
}
