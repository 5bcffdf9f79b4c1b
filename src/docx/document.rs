//! A `.docx` package and the paragraph-level edits the reports need.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::errors::{ReportError, Result};
use crate::package::{Package, xml_escape, xml_unescape};

pub const DOCUMENT_PART: &str = "word/document.xml";

static PARAGRAPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*[^/])?>.*?</w:p>").expect("static regex compile"));

static TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(<w:t(?:\s[^>]*)?>)(.*?)</w:t>").expect("static regex compile"));

pub(crate) static TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:tbl(?:\s[^>]*)?>.*?</w:tbl>").expect("static regex compile"));

pub(crate) static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:tr(?:\s[^>]*)?>.*?</w:tr>").expect("static regex compile"));

pub(crate) static CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:tc(?:\s[^>]*)?>.*?</w:tc>").expect("static regex compile"));

pub(crate) static CELL_PROPS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:tcPr>.*?</w:tcPr>|<w:tcPr/>").expect("static regex compile"));

const FONT: &str = "Times New Roman";
/// 12 pt, in the half-points Word stores.
const FONT_SIZE_HALF_POINTS: u32 = 24;

/// Run formatting for generated text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStyle<'a> {
    pub bold: bool,
    pub color: Option<&'a str>,
}

impl RunStyle<'static> {
    pub const PLAIN: RunStyle<'static> = RunStyle { bold: false, color: None };
    pub const BOLD: RunStyle<'static> = RunStyle { bold: true, color: None };
}

/// Paragraph alignment for generated paragraphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

impl Align {
    fn value(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
        }
    }
}

/// Text escaped for `<w:t>`, with line breaks turned into `<w:br/>`.
fn text_content(text: &str) -> String {
    text.split('\n')
        .map(|line| xml_escape(line.trim_end_matches('\r')))
        .collect::<Vec<_>>()
        .join(r#"</w:t><w:br/><w:t xml:space="preserve">"#)
}

/// A Times New Roman 12 pt run.
#[must_use]
pub fn run_xml(text: &str, style: RunStyle<'_>) -> String {
    let mut props = format!(
        r#"<w:rFonts w:ascii="{f}" w:hAnsi="{f}" w:cs="{f}"/>"#,
        f = FONT
    );
    if style.bold {
        props.push_str("<w:b/><w:bCs/>");
    }
    if let Some(color) = style.color {
        props.push_str(&format!(r#"<w:color w:val="{}"/>"#, color));
    }
    props.push_str(&format!(
        r#"<w:sz w:val="{s}"/><w:szCs w:val="{s}"/>"#,
        s = FONT_SIZE_HALF_POINTS
    ));
    format!(
        r#"<w:r><w:rPr>{}</w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#,
        props,
        text_content(text)
    )
}

/// A paragraph holding one run.
#[must_use]
pub fn paragraph_xml(text: &str, style: RunStyle<'_>, align: Option<Align>) -> String {
    let props = align.map_or_else(String::new, |a| format!(r#"<w:pPr><w:jc w:val="{}"/></w:pPr>"#, a.value()));
    if text.is_empty() {
        return format!("<w:p>{}</w:p>", props);
    }
    format!("<w:p>{}{}</w:p>", props, run_xml(text, style))
}

#[must_use]
pub fn page_break_xml() -> &'static str {
    r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#
}

/// Visible text of an XML fragment: every `<w:t>` concatenated.
#[must_use]
pub fn fragment_text(xml: &str) -> String {
    TEXT_RE
        .captures_iter(xml)
        .map(|c| xml_unescape(&c[2]))
        .collect()
}

/// Byte range of the first paragraph whose text satisfies `pred`.
pub fn find_paragraph<P>(xml: &str, pred: P) -> Option<Range<usize>>
where
    P: Fn(&str) -> bool,
{
    PARAGRAPH_RE
        .find_iter(xml)
        .find(|m| pred(&fragment_text(m.as_str())))
        .map(|m| m.range())
}

/// Applies every token replacement to one paragraph.
///
/// Returns `None` when no token occurs in the paragraph's text. Otherwise
/// the whole new text lands in the first text run, keeping that run's
/// formatting, and the other runs are emptied.
fn replace_in_paragraph(paragraph: &str, replacements: &[(&str, String)]) -> Option<String> {
    let texts: Vec<_> = TEXT_RE.captures_iter(paragraph).collect();
    if texts.is_empty() {
        return None;
    }
    let full: String = texts.iter().map(|c| xml_unescape(&c[2])).collect();
    if !replacements.iter().any(|(token, _)| full.contains(token)) {
        return None;
    }
    let mut replaced = full;
    for (token, value) in replacements {
        replaced = replaced.replace(token, value);
    }

    let mut out = String::with_capacity(paragraph.len() + replaced.len());
    let mut last = 0;
    for (i, caps) in texts.iter().enumerate() {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&paragraph[last..whole.start()]);
        if i == 0 {
            out.push_str(r#"<w:t xml:space="preserve">"#);
            out.push_str(&text_content(&replaced));
            out.push_str("</w:t>");
        } else {
            out.push_str(&caps[1]);
            out.push_str("</w:t>");
        }
        last = whole.end();
    }
    out.push_str(&paragraph[last..]);
    Some(out)
}

/// Replaces `ranges` (sorted, non-overlapping) of `xml` with new content.
pub(crate) fn splice(xml: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(r, _)| r.start);
    let mut out = String::with_capacity(xml.len());
    let mut last = 0;
    for (range, replacement) in edits {
        out.push_str(&xml[last..range.start]);
        out.push_str(&replacement);
        last = range.end;
    }
    out.push_str(&xml[last..]);
    out
}

/// An opened Word document.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    package: Package,
}

impl DocxPackage {
    /// # Errors
    ///
    /// [`ReportError::Document`] when the buffer is not a Word package.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let package = Package::from_bytes(bytes)
            .map_err(|e| ReportError::Document(format!("template is not a .docx file: {}", e)))?;
        if !package.contains(DOCUMENT_PART) {
            return Err(ReportError::Document(format!(
                "template has no '{}' part",
                DOCUMENT_PART
            )));
        }
        Ok(Self { package })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.package.to_bytes()
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn package_mut(&mut self) -> &mut Package {
        &mut self.package
    }

    pub fn document_xml(&self) -> Result<String> {
        self.package.text(DOCUMENT_PART)
    }

    pub fn set_document_xml(&mut self, xml: String) {
        self.package.set_part(DOCUMENT_PART, xml.into_bytes());
    }

    /// The body plus every header and footer part.
    #[must_use]
    pub fn text_parts(&self) -> Vec<String> {
        self.package
            .names()
            .filter(|name| {
                *name == DOCUMENT_PART
                    || (name.starts_with("word/header") || name.starts_with("word/footer"))
                        && name.ends_with(".xml")
            })
            .map(str::to_string)
            .collect()
    }

    /// Visible text of the body, paragraph by paragraph.
    pub fn paragraphs(&self) -> Result<Vec<String>> {
        let xml = self.document_xml()?;
        Ok(PARAGRAPH_RE
            .find_iter(&xml)
            .map(|m| fragment_text(m.as_str()))
            .collect())
    }

    /// Replaces the first body paragraph whose text contains `token`.
    ///
    /// Returns `false`, leaving the document untouched, when the token is
    /// missing.
    pub fn replace_paragraph_containing(&mut self, token: &str, replacement: &str) -> Result<bool> {
        let xml = self.document_xml()?;
        let Some(range) = find_paragraph(&xml, |text| text.contains(token)) else {
            warn!(token, "Placeholder paragraph not found in template");
            return Ok(false);
        };
        let updated = splice(&xml, vec![(range, replacement.to_string())]);
        self.set_document_xml(updated);
        Ok(true)
    }

    /// Inserts `fragment` right before the first body paragraph whose text
    /// satisfies `pred`.
    pub fn insert_before_paragraph<P>(&mut self, pred: P, fragment: &str) -> Result<bool>
    where
        P: Fn(&str) -> bool,
    {
        let xml = self.document_xml()?;
        let Some(range) = find_paragraph(&xml, pred) else {
            return Ok(false);
        };
        let at = range.start;
        self.set_document_xml(splice(&xml, vec![(at..at, fragment.to_string())]));
        Ok(true)
    }
}

/// Replaces tokens in the body, headers and footers.
///
/// Tokens split across several runs of one paragraph are still found. Table
/// cells are covered since their text lives in paragraphs too. Returns the
/// number of paragraphs changed.
#[tracing::instrument(level = "info", skip_all)]
pub fn replace_placeholders(doc: &mut DocxPackage, replacements: &[(&str, String)]) -> Result<usize> {
    let mut changed = 0;
    for part in doc.text_parts() {
        let xml = doc.package.text(&part)?;
        let edits: Vec<(Range<usize>, String)> = PARAGRAPH_RE
            .find_iter(&xml)
            .filter_map(|m| replace_in_paragraph(m.as_str(), replacements).map(|new| (m.range(), new)))
            .collect();
        if edits.is_empty() {
            continue;
        }
        debug!(part = %part, paragraphs = edits.len(), "Replaced placeholders");
        changed += edits.len();
        let updated = splice(&xml, edits);
        doc.package.set_part(&part, updated.into_bytes());
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_tokens_are_replaced() {
        let p = r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>City: Cccc</w:t></w:r><w:r><w:t>ityyy.</w:t></w:r></w:p>"#;
        let out = replace_in_paragraph(p, &[("Ccccityyy", "Pune & Co".to_string())]).unwrap();
        assert_eq!(fragment_text(&out), "City: Pune & Co.");
        assert!(out.contains("<w:b/>"));
        assert!(out.contains("Pune &amp; Co"));
    }

    #[test]
    fn untouched_paragraphs_are_skipped() {
        let p = "<w:p><w:r><w:t>Nothing here</w:t></w:r></w:p>";
        assert!(replace_in_paragraph(p, &[("Ccccityyy", "x".to_string())]).is_none());
    }

    #[test]
    fn newlines_become_breaks() {
        let run = run_xml("a\nb", RunStyle::PLAIN);
        assert!(run.contains("<w:br/>"));
        assert_eq!(fragment_text(&run), "ab");
    }

    #[test]
    fn paragraph_regex_skips_properties() {
        let xml = r#"<w:body><w:p w:rsidR="1"><w:pPr><w:jc w:val="left"/></w:pPr><w:r><w:t>one</w:t></w:r></w:p><w:p/><w:p><w:r><w:t>two</w:t></w:r></w:p></w:body>"#;
        let found = find_paragraph(xml, |t| t == "two").unwrap();
        assert_eq!(fragment_text(&xml[found]), "two");
    }
}
