//! OOXML packages (`.xlsx`, `.docx`) as an ordered map of ZIP parts.
//!
//! Parts keep their original order so that `[Content_Types].xml` stays the
//! first entry when the package is written back.

use std::io::{Cursor, Read, Write};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::{ReportError, Result};
use crate::utils::upload::is_path_traversal;

#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    /// Reads every file entry of a ZIP buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Archive`] when the buffer is not a ZIP file or an
    /// entry cannot be decompressed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            if is_path_traversal(&name) {
                warn!(entry = %name, "Skipping archive entry with unsafe path");
                continue;
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            parts.push((name, data));
        }
        Ok(Self { parts })
    }

    /// Writes the package back as a deflated ZIP buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in &self.parts {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(data)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    /// A part decoded as UTF-8 text.
    pub fn text(&self, name: &str) -> Result<String> {
        let bytes = self
            .part(name)
            .ok_or_else(|| ReportError::Archive(format!("missing package part '{}'", name)))?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ReportError::Archive(format!("part '{}' is not UTF-8: {}", name, e)))
    }

    /// Replaces a part, or appends it when it does not exist yet.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => self.parts.push((name.to_string(), data)),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }
}

/// A `<Relationship>` entry of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

static RELATIONSHIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:\w+:)?Relationship\b[^>]*>").expect("static regex compile"));

/// Parses every relationship of a `.rels` document.
#[must_use]
pub fn parse_relationships(xml: &str) -> Vec<Relationship> {
    RELATIONSHIP_RE
        .find_iter(xml)
        .filter_map(|m| {
            let tag = m.as_str();
            Some(Relationship {
                id: attribute(tag, "Id")?,
                rel_type: attribute(tag, "Type").unwrap_or_default(),
                target: attribute(tag, "Target")?,
            })
        })
        .collect()
}

/// Value of attribute `name` inside a single start tag, entity-decoded.
#[must_use]
pub fn attribute(tag: &str, name: &str) -> Option<String> {
    let needle = format!("{}=", name);
    let mut search = 0;
    while let Some(pos) = tag[search..].find(&needle) {
        let start = search + pos;
        let preceded_ok = tag[..start]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        let value_start = start + needle.len();
        if preceded_ok {
            let quote = tag[value_start..].chars().next()?;
            if quote == '"' || quote == '\'' {
                let rest = &tag[value_start + 1..];
                let end = rest.find(quote)?;
                return Some(xml_unescape(&rest[..end]));
            }
        }
        search = value_start;
    }
    None
}

/// Path of the `.rels` part that belongs to `part`.
///
/// # Examples
///
/// ```
/// use audit_reports::package::rels_path_for;
///
/// assert_eq!(rels_path_for("xl/worksheets/sheet1.xml"), "xl/worksheets/_rels/sheet1.xml.rels");
/// ```
#[must_use]
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolves a relationship target against the part that declared it.
///
/// # Examples
///
/// ```
/// use audit_reports::package::resolve_target;
///
/// assert_eq!(resolve_target("xl/drawings/drawing1.xml", "../media/image1.png"), "xl/media/image1.png");
/// assert_eq!(resolve_target("xl/workbook.xml", "/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
/// ```
#[must_use]
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = source_part.split('/').collect();
    segments.pop();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[must_use]
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(amp|lt|gt|quot|apos|#x[0-9a-fA-F]+|#[0-9]+);").expect("static regex compile")
});

#[must_use]
pub fn xml_unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            match entity {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                _ => {
                    let code = if let Some(hex) = entity.strip_prefix("#x") {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        entity[1..].parse::<u32>().ok()
                    };
                    code.and_then(char::from_u32)
                        .map_or_else(|| caps[0].to_string(), |c| c.to_string())
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_lookup_ignores_prefixed_names() {
        let tag = r#"<sheet name="Public_IP_VAPT" sheetId="2" r:id="rId2"/>"#;
        assert_eq!(attribute(tag, "name").as_deref(), Some("Public_IP_VAPT"));
        assert_eq!(attribute(tag, "r:id").as_deref(), Some("rId2"));
        assert_eq!(attribute(tag, "Id"), None);
    }

    #[test]
    fn relationships_parse() {
        let xml = r#"<Relationships><Relationship Id="rId1" Type="http://x/image" Target="../media/image1.png"/></Relationships>"#;
        let rels = parse_relationships(xml);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].target, "../media/image1.png");
    }

    #[test]
    fn escape_round_trip() {
        let raw = "Tom & Jerry <b>\"quoted\"</b>";
        assert_eq!(xml_unescape(&xml_escape(raw)), raw);
        assert_eq!(xml_unescape("&#8217;"), "\u{2019}");
    }
}
