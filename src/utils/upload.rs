//! Upload validation: extension allow-lists, size caps and magic bytes.
//!
//! Every multipart file goes through [`validate_upload`] before any parser
//! sees it, so a renamed executable never reaches calamine or zip.

use std::path::{Component, Path};

use crate::errors::{ReportError, Result};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const XLS_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = b"\xFF\xD8\xFF";
const GIF87_MAGIC: &[u8] = b"GIF87a";
const GIF89_MAGIC: &[u8] = b"GIF89a";

/// What a given form field is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Excel,
    Zip,
    Csv,
    Docx,
    Image,
    Text,
}

impl UploadKind {
    #[must_use]
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            UploadKind::Excel => &["xlsx"],
            UploadKind::Zip => &["zip"],
            UploadKind::Csv => &["csv"],
            UploadKind::Docx => &["docx"],
            UploadKind::Image => &["png", "jpg", "jpeg", "gif"],
            UploadKind::Text => &["txt", "nmap", "gnmap", "csv"],
        }
    }

    fn describe(self) -> &'static str {
        match self {
            UploadKind::Excel => "an Excel workbook (.xlsx)",
            UploadKind::Zip => "a ZIP archive (.zip)",
            UploadKind::Csv => "a CSV file (.csv)",
            UploadKind::Docx => "a Word document (.docx)",
            UploadKind::Image => "an image (.png, .jpg, .jpeg, .gif)",
            UploadKind::Text => "a text scan output file",
        }
    }
}

/// Lowercased extension of `name`, without the dot.
#[must_use]
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Whether `bytes` starts with the signature expected for `extension`.
///
/// Text formats have no signature; they are accepted unless they look
/// like a binary archive.
#[must_use]
pub fn has_valid_signature(extension: &str, bytes: &[u8]) -> bool {
    match extension {
        "xlsx" | "zip" | "docx" => bytes.starts_with(ZIP_MAGIC),
        "xls" => bytes.starts_with(XLS_MAGIC),
        "png" => bytes.starts_with(PNG_MAGIC),
        "jpg" | "jpeg" => bytes.starts_with(JPEG_MAGIC),
        "gif" => bytes.starts_with(GIF87_MAGIC) || bytes.starts_with(GIF89_MAGIC),
        "csv" | "txt" | "nmap" | "gnmap" => {
            !bytes.starts_with(ZIP_MAGIC) && !bytes.starts_with(XLS_MAGIC)
        }
        _ => false,
    }
}

/// Validates an uploaded file before it is parsed.
///
/// # Errors
///
/// Returns [`ReportError::Upload`] when the name is empty, the extension is
/// not allowed for `kind`, the file is empty or larger than `max_bytes`, or
/// the leading bytes do not match the claimed format.
pub fn validate_upload(kind: UploadKind, filename: &str, bytes: &[u8], max_bytes: usize) -> Result<()> {
    let name = filename.trim();
    if name.is_empty() {
        return Err(ReportError::Upload("no file name supplied".to_string()));
    }

    let Some(ext) = extension_of(name) else {
        return Err(ReportError::Upload(format!(
            "'{}' has no extension, expected {}",
            sanitize_filename(name),
            kind.describe()
        )));
    };

    if !kind.allowed_extensions().contains(&ext.as_str()) {
        return Err(ReportError::Upload(format!(
            "'{}' is not {}",
            sanitize_filename(name),
            kind.describe()
        )));
    }

    if bytes.is_empty() {
        return Err(ReportError::Upload(format!(
            "'{}' is empty",
            sanitize_filename(name)
        )));
    }

    if bytes.len() > max_bytes {
        return Err(ReportError::Upload(format!(
            "'{}' exceeds the {} MB upload limit",
            sanitize_filename(name),
            max_bytes / (1024 * 1024)
        )));
    }

    if !has_valid_signature(&ext, bytes) {
        return Err(ReportError::Upload(format!(
            "'{}' content does not match its extension",
            sanitize_filename(name)
        )));
    }

    Ok(())
}

/// Reduces an uploaded file name to a safe base name.
///
/// # Examples
///
/// ```
/// use audit_reports::utils::upload::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
/// assert_eq!(sanitize_filename("ATM Review (final).xlsx"), "ATM Review _final_.xlsx");
/// assert_eq!(sanitize_filename(""), "upload");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .replace('\0', "");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Whether an archive entry name tries to escape its extraction root.
#[must_use]
pub fn is_path_traversal(name: &str) -> bool {
    if name.contains('\0') {
        return true;
    }
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return true;
    }
    let bytes = normalized.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return true;
    }
    Path::new(&normalized)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_detection() {
        assert!(is_path_traversal("../secret.png"));
        assert!(is_path_traversal("evidence/../../x.png"));
        assert!(is_path_traversal("/abs/x.png"));
        assert!(is_path_traversal("C:\\temp\\x.png"));
        assert!(!is_path_traversal("Evidence/ALL POC/17.1 login.png"));
    }

    #[test]
    fn signature_checks() {
        assert!(has_valid_signature("xlsx", b"PK\x03\x04rest"));
        assert!(!has_valid_signature("xlsx", b"MZ\x90\x00"));
        assert!(has_valid_signature("gif", b"GIF89a..."));
        assert!(has_valid_signature("csv", b"Name,Risk\n"));
        assert!(!has_valid_signature("csv", b"PK\x03\x04"));
    }
}
