//! Image extraction from evidence ZIP archives.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::errors::Result;
use crate::utils::upload::{extension_of, is_path_traversal};

/// Extensions accepted as checklist evidence.
pub const EVIDENCE_EXTENSIONS: [&str; 9] =
    ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "svg"];

/// Extensions accepted inside the `ALL POC` folder of a VAPT evidence archive.
pub const POC_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff"];

/// Folder name marking VAPT proof-of-concept screenshots.
pub const POC_FOLDER_MARKER: &str = "all poc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceImage {
    /// Entry path inside the archive.
    pub path: String,
    /// File name without directory or extension.
    pub stem: String,
    /// Lowercased extension.
    pub extension: String,
    pub data: Vec<u8>,
}

fn is_metadata_entry(path: &str) -> bool {
    path.starts_with("__MACOSX/")
        || path
            .rsplit('/')
            .next()
            .is_some_and(|f| f.starts_with("._") || f.eq_ignore_ascii_case("thumbs.db"))
}

fn file_stem(path: &str) -> String {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => file.to_string(),
    }
}

/// Walks every image entry whose extension is in `allowed` and whose path
/// passes `keep`.
fn collect_images<F>(zip_bytes: &[u8], allowed: &[&str], keep: F) -> Result<Vec<EvidenceImage>>
where
    F: Fn(&str) -> bool,
{
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))?;
    let mut images = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let path = entry.name().replace('\\', "/");
        if is_path_traversal(&path) {
            warn!(entry = %path, "Skipping evidence entry with unsafe path");
            continue;
        }
        if is_metadata_entry(&path) || !keep(&path) {
            continue;
        }
        let Some(extension) = extension_of(&path) else {
            continue;
        };
        if !allowed.contains(&extension.as_str()) {
            debug!(entry = %path, "Skipping non-image entry");
            continue;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        images.push(EvidenceImage {
            stem: file_stem(&path),
            path,
            extension,
            data,
        });
    }

    Ok(images)
}

/// Every evidence image in the archive, in archive order.
pub fn extract_images(zip_bytes: &[u8]) -> Result<Vec<EvidenceImage>> {
    collect_images(zip_bytes, &EVIDENCE_EXTENSIONS, |_| true)
}

/// Images restricted to a custom extension list.
pub fn extract_images_with(zip_bytes: &[u8], allowed: &[&str]) -> Result<Vec<EvidenceImage>> {
    collect_images(zip_bytes, allowed, |_| true)
}

/// Proof-of-concept screenshots under any `ALL POC` folder, keyed by stem.
///
/// When two files share a stem the first one in archive order wins.
pub fn extract_poc_folder(zip_bytes: &[u8]) -> Result<BTreeMap<String, EvidenceImage>> {
    let images = collect_images(zip_bytes, &POC_EXTENSIONS, |path| {
        path.to_lowercase()
            .split('/')
            .rev()
            .skip(1)
            .any(|dir| dir.contains(POC_FOLDER_MARKER))
    })?;

    let mut out = BTreeMap::new();
    for image in images {
        out.entry(image.stem.clone()).or_insert(image);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_and_metadata() {
        assert_eq!(file_stem("Evidence/17.1 login page.png"), "17.1 login page");
        assert_eq!(file_stem("noext"), "noext");
        assert!(is_metadata_entry("__MACOSX/Evidence/._17.1.png"));
        assert!(is_metadata_entry("Evidence/._17.1.png"));
        assert!(!is_metadata_entry("Evidence/17.1.png"));
    }
}
