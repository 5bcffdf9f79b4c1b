//! Findings from an archive of Nessus CSV exports.

use std::collections::BTreeSet;
use std::io::{Cursor, Read};

use tracing::{info, warn};
use zip::ZipArchive;

use crate::core::models::RiskLevel;
use crate::errors::{ReportError, Result};
use crate::utils::upload::{extension_of, is_path_traversal};

/// One reportable scanner finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub name: String,
    pub host: String,
    pub risk: RiskLevel,
}

/// All CSV rows of a Nessus upload, aligned to the union of their headers.
#[derive(Debug, Clone, Default)]
pub struct NessusExport {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl NessusExport {
    /// Appends one CSV file; columns the export has not seen yet are added
    /// at the end and earlier rows read empty for them.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. A file that fails to
    /// parse leaves the export untouched.
    pub fn add_csv(&mut self, data: &[u8]) -> Result<()> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(data);
        let source_headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();

        let mut headers = self.headers.clone();
        let mapping: Vec<usize> = source_headers
            .iter()
            .map(|h| match headers.iter().position(|known| known == h) {
                Some(i) => i,
                None => {
                    headers.push(h.clone());
                    headers.len() - 1
                }
            })
            .collect();

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            let record = record?;
            let mut row = vec![String::new(); headers.len()];
            for (value, &target) in record.iter().zip(&mapping) {
                row[target] = String::from_utf8_lossy(value).into_owned();
            }
            rows.push(row);
        }

        let width = headers.len();
        self.headers = headers;
        self.rows.extend(rows);
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        Ok(())
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows rated low, medium, high or critical, in export order.
    #[must_use]
    pub fn findings(&self) -> Vec<Finding> {
        let (Some(name_col), Some(risk_col)) = (self.column("Name"), self.column("Risk")) else {
            return Vec::new();
        };
        let host_col = self.column("Host");

        self.rows
            .iter()
            .filter_map(|row| {
                let risk = RiskLevel::parse(field(row, risk_col))?;
                let name = field(row, name_col).trim();
                if name.is_empty() {
                    return None;
                }
                Some(Finding {
                    name: name.to_string(),
                    host: host_col.map_or("", |c| field(row, c).trim()).to_string(),
                    risk,
                })
            })
            .collect()
    }
}

/// Cell `col` of an export row, empty when the row is short.
#[must_use]
pub fn field(row: &[String], col: usize) -> &str {
    row.get(col).map_or("", String::as_str)
}

/// Distinct finding names in first-seen order.
#[must_use]
pub fn unique_names(findings: &[Finding]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    findings
        .iter()
        .filter(|f| seen.insert(f.name.as_str()))
        .map(|f| f.name.clone())
        .collect()
}

/// Sorted, distinct, non-empty hosts across all findings.
#[must_use]
pub fn hosts(findings: &[Finding]) -> Vec<String> {
    findings
        .iter()
        .filter(|f| !f.host.is_empty())
        .map(|f| f.host.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted hosts affected by `name`.
#[must_use]
pub fn affected_hosts(findings: &[Finding], name: &str) -> Vec<String> {
    findings
        .iter()
        .filter(|f| f.name == name && !f.host.is_empty())
        .map(|f| f.host.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Highest risk reported for `name`.
#[must_use]
pub fn max_risk(findings: &[Finding], name: &str) -> Option<RiskLevel> {
    findings
        .iter()
        .filter(|f| f.name == name)
        .map(|f| f.risk)
        .min_by_key(|r| r.priority())
}

/// Reads every `.csv` entry of a Nessus upload.
///
/// # Errors
///
/// [`ReportError::Validation`] when the archive holds no CSV rows at all.
#[tracing::instrument(level = "info", skip_all)]
pub fn parse_nessus_archive(zip_bytes: &[u8]) -> Result<NessusExport> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))?;
    let mut export = NessusExport::default();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if entry.is_dir() || is_path_traversal(&name) || name.starts_with("__MACOSX/") {
            continue;
        }
        if extension_of(&name).as_deref() != Some("csv") {
            continue;
        }
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        if let Err(e) = export.add_csv(&data) {
            warn!(entry = %name, "Skipping unreadable Nessus CSV: {}", e);
        }
    }

    if export.is_empty() {
        return Err(ReportError::Validation("No Nessus data found".to_string()));
    }
    info!(rows = export.rows.len(), columns = export.headers.len(), "Parsed Nessus archive");
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_unioned_across_files() {
        let mut export = NessusExport::default();
        export.add_csv(b"Name,Risk,Host\nSSL,Medium,10.0.0.1\n").unwrap();
        export.add_csv(b"Host,Name,Risk,Port\n10.0.0.2,SSL,High,443\n").unwrap();
        assert_eq!(export.headers, vec!["Name", "Risk", "Host", "Port"]);
        assert_eq!(export.rows[0], vec!["SSL", "Medium", "10.0.0.1", ""]);
        assert_eq!(export.rows[1], vec!["SSL", "High", "10.0.0.2", "443"]);
    }

    #[test]
    fn informational_rows_are_dropped() {
        let mut export = NessusExport::default();
        export
            .add_csv(b"Name,Risk,Host\nSSL,Medium,10.0.0.1\nPing,None,10.0.0.1\nSSL,Critical,10.0.0.3\n")
            .unwrap();
        let findings = export.findings();
        assert_eq!(findings.len(), 2);
        assert_eq!(max_risk(&findings, "SSL"), Some(RiskLevel::Critical));
        assert_eq!(affected_hosts(&findings, "SSL"), vec!["10.0.0.1", "10.0.0.3"]);
        assert_eq!(unique_names(&findings), vec!["SSL"]);
    }

    #[test]
    fn invalid_utf8_is_replaced_and_rows_stay_aligned() {
        let mut export = NessusExport::default();
        export.add_csv(b"Name,Risk\nSSL,Medium\n").unwrap();
        export
            .add_csv(b"Host,Name,Risk\n10.0.0.2,Weak \xff Cipher,High\n10.0.0.3,SSH,Low\n")
            .unwrap();

        assert!(export.rows.iter().all(|row| row.len() == export.headers.len()));
        let findings = export.findings();
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[1].name, "Weak \u{fffd} Cipher");
        assert_eq!(findings[1].host, "10.0.0.2");
    }

    #[test]
    fn short_rows_read_as_empty() {
        let export = NessusExport {
            headers: vec!["Name".into(), "Risk".into(), "Host".into()],
            rows: vec![vec!["SSL".into(), "High".into()], vec!["SSH".into()]],
        };
        let findings = export.findings();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].host, "");
    }
}
