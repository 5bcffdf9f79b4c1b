//! The Public IP VAPT vulnerability catalog and scanner-name matching.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Local;
use regex::{Regex, RegexBuilder};
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::merge::VulnerabilityDetails;
use crate::errors::{ReportError, Result};
use crate::utils::cells::{truncate_chars, write_text};
use crate::xlsx::WorkbookModel;
use crate::xlsx::style;

pub const GROUP_COLUMN: &str = "Vulnerabilities in this group";
/// Scanner names are compared on this many leading characters.
pub const MATCH_PREFIX_CHARS: usize = 170;

const GROUP_NAME_CHARS: usize = 200;
const RISK_FACTOR_CHARS: usize = 20;
const CVSS_CHARS: usize = 10;

/// Columns written for auditor-defined groups, in order.
pub const WRITE_BACK_COLUMNS: [&str; 12] = [
    "Sr No",
    "Name of Vulnerability",
    "Risk Factor",
    "CVE/CWE ID",
    "CVSS",
    "Audit Observation",
    "Impact",
    "Recommendation/Countermeasure",
    "Affected System",
    "Reference Link",
    GROUP_COLUMN,
    "Time_stamp",
];

/// A catalog group together with the scanner names assigned to it.
///
/// Groups created by the auditor have a negative `catalog_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedGroup {
    pub catalog_id: i64,
    pub group_name: String,
    pub risk_factor: String,
    pub cvss_score: String,
    pub matched_vulnerabilities: Vec<String>,
    #[serde(default)]
    pub is_new_group: bool,
    #[serde(default)]
    pub is_manual: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub matched_groups: Vec<MatchedGroup>,
    pub unmatched_vulnerabilities: Vec<String>,
}

/// A column of the follow-up sheet taken from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportColumn {
    pub title: String,
    /// Column index in the catalog.
    pub source: usize,
}

/// Compact form of a header used for fuzzy comparisons: lowercase ASCII
/// alphanumerics only.
#[must_use]
pub fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Line-anchored, case-insensitive matcher for one scanner name.
///
/// The name is cut to [`MATCH_PREFIX_CHARS`] characters and must start the
/// group block or follow a line break inside it.
pub fn name_matcher(name: &str) -> Option<Regex> {
    let short = truncate_chars(name, MATCH_PREFIX_CHARS);
    let pattern = format!(r"(?:\n|\r\n|\A){}", regex::escape(&short));
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(name = %short, "Could not build matcher: {}", e);
            None
        }
    }
}

/// Looser rule used for screenshots: either lowercased 170-character prefix
/// contains the other.
///
/// # Examples
///
/// ```
/// use audit_reports::vapt::catalog::loosely_matches;
///
/// assert!(loosely_matches("SSL Certificate Cannot Be Trusted", "ssl certificate"));
/// assert!(!loosely_matches("SSH Weak Algorithms", "ssl certificate"));
/// ```
#[must_use]
pub fn loosely_matches(a: &str, b: &str) -> bool {
    let a = truncate_chars(a.trim(), MATCH_PREFIX_CHARS).to_lowercase();
    let b = truncate_chars(b.trim(), MATCH_PREFIX_CHARS).to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

#[derive(Debug, Clone, Default)]
pub struct VulnerabilityCatalog {
    headers: Vec<String>,
    entries: Vec<Vec<String>>,
    group_col: usize,
}

impl VulnerabilityCatalog {
    /// Reads the catalog from the first sheet of a workbook; row 1 holds the
    /// headers.
    ///
    /// # Errors
    ///
    /// [`ReportError::Catalog`] when the workbook cannot be read or has no
    /// `Vulnerabilities in this group` column.
    pub fn from_xlsx(bytes: &[u8]) -> Result<Self> {
        let model = WorkbookModel::from_bytes(bytes).map_err(|e| ReportError::Catalog(e.to_string()))?;
        let sheet = model.first_sheet().map_err(|e| ReportError::Catalog(e.to_string()))?;

        let headers: Vec<String> = sheet
            .rows
            .first()
            .map(|row| row.iter().map(|h| h.trim().to_string()).collect())
            .unwrap_or_default();
        let Some(group_col) = headers.iter().position(|h| h.eq_ignore_ascii_case(GROUP_COLUMN)) else {
            return Err(ReportError::Catalog(format!("missing '{}' column", GROUP_COLUMN)));
        };

        let entries = sheet
            .rows
            .iter()
            .skip(1)
            .map(|row| {
                let mut row = row.clone();
                row.resize(headers.len().max(row.len()), String::new());
                row
            })
            .collect();

        Ok(Self {
            headers,
            entries,
            group_col,
        })
    }

    /// Loads the catalog workbook from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| ReportError::Catalog(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::from_xlsx(&bytes)?;
        info!(path = %path.display(), entries = catalog.len(), "Loaded vulnerability catalog");
        Ok(catalog)
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First column whose header satisfies `predicate` on its [`header_key`].
    pub fn find_column<P: Fn(&str) -> bool>(&self, predicate: P) -> Option<usize> {
        self.headers.iter().position(|h| predicate(&header_key(h)))
    }

    /// Cell of entry `id` in column `col`, trimmed.
    #[must_use]
    pub fn value(&self, id: usize, col: usize) -> &str {
        self.entries
            .get(id)
            .and_then(|row| row.get(col))
            .map_or("", |v| v.trim())
    }

    fn value_by<P: Fn(&str) -> bool>(&self, id: usize, predicate: P) -> &str {
        self.find_column(predicate).map_or("", |col| self.value(id, col))
    }

    #[must_use]
    pub fn group_name(&self, id: usize) -> &str {
        self.value_by(id, |k| k.contains("name") && k.contains("vulnerability"))
    }

    #[must_use]
    pub fn risk_factor(&self, id: usize) -> &str {
        self.value_by(id, |k| k.contains("risk") && k.contains("factor"))
    }

    #[must_use]
    pub fn cvss_score(&self, id: usize) -> &str {
        self.value_by(id, |k| k.contains("cvss"))
    }

    /// First entry whose group block contains `name` under the anchored rule.
    #[must_use]
    pub fn match_group(&self, name: &str) -> Option<usize> {
        let matcher = name_matcher(name)?;
        (0..self.entries.len()).find(|&id| matcher.is_match(self.value(id, self.group_col)))
    }

    /// Assigns scanner names to catalog groups.
    ///
    /// Entries are walked in catalog order and each collects every name it
    /// matches, so one name may land in several groups. Names matching no
    /// entry are returned sorted.
    #[tracing::instrument(level = "info", skip_all, fields(names = names.len()))]
    pub fn match_findings(&self, names: &[String]) -> MatchOutcome {
        let matchers: Vec<(&String, Option<Regex>)> = names.iter().map(|n| (n, name_matcher(n))).collect();
        let mut matched_any = vec![false; names.len()];
        let mut matched_groups = Vec::new();

        for id in 0..self.entries.len() {
            let block = self.value(id, self.group_col);
            if block.is_empty() {
                continue;
            }
            let mut hits = Vec::new();
            for (i, (name, matcher)) in matchers.iter().enumerate() {
                if matcher.as_ref().is_some_and(|m| m.is_match(block)) {
                    hits.push((*name).clone());
                    matched_any[i] = true;
                }
            }
            if hits.is_empty() {
                continue;
            }
            matched_groups.push(MatchedGroup {
                catalog_id: id as i64,
                group_name: truncate_chars(self.group_name(id), GROUP_NAME_CHARS),
                risk_factor: truncate_chars(self.risk_factor(id), RISK_FACTOR_CHARS),
                cvss_score: truncate_chars(self.cvss_score(id), CVSS_CHARS),
                matched_vulnerabilities: hits,
                is_new_group: false,
                is_manual: false,
            });
        }

        let mut unmatched: Vec<String> = names
            .iter()
            .zip(&matched_any)
            .filter(|(_, hit)| !**hit)
            .map(|(n, _)| n.clone())
            .collect();
        unmatched.sort();
        unmatched.dedup();

        info!(
            groups = matched_groups.len(),
            unmatched = unmatched.len(),
            "Matched scanner findings against catalog"
        );
        MatchOutcome {
            matched_groups,
            unmatched_vulnerabilities: unmatched,
        }
    }

    /// Groups names by their first matching entry, so each name is reported
    /// once. Groups come out in catalog order.
    #[must_use]
    pub fn group_by_first_match(&self, names: &[String]) -> MatchOutcome {
        let mut by_entry: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        let mut unmatched = Vec::new();
        for name in names {
            match self.match_group(name) {
                Some(id) => by_entry.entry(id).or_default().push(name.clone()),
                None => unmatched.push(name.clone()),
            }
        }
        unmatched.sort();
        unmatched.dedup();

        let matched_groups = by_entry
            .into_iter()
            .map(|(id, hits)| MatchedGroup {
                catalog_id: id as i64,
                group_name: truncate_chars(self.group_name(id), GROUP_NAME_CHARS),
                risk_factor: truncate_chars(self.risk_factor(id), RISK_FACTOR_CHARS),
                cvss_score: truncate_chars(self.cvss_score(id), CVSS_CHARS),
                matched_vulnerabilities: hits,
                is_new_group: false,
                is_manual: false,
            })
            .collect();
        MatchOutcome {
            matched_groups,
            unmatched_vulnerabilities: unmatched,
        }
    }

    /// Catalog columns shown in the follow-up sheet, in catalog order.
    ///
    /// Serial, group-list, affected-system and timestamp columns are
    /// dropped and `CVE ID` is shown as `CVE/CWE ID`.
    #[must_use]
    pub fn report_columns(&self) -> Vec<ReportColumn> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, h)| {
                let key = header_key(h);
                !key.is_empty()
                    && !matches!(
                        key.as_str(),
                        "srno" | "vulnerabilitiesinthisgroup" | "affectedsystem" | "affectedsystems" | "timestamp"
                    )
            })
            .map(|(source, h)| ReportColumn {
                title: if header_key(h) == "cveid" {
                    "CVE/CWE ID".to_string()
                } else {
                    h.clone()
                },
                source,
            })
            .collect()
    }

    fn column_or_insert(&mut self, title: &str) -> usize {
        let key = header_key(title);
        if let Some(i) = self.headers.iter().position(|h| header_key(h) == key) {
            return i;
        }
        // "CVE ID" and "CVSS Score" style headers stand in for their short forms
        let alias = match key.as_str() {
            "cvecweid" => self.headers.iter().position(|h| header_key(h) == "cveid"),
            "cvss" => self.headers.iter().position(|h| header_key(h).contains("cvss")),
            "recommendationcountermeasure" => self
                .headers
                .iter()
                .position(|h| header_key(h).contains("recommendation")),
            _ => None,
        };
        if let Some(i) = alias {
            return i;
        }
        self.headers.push(title.to_string());
        for row in &mut self.entries {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    /// Appends auditor-defined groups as new catalog entries.
    ///
    /// `merged` lists the scanner names folded into each group; they become
    /// the entry's group block so later scans match it.
    pub fn append_entries(&mut self, details: &[(VulnerabilityDetails, Vec<String>)]) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let cols: Vec<usize> = WRITE_BACK_COLUMNS.iter().map(|t| self.column_or_insert(t)).collect();

        for (detail, merged) in details {
            let names = if merged.is_empty() {
                vec![detail.vulnerability_name.clone()]
            } else {
                merged.clone()
            };
            let block = names
                .iter()
                .map(|n| truncate_chars(n, MATCH_PREFIX_CHARS))
                .collect::<Vec<_>>()
                .join("\n");
            let values = [
                (self.entries.len() + 1).to_string(),
                detail.vulnerability_name.clone(),
                detail.risk_factor.clone(),
                detail.cve_id.clone(),
                detail.cvss_score.clone(),
                detail.audit_observation.clone(),
                detail.impact.clone(),
                detail.recommendation.clone(),
                String::new(),
                detail.reference_link.clone(),
                block,
                stamp.clone(),
            ];

            let mut row = vec![String::new(); self.headers.len()];
            for (&col, value) in cols.iter().zip(values) {
                row[col] = value;
            }
            self.entries.push(row);
        }
        info!(added = details.len(), total = self.entries.len(), "Appended catalog entries");
    }

    /// Writes the catalog as a single-sheet workbook.
    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Catalog")?;

        let header = style::scan_header();
        let cell = style::scan_cell(false);
        for (col, title) in self.headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, title, &header)?;
            sheet.set_column_width(col as u16, 25)?;
        }
        for (r, row) in self.entries.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                write_text(sheet, (r + 1) as u32, col as u16, value, &cell)?;
            }
        }
        Ok(workbook.save_to_buffer()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> VulnerabilityCatalog {
        VulnerabilityCatalog {
            headers: vec![
                "Sr No".into(),
                "Name of Vulnerability".into(),
                "Risk Factor".into(),
                "CVE ID".into(),
                "Vulnerabilities in this group".into(),
            ],
            entries: vec![
                vec![
                    "1".into(),
                    "Weak TLS".into(),
                    "MEDIUM".into(),
                    "".into(),
                    "SSL Certificate Cannot Be Trusted\nTLS Version 1.0 Protocol Detection".into(),
                ],
                vec!["2".into(), "Old SSH".into(), "LOW".into(), "".into(), "SSH Weak Algorithms Supported".into()],
            ],
            group_col: 4,
        }
    }

    #[test]
    fn matching_is_anchored_to_line_starts() {
        let c = catalog();
        assert_eq!(c.match_group("tls version 1.0 protocol detection"), Some(0));
        assert_eq!(c.match_group("Version 1.0 Protocol Detection"), None);
        assert_eq!(c.match_group("SSH Weak Algorithms"), Some(1));
    }

    #[test]
    fn report_columns_drop_bookkeeping() {
        let titles: Vec<String> = catalog().report_columns().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["Name of Vulnerability", "Risk Factor", "CVE/CWE ID"]);
    }
}
