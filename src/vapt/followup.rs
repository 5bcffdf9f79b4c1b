//! Comparing a new scan against the previous audit report.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::{info, warn};

use crate::core::models::{FindingStatus, RiskLevel};
use crate::errors::{ReportError, Result};
use crate::utils::cells::unquoted;
use crate::xlsx::{AnchoredImage, WorkbookModel, read_anchored_images};

pub const REPORT_SHEET: &str = "Public_IP_VAPT";
pub const NAME_COLUMN: &str = "Name of Vulnerability";
pub const RISK_COLUMN: &str = "Risk Factor";

/// Classifies every name of either audit.
///
/// Names in both sets are `Open`, names only in `old` are `Closed` and
/// names only in `new` are `New`.
#[must_use]
pub fn compare_vulnerabilities(new: &BTreeSet<String>, old: &BTreeSet<String>) -> BTreeMap<String, FindingStatus> {
    let mut out = BTreeMap::new();
    for name in new.union(old) {
        let status = match (new.contains(name), old.contains(name)) {
            (true, true) => FindingStatus::Open,
            (false, true) => FindingStatus::Closed,
            _ => FindingStatus::New,
        };
        out.insert(name.clone(), status);
    }
    out
}

/// Findings per severity, in the order the summary shows them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl RiskCounts {
    pub fn add(&mut self, risk: &str) {
        match RiskLevel::parse(risk) {
            Some(RiskLevel::Critical) => self.critical += 1,
            Some(RiskLevel::High) => self.high += 1,
            Some(RiskLevel::Medium) => self.medium += 1,
            Some(RiskLevel::Low) => self.low += 1,
            None => {}
        }
    }

    /// `(label, count)` pairs from critical down to low.
    #[must_use]
    pub fn labelled(&self) -> [(&'static str, usize); 4] {
        [
            ("Critical", self.critical),
            ("High", self.high),
            ("Medium", self.medium),
            ("Low", self.low),
        ]
    }
}

/// Counts the risks of rows whose status is still `New` or `Open`.
pub fn risk_counts_for<'a, I>(rows: I) -> RiskCounts
where
    I: IntoIterator<Item = (&'a str, FindingStatus)>,
{
    let mut counts = RiskCounts::default();
    for (risk, status) in rows {
        if matches!(status, FindingStatus::New | FindingStatus::Open) {
            counts.add(risk);
        }
    }
    counts
}

/// One finding row of the previous report.
#[derive(Debug, Clone, Default)]
pub struct OldRow {
    pub name: String,
    /// Cell values keyed by header.
    pub values: Vec<(String, String)>,
    /// Screenshots anchored in the row's `POC` columns.
    pub images: Vec<AnchoredImage>,
}

impl OldRow {
    /// Value under `header`: exact match first, else a header containing or
    /// contained in it.
    #[must_use]
    pub fn value_for(&self, header: &str) -> Option<&str> {
        let wanted = header.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        let exact = self
            .values
            .iter()
            .find(|(h, _)| h.trim().to_lowercase() == wanted);
        exact
            .or_else(|| {
                self.values.iter().find(|(h, _)| {
                    let h = h.trim().to_lowercase();
                    !h.is_empty() && (h.contains(&wanted) || wanted.contains(&h))
                })
            })
            .map(|(_, v)| v.as_str())
    }
}

/// The previous audit's `Public_IP_VAPT` sheet.
#[derive(Debug, Clone, Default)]
pub struct OldReport {
    pub rows: Vec<OldRow>,
    pub risk_counts: RiskCounts,
}

impl OldReport {
    /// Reads the previous report.
    ///
    /// # Errors
    ///
    /// [`ReportError::Validation`] when the workbook has no `Public_IP_VAPT`
    /// sheet or that sheet has no `Name of Vulnerability` column.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn from_xlsx(bytes: &[u8]) -> Result<Self> {
        let model = WorkbookModel::from_bytes(bytes)?;
        let Some(sheet) = model.sheet(REPORT_SHEET) else {
            return Err(ReportError::Validation(format!(
                "Previous report has no '{}' worksheet",
                REPORT_SHEET
            )));
        };
        let Some(name_col) = sheet.column_named(0, NAME_COLUMN) else {
            return Err(ReportError::Validation(format!(
                "Previous report has no '{}' column",
                NAME_COLUMN
            )));
        };
        let risk_col = sheet.column_named(0, RISK_COLUMN);
        let headers: Vec<String> = sheet.rows.first().cloned().unwrap_or_default();
        let poc = poc_columns(&headers);

        let mut images_by_row: HashMap<u32, Vec<AnchoredImage>> = HashMap::new();
        if let Some((first, last)) = poc {
            match read_anchored_images(bytes) {
                Ok(mut by_sheet) => {
                    for image in by_sheet.remove(REPORT_SHEET).unwrap_or_default() {
                        let col = usize::from(image.col);
                        if image.row >= 1 && (first..=last).contains(&col) {
                            images_by_row.entry(image.row).or_default().push(image);
                        }
                    }
                }
                Err(e) => warn!("Could not read images of previous report: {}", e),
            }
        }

        let mut report = OldReport::default();
        for (r, row) in sheet.rows.iter().enumerate().skip(1) {
            let name = unquoted(sheet.cell(r, name_col).trim());
            if name.is_empty() {
                continue;
            }
            if let Some(col) = risk_col {
                report.risk_counts.add(sheet.cell(r, col));
            }
            let values = headers
                .iter()
                .enumerate()
                .filter(|(_, h)| !h.trim().is_empty())
                .map(|(c, h)| (h.trim().to_string(), row.get(c).map(|v| unquoted(v).to_string()).unwrap_or_default()))
                .collect();
            let mut images = images_by_row.remove(&(r as u32)).unwrap_or_default();
            images.sort_by_key(|i| (i.col, i.x_offset));
            report.rows.push(OldRow {
                name: name.to_string(),
                values,
                images,
            });
        }

        info!(rows = report.rows.len(), "Read previous audit report");
        Ok(report)
    }

    #[must_use]
    pub fn names(&self) -> BTreeSet<String> {
        self.rows.iter().map(|r| r.name.clone()).collect()
    }

    #[must_use]
    pub fn row(&self, name: &str) -> Option<&OldRow> {
        self.rows.iter().find(|r| r.name == name)
    }
}

/// Span of the current (not `Old`) POC block in a header row.
///
/// A merged `POC` title only fills its first cell, so the block runs until
/// the next titled column.
#[must_use]
pub fn poc_columns(headers: &[String]) -> Option<(usize, usize)> {
    let is_poc = |h: &str| {
        let h = h.to_lowercase();
        h.contains("poc") && !h.contains("old")
    };
    let first = headers.iter().position(|h| is_poc(h))?;
    let mut last = first;
    for (c, h) in headers.iter().enumerate().skip(first + 1) {
        if h.trim().is_empty() || is_poc(h) {
            last = c;
        } else {
            break;
        }
    }
    // a block written without trailing titles still spans its image columns
    if last == first && first + 1 == headers.len() {
        last = first + super::report::POC_BLOCK_WIDTH as usize - 1;
    }
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_partition_the_union() {
        let new: BTreeSet<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
        let old: BTreeSet<String> = ["B", "C"].iter().map(|s| s.to_string()).collect();
        let diff = compare_vulnerabilities(&new, &old);
        assert_eq!(diff.len(), 3);
        assert_eq!(diff["A"], FindingStatus::New);
        assert_eq!(diff["B"], FindingStatus::Open);
        assert_eq!(diff["C"], FindingStatus::Closed);
    }

    #[test]
    fn poc_block_spans_untitled_columns() {
        let headers: Vec<String> = ["Sr.No", "Name of Vulnerability", "POC", "", "", "Status"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(poc_columns(&headers), Some((2, 4)));
    }

    #[test]
    fn old_poc_is_not_current_poc() {
        let headers: Vec<String> = ["Old POC", "", "POC", ""].iter().map(|s| s.to_string()).collect();
        assert_eq!(poc_columns(&headers), Some((2, 3)));
    }
}
