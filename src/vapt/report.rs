//! The Public IP VAPT follow-up audit workbook.
//!
//! Sheets, in order: `Meta_Data`, `Nmap Files`, `Nessus CSV Files`, `Scope`,
//! `Summary` and `Public_IP_VAPT`. The finding rows are assembled first so
//! the follow-up counts on `Meta_Data` describe the finished sheet.

use std::collections::{BTreeMap, BTreeSet};

use rust_xlsxwriter::{Image, Workbook, Worksheet};
use tracing::{info, warn};

use super::catalog::{MatchedGroup, ReportColumn, VulnerabilityCatalog, header_key, loosely_matches};
use super::followup::{OldReport, RiskCounts, compare_vulnerabilities, risk_counts_for};
use super::merge::{MergeState, VulnerabilityDetails};
use super::metadata::{self, metadata_sections, write_metadata_sheet};
use super::nessus::{self, Finding, NessusExport};
use super::nmap::NmapScan;
use crate::core::form::FormFields;
use crate::core::models::{FindingStatus, RiskLevel, camel_case_risk, risk_priority};
use crate::errors::Result;
use crate::evidence::EvidenceImage;
use crate::utils::cells::{clean_cell_value, text_format, write_text};
use crate::xlsx::style;

pub const OUTPUT_FILE_NAME: &str = "Public_IP_VAPT_Follow_Up_Audit_Report.xlsx";
pub const VAPT_SHEET: &str = super::followup::REPORT_SHEET;
pub const NMAP_SHEET: &str = "Nmap Files";
pub const NESSUS_SHEET: &str = "Nessus CSV Files";
pub const SCOPE_SHEET: &str = "Scope";
pub const SUMMARY_SHEET: &str = "Summary";

/// Screenshots per POC block.
pub const POC_BLOCK_WIDTH: u16 = 7;

pub const MULTIPLE_VULNERABILITIES_PREFIX: &str =
    "It was observed that the hosts are affected by multiple vulnerabilities, which are listed below.\n\n";
pub const SINGLE_VULNERABILITY_OBSERVATION: &str = "It was observed that the host is affected by a vulnerability.";
pub const AFFECTED_SYSTEMS: &str = "Affected Systems";

const POC_SCALE: f64 = 1.0 / 30.0;
const ROW_HEIGHT: f64 = 37.5;
const ROW_HEIGHT_WITH_IMAGES: f64 = 45.0;
const HEADER_HEIGHT: f64 = 30.0;
const SCAN_ROW_HEIGHT: f64 = 20.0;
const DEFAULT_WIDTH: f64 = 20.0;

/// Everything the follow-up report is built from.
pub struct FollowupInput<'a> {
    pub nmap: &'a NmapScan,
    pub nessus: &'a NessusExport,
    pub catalog: &'a VulnerabilityCatalog,
    /// Curated matches; plain catalog matching is used when absent.
    pub merge_state: Option<&'a MergeState>,
    pub old_report: &'a OldReport,
    /// New screenshots from the evidence archive, keyed by file stem.
    pub poc_images: &'a BTreeMap<String, EvidenceImage>,
    pub form: &'a FormFields,
}

/// Column layout of the `Public_IP_VAPT` sheet.
#[derive(Debug, Clone)]
pub struct VaptLayout {
    pub catalog_columns: Vec<ReportColumn>,
    /// Index into `catalog_columns` before which `Affected Systems` sits.
    pub affected_position: usize,
}

fn is_risk_column(title: &str) -> bool {
    let key = header_key(title);
    key.contains("risk") && key.contains("factor")
}

fn is_observation_column(title: &str) -> bool {
    let key = header_key(title);
    key.contains("audit") && key.contains("observation")
}

fn is_name_column(title: &str) -> bool {
    let key = header_key(title);
    key.contains("name") && key.contains("vulnerability")
}

fn is_recommendation_column(title: &str) -> bool {
    let key = header_key(title);
    key.contains("recommendation") || key.contains("countermeasure")
}

fn is_reference_column(title: &str) -> bool {
    let key = header_key(title);
    key.contains("reference") && key.contains("link")
}

fn is_left_aligned(title: &str) -> bool {
    is_observation_column(title)
        || is_recommendation_column(title)
        || is_reference_column(title)
        || header_key(title).contains("impact")
}

impl VaptLayout {
    pub fn new(catalog: &VulnerabilityCatalog) -> Self {
        let catalog_columns = catalog.report_columns();
        let affected_position = catalog_columns
            .iter()
            .position(|c| is_recommendation_column(&c.title))
            .map(|i| i + 1)
            .or_else(|| catalog_columns.iter().position(|c| is_reference_column(&c.title)))
            .unwrap_or(catalog_columns.len());
        Self {
            catalog_columns,
            affected_position,
        }
    }

    /// Output column of catalog column `i`.
    #[must_use]
    pub fn catalog_col(&self, i: usize) -> u16 {
        let shift = usize::from(i >= self.affected_position);
        (2 + i + shift) as u16
    }

    #[must_use]
    pub fn affected_col(&self) -> u16 {
        (2 + self.affected_position) as u16
    }

    #[must_use]
    pub fn status_col(&self) -> u16 {
        (3 + self.catalog_columns.len()) as u16
    }

    #[must_use]
    pub fn old_poc_col(&self) -> u16 {
        self.status_col() + 1
    }

    #[must_use]
    pub fn poc_col(&self) -> u16 {
        self.old_poc_col() + POC_BLOCK_WIDTH
    }

    /// Titles up to and including `Status`.
    #[must_use]
    pub fn titles(&self) -> Vec<String> {
        let mut titles = vec!["Sr.No".to_string(), "Vulnerabilities".to_string()];
        for (i, column) in self.catalog_columns.iter().enumerate() {
            if i == self.affected_position {
                titles.push(AFFECTED_SYSTEMS.to_string());
            }
            titles.push(column.title.clone());
        }
        if self.affected_position >= self.catalog_columns.len() {
            titles.push(AFFECTED_SYSTEMS.to_string());
        }
        titles.push("Status".to_string());
        titles
    }

    fn position_of<P: Fn(&str) -> bool>(&self, predicate: P) -> Option<usize> {
        self.catalog_columns.iter().position(|c| predicate(&c.title))
    }
}

/// One finding row of the `Public_IP_VAPT` sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct VaptRow {
    pub serial: usize,
    /// Scanner names, newline separated.
    pub vulnerabilities: String,
    /// Values aligned with [`VaptLayout::catalog_columns`].
    pub values: Vec<String>,
    pub affected_systems: String,
    /// Name compared against the previous report.
    pub name: String,
    pub risk: String,
    pub status: FindingStatus,
    pub old_images: Vec<Vec<u8>>,
    pub new_images: Vec<Vec<u8>>,
}

/// Value of a detail record for a catalog-style column title.
fn detail_value(details: &VulnerabilityDetails, title: &str, group_name: &str) -> String {
    let key = header_key(title);
    if is_risk_column(title) {
        details.risk_factor.clone()
    } else if key.contains("cve") {
        details.cve_id.clone()
    } else if key.contains("cvss") {
        details.cvss_score.clone()
    } else if is_observation_column(title) {
        details.audit_observation.clone()
    } else if key.contains("impact") {
        details.impact.clone()
    } else if is_recommendation_column(title) {
        details.recommendation.clone()
    } else if is_reference_column(title) {
        details.reference_link.clone()
    } else if is_name_column(title) {
        if group_name.is_empty() {
            details.vulnerability_name.clone()
        } else {
            group_name.to_string()
        }
    } else {
        String::new()
    }
}

fn scanner_risk(findings: &[Finding], names: &[String]) -> Option<RiskLevel> {
    names
        .iter()
        .filter_map(|n| nessus::max_risk(findings, n))
        .min_by_key(|r| r.priority())
}

fn hosts_for(findings: &[Finding], names: &[String]) -> Vec<String> {
    names
        .iter()
        .flat_map(|n| nessus::affected_hosts(findings, n))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Fills the cells that follow fixed rules once the raw values are known:
/// the risk cell, the audit observation and an empty `CVE/CWE ID`.
fn finish_values(layout: &VaptLayout, values: &mut [String], names: &[String], fallback_risk: Option<RiskLevel>) -> String {
    let risk = match layout.position_of(is_risk_column) {
        Some(i) => {
            let risk = match RiskLevel::parse(&values[i]) {
                Some(level) => level.camel().to_string(),
                None => fallback_risk.map_or_else(|| camel_case_risk(&values[i]), |r| r.camel().to_string()),
            };
            values[i] = risk.clone();
            risk
        }
        None => fallback_risk.map_or_else(String::new, |r| r.camel().to_string()),
    };

    if let Some(i) = layout.position_of(is_observation_column) {
        if names.len() > 1 {
            let listing = format!("{}{}", MULTIPLE_VULNERABILITIES_PREFIX, names.join("\n"));
            values[i] = if values[i].trim().is_empty() {
                listing
            } else {
                format!("{}\n\n{}", values[i], listing)
            };
        } else if values[i].trim().is_empty() {
            values[i] = SINGLE_VULNERABILITY_OBSERVATION.to_string();
        }
    }

    if let Some(i) = layout.position_of(|t| t == "CVE/CWE ID") {
        if values[i].trim().is_empty() {
            values[i] = "N/A".to_string();
        }
    }
    risk
}

fn group_row(
    input: &FollowupInput<'_>,
    layout: &VaptLayout,
    findings: &[Finding],
    group: &MatchedGroup,
    details: Option<&VulnerabilityDetails>,
) -> VaptRow {
    let mut names = group.matched_vulnerabilities.clone();
    names.sort();
    names.dedup();

    let mut values: Vec<String> = layout
        .catalog_columns
        .iter()
        .map(|column| match (details, usize::try_from(group.catalog_id)) {
            (Some(d), _) => detail_value(d, &column.title, &group.group_name),
            (None, Ok(id)) => input.catalog.value(id, column.source).to_string(),
            (None, Err(_)) => String::new(),
        })
        .collect();

    let fallback = scanner_risk(findings, &names).or_else(|| RiskLevel::parse(&group.risk_factor));
    let risk = finish_values(layout, &mut values, &names, fallback);

    let mut hosts = hosts_for(findings, &names);
    if hosts.is_empty() {
        hosts = details.map(VulnerabilityDetails::affected_hosts).unwrap_or_default();
    }
    let name = layout
        .position_of(is_name_column)
        .map(|i| values[i].trim().to_string())
        .filter(|n| !n.is_empty())
        .or_else(|| Some(group.group_name.clone()).filter(|n| !n.is_empty()))
        .or_else(|| names.first().cloned())
        .unwrap_or_default();

    VaptRow {
        serial: 0,
        vulnerabilities: names.join("\n"),
        values,
        affected_systems: hosts.join("\n"),
        name,
        risk,
        status: FindingStatus::New,
        old_images: Vec::new(),
        new_images: Vec::new(),
    }
}

fn unmatched_row(
    layout: &VaptLayout,
    findings: &[Finding],
    vulnerability: &str,
    details: Option<&VulnerabilityDetails>,
) -> VaptRow {
    let display = details
        .map(|d| d.vulnerability_name.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| vulnerability.to_string());
    let names = vec![vulnerability.to_string()];

    let mut values: Vec<String> = layout
        .catalog_columns
        .iter()
        .map(|column| match details {
            Some(d) => detail_value(d, &column.title, &display),
            None if is_name_column(&column.title) => display.clone(),
            None => String::new(),
        })
        .collect();
    let risk = finish_values(layout, &mut values, &names, scanner_risk(findings, &names));

    let mut hosts = hosts_for(findings, &names);
    if hosts.is_empty() {
        hosts = details.map(VulnerabilityDetails::affected_hosts).unwrap_or_default();
    }

    VaptRow {
        serial: 0,
        vulnerabilities: display.clone(),
        values,
        affected_systems: hosts.join("\n"),
        name: display,
        risk,
        status: FindingStatus::New,
        old_images: Vec::new(),
        new_images: Vec::new(),
    }
}

fn closed_row(layout: &VaptLayout, old: &super::followup::OldRow) -> VaptRow {
    let values: Vec<String> = layout
        .catalog_columns
        .iter()
        .map(|column| old.value_for(&column.title).unwrap_or("").to_string())
        .collect();
    let risk = layout
        .position_of(is_risk_column)
        .map(|i| camel_case_risk(&values[i]))
        .unwrap_or_default();
    let mut values = values;
    if let Some(i) = layout.position_of(is_risk_column) {
        values[i] = risk.clone();
    }

    VaptRow {
        serial: 0,
        vulnerabilities: old
            .value_for("Vulnerabilities")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(old.name.as_str())
            .to_string(),
        values,
        affected_systems: old.value_for(AFFECTED_SYSTEMS).unwrap_or("").to_string(),
        name: old.name.clone(),
        risk,
        status: FindingStatus::Closed,
        old_images: old.images.iter().map(|i| i.data.clone()).collect(),
        new_images: Vec::new(),
    }
}

/// New screenshots whose file stem loosely matches the row's name or one of
/// its scanner names.
fn new_images_for(row: &VaptRow, poc_images: &BTreeMap<String, EvidenceImage>) -> Vec<Vec<u8>> {
    let candidates: Vec<&str> = std::iter::once(row.name.as_str())
        .chain(row.vulnerabilities.lines())
        .filter(|c| !c.trim().is_empty())
        .collect();
    poc_images
        .iter()
        .filter(|(stem, _)| candidates.iter().any(|c| loosely_matches(stem, c)))
        .map(|(_, image)| image.data.clone())
        .take(POC_BLOCK_WIDTH as usize)
        .collect()
}

/// Builds, classifies and orders the finding rows.
///
/// Rows are produced for matched groups, then for names no group claimed,
/// then for findings of the previous report that were not seen again. The
/// result is sorted by risk (stable) and numbered from 1.
#[tracing::instrument(level = "info", skip_all)]
pub fn build_vapt_rows(input: &FollowupInput<'_>, layout: &VaptLayout) -> Vec<VaptRow> {
    let findings = input.nessus.findings();
    let names = nessus::unique_names(&findings);

    let (groups, details): (Vec<MatchedGroup>, BTreeMap<i64, VulnerabilityDetails>) = match input.merge_state {
        Some(state) if !state.matched_groups.is_empty() => {
            (state.matched_groups.clone(), state.new_group_details.clone())
        }
        _ => (input.catalog.group_by_first_match(&names).matched_groups, BTreeMap::new()),
    };

    let mut rows: Vec<VaptRow> = groups
        .iter()
        .map(|g| group_row(input, layout, &findings, g, details.get(&g.catalog_id)))
        .collect();

    let claimed: BTreeSet<&str> = groups
        .iter()
        .flat_map(|g| g.matched_vulnerabilities.iter().map(String::as_str))
        .collect();
    for name in names.iter().filter(|n| !claimed.contains(n.as_str())) {
        let detail = details.values().find(|d| {
            d.vulnerability_name == *name || d.actual_vulnerability_name.as_deref() == Some(name.as_str())
        });
        rows.push(unmatched_row(layout, &findings, name, detail));
    }

    let ours: BTreeSet<String> = rows.iter().map(|r| r.name.clone()).collect();
    let statuses = compare_vulnerabilities(&ours, &input.old_report.names());
    for row in &mut rows {
        row.status = statuses.get(&row.name).copied().unwrap_or(FindingStatus::New);
        if row.status == FindingStatus::Open {
            if let Some(old) = input.old_report.row(&row.name) {
                row.old_images = old.images.iter().map(|i| i.data.clone()).collect();
            }
        }
        row.new_images = new_images_for(row, input.poc_images);
    }

    for (name, status) in &statuses {
        if *status != FindingStatus::Closed {
            continue;
        }
        if let Some(old) = input.old_report.row(name) {
            rows.push(closed_row(layout, old));
        }
    }

    rows.sort_by_key(|r| risk_priority(&r.risk));
    for (i, row) in rows.iter_mut().enumerate() {
        row.serial = i + 1;
    }

    info!(
        rows = rows.len(),
        closed = rows.iter().filter(|r| r.status == FindingStatus::Closed).count(),
        "Assembled follow-up rows"
    );
    rows
}

/// Counts of the rows still `New` or `Open`.
#[must_use]
pub fn follow_up_counts(rows: &[VaptRow]) -> RiskCounts {
    risk_counts_for(rows.iter().map(|r| (r.risk.as_str(), r.status)))
}

/// Column order inside a POC block starting at `start`: the 2nd to 7th
/// column, then the 1st.
#[must_use]
pub fn poc_column_order(start: u16) -> Vec<u16> {
    (start + 1..start + POC_BLOCK_WIDTH)
        .chain(std::iter::once(start))
        .collect()
}

fn place_images(sheet: &mut Worksheet, row: u32, block_start: u16, images: &[Vec<u8>]) -> usize {
    let mut placed = 0;
    for (data, col) in images.iter().zip(poc_column_order(block_start)) {
        let image = match Image::new_from_buffer(data) {
            Ok(image) => image.set_scale_width(POC_SCALE).set_scale_height(POC_SCALE),
            Err(e) => {
                warn!(row, col, "Skipping unreadable screenshot: {}", e);
                continue;
            }
        };
        match sheet.insert_image(row, col, &image) {
            Ok(_) => placed += 1,
            Err(e) => warn!(row, col, "Failed to insert screenshot: {}", e),
        }
    }
    placed
}

fn write_vapt_sheet(sheet: &mut Worksheet, layout: &VaptLayout, rows: &[VaptRow]) -> Result<()> {
    let header = style::scan_header();
    let centered = style::scan_cell(true);
    let left = style::scan_cell(false);

    for (col, title) in layout.titles().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, title, &header)?;
    }
    let old_poc = layout.old_poc_col();
    let poc = layout.poc_col();
    sheet.merge_range(0, old_poc, 0, old_poc + POC_BLOCK_WIDTH - 1, "Old POC", &header)?;
    sheet.merge_range(0, poc, 0, poc + POC_BLOCK_WIDTH - 1, "POC", &header)?;
    sheet.set_row_height(0, HEADER_HEIGHT)?;

    sheet.set_column_width(0, 8)?;
    sheet.set_column_width(1, 50)?;
    for col in 2..poc + POC_BLOCK_WIDTH {
        sheet.set_column_width(col, DEFAULT_WIDTH)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_number_with_format(r, 0, row.serial as f64, &centered)?;
        write_text(sheet, r, 1, &row.vulnerabilities, &centered)?;

        for (c, (column, value)) in layout.catalog_columns.iter().zip(&row.values).enumerate() {
            let col = layout.catalog_col(c);
            if is_risk_column(&column.title) && !value.is_empty() {
                sheet.write_string_with_format(r, col, value, &style::risk_cell(value, "Arial"))?;
                continue;
            }
            let format = if is_left_aligned(&column.title) { &left } else { &centered };
            write_text(sheet, r, col, value, format)?;
        }
        write_text(sheet, r, layout.affected_col(), &row.affected_systems, &centered)?;
        sheet.write_string_with_format(r, layout.status_col(), row.status.label(), &centered)?;

        for col in old_poc..poc + POC_BLOCK_WIDTH {
            sheet.write_blank(r, col, &centered)?;
        }
        let placed = place_images(sheet, r, old_poc, &row.old_images) + place_images(sheet, r, poc, &row.new_images);
        sheet.set_row_height(r, if placed > 0 { ROW_HEIGHT_WITH_IMAGES } else { ROW_HEIGHT })?;
    }
    Ok(())
}

/// Merges `first..=last` in `col` when it spans more than one row.
fn merge_down(sheet: &mut Worksheet, first: u32, last: u32, col: u16, value: &str) -> Result<()> {
    if last > first {
        let format = text_format(value, &style::scan_cell(true));
        sheet.merge_range(first, col, last, col, &clean_cell_value(value), &format)?;
    }
    Ok(())
}

fn write_nmap_sheet(sheet: &mut Worksheet, scan: &NmapScan) -> Result<()> {
    let header = style::scan_header();
    let cell = style::scan_cell(true);
    let rows = scan.paired_rows();
    for col in 0..6 {
        sheet.set_column_width(col, DEFAULT_WIDTH)?;
    }

    for (r, row) in rows.iter().enumerate() {
        let format = if row.is_header { &header } else { &cell };
        for (c, value) in row.cells.iter().enumerate() {
            write_text(sheet, r as u32, c as u16, value, format)?;
        }
        sheet.set_row_height(r as u32, SCAN_ROW_HEIGHT)?;
    }

    // each block is the run of data rows under one header row
    let mut start = 0;
    while start < rows.len() {
        let first = start + 1;
        let mut end = first;
        while end < rows.len() && !rows[end].is_header {
            end += 1;
        }
        let block = &rows[first..end];

        for col in [0usize, 3] {
            let mut i = 0;
            while i < block.len() {
                let mut j = i;
                while j + 1 < block.len() && block[j + 1].cells[col] == block[i].cells[col] {
                    j += 1;
                }
                if !block[i].cells[col].is_empty() {
                    merge_down(sheet, (first + i) as u32, (first + j) as u32, col as u16, &block[i].cells[col])?;
                }
                i = j + 1;
            }
        }
        for col in [1usize, 2, 4, 5] {
            let mut i = 0;
            while i < block.len() {
                let mut j = i;
                while j + 1 < block.len() && block[j + 1].cells[col].is_empty() {
                    j += 1;
                }
                if !block[i].cells[col].is_empty() {
                    merge_down(sheet, (first + i) as u32, (first + j) as u32, col as u16, &block[i].cells[col])?;
                }
                i = j + 1;
            }
        }
        start = end;
    }
    Ok(())
}

fn write_nessus_sheet(sheet: &mut Worksheet, export: &NessusExport) -> Result<()> {
    let header = style::scan_header();
    let cell = style::scan_cell(false);
    for (c, title) in export.headers.iter().enumerate() {
        write_text(sheet, 0, c as u16, title, &header)?;
        sheet.set_column_width(c as u16, DEFAULT_WIDTH)?;
    }
    sheet.set_row_height(0, HEADER_HEIGHT)?;
    for (r, row) in export.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            write_text(sheet, r, c as u16, value, &cell)?;
        }
        sheet.set_row_height(r, SCAN_ROW_HEIGHT)?;
    }
    Ok(())
}

fn write_scope_sheet(sheet: &mut Worksheet, export: &NessusExport) -> Result<()> {
    let header = style::scan_header();
    let cell = style::scan_cell(true);
    sheet.write_string_with_format(0, 0, "Sr.No", &header)?;
    sheet.write_string_with_format(0, 1, "Host", &header)?;
    sheet.set_column_width(0, 10)?;
    sheet.set_column_width(1, 30)?;

    let hosts: BTreeSet<&str> = export
        .column("Host")
        .map(|c| {
            export
                .rows
                .iter()
                .map(|row| nessus::field(row, c).trim())
                .filter(|h| !h.is_empty())
                .collect()
        })
        .unwrap_or_default();
    for (i, host) in hosts.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_number_with_format(r, 0, (i + 1) as f64, &cell)?;
        write_text(sheet, r, 1, host, &cell)?;
    }
    Ok(())
}

fn write_summary_sheet(sheet: &mut Worksheet, findings: &[Finding]) -> Result<()> {
    let header = style::scan_header();
    let centered = style::scan_cell(true);
    let left = style::scan_cell(false);
    for (c, (title, width)) in [("Sr.No", 10), ("Name", 60), ("Host", 20)].iter().enumerate() {
        sheet.write_string_with_format(0, c as u16, *title, &header)?;
        sheet.set_column_width(c as u16, *width)?;
    }

    let pairs: BTreeSet<(&str, &str)> = findings.iter().map(|f| (f.name.as_str(), f.host.as_str())).collect();
    let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, host) in pairs {
        by_name.entry(name).or_default().push(host);
    }

    let mut r: u32 = 1;
    for (serial, (name, hosts)) in by_name.iter().enumerate() {
        let first = r;
        let serial = (serial + 1) as f64;
        for host in hosts {
            sheet.write_number_with_format(r, 0, serial, &centered)?;
            write_text(sheet, r, 1, name, &left)?;
            write_text(sheet, r, 2, host, &centered)?;
            r += 1;
        }
        let last = r - 1;
        if last > first {
            sheet.merge_range(first, 0, last, 0, "", &centered)?;
            sheet.write_number_with_format(first, 0, serial, &centered)?;
            sheet.merge_range(first, 1, last, 1, &clean_cell_value(name), &text_format(name, &left))?;
        }
    }
    Ok(())
}

/// Writes the whole follow-up workbook.
///
/// # Errors
///
/// Fails only when the workbook itself cannot be written; unreadable
/// screenshots are logged and skipped.
#[tracing::instrument(level = "info", skip_all)]
pub fn build_followup_workbook(input: &FollowupInput<'_>) -> Result<Vec<u8>> {
    let layout = VaptLayout::new(input.catalog);
    let rows = build_vapt_rows(input, &layout);
    let findings = input.nessus.findings();
    let sections = metadata_sections(input.form, &input.old_report.risk_counts, &follow_up_counts(&rows));

    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name(metadata::SHEET_NAME)?;
    write_metadata_sheet(sheet, &sections)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name(NMAP_SHEET)?;
    write_nmap_sheet(sheet, input.nmap)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name(NESSUS_SHEET)?;
    write_nessus_sheet(sheet, input.nessus)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name(SCOPE_SHEET)?;
    write_scope_sheet(sheet, input.nessus)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name(SUMMARY_SHEET)?;
    write_summary_sheet(sheet, &findings)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name(VAPT_SHEET)?;
    write_vapt_sheet(sheet, &layout, &rows)?;

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poc_columns_fill_second_to_seventh_then_first() {
        assert_eq!(poc_column_order(10), vec![11, 12, 13, 14, 15, 16, 10]);
    }
}
