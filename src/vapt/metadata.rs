//! The `Meta_Data` sheet of the follow-up report.

use chrono::NaiveDate;
use rust_xlsxwriter::Worksheet;

use super::followup::RiskCounts;
use crate::core::form::FormFields;
use crate::errors::Result;
use crate::utils::cells::write_text;
use crate::xlsx::style;

pub const SHEET_NAME: &str = "Meta_Data";

const LABEL_WIDTH: f64 = 35.0;
const VALUE_WIDTH: f64 = 60.0;
const TITLE_HEIGHT: f64 = 25.0;
const ROW_HEIGHT: f64 = 20.0;

/// A titled block of label/value rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaSection {
    pub title: String,
    pub rows: Vec<(String, String)>,
}

impl MetaSection {
    fn new(title: impl Into<String>, rows: Vec<(String, String)>) -> Self {
        Self {
            title: title.into(),
            rows,
        }
    }
}

fn pair(label: impl Into<String>, value: impl Into<String>) -> (String, String) {
    (label.into(), value.into())
}

fn joined(title: &str, name: &str) -> String {
    format!("{} {}", title, name).trim().to_string()
}

/// `YYYY-MM-DD` as `DD.MM.YYYY`; other input is returned unchanged.
///
/// # Examples
///
/// ```
/// use audit_reports::vapt::metadata::report_date;
///
/// assert_eq!(report_date("2025-03-31"), "31.03.2025");
/// assert_eq!(report_date("31/03/2025"), "31/03/2025");
/// ```
#[must_use]
pub fn report_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => date.format("%d.%m.%Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

fn counts_rows(counts: &RiskCounts) -> Vec<(String, String)> {
    counts
        .labelled()
        .iter()
        .map(|(label, n)| pair(*label, n.to_string()))
        .collect()
}

fn certified(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "yes" => "Yes".to_string(),
        "no" | "" => "No".to_string(),
        _ => raw.trim().to_string(),
    }
}

/// Sections of the sheet, in display order.
///
/// Email and team sections only appear for non-empty entries; team member
/// `n` keeps the position it had on the form.
#[must_use]
pub fn metadata_sections(form: &FormFields, first_audit: &RiskCounts, follow_up: &RiskCounts) -> Vec<MetaSection> {
    let mut sections = vec![
        MetaSection::new(
            "ORGANIZATION INFORMATION",
            vec![
                pair("Organization Name", form.choice_or_other("organization", "otherOrganization")),
                pair("City", form.choice_or_other("city", "otherCity")),
                pair("State", form.get("state")),
                pair("First Audit Report ID", form.get("firstAuditReportId")),
                pair("First Audit Report Date", report_date(form.get("firstAuditReportDate"))),
            ],
        ),
        MetaSection::new(
            "AUDIT PERIOD",
            vec![pair("Start Date", form.get("startDate")), pair("End Date", form.get("endDate"))],
        ),
        MetaSection::new(
            "REPORT PREPARED BY",
            vec![pair("Name", joined(form.get("preparedByTitle"), form.get("preparedByName")))],
        ),
        MetaSection::new(
            "AUDITEE DETAILS",
            vec![
                pair("Name", joined(form.get("auditeeTitle"), form.get("auditeeName"))),
                pair("Designation", form.get("designation")),
            ],
        ),
        MetaSection::new("FIRST AUDIT", counts_rows(first_audit)),
        MetaSection::new("FOLLOW UP AUDIT", counts_rows(follow_up)),
    ];

    let emails: Vec<(String, String)> = form
        .get_all("bankEmail[]")
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .enumerate()
        .map(|(i, e)| pair(format!("Email {}", i + 1), e))
        .collect();
    if !emails.is_empty() {
        sections.push(MetaSection::new("ORGANIZATION EMAIL ADDRESSES", emails));
    }

    let names = form.get_all("teamName[]");
    let designations = form.get_all("teamDesignation[]");
    let emails = form.get_all("teamEmail[]");
    let qualifications = form.get_all("teamQualification[]");
    for (i, name) in names.iter().enumerate() {
        if name.trim().is_empty() {
            continue;
        }
        let n = i + 1;
        let at = |list: &[&str]| list.get(i).map_or(String::new(), |v| v.trim().to_string());
        sections.push(MetaSection::new(
            format!("AUDITING TEAM MEMBER {}", n),
            vec![
                pair(format!("Team Member {} - Name", n), name.trim()),
                pair(format!("Team Member {} - Designation", n), at(&designations)),
                pair(format!("Team Member {} - Email", n), at(&emails)),
                pair(format!("Team Member {} - Qualification", n), at(&qualifications)),
                pair(
                    format!("Team Member {} - Certified", n),
                    certified(form.get(&format!("teamCertified[{}]", i))),
                ),
            ],
        ));
    }

    sections
}

/// Writes `sections` one under the other with a blank row between them.
pub fn write_metadata_sheet(sheet: &mut Worksheet, sections: &[MetaSection]) -> Result<()> {
    let header = style::scan_header();
    let cell = style::scan_cell(false);
    sheet.set_column_width(0, LABEL_WIDTH)?;
    sheet.set_column_width(1, VALUE_WIDTH)?;

    let mut row: u32 = 0;
    for section in sections {
        sheet.write_string_with_format(row, 0, &section.title, &header)?;
        sheet.write_blank(row, 1, &header)?;
        sheet.set_row_height(row, TITLE_HEIGHT)?;
        row += 1;

        for (label, value) in &section.rows {
            sheet.write_string_with_format(row, 0, label, &cell)?;
            write_text(sheet, row, 1, value, &cell)?;
            sheet.set_row_height(row, ROW_HEIGHT)?;
            row += 1;
        }
        row += 1;
    }
    Ok(())
}
