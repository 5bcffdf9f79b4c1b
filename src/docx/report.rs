//! The Cyber Security Audit report (`.docx`).

use tracing::info;

use super::annexure::{AnnexureImage, insert_annexures};
use super::dates::{financial_year, superscript_date};
use super::document::{DocxPackage, page_break_xml, replace_placeholders};
use super::table::{insert_table, set_poc_attached};
use crate::core::form::FormFields;
use crate::core::models::ReportFile;
use crate::errors::{ReportError, Result};
use crate::evidence::archive::extract_images_with;
use crate::xlsx::WorkbookModel;

pub const OUTPUT_FILE_NAME: &str = "Cyber_Security_Audit_Report.docx";
pub const TEMPLATE_FILE_NAME: &str = "Cybersecurity_Audit_Report.docx";

pub const TABLE_TOKEN: &str = "tttttaaablllelelel";
pub const ANNEXURE_TOKEN: &str = "Annnnnnnexxxurressss";
const ANNEXURE_HEADING: &str = "annexures for cyber security audit";

/// Checklist columns copied into the report, A through E.
pub const TABLE_COLUMNS: usize = 5;
pub const ANNEXURE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

fn joined(prefix: &str, name: &str) -> String {
    format!("{} {}", prefix, name).trim().to_string()
}

/// Template tokens and their values for a submitted form.
#[must_use]
pub fn report_replacements(form: &FormFields) -> Vec<(&'static str, String)> {
    let organization = form.choice_or_other("organizationName", "organizationNameOther");
    let emails: Vec<&str> = form
        .get_all("email[]")
        .into_iter()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect();
    let date_of_audit = format!(
        "{} to {}",
        superscript_date(form.get("startAuditDate")),
        superscript_date(form.get("endAuditDate"))
    );

    vec![
        ("Orggganization____nameeee", organization.clone()),
        ("Ccccityyy", form.choice_or_other("city", "cityOther")),
        ("Stttateeee", form.get("state").to_string()),
        (
            "Prepaaareddd_byyyyy",
            joined(form.get("preparedByPrefix"), form.get("preparedByName")),
        ),
        (
            "Suuubmiiiiitttedddd_tooto",
            joined(form.get("submittedToPrefix"), form.get("submittedToName")),
        ),
        ("Deeeesigggnation", form.get("auditeeDesignation").to_string()),
        ("eeeeeemail", emails.join(", ")),
        ("addddddddrrreessss", format!("{}, {}", organization, form.get("address"))),
        ("Daaaaateeee_offff_auuuudit", date_of_audit),
        ("audit_period_finanicialll_yeearrr", financial_year(form.get("startAuditDate"))),
    ]
}

/// Columns A..E of the first sheet, down to the last row with a value in A.
///
/// # Errors
///
/// [`ReportError::Validation`] when column A is empty.
pub fn checklist_rows(workbook_bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let model = WorkbookModel::from_bytes(workbook_bytes)?;
    let sheet = model.first_sheet()?;
    let Some(last) = sheet.last_filled_row(0) else {
        return Err(ReportError::Validation(
            "The checklist workbook has no rows in column A".to_string(),
        ));
    };
    Ok((0..=last)
        .map(|r| {
            (0..TABLE_COLUMNS)
                .map(|c| sheet.cell(r, c).to_string())
                .collect()
        })
        .collect())
}

/// Annexure candidates of an evidence archive.
pub fn annexure_images(zip_bytes: &[u8]) -> Result<Vec<AnnexureImage>> {
    Ok(extract_images_with(zip_bytes, &ANNEXURE_EXTENSIONS)?
        .into_iter()
        .map(|image| AnnexureImage {
            file_name: format!("{}.{}", image.stem, image.extension),
            extension: image.extension,
            data: image.data,
        })
        .collect())
}

/// Fills the Word template with the form, the checklist table and the
/// evidence annexures.
///
/// # Errors
///
/// Fails when the template is not a `.docx`, the workbook cannot be read or
/// has an empty column A, or the archive is not a ZIP file.
#[tracing::instrument(level = "info", skip_all)]
pub fn build_cyber_security_report(
    template: &[u8],
    form: &FormFields,
    workbook_bytes: &[u8],
    zip_bytes: &[u8],
) -> Result<ReportFile> {
    let rows = checklist_rows(workbook_bytes)?;
    let images = annexure_images(zip_bytes)?;
    let mut doc = DocxPackage::from_bytes(template)?;

    replace_placeholders(&mut doc, &report_replacements(form))?;
    doc.insert_before_paragraph(
        |text| text.to_lowercase().contains(ANNEXURE_HEADING),
        page_break_xml(),
    )?;
    insert_table(&mut doc, TABLE_TOKEN, &rows, 1)?;
    if !images.is_empty() {
        let annexures = insert_annexures(&mut doc, ANNEXURE_TOKEN, &images)?;
        set_poc_attached(&mut doc, &annexures)?;
    }

    info!(rows = rows.len(), images = images.len(), "Built cyber security audit report");
    Ok(ReportFile::docx(OUTPUT_FILE_NAME, doc.to_bytes()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacements_resolve_other_choices() {
        let form: FormFields = vec![
            ("organizationName", "Other"),
            ("organizationNameOther", "Sample Urban Bank"),
            ("city", "Pune"),
            ("address", "MG Road"),
            ("email[]", "a@bank.test"),
            ("email[]", ""),
            ("email[]", "b@bank.test"),
            ("startAuditDate", "2025-10-21"),
            ("endAuditDate", "2025-10-23"),
        ]
        .into_iter()
        .collect();
        let map: std::collections::HashMap<_, _> = report_replacements(&form).into_iter().collect();
        assert_eq!(map["Orggganization____nameeee"], "Sample Urban Bank");
        assert_eq!(map["addddddddrrreessss"], "Sample Urban Bank, MG Road");
        assert_eq!(map["eeeeeemail"], "a@bank.test, b@bank.test");
        assert_eq!(map["Daaaaateeee_offff_auuuudit"], "21ˢᵗ October 2025 to 23ʳᵈ October 2025");
        assert_eq!(map["audit_period_finanicialll_yeearrr"], "01ˢᵗ April 2025 to 31ˢᵗ March 2026");
    }
}
