mod common;

use audit_reports::core::form::FormFields;
use audit_reports::docx::report::{ANNEXURE_TOKEN, OUTPUT_FILE_NAME, TABLE_TOKEN};
use audit_reports::docx::{DocxPackage, build_cyber_security_report, replace_placeholders};
use audit_reports::errors::ReportError;
use common::{PNG, docx_template, xlsx_of, zip_of};

fn template() -> Vec<u8> {
    docx_template(&[
        "Cyber Security Audit of Orggganization____nameeee, Ccccityyy",
        "Audit period: audit_period_finanicialll_yeearrr",
        TABLE_TOKEN,
        "Annexures for Cyber Security Audit",
        ANNEXURE_TOKEN,
    ])
}

fn checklist() -> Vec<u8> {
    xlsx_of(&[(
        "Checklist",
        vec![
            vec!["Sr. No.", "Requirements", "Complied Status (Fully Complied)", "Auditor's Remark", "POC Attached"],
            vec!["1", "Firewall in place", "Complied", "Rules reviewed", ""],
            vec!["2", "Backups tested", "Not Complied", "No restore test", ""],
            vec!["", "", "", "", ""],
        ],
    )])
}

fn form() -> FormFields {
    vec![
        ("organizationName", "Sample Co-operative Bank"),
        ("city", "Other"),
        ("cityOther", "Nashik"),
        ("startAuditDate", "2025-10-21"),
        ("endAuditDate", "2025-10-23"),
    ]
    .into_iter()
    .collect()
}

fn document_xml(bytes: &[u8]) -> String {
    DocxPackage::from_bytes(bytes).unwrap().document_xml().unwrap()
}

#[test]
fn test_report_is_filled() {
    let evidence = zip_of(&[
        ("Evidence/2_Restore log.png", &PNG),
        ("Evidence/1_Firewall rules.png", &PNG),
        ("Evidence/1_Rule base.png", &PNG),
        ("Evidence/readme.txt", b"ignored"),
    ]);
    let report = build_cyber_security_report(&template(), &form(), &checklist(), &evidence).unwrap();
    assert_eq!(report.file_name, OUTPUT_FILE_NAME);

    let xml = document_xml(&report.bytes);
    assert!(xml.contains("Sample Co-operative Bank, Nashik"));
    assert!(xml.contains("01ˢᵗ April 2025 to 31ˢᵗ March 2026"));
    assert!(!xml.contains(TABLE_TOKEN));
    assert!(!xml.contains(ANNEXURE_TOKEN));

    assert!(xml.contains("<w:tbl>"));
    assert!(xml.contains("Backups tested"));
    assert!(xml.contains("Annexure 1 (Firewall rules)"));
    assert!(xml.contains("Rule base"));
    assert!(xml.contains("Annexure 2 (Restore log)"));
    assert!(xml.contains(r#"w:type="page""#));

    let package = DocxPackage::from_bytes(&report.bytes).unwrap();
    let media: Vec<&str> = package
        .package()
        .names()
        .filter(|n| n.starts_with("word/media/"))
        .collect();
    assert_eq!(media.len(), 3);
}

#[test]
fn test_report_without_evidence_images() {
    let evidence = zip_of(&[("readme.txt", b"nothing")]);
    let report = build_cyber_security_report(&template(), &form(), &checklist(), &evidence).unwrap();
    let xml = document_xml(&report.bytes);
    assert!(xml.contains("Firewall in place"));
}

#[test]
fn test_empty_checklist_is_rejected() {
    let empty = xlsx_of(&[("Checklist", vec![vec!["", "Requirements"]])]);
    let evidence = zip_of(&[("readme.txt", b"nothing")]);
    let err = build_cyber_security_report(&template(), &form(), &empty, &evidence).unwrap_err();
    assert!(matches!(err, ReportError::Validation(_)));
}

#[test]
fn test_placeholders_in_body() {
    let template = docx_template(&["Prepared for Stttateeee"]);
    let mut doc = DocxPackage::from_bytes(&template).unwrap();
    let replaced = replace_placeholders(&mut doc, &[("Stttateeee", "Maharashtra".to_string())]).unwrap();
    assert_eq!(replaced, 1);
    assert!(doc.document_xml().unwrap().contains("Prepared for Maharashtra"));
}

#[test]
fn test_non_docx_template_is_rejected() {
    let err = DocxPackage::from_bytes(b"plain text").unwrap_err();
    assert!(matches!(err, ReportError::Document(_)));
}
