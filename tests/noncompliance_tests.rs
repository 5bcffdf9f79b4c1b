mod common;

use audit_reports::noncompliance::{ALL_COMPLIANT_MESSAGE, filter_workbook, summary_workbook};
use audit_reports::xlsx::WorkbookModel;
use chrono::NaiveDate;
use audit_reports::xlsx::read_anchored_images;
use common::{xlsx_of, xlsx_with_images};
use pretty_assertions::assert_eq;

fn review() -> Vec<u8> {
    xlsx_of(&[
        (
            "Firewall",
            vec![
                vec!["Sr. No.", "Questionnaire/Points", "Compliance/Non-Compliance/Not Applicable"],
                vec!["1", "Default rules reviewed?", "Compliance"],
                vec!["2", "Admin access restricted?", "Non-Compliance"],
                vec!["3", "Logging enabled?", "Not Applicable"],
                vec!["4", "Firmware current?", "noncompliance"],
            ],
        ),
        (
            "Router",
            vec![
                vec!["Sr. No.", "Questionnaire/Points", "Compliance/Non-Compliance/Not Applicable"],
                vec!["1", "Telnet disabled?", "Compliance"],
            ],
        ),
    ])
}

#[test]
fn test_only_non_compliant_rows_survive() {
    let (bytes, summary) = filter_workbook(&review()).unwrap();
    let model = WorkbookModel::from_bytes(&bytes).unwrap();

    let firewall = model.sheet("Firewall").unwrap();
    assert_eq!(firewall.cell(1, 1), "Admin access restricted?");
    assert_eq!(firewall.cell(2, 1), "Firmware current?");
    // serials are renumbered after removal
    assert_eq!(firewall.cell(1, 0), "1");
    assert_eq!(firewall.cell(2, 0), "2");

    assert_eq!(summary.sheets.len(), 2);
    assert_eq!(summary.sheets[0].rows_removed, 2);
    assert_eq!(summary.total_rows_before, 7);
    assert_eq!(summary.total_rows_after, 4);
}

#[test]
fn test_fully_compliant_sheet_gets_banner() {
    let (bytes, _) = filter_workbook(&review()).unwrap();
    let model = WorkbookModel::from_bytes(&bytes).unwrap();
    let router = model.sheet("Router").unwrap();
    assert_eq!(router.cell(2, 0), ALL_COMPLIANT_MESSAGE);
}

#[test]
fn test_summary_workbook_is_readable() {
    let (_, summary) = filter_workbook(&review()).unwrap();
    let generated_at = NaiveDate::from_ymd_opt(2025, 10, 21)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    let bytes = summary_workbook(&summary, generated_at).unwrap();
    let model = WorkbookModel::from_bytes(&bytes).unwrap();
    let sheet = model.sheet("Processing Summary").unwrap();
    assert!(sheet.rows.iter().flatten().any(|c| c == "Firewall"));
}

#[test]
fn test_garbage_upload_is_a_workbook_error() {
    assert!(filter_workbook(b"PK\x03\x04 not really").is_err());
}

#[test]
fn test_images_follow_their_rows() {
    let bytes = xlsx_with_images(
        "Firewall",
        vec![
            vec!["Sr. No.", "Questionnaire/Points", "Compliance/Non-Compliance/Not Applicable"],
            vec!["1", "Default rules reviewed?", "Compliance"],
            vec!["2", "Admin access restricted?", "Non-Compliance"],
            vec!["3", "Logging enabled?", "Not Applicable"],
            vec!["4", "Firmware current?", "Non-Compliance"],
        ],
        &[(1, 8), (2, 8), (2, 9), (3, 8), (4, 10)],
    );
    assert_eq!(read_anchored_images(&bytes).unwrap()["Firewall"].len(), 5);

    let (filtered, summary) = filter_workbook(&bytes).unwrap();
    assert_eq!(summary.sheets[0].rows_removed, 2);

    let images = read_anchored_images(&filtered).unwrap();
    let mut anchors: Vec<(u32, u16)> = images["Firewall"].iter().map(|i| (i.row, i.col)).collect();
    anchors.sort();
    assert_eq!(anchors, vec![(1, 8), (1, 9), (2, 10)]);
}
