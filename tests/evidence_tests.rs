mod common;

use audit_reports::evidence::archive::{extract_images, extract_poc_folder};
use audit_reports::evidence::attach::{POC_FIRST_COL, output_file_name, shifted_col};
use audit_reports::evidence::{EvidenceProfile, attach_evidence, group_by_base_number};
use audit_reports::xlsx::{WorkbookModel, read_anchored_images};
use common::{PNG, xlsx_of, zip_of};
use pretty_assertions::assert_eq;

fn banking_review() -> Vec<u8> {
    xlsx_of(&[
        (
            "Internet Banking",
            vec![
                vec!["Sr. No.", "Questionnaire/Points", "Status", "", "", "", "", "", "Remarks"],
                vec!["1", "Is MFA enforced?", "Compliance", "", "", "", "", "", "ok"],
                vec!["2", "Is the session timeout set?", "Non-Compliance", "", "", "", "", "", "15 min"],
                vec!["3", "Are passwords hashed?", "Compliance"],
            ],
        ),
        ("Notes", vec![vec!["Reviewed by", "Auditor"]]),
    ])
}

#[test]
fn test_archive_skips_metadata_and_non_images() {
    let zip = zip_of(&[
        ("Evidence/18.1 login.png", &PNG),
        ("__MACOSX/Evidence/._18.1 login.png", b"junk"),
        ("Evidence/readme.txt", b"notes"),
        ("../escape.png", &PNG),
    ]);
    let images = extract_images(&zip).unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].stem, "18.1 login");
    assert_eq!(images[0].extension, "png");
}

#[test]
fn test_poc_folder_is_keyed_by_stem() {
    let zip = zip_of(&[
        ("Audit/ALL POC/SSL Certificate Cannot Be Trusted.png", &PNG),
        ("Audit/other/SSH Weak Algorithms Supported.png", &PNG),
    ]);
    let images = extract_poc_folder(&zip).unwrap();
    assert_eq!(
        images.keys().cloned().collect::<Vec<_>>(),
        vec!["SSL Certificate Cannot Be Trusted".to_string()]
    );
}

#[test]
fn test_grouping_by_point_number() {
    let zip = zip_of(&[
        ("18.2_b.png", &PNG),
        ("18.1 login.png", &PNG),
        ("18.2_a.png", &PNG),
        ("18.40.png", &PNG),
        ("17.1.png", &PNG),
    ]);
    let groups = group_by_base_number(extract_images(&zip).unwrap(), EvidenceProfile::InternetBanking);
    let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
    assert_eq!(labels, vec!["18.1", "18.2"]);
    assert_eq!(groups[1].images.len(), 2);
    assert_eq!(groups[1].images[0].stem, "18.2_b");
}

#[test]
fn test_attach_places_thumbnails_on_point_rows() {
    let zip = zip_of(&[
        ("18.1 login.png", &PNG),
        ("18.2_a.png", &PNG),
        ("18.2_b.png", &PNG),
    ]);
    let outcome = attach_evidence(&banking_review(), &zip, EvidenceProfile::InternetBanking).unwrap();
    assert_eq!(outcome.placed, 3);
    assert!(outcome.unmatched_points.is_empty());

    let model = WorkbookModel::from_bytes(&outcome.bytes).unwrap();
    let sheet = model.first_sheet().unwrap();
    assert_eq!(sheet.cell(0, usize::from(POC_FIRST_COL)), "POC");
    // the old column I moved right past the POC block
    assert_eq!(sheet.cell(2, usize::from(shifted_col(8))), "15 min");
    assert_eq!(model.sheet("Notes").unwrap().cell(0, 1), "Auditor");

    let images = read_anchored_images(&outcome.bytes).unwrap();
    let placed = &images["Internet Banking"];
    let mut cells: Vec<(u32, u16)> = placed.iter().map(|i| (i.row, i.col)).collect();
    cells.sort_unstable();
    assert_eq!(cells, vec![(1, 9), (2, 9), (2, 10)]);
}

#[test]
fn test_output_name() {
    assert_eq!(output_file_name("C:\\audits\\IB Review.xlsx"), "IB Review_with_POC.xlsx");
    assert_eq!(output_file_name(".xlsx"), "Evidence_with_POC.xlsx");
}

#[test]
fn test_profiles_from_slug() {
    assert_eq!(EvidenceProfile::from_slug("internet-banking"), Some(EvidenceProfile::InternetBanking));
    assert_eq!(EvidenceProfile::from_slug("Application"), Some(EvidenceProfile::Application));
    assert_eq!(EvidenceProfile::from_slug("mobile"), None);
}
