use std::error::Error;

use audit_reports::errors::{GENERIC_CLIENT_MESSAGE, ReportError};
use axum::http::StatusCode;

#[test]
fn test_report_error_implements_error_trait() {
    fn assert_error<T: Error>(_: &T) {}

    let error = ReportError::Workbook("bad sheet".to_string());
    assert_error(&error);
}

#[test]
fn test_report_error_display() {
    let error = ReportError::Upload("'scan.exe' is not a ZIP archive (.zip)".to_string());
    assert_eq!(
        format!("{error}"),
        "Invalid file type: 'scan.exe' is not a ZIP archive (.zip)"
    );

    let error = ReportError::Catalog("missing column".to_string());
    assert_eq!(
        format!("{error}"),
        "Failed to load vulnerability catalog: missing column"
    );
}

#[test]
fn test_status_codes() {
    assert_eq!(
        ReportError::Validation(String::new()).status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        ReportError::Upload(String::new()).status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        ReportError::Session(String::new()).status_code(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        ReportError::NotFound(String::new()).status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        ReportError::Document(String::new()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_internal_detail_is_not_shown_to_clients() {
    let error = ReportError::Io("/srv/templates/report.docx: permission denied".to_string());
    assert_eq!(error.client_message(), GENERIC_CLIENT_MESSAGE);

    let error = ReportError::Validation("Missing required file 'excelFile'".to_string());
    assert_eq!(error.client_message(), "Missing required file 'excelFile'");
}

#[test]
fn test_report_error_from_conversions() {
    let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let report_err: ReportError = err.into();
    assert!(matches!(report_err, ReportError::Io(msg) if msg.contains("gone")));

    let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let report_err: ReportError = err.into();
    assert!(matches!(report_err, ReportError::Validation(_)));

    let err = zip::ZipArchive::new(std::io::Cursor::new(b"not a zip".to_vec())).unwrap_err();
    let report_err: ReportError = err.into();
    assert!(matches!(report_err, ReportError::Archive(_)));
}
