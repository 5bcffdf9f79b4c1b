mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use audit_reports::api::helpers::SESSION_HEADER;
use audit_reports::api::{AppState, router};
use audit_reports::core::config::AppConfig;
use audit_reports::core::models::{DOCX_CONTENT_TYPE, XLSX_CONTENT_TYPE};
use audit_reports::docx::report::{TABLE_TOKEN, TEMPLATE_FILE_NAME};
use audit_reports::vapt::VulnerabilityCatalog;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use common::{PNG, catalog_xlsx, docx_template, nessus_zip, nmap_zip, old_report_xlsx, xlsx_of, zip_of};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "audit-reports-test-boundary";

fn app_with(config: AppConfig) -> Router {
    router(Arc::new(AppState::new(config)))
}

fn workspace() -> (TempDir, AppConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::for_tests(dir.path());
    std::fs::write(&config.vapt_catalog_path, catalog_xlsx()).unwrap();
    std::fs::create_dir_all(&config.template_dir).unwrap();
    (dir, config)
}

fn multipart(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    for (name, file_name, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn multipart_request(uri: &str, body: Body) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(body)
        .unwrap()
}

fn json_request(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(SESSION_HEADER, token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_of(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn bytes_of(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

fn tomcat_details() -> Value {
    json!({
        "vulnerabilityName": "Tomcat Default Content",
        "riskFactor": "High",
        "cveId": "",
        "cvssScore": "7.5",
        "auditObservation": "Default files are exposed.",
        "impact": "Information disclosure.",
        "recommendation": "Remove default content.",
        "referenceLink": "https://example.test/tomcat"
    })
}

async fn open_session(app: &Router) -> (String, Value) {
    let request = multipart_request(
        "/api/vapt/public-ip/check",
        multipart(
            &[],
            &[("nmapFiles", "nmap.zip", &nmap_zip()), ("nessusFiles", "nessus.zip", &nessus_zip())],
        ),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = response.headers()[SESSION_HEADER].to_str().unwrap().to_string();
    let body = json_of(response).await;
    assert_eq!(body["session_token"], token.as_str());
    (token, body)
}

fn catalog_len(path: &Path) -> usize {
    VulnerabilityCatalog::load(path).unwrap().len()
}

#[tokio::test]
async fn test_health() {
    let (_dir, config) = workspace();
    let response = app_with(config)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_checklist_listing_and_lookup() {
    let (_dir, config) = workspace();
    let app = app_with(config);

    let response = app
        .clone()
        .oneshot(Request::get("/api/checklists").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let listing = json_of(response).await;
    assert_eq!(listing.as_array().unwrap().len(), 9);

    let response = app
        .clone()
        .oneshot(Request::get("/api/checklists/firewall").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(response).await["id"], "firewall");

    let response = app
        .oneshot(Request::get("/api/checklists/mainframe").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_of(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Unknown checklist 'mainframe'");
}

#[tokio::test]
async fn test_checklist_report_from_urlencoded_form() {
    let (_dir, config) = workspace();
    let request = Request::post("/api/checklists/atm/report")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("physicalAttacksCardReaders=compliance"))
        .unwrap();
    let response = app_with(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], XLSX_CONTENT_TYPE);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("filename*=UTF-8''ATM%20Review.xlsx"));
    assert!(bytes_of(response).await.starts_with(b"PK\x03\x04"));
}

#[tokio::test]
async fn test_unknown_evidence_profile_is_not_found() {
    let (_dir, config) = workspace();
    let request = multipart_request("/api/evidence/mobile", multipart(&[], &[]));
    let response = app_with(config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_evidence_attachment() {
    let (_dir, config) = workspace();
    let review = xlsx_of(&[(
        "Internet Banking",
        vec![
            vec!["Sr. No.", "Questionnaire/Points", "Status"],
            vec!["1", "Is MFA enforced?", "Compliance"],
        ],
    )]);
    let evidence = zip_of(&[("18.1 mfa.png", &PNG)]);
    let request = multipart_request(
        "/api/evidence/internet-banking",
        multipart(&[], &[("excelFile", "IB Review.xlsx", &review), ("zipFile", "evidence.zip", &evidence)]),
    );
    let response = app_with(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains("IB%20Review_with_POC.xlsx"));
}

#[tokio::test]
async fn test_missing_and_invalid_uploads_are_rejected() {
    let (_dir, config) = workspace();
    let app = app_with(config);

    let response = app
        .clone()
        .oneshot(multipart_request("/api/non-compliance", multipart(&[], &[])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(response).await["message"], "Missing required file 'excelFile'");

    let request = multipart_request(
        "/api/non-compliance",
        multipart(&[], &[("excelFile", "review.exe", b"MZ\x90\x00")]),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let message = json_of(response).await["message"].as_str().unwrap().to_string();
    assert!(message.starts_with("Invalid file type"), "{message}");

    let request = multipart_request(
        "/api/non-compliance",
        multipart(&[], &[("excelFile", "review.xlsx", b"not a zip at all")]),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_compliance_summary_download() {
    let (_dir, config) = workspace();
    let review = xlsx_of(&[(
        "Firewall",
        vec![
            vec!["Sr. No.", "Point", "Compliance/Non-Compliance/Not Applicable"],
            vec!["1", "Admin access restricted?", "Non-Compliance"],
        ],
    )]);
    let request = multipart_request(
        "/api/non-compliance/summary",
        multipart(&[], &[("excelFile", "review.xlsx", &review)]),
    );
    let response = app_with(config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains("Asset_Review_Processing_Summary.xlsx"));
}

#[tokio::test]
async fn test_merge_session_flow() {
    let (_dir, config) = workspace();
    let app = app_with(config);
    let (token, check) = open_session(&app).await;
    assert_eq!(check["matched_groups"].as_array().unwrap().len(), 2);
    assert_eq!(check["unmatched_vulnerabilities"], json!(["Apache Tomcat Default Files"]));

    let response = app
        .clone()
        .oneshot(json_request(
            "/api/vapt/public-ip/add-details",
            Some(&token),
            &json!({
                "vulnerability_name": "Apache Tomcat Default Files",
                "vulnerability_details": tomcat_details()
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reply = json_of(response).await;
    assert_eq!(reply["success"], true);
    assert_eq!(reply["updated_state"]["unmatched_vulnerabilities"], json!([]));
    assert_eq!(reply["updated_state"]["matched_groups"].as_array().unwrap().len(), 3);

    let response = app
        .clone()
        .oneshot(json_request(
            "/api/vapt/public-ip/merge-groups",
            Some(&token),
            &json!({ "source_group_id": 1, "target_group_id": "0" }),
        ))
        .await
        .unwrap();
    let reply = json_of(response).await;
    assert_eq!(reply["updated_state"]["matched_groups"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(json_request("/api/vapt/public-ip/undo", Some(&token), &json!({})))
        .await
        .unwrap();
    let reply = json_of(response).await;
    assert_eq!(reply["message"], "Last operation undone successfully");
    assert_eq!(reply["updated_state"]["matched_groups"].as_array().unwrap().len(), 3);

    let request = Request::post("/api/vapt/public-ip/report")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header(SESSION_HEADER, &token)
        .body(multipart(
            &[("organizationName", "Sample Bank"), ("startAuditDate", "2025-10-21")],
            &[
                ("nmapFiles", "nmap.zip", &nmap_zip()),
                ("nessusFiles", "nessus.zip", &nessus_zip()),
                ("userExcelFile", "previous.xlsx", &old_report_xlsx()),
            ],
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains("Public_IP_VAPT_Follow_Up_Audit_Report.xlsx"));
}

#[tokio::test]
async fn test_merge_requires_a_valid_session() {
    let (_dir, config) = workspace();
    let app = app_with(config);
    let body = json!({ "unmatched_vulnerability": "X", "target_group_id": 0 });

    let response = app
        .clone()
        .oneshot(json_request("/api/vapt/public-ip/merge-with-matched", None, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request(
            "/api/vapt/public-ip/merge-with-matched",
            Some("0123.deadbeef"),
            &body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (token, _) = open_session(&app).await;
    let response = app
        .oneshot(json_request(
            "/api/vapt/public-ip/merge-with-matched",
            Some(&token),
            &json!({ "target_group_id": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(response).await["message"], "Missing required parameters");
}

#[tokio::test]
async fn test_expired_session_has_no_data() {
    let (_dir, mut config) = workspace();
    config.session_ttl = Duration::ZERO;
    let app = app_with(config);
    let (token, _) = open_session(&app).await;

    let response = app
        .oneshot(json_request(
            "/api/vapt/public-ip/merge-with-matched",
            Some(&token),
            &json!({ "unmatched_vulnerability": "X", "target_group_id": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(response).await["message"], "No vulnerability data found in session");
}

#[tokio::test]
async fn test_missing_detail_field_is_named() {
    let (_dir, config) = workspace();
    let app = app_with(config);
    let (token, _) = open_session(&app).await;

    let mut details = tomcat_details();
    details.as_object_mut().unwrap().remove("impact");
    let response = app
        .oneshot(json_request(
            "/api/vapt/public-ip/add-manual",
            Some(&token),
            &json!({ "vulnerability_details": details }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(response).await["message"], "Missing required field 'impact'");
}

#[tokio::test]
async fn test_catalog_write_back() {
    let (_dir, mut config) = workspace();
    config.catalog_write_back = true;
    let catalog_path = config.vapt_catalog_path.clone();
    let app = app_with(config);
    let (token, _) = open_session(&app).await;
    assert_eq!(catalog_len(&catalog_path), 2);

    let response = app
        .oneshot(json_request(
            "/api/vapt/public-ip/merge-with-unmatched",
            Some(&token),
            &json!({
                "vulnerabilities": ["Apache Tomcat Default Files"],
                "vulnerability_details": tomcat_details()
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let catalog = VulnerabilityCatalog::load(&catalog_path).unwrap();
    assert_eq!(catalog.len(), 3);
    let outcome = catalog.match_findings(&["Apache Tomcat Default Files".to_string()]);
    assert_eq!(outcome.matched_groups.len(), 1);
}

#[tokio::test]
async fn test_word_report_uses_template_directory() {
    let (_dir, config) = workspace();
    std::fs::write(
        config.template_path(TEMPLATE_FILE_NAME),
        docx_template(&["Report for Orggganization____nameeee", TABLE_TOKEN]),
    )
    .unwrap();
    let checklist = xlsx_of(&[(
        "Checklist",
        vec![
            vec!["Sr. No.", "Requirements", "Complied Status", "Auditor's Remark", "POC Attached"],
            vec!["1", "Firewall in place", "Complied", "Checked", ""],
        ],
    )]);
    let evidence = zip_of(&[("1_Firewall.png", &PNG)]);

    let request = multipart_request(
        "/api/word/cyber-security",
        multipart(
            &[("organizationName", "Sample Bank")],
            &[("excelFile", "checklist.xlsx", &checklist), ("zipFile", "evidence.zip", &evidence)],
        ),
    );
    let response = app_with(config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], DOCX_CONTENT_TYPE);
}

#[tokio::test]
async fn test_word_report_without_template_fails_generically() {
    let (_dir, config) = workspace();
    let checklist = xlsx_of(&[("Checklist", vec![vec!["1", "Firewall in place"]])]);
    let evidence = zip_of(&[("1_Firewall.png", &PNG)]);
    let request = multipart_request(
        "/api/word/cyber-security",
        multipart(&[], &[("excelFile", "checklist.xlsx", &checklist), ("zipFile", "evidence.zip", &evidence)]),
    );
    let response = app_with(config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_of(response).await["message"],
        audit_reports::errors::GENERIC_CLIENT_MESSAGE
    );
}
