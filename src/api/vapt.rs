//! Public IP VAPT follow-up routes: catalog check, merge session and the
//! final workbook.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::helpers::{SESSION_HEADER, attachment, json_ok, run_blocking};
use super::routes::AppState;
use super::upload::Submission;
use crate::core::models::ReportFile;
use crate::errors::{ReportError, Result};
use crate::evidence::extract_poc_folder;
use crate::utils::upload::UploadKind;
use crate::vapt::merge::MergeOperation;
use crate::vapt::{
    FollowupInput, MatchedGroup, MergeReply, MergeState, OldReport, VulnerabilityCatalog, VulnerabilityDetails,
    build_followup_workbook, nessus, parse_nessus_archive, parse_nmap_archive, report,
};

#[derive(Debug, Serialize)]
struct CheckResponse {
    success: bool,
    session_token: String,
    matched_groups: Vec<MatchedGroup>,
    unmatched_vulnerabilities: Vec<String>,
}

fn missing_parameters() -> ReportError {
    ReportError::Validation("Missing required parameters".to_string())
}

fn json_body(body: &Bytes) -> Result<Value> {
    serde_json::from_slice(body).map_err(|_| missing_parameters())
}

fn text_param<'a>(body: &'a Value, key: &str) -> Result<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(missing_parameters)
}

/// Group ids arrive as numbers or numeric strings.
fn id_param(body: &Value, key: &str) -> Result<i64> {
    match body.get(key) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(missing_parameters),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| missing_parameters()),
        _ => Err(missing_parameters()),
    }
}

fn details_param(body: &Value) -> Result<VulnerabilityDetails> {
    let details = body.get("vulnerability_details").ok_or_else(missing_parameters)?;
    VulnerabilityDetails::from_json(details)
}

fn load_catalog(state: &AppState) -> Result<VulnerabilityCatalog> {
    VulnerabilityCatalog::load(&state.config.vapt_catalog_path)
}

// ============================================================================
// Check
// ============================================================================

/// Matches the uploaded Nessus findings against the catalog and opens a
/// merge session.
#[tracing::instrument(level = "info", skip_all)]
pub async fn check(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<Response> {
    let submission = Submission::from_multipart(multipart).await?;
    let max = state.config.max_upload_bytes;
    submission.require("nmapFiles", UploadKind::Zip, max)?;
    let nessus_zip = submission.require("nessusFiles", UploadKind::Zip, max)?.bytes.clone();

    let worker_state = Arc::clone(&state);
    let outcome = run_blocking(move || {
        let export = parse_nessus_archive(&nessus_zip)?;
        let names = nessus::unique_names(&export.findings());
        let catalog = load_catalog(&worker_state)?;
        Ok(catalog.match_findings(&names))
    })
    .await?;

    let session_id = Uuid::new_v4();
    let token = state.signer.issue(session_id)?;
    info!(
        session = %session_id,
        matched = outcome.matched_groups.len(),
        unmatched = outcome.unmatched_vulnerabilities.len(),
        "Opened merge session"
    );
    state
        .sessions
        .put(session_id, MergeState::from_outcome(outcome.clone()))
        .await;

    let body = CheckResponse {
        success: true,
        session_token: token.clone(),
        matched_groups: outcome.matched_groups,
        unmatched_vulnerabilities: outcome.unmatched_vulnerabilities,
    };
    let mut response = json_ok(&body);
    if let Ok(value) = HeaderValue::from_str(&token) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    Ok(response)
}

// ============================================================================
// Merge Session
// ============================================================================

/// Applies `operation` to the caller's session and stores the result.
async fn with_session<F>(state: &AppState, headers: &HeaderMap, operation: F) -> Result<MergeReply>
where
    F: FnOnce(&mut MergeState) -> Result<MergeReply>,
{
    let id = state.signer.require(headers)?;
    let Some(mut merge) = state.sessions.get(id).await else {
        return Err(ReportError::Validation("No vulnerability data found in session".to_string()));
    };
    let reply = operation(&mut merge)?;
    if state.config.catalog_write_back && reply.success {
        write_back_latest(state, &merge).await?;
    }
    state.sessions.put(id, merge).await;
    Ok(reply)
}

/// The group created by the most recent detail-bearing operation.
fn latest_created_group(merge: &MergeState) -> Option<(VulnerabilityDetails, Vec<String>)> {
    let id = match merge.operations.last()? {
        MergeOperation::MergeWithUnmatched { new_group_id, .. }
        | MergeOperation::AddDetails { new_group_id, .. }
        | MergeOperation::AddManual { new_group_id, .. } => *new_group_id,
        MergeOperation::MergeWithMatched { .. } | MergeOperation::MergeMatchedGroups { .. } => return None,
    };
    let details = merge.new_group_details.get(&id)?.clone();
    let names = merge
        .group(id)
        .map(|g| g.matched_vulnerabilities.clone())
        .unwrap_or_default();
    Some((details, names))
}

/// Appends a freshly created group to the catalog workbook on disk.
async fn write_back_latest(state: &AppState, merge: &MergeState) -> Result<()> {
    let Some(entry) = latest_created_group(merge) else {
        return Ok(());
    };
    let _guard = state.catalog_lock.lock().await;
    let path = state.config.vapt_catalog_path.clone();
    let name = entry.0.vulnerability_name.clone();
    run_blocking(move || {
        let mut catalog = VulnerabilityCatalog::load(&path)?;
        catalog.append_entries(&[entry]);
        let bytes = catalog.to_xlsx_bytes()?;
        std::fs::write(&path, bytes)
            .map_err(|e| ReportError::Io(format!("cannot write catalog {}: {}", path.display(), e)))
    })
    .await?;
    info!(vulnerability = %name, "Wrote new group back to the catalog");
    Ok(())
}

fn reply_response(reply: &MergeReply) -> Response {
    if !reply.success {
        warn!(message = %reply.message, "Merge operation had no effect");
    }
    json_ok(reply)
}

pub async fn merge_with_matched(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let body = json_body(&body)?;
    let vulnerability = text_param(&body, "unmatched_vulnerability")?.to_string();
    let target = id_param(&body, "target_group_id")?;
    let reply = with_session(&state, &headers, |m| m.merge_with_matched(&vulnerability, target)).await?;
    Ok(reply_response(&reply))
}

pub async fn merge_with_unmatched(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let body = json_body(&body)?;
    let names: Vec<String> = body
        .get("vulnerabilities")
        .and_then(Value::as_array)
        .ok_or_else(missing_parameters)?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    let details = details_param(&body)?;
    let reply = with_session(&state, &headers, |m| m.merge_with_unmatched(&names, details)).await?;
    Ok(reply_response(&reply))
}

pub async fn add_details(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let body = json_body(&body)?;
    let name = text_param(&body, "vulnerability_name")?.to_string();
    let details = details_param(&body)?;
    let reply = with_session(&state, &headers, |m| m.add_details(&name, details)).await?;
    Ok(reply_response(&reply))
}

pub async fn merge_groups(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let body = json_body(&body)?;
    let source = id_param(&body, "source_group_id")?;
    let target = id_param(&body, "target_group_id")?;
    let reply = with_session(&state, &headers, |m| m.merge_groups(source, target)).await?;
    Ok(reply_response(&reply))
}

pub async fn add_manual(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let body = json_body(&body)?;
    let details = details_param(&body)?;
    let reply = with_session(&state, &headers, |m| m.add_manual(details)).await?;
    Ok(reply_response(&reply))
}

pub async fn undo(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response> {
    let id = state.signer.require(&headers)?;
    let Some(mut merge) = state.sessions.get(id).await else {
        return Err(ReportError::Validation("No vulnerability data found in session".to_string()));
    };
    let reply = merge.undo();
    state.sessions.put(id, merge).await;
    Ok(reply_response(&reply))
}

// ============================================================================
// Report
// ============================================================================

/// Builds the follow-up workbook, using the caller's curated matches when a
/// session token is sent.
#[tracing::instrument(level = "info", skip_all)]
pub async fn followup_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response> {
    let merge_state = match state.signer.from_headers(&headers)? {
        Some(id) => state.sessions.get(id).await,
        None => None,
    };

    let submission = Submission::from_multipart(multipart).await?;
    let max = state.config.max_upload_bytes;
    let nmap_zip = submission.require("nmapFiles", UploadKind::Zip, max)?.bytes.clone();
    let nessus_zip = submission.require("nessusFiles", UploadKind::Zip, max)?.bytes.clone();
    let old_workbook = submission.require("userExcelFile", UploadKind::Excel, max)?.bytes.clone();
    let evidence_zip = submission
        .optional("evidenceFiles", UploadKind::Zip, max)?
        .map(|f| f.bytes.clone());
    let form = submission.fields;

    let worker_state = Arc::clone(&state);
    let report = run_blocking(move || {
        let nmap = parse_nmap_archive(&nmap_zip)?;
        let nessus = parse_nessus_archive(&nessus_zip)?;
        let old_report = OldReport::from_xlsx(&old_workbook)?;
        let catalog = load_catalog(&worker_state)?;
        let poc_images = match evidence_zip {
            Some(zip) => extract_poc_folder(&zip)?,
            None => BTreeMap::new(),
        };
        let bytes = build_followup_workbook(&FollowupInput {
            nmap: &nmap,
            nessus: &nessus,
            catalog: &catalog,
            merge_state: merge_state.as_ref(),
            old_report: &old_report,
            poc_images: &poc_images,
            form: &form,
        })?;
        Ok(ReportFile::xlsx(report::OUTPUT_FILE_NAME, bytes))
    })
    .await?;
    Ok(attachment(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(name: &str) -> VulnerabilityDetails {
        VulnerabilityDetails {
            vulnerability_name: name.to_string(),
            risk_factor: "High".to_string(),
            ..VulnerabilityDetails::default()
        }
    }

    #[test]
    fn ids_accept_numbers_and_strings() {
        let body = json!({ "a": -3, "b": "12", "c": "x" });
        assert_eq!(id_param(&body, "a").unwrap(), -3);
        assert_eq!(id_param(&body, "b").unwrap(), 12);
        assert!(id_param(&body, "c").is_err());
        assert!(id_param(&body, "missing").is_err());
    }

    #[test]
    fn blank_text_parameters_are_missing() {
        let body = json!({ "vulnerability_name": "  " });
        let err = text_param(&body, "vulnerability_name").unwrap_err();
        assert_eq!(err.to_string(), "Invalid request: Missing required parameters");
    }

    #[test]
    fn latest_group_follows_detail_bearing_operations() {
        let mut merge = MergeState {
            unmatched_vulnerabilities: vec!["SSL Weak Cipher".to_string()],
            ..MergeState::default()
        };
        assert!(latest_created_group(&merge).is_none());

        merge.add_details("SSL Weak Cipher", details("Weak TLS")).unwrap();
        let (entry, names) = latest_created_group(&merge).unwrap();
        assert_eq!(entry.vulnerability_name, "Weak TLS");
        assert_eq!(names, vec!["SSL Weak Cipher".to_string()]);

        merge.undo();
        assert!(latest_created_group(&merge).is_none());
    }
}
