//! Report download handlers: checklists, evidence, non-compliance and Word.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, Request, State};
use axum::response::Response;
use chrono::Local;
use tracing::info;

use super::helpers::{attachment, json_ok, run_blocking};
use super::routes::AppState;
use super::upload::Submission;
use crate::checklist::{ChecklistSummary, render_checklist};
use crate::core::models::ReportFile;
use crate::docx::build_cyber_security_report;
use crate::docx::report::TEMPLATE_FILE_NAME;
use crate::errors::{ReportError, Result};
use crate::evidence::attach::output_file_name;
use crate::evidence::{EvidenceProfile, attach_evidence as attach};
use crate::noncompliance::{self, filter_workbook, summary_workbook};
use crate::utils::upload::UploadKind;

// ============================================================================
// Checklists
// ============================================================================

pub async fn list_checklists(State(state): State<Arc<AppState>>) -> Json<Vec<ChecklistSummary>> {
    Json(state.checklists.summaries())
}

pub async fn get_checklist(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Response> {
    let Some(checklist) = state.checklists.get(&id) else {
        return Err(ReportError::NotFound(format!("Unknown checklist '{}'", id)));
    };
    Ok(json_ok(checklist))
}

#[tracing::instrument(level = "info", skip(state, request))]
pub async fn checklist_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response> {
    let Some(checklist) = state.checklists.get(&id) else {
        return Err(ReportError::NotFound(format!("Unknown checklist '{}'", id)));
    };
    let submission = Submission::from_request(request, &state, state.body_limit()).await?;
    let answers = submission.fields.to_map();
    let checklist = checklist.clone();

    let report = run_blocking(move || {
        let bytes = render_checklist(&checklist, &answers)?;
        Ok(ReportFile::xlsx(checklist.file_name.clone(), bytes))
    })
    .await?;
    info!(checklist = %id, "Generated checklist report");
    Ok(attachment(report))
}

// ============================================================================
// Evidence
// ============================================================================

#[tracing::instrument(level = "info", skip(state, multipart))]
pub async fn attach_evidence(
    State(state): State<Arc<AppState>>,
    Path(profile): Path<String>,
    multipart: Multipart,
) -> Result<Response> {
    let Some(profile) = EvidenceProfile::from_slug(&profile) else {
        return Err(ReportError::NotFound(format!("Unknown evidence profile '{}'", profile)));
    };
    let submission = Submission::from_multipart(multipart).await?;
    let max = state.config.max_upload_bytes;
    let excel = submission.require("excelFile", UploadKind::Excel, max)?.clone();
    let zip = submission.require("zipFile", UploadKind::Zip, max)?.clone();

    let report = run_blocking(move || {
        let outcome = attach(&excel.bytes, &zip.bytes, profile)?;
        info!(
            placed = outcome.placed,
            unmatched = outcome.unmatched_points.len(),
            "Attached evidence"
        );
        Ok(ReportFile::xlsx(output_file_name(&excel.file_name), outcome.bytes))
    })
    .await?;
    Ok(attachment(report))
}

// ============================================================================
// Non-compliance
// ============================================================================

#[tracing::instrument(level = "info", skip_all)]
pub async fn non_compliance(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<Response> {
    let submission = Submission::from_multipart(multipart).await?;
    let excel = submission
        .require("excelFile", UploadKind::Excel, state.config.max_upload_bytes)?
        .clone();

    let report = run_blocking(move || {
        let (bytes, summary) = filter_workbook(&excel.bytes)?;
        info!(removed = summary.rows_removed, "Filtered non-compliance rows");
        Ok(ReportFile::xlsx(noncompliance::OUTPUT_FILE_NAME, bytes))
    })
    .await?;
    Ok(attachment(report))
}

#[tracing::instrument(level = "info", skip_all)]
pub async fn non_compliance_summary(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<Response> {
    let submission = Submission::from_multipart(multipart).await?;
    let excel = submission
        .require("excelFile", UploadKind::Excel, state.config.max_upload_bytes)?
        .clone();

    let report = run_blocking(move || {
        let (_, summary) = filter_workbook(&excel.bytes)?;
        let bytes = summary_workbook(&summary, Local::now().naive_local())?;
        Ok(ReportFile::xlsx(noncompliance::SUMMARY_FILE_NAME, bytes))
    })
    .await?;
    Ok(attachment(report))
}

// ============================================================================
// Word
// ============================================================================

#[tracing::instrument(level = "info", skip_all)]
pub async fn cyber_security_report(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<Response> {
    let submission = Submission::from_multipart(multipart).await?;
    let max = state.config.max_upload_bytes;
    let excel = submission.require("excelFile", UploadKind::Excel, max)?.clone();
    let zip = submission.require("zipFile", UploadKind::Zip, max)?.clone();

    let template = match submission.optional("templateFile", UploadKind::Docx, max)? {
        Some(file) => file.bytes.clone(),
        None => {
            let path = state.config.template_path(TEMPLATE_FILE_NAME);
            tokio::fs::read(&path).await.map_err(|e| {
                ReportError::Config(format!("cannot read template {}: {}", path.display(), e))
            })?
        }
    };
    let form = submission.fields;

    let report = run_blocking(move || build_cyber_security_report(&template, &form, &excel.bytes, &zip.bytes)).await?;
    Ok(attachment(report))
}
