//! Common helper functions for API handlers.
//!
//! Response builders shared by every route, plus the bridge that moves
//! workbook generation off the async runtime.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::core::models::ReportFile;
use crate::errors::{ReportError, Result};
use crate::utils::upload::sanitize_filename;

pub const SESSION_HEADER: &str = "x-session-token";

/// Characters left readable in an RFC 5987 `filename*` value.
const FILENAME_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-').remove(b'_');

// ============================================================================
// Response Builders
// ============================================================================

/// `{"success": false, "message": ...}` with the given status.
#[must_use]
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

/// A 200 JSON body.
#[must_use]
pub fn json_ok<T: Serialize>(body: &T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

/// `Content-Disposition` value carrying both an ASCII fallback and the
/// UTF-8 name.
///
/// # Examples
///
/// ```
/// use audit_reports::api::helpers::content_disposition;
///
/// assert_eq!(
///     content_disposition("Report (final).xlsx"),
///     "attachment; filename=\"Report _final_.xlsx\"; filename*=UTF-8''Report%20%28final%29.xlsx"
/// );
/// ```
#[must_use]
pub fn content_disposition(file_name: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitize_filename(file_name),
        utf8_percent_encode(file_name, FILENAME_ESCAPES)
    )
}

/// A generated report as a download.
#[must_use]
pub fn attachment(report: ReportFile) -> Response {
    let disposition = HeaderValue::from_str(&content_disposition(&report.file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(report.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, must-revalidate"),
            ),
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        ],
        report.bytes,
    )
        .into_response()
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Request rejected");
        }
        error_response(status, &self.client_message())
    }
}

// ============================================================================
// Blocking Work
// ============================================================================

/// Runs CPU-bound report generation on the blocking pool.
pub async fn run_blocking<F, T>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ReportError::Io(format!("report worker failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let response = ReportError::Validation("Missing required file 'excelFile'".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn attachments_are_not_cached() {
        let response = attachment(ReportFile::xlsx("ATM_Review.xlsx", vec![1, 2, 3]));
        let headers = response.headers();
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-store, must-revalidate");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert!(
            headers[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .contains("filename*=UTF-8''ATM_Review.xlsx")
        );
    }
}
