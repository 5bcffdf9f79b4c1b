//! Reading request bodies into form fields and uploaded files.

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use tracing::debug;

use crate::core::form::FormFields;
use crate::errors::{ReportError, Result};
use crate::utils::upload::{UploadKind, validate_upload};

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A submitted form: text fields plus every non-empty file part.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub fields: FormFields,
    pub files: Vec<UploadedFile>,
}

fn malformed(e: impl std::fmt::Display) -> ReportError {
    ReportError::Validation(format!("Malformed form submission: {}", e))
}

impl Submission {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut submission = Submission::default();
        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await.map_err(malformed)?;
                    // browsers send an empty part for an untouched file input
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    debug!(field = %name, size = bytes.len(), "Received upload");
                    submission.files.push(UploadedFile {
                        field: name,
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                None => {
                    let value = field.text().await.map_err(malformed)?;
                    submission.fields.push(name, value);
                }
            }
        }
        Ok(submission)
    }

    /// Multipart bodies are parsed as such; anything else as
    /// `application/x-www-form-urlencoded`.
    pub async fn from_request<S>(request: Request, state: &S, limit: usize) -> Result<Self>
    where
        S: Send + Sync,
    {
        let is_multipart = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"));
        if is_multipart {
            let multipart = Multipart::from_request(request, state).await.map_err(malformed)?;
            return Self::from_multipart(multipart).await;
        }
        let body = axum::body::to_bytes(request.into_body(), limit)
            .await
            .map_err(malformed)?;
        Ok(Submission {
            fields: FormFields::from_urlencoded(&String::from_utf8_lossy(&body)),
            files: Vec::new(),
        })
    }

    #[must_use]
    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == field)
    }

    /// The validated upload of `field`.
    ///
    /// # Errors
    ///
    /// [`ReportError::Validation`] when the field is missing and
    /// [`ReportError::Upload`] when the file fails validation.
    pub fn require(&self, field: &str, kind: UploadKind, max_bytes: usize) -> Result<&UploadedFile> {
        let Some(file) = self.file(field) else {
            return Err(ReportError::Validation(format!(
                "Missing required file '{}'",
                field
            )));
        };
        validate_upload(kind, &file.file_name, &file.bytes, max_bytes)?;
        Ok(file)
    }

    /// The validated upload of `field`, or `None` when it was not sent.
    pub fn optional(&self, field: &str, kind: UploadKind, max_bytes: usize) -> Result<Option<&UploadedFile>> {
        match self.file(field) {
            Some(file) => {
                validate_upload(kind, &file.file_name, &file.bytes, max_bytes)?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }
}
