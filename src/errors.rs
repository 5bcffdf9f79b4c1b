use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid file type: {0}")]
    Upload(String),

    #[error("Failed to process workbook: {0}")]
    Workbook(String),

    #[error("Failed to read archive: {0}")]
    Archive(String),

    #[error("Failed to build document: {0}")]
    Document(String),

    #[error("Failed to load vulnerability catalog: {0}")]
    Catalog(String),

    #[error("Invalid follow-up session: {0}")]
    Session(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O failure: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Message returned to clients for failures whose detail stays in the log.
pub const GENERIC_CLIENT_MESSAGE: &str =
    "An error occurred while generating the report. Please try again later.";

impl ReportError {
    /// HTTP status used when this error ends a request.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReportError::Validation(_) | ReportError::Upload(_) => StatusCode::BAD_REQUEST,
            ReportError::Session(_) => StatusCode::UNAUTHORIZED,
            ReportError::NotFound(_) => StatusCode::NOT_FOUND,
            ReportError::Catalog(_)
            | ReportError::Workbook(_)
            | ReportError::Archive(_)
            | ReportError::Document(_)
            | ReportError::Io(_)
            | ReportError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text that is safe to show to the auditor.
    ///
    /// Client mistakes carry their specific message; internal failures
    /// collapse to [`GENERIC_CLIENT_MESSAGE`].
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            ReportError::Validation(msg) | ReportError::NotFound(msg) => msg.clone(),
            ReportError::Upload(_) | ReportError::Session(_) => self.to_string(),
            _ => GENERIC_CLIENT_MESSAGE.to_string(),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for ReportError {
    fn from(error: rust_xlsxwriter::XlsxError) -> Self {
        ReportError::Workbook(error.to_string())
    }
}

impl From<calamine::Error> for ReportError {
    fn from(error: calamine::Error) -> Self {
        ReportError::Workbook(error.to_string())
    }
}

impl From<calamine::XlsxError> for ReportError {
    fn from(error: calamine::XlsxError) -> Self {
        ReportError::Workbook(error.to_string())
    }
}

impl From<zip::result::ZipError> for ReportError {
    fn from(error: zip::result::ZipError) -> Self {
        ReportError::Archive(error.to_string())
    }
}

impl From<csv::Error> for ReportError {
    fn from(error: csv::Error) -> Self {
        ReportError::Archive(format!("CSV parse error: {}", error))
    }
}

impl From<std::io::Error> for ReportError {
    fn from(error: std::io::Error) -> Self {
        ReportError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(error: serde_json::Error) -> Self {
        ReportError::Validation(format!("Invalid JSON payload: {}", error))
    }
}

impl From<anyhow::Error> for ReportError {
    fn from(error: anyhow::Error) -> Self {
        ReportError::Io(error.to_string())
    }
}

pub type Result<T, E = ReportError> = std::result::Result<T, E>;
