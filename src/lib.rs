/// Audit Reports - generates compliance audit deliverables from uploaded
/// workbooks, evidence archives and scanner exports.
///
/// This crate covers the report flows an audit team runs after fieldwork:
/// 1. Checklist workbooks rendered from built-in question catalogs
/// 2. Evidence screenshots from a ZIP placed next to their checklist rows
/// 3. Non-compliance filtering of a finished checklist, with a summary
/// 4. The Public IP VAPT follow-up workbook built from Nmap and Nessus output
/// 5. The Word cyber-security audit report filled from a template
///
/// # Architecture
///
/// The system uses:
/// - axum for the HTTP API, with a per-session merge store for VAPT curation
/// - calamine to read uploaded workbooks and rust_xlsxwriter to write them
/// - zip for evidence archives and for editing `.docx` packages
/// - Tokio's blocking pool for CPU-bound report generation
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use audit_reports::api::{AppState, router};
/// use audit_reports::core::config::AppConfig;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     audit_reports::setup_logging();
///
///     let config = AppConfig::from_env()?;
///     let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
///     let app = router(Arc::new(AppState::new(config)));
///     axum::serve(listener, app).await?;
///     Ok(())
/// }
/// ```
// Module declarations
pub mod api;
pub mod checklist;
pub mod core;
pub mod docx;
pub mod errors;
pub mod evidence;
pub mod noncompliance;
pub mod package;
pub mod utils;
pub mod vapt;
pub mod xlsx;

pub use errors::{ReportError, Result};

/// Configure structured JSON logging.
///
/// The level comes from `RUST_LOG` and defaults to `info`. Calling this more
/// than once is harmless, so tests may call it freely.
///
/// # Example
///
/// ```
/// audit_reports::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
