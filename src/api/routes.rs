//! Shared state and the route table.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::session::{InMemoryMergeStore, MergeStateStore, SessionSigner};
use super::{handlers, vapt};
use crate::checklist::ChecklistRegistry;
use crate::core::config::AppConfig;

/// Upload fields a single request may carry at most.
const MAX_FILES_PER_REQUEST: usize = 4;

pub struct AppState {
    pub config: AppConfig,
    pub checklists: &'static ChecklistRegistry,
    pub sessions: Arc<dyn MergeStateStore>,
    pub signer: SessionSigner,
    /// Serializes writes to the catalog workbook.
    pub catalog_lock: Mutex<()>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(InMemoryMergeStore::new(config.session_ttl));
        Self::with_store(config, store)
    }

    pub fn with_store(config: AppConfig, sessions: Arc<dyn MergeStateStore>) -> Self {
        let signer = SessionSigner::new(&config.session_secret);
        Self {
            config,
            checklists: ChecklistRegistry::builtin(),
            sessions,
            signer,
            catalog_lock: Mutex::new(()),
        }
    }

    /// Largest body accepted by any route.
    #[must_use]
    pub fn body_limit(&self) -> usize {
        self.config.max_upload_bytes * MAX_FILES_PER_REQUEST
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let limit = state.body_limit();
    Router::new()
        .route("/health", get(health))
        .route("/api/checklists", get(handlers::list_checklists))
        .route("/api/checklists/:id", get(handlers::get_checklist))
        .route("/api/checklists/:id/report", post(handlers::checklist_report))
        .route("/api/evidence/:profile", post(handlers::attach_evidence))
        .route("/api/non-compliance", post(handlers::non_compliance))
        .route("/api/non-compliance/summary", post(handlers::non_compliance_summary))
        .route("/api/word/cyber-security", post(handlers::cyber_security_report))
        .route("/api/vapt/public-ip/check", post(vapt::check))
        .route("/api/vapt/public-ip/merge-with-matched", post(vapt::merge_with_matched))
        .route("/api/vapt/public-ip/merge-with-unmatched", post(vapt::merge_with_unmatched))
        .route("/api/vapt/public-ip/add-details", post(vapt::add_details))
        .route("/api/vapt/public-ip/merge-groups", post(vapt::merge_groups))
        .route("/api/vapt/public-ip/add-manual", post(vapt::add_manual))
        .route("/api/vapt/public-ip/undo", post(vapt::undo))
        .route("/api/vapt/public-ip/report", post(vapt::followup_report))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}
