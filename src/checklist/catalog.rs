//! Checklist catalogs embedded at compile time.
//!
//! A catalog maps each form field to its question, its risk rating and the
//! canned narrative for every possible answer.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::core::models::Answer;
use crate::errors::{ReportError, Result};

const BUILTIN_SOURCES: [(&str, &str); 9] = [
    ("atm", include_str!("../../checklists/atm.json")),
    ("antivirus", include_str!("../../checklists/antivirus.json")),
    (
        "backup-and-restoration",
        include_str!("../../checklists/backup-and-restoration.json"),
    ),
    (
        "database-controls",
        include_str!("../../checklists/database-controls.json"),
    ),
    (
        "esxi-server-logical",
        include_str!("../../checklists/esxi-server-logical.json"),
    ),
    ("firewall", include_str!("../../checklists/firewall.json")),
    (
        "linux-server-logical",
        include_str!("../../checklists/linux-server-logical.json"),
    ),
    ("remote-access", include_str!("../../checklists/remote-access.json")),
    ("router", include_str!("../../checklists/router.json")),
];

/// Narrative written for one answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseText {
    pub status: String,
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub observation: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub field: String,
    pub question: String,
    pub risk: String,
    #[serde(default)]
    pub responses: BTreeMap<String, ResponseText>,
}

impl Question {
    #[must_use]
    pub fn response(&self, answer: Answer) -> Option<&ResponseText> {
        self.responses.get(answer.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    pub id: String,
    pub sheet_title: String,
    pub file_name: String,
    pub questions: Vec<Question>,
}

impl Checklist {
    /// Parses and validates a catalog document.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Catalog`] for malformed JSON, an empty field
    /// name or a field that appears twice.
    pub fn from_json(raw: &str) -> Result<Self> {
        let checklist: Checklist = serde_json::from_str(raw)
            .map_err(|e| ReportError::Catalog(format!("invalid checklist JSON: {}", e)))?;

        let mut seen = HashSet::new();
        for q in &checklist.questions {
            if q.field.trim().is_empty() {
                return Err(ReportError::Catalog(format!(
                    "checklist '{}' has a question without a field",
                    checklist.id
                )));
            }
            if !seen.insert(q.field.as_str()) {
                return Err(ReportError::Catalog(format!(
                    "checklist '{}' repeats field '{}'",
                    checklist.id, q.field
                )));
            }
        }
        Ok(checklist)
    }
}

/// Listing entry returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistSummary {
    pub id: String,
    pub title: String,
    pub file_name: String,
    pub question_count: usize,
}

#[derive(Debug, Default)]
pub struct ChecklistRegistry {
    checklists: BTreeMap<String, Checklist>,
}

static BUILTIN: Lazy<ChecklistRegistry> = Lazy::new(|| {
    let mut registry = ChecklistRegistry::default();
    for (id, raw) in BUILTIN_SOURCES {
        match Checklist::from_json(raw) {
            Ok(checklist) => registry.insert(checklist),
            Err(e) => error!(checklist = %id, "Failed to load built-in checklist: {}", e),
        }
    }
    registry
});

impl ChecklistRegistry {
    /// The catalogs compiled into the binary.
    #[must_use]
    pub fn builtin() -> &'static ChecklistRegistry {
        &BUILTIN
    }

    pub fn insert(&mut self, checklist: Checklist) {
        self.checklists.insert(checklist.id.clone(), checklist);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Checklist> {
        self.checklists.get(id)
    }

    #[must_use]
    pub fn summaries(&self) -> Vec<ChecklistSummary> {
        self.checklists
            .values()
            .map(|c| ChecklistSummary {
                id: c.id.clone(),
                title: c.sheet_title.clone(),
                file_name: c.file_name.clone(),
                question_count: c.questions.len(),
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.checklists.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checklists.is_empty()
    }
}
