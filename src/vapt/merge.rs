//! Auditor curation of catalog matches before the follow-up report is built.
//!
//! A [`MergeState`] starts from a [`MatchOutcome`] and records every change
//! on an undo stack.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::catalog::{MatchOutcome, MatchedGroup};
use crate::errors::{ReportError, Result};

/// Keys every auditor-supplied detail record must carry.
pub const REQUIRED_DETAIL_FIELDS: [&str; 8] = [
    "vulnerabilityName",
    "riskFactor",
    "cveId",
    "cvssScore",
    "auditObservation",
    "impact",
    "recommendation",
    "referenceLink",
];

/// Offset of ids given to manually added vulnerabilities.
const MANUAL_ID_OFFSET: i64 = 1000;

const GROUP_NAME_LIMIT: usize = 200;
const RISK_FACTOR_LIMIT: usize = 20;
const CVSS_SCORE_LIMIT: usize = 10;

fn truncated(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

/// Catalog-style description of a group the auditor created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityDetails {
    pub vulnerability_name: String,
    pub risk_factor: String,
    pub cve_id: String,
    pub cvss_score: String,
    pub audit_observation: String,
    pub impact: String,
    pub recommendation: String,
    pub reference_link: String,
    /// Scanner name the details were written for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_vulnerability_name: Option<String>,
    /// Hosts typed by the auditor, newline or comma separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_systems: Option<String>,
}

fn json_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

impl VulnerabilityDetails {
    /// Reads a detail record from a request body.
    ///
    /// # Errors
    ///
    /// [`ReportError::Validation`] naming the first required key that is
    /// missing.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(ReportError::Validation("Missing required parameters".to_string()));
        };
        if let Some(missing) = REQUIRED_DETAIL_FIELDS.iter().find(|f| !object.contains_key(**f)) {
            return Err(ReportError::Validation(format!("Missing required field '{}'", missing)));
        }
        let optional = |key: &str| Some(json_text(object.get(key))).filter(|s| !s.is_empty());

        Ok(Self {
            vulnerability_name: json_text(object.get("vulnerabilityName")),
            risk_factor: json_text(object.get("riskFactor")),
            cve_id: json_text(object.get("cveId")),
            cvss_score: json_text(object.get("cvssScore")),
            audit_observation: json_text(object.get("auditObservation")),
            impact: json_text(object.get("impact")),
            recommendation: json_text(object.get("recommendation")),
            reference_link: json_text(object.get("referenceLink")),
            actual_vulnerability_name: optional("actualVulnerabilityName"),
            affected_systems: optional("affectedSystems"),
        })
    }

    /// Auditor-typed hosts, split on newlines, else on commas.
    #[must_use]
    pub fn affected_hosts(&self) -> Vec<String> {
        let Some(raw) = self.affected_systems.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Vec::new();
        };
        let separator = if raw.contains('\n') { '\n' } else { ',' };
        raw.split(separator)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// One reversible change to the merge state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MergeOperation {
    MergeWithMatched {
        target_group_id: i64,
        vulnerability: String,
        /// Whether the name was already in the target group.
        already_present: bool,
    },
    MergeWithUnmatched {
        new_group_id: i64,
        vulnerabilities: Vec<String>,
    },
    AddDetails {
        new_group_id: i64,
        vulnerability: String,
    },
    MergeMatchedGroups {
        source_index: usize,
        source: MatchedGroup,
        target_group_id: i64,
        /// Names that were moved into the target, as opposed to already there.
        moved: Vec<String>,
    },
    AddManual {
        new_group_id: i64,
        vulnerability: String,
    },
}

/// Per-session working set of matched groups and unmatched names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeState {
    pub matched_groups: Vec<MatchedGroup>,
    pub unmatched_vulnerabilities: Vec<String>,
    /// Details of auditor-created groups keyed by group id.
    pub new_group_details: BTreeMap<i64, VulnerabilityDetails>,
    pub manually_added: Vec<String>,
    pub operations: Vec<MergeOperation>,
}

/// The part of the state the dashboard redraws after each change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateView {
    pub matched_groups: Vec<MatchedGroup>,
    pub unmatched_vulnerabilities: Vec<String>,
}

/// Result of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReply {
    pub success: bool,
    pub message: String,
    pub updated_state: StateView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_vulnerability: Option<NewVulnerability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewVulnerability {
    pub group_id: i64,
    pub group_name: String,
    pub risk_factor: String,
}

impl MergeState {
    pub fn from_outcome(outcome: MatchOutcome) -> Self {
        Self {
            matched_groups: outcome.matched_groups,
            unmatched_vulnerabilities: outcome.unmatched_vulnerabilities,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn view(&self) -> StateView {
        StateView {
            matched_groups: self.matched_groups.clone(),
            unmatched_vulnerabilities: self.unmatched_vulnerabilities.clone(),
        }
    }

    fn reply(&self, success: bool, message: &str) -> MergeReply {
        MergeReply {
            success,
            message: message.to_string(),
            updated_state: self.view(),
            new_vulnerability: None,
        }
    }

    fn group_index(&self, id: i64) -> Option<usize> {
        self.matched_groups.iter().position(|g| g.catalog_id == id)
    }

    #[must_use]
    pub fn group(&self, id: i64) -> Option<&MatchedGroup> {
        self.matched_groups.iter().find(|g| g.catalog_id == id)
    }

    /// First id at or below `-(groups + offset)` that no live group and no
    /// recorded details use. Merged-away groups keep their details, so their
    /// ids stay reserved.
    fn fresh_id(&self, offset: i64) -> i64 {
        let mut id = -(self.matched_groups.len() as i64) - offset;
        while self.group_index(id).is_some() || self.new_group_details.contains_key(&id) {
            id -= 1;
        }
        id
    }

    fn next_new_id(&self) -> i64 {
        self.fresh_id(1)
    }

    fn take_unmatched(&mut self, name: &str) {
        self.unmatched_vulnerabilities.retain(|n| n != name);
    }

    fn restore_unmatched(&mut self, name: &str) {
        if !self.unmatched_vulnerabilities.iter().any(|n| n == name) {
            self.unmatched_vulnerabilities.push(name.to_string());
            self.unmatched_vulnerabilities.sort();
        }
    }

    fn new_group(id: i64, details: &VulnerabilityDetails, names: Vec<String>, is_manual: bool) -> MatchedGroup {
        MatchedGroup {
            catalog_id: id,
            group_name: truncated(&details.vulnerability_name, GROUP_NAME_LIMIT),
            risk_factor: truncated(&details.risk_factor, RISK_FACTOR_LIMIT),
            cvss_score: truncated(&details.cvss_score, CVSS_SCORE_LIMIT),
            matched_vulnerabilities: names,
            is_new_group: true,
            is_manual,
        }
    }

    /// Moves one unmatched name into an existing group.
    pub fn merge_with_matched(&mut self, vulnerability: &str, target_group_id: i64) -> Result<MergeReply> {
        let Some(index) = self.group_index(target_group_id) else {
            return Err(ReportError::NotFound("Target group not found".to_string()));
        };
        let group = &mut self.matched_groups[index];
        let already_present = group.matched_vulnerabilities.iter().any(|v| v == vulnerability);
        if !already_present {
            group.matched_vulnerabilities.push(vulnerability.to_string());
        }
        self.take_unmatched(vulnerability);
        self.operations.push(MergeOperation::MergeWithMatched {
            target_group_id,
            vulnerability: vulnerability.to_string(),
            already_present,
        });
        info!(target_group_id, "Merged vulnerability into matched group");
        Ok(self.reply(true, "Vulnerability merged successfully"))
    }

    /// Creates a new group from several unmatched names.
    pub fn merge_with_unmatched(&mut self, vulnerabilities: &[String], mut details: VulnerabilityDetails) -> Result<MergeReply> {
        let Some(first) = vulnerabilities.first() else {
            return Err(ReportError::Validation("Missing required parameters".to_string()));
        };
        details.actual_vulnerability_name = Some(first.clone());
        let id = self.next_new_id();
        self.matched_groups
            .push(Self::new_group(id, &details, vulnerabilities.to_vec(), false));
        self.new_group_details.insert(id, details);
        for name in vulnerabilities {
            self.take_unmatched(name);
        }
        self.operations.push(MergeOperation::MergeWithUnmatched {
            new_group_id: id,
            vulnerabilities: vulnerabilities.to_vec(),
        });
        info!(new_group_id = id, count = vulnerabilities.len(), "Created group from unmatched vulnerabilities");
        Ok(self.reply(true, "Vulnerabilities merged into new group successfully"))
    }

    /// Gives one unmatched name its own group described by `details`.
    pub fn add_details(&mut self, vulnerability: &str, mut details: VulnerabilityDetails) -> Result<MergeReply> {
        let id = self.next_new_id();
        details.actual_vulnerability_name = Some(vulnerability.to_string());
        self.matched_groups
            .push(Self::new_group(id, &details, vec![vulnerability.to_string()], false));
        self.new_group_details.insert(id, details);
        self.take_unmatched(vulnerability);
        self.operations.push(MergeOperation::AddDetails {
            new_group_id: id,
            vulnerability: vulnerability.to_string(),
        });
        Ok(self.reply(true, "Vulnerability details added successfully"))
    }

    /// Folds the source group into the target and removes the source.
    pub fn merge_groups(&mut self, source_group_id: i64, target_group_id: i64) -> Result<MergeReply> {
        let (Some(source_index), Some(_)) = (self.group_index(source_group_id), self.group_index(target_group_id)) else {
            return Err(ReportError::NotFound("Source or target group not found".to_string()));
        };
        if source_group_id == target_group_id {
            return Err(ReportError::Validation("Cannot merge a group into itself".to_string()));
        }

        let source = self.matched_groups.remove(source_index);
        let target_index = self.group_index(target_group_id).ok_or_else(|| {
            ReportError::NotFound("Source or target group not found".to_string())
        })?;
        let target = &mut self.matched_groups[target_index];
        let mut moved = Vec::new();
        for name in &source.matched_vulnerabilities {
            if !target.matched_vulnerabilities.contains(name) {
                target.matched_vulnerabilities.push(name.clone());
                moved.push(name.clone());
            }
        }
        self.operations.push(MergeOperation::MergeMatchedGroups {
            source_index,
            source,
            target_group_id,
            moved,
        });
        info!(source_group_id, target_group_id, "Merged matched groups");
        Ok(self.reply(true, "Groups merged successfully"))
    }

    /// Adds a vulnerability the scanner did not report.
    pub fn add_manual(&mut self, mut details: VulnerabilityDetails) -> Result<MergeReply> {
        let id = self.fresh_id(MANUAL_ID_OFFSET);
        let name = details.vulnerability_name.clone();
        details.actual_vulnerability_name = Some(name.clone());
        let group = Self::new_group(id, &details, vec![name.clone()], true);
        let new_vulnerability = NewVulnerability {
            group_id: id,
            group_name: group.group_name.clone(),
            risk_factor: group.risk_factor.clone(),
        };
        self.matched_groups.push(group);
        self.new_group_details.insert(id, details);
        self.manually_added.push(name.clone());
        self.operations.push(MergeOperation::AddManual {
            new_group_id: id,
            vulnerability: name,
        });

        let mut reply = self.reply(true, "Manual vulnerability added successfully");
        reply.new_vulnerability = Some(new_vulnerability);
        Ok(reply)
    }

    /// Reverts the most recent operation.
    pub fn undo(&mut self) -> MergeReply {
        let Some(operation) = self.operations.pop() else {
            return self.reply(false, "No operations to undo");
        };

        match operation {
            MergeOperation::MergeWithMatched {
                target_group_id,
                vulnerability,
                already_present,
            } => {
                if !already_present {
                    if let Some(index) = self.group_index(target_group_id) {
                        self.matched_groups[index]
                            .matched_vulnerabilities
                            .retain(|v| *v != vulnerability);
                    }
                }
                self.restore_unmatched(&vulnerability);
            }
            MergeOperation::MergeWithUnmatched {
                new_group_id,
                vulnerabilities,
            } => {
                self.drop_new_group(new_group_id);
                for name in &vulnerabilities {
                    self.restore_unmatched(name);
                }
            }
            MergeOperation::AddDetails {
                new_group_id,
                vulnerability,
            } => {
                self.drop_new_group(new_group_id);
                self.restore_unmatched(&vulnerability);
            }
            MergeOperation::MergeMatchedGroups {
                source_index,
                source,
                target_group_id,
                moved,
            } => {
                if let Some(index) = self.group_index(target_group_id) {
                    self.matched_groups[index]
                        .matched_vulnerabilities
                        .retain(|v| !moved.contains(v));
                }
                let at = source_index.min(self.matched_groups.len());
                self.matched_groups.insert(at, source);
            }
            MergeOperation::AddManual {
                new_group_id,
                vulnerability,
            } => {
                self.drop_new_group(new_group_id);
                if let Some(pos) = self.manually_added.iter().rposition(|v| *v == vulnerability) {
                    self.manually_added.remove(pos);
                }
            }
        }

        info!(remaining = self.operations.len(), "Undid merge operation");
        self.reply(true, "Last operation undone successfully")
    }

    fn drop_new_group(&mut self, id: i64) {
        self.matched_groups.retain(|g| g.catalog_id != id);
        self.new_group_details.remove(&id);
    }

    /// Details of every auditor-created group with the names folded into it,
    /// as written back to the catalog.
    #[must_use]
    pub fn write_back_entries(&self) -> Vec<(VulnerabilityDetails, Vec<String>)> {
        self.matched_groups
            .iter()
            .filter_map(|g| {
                let details = self.new_group_details.get(&g.catalog_id)?;
                Some((details.clone(), g.matched_vulnerabilities.clone()))
            })
            .collect()
    }

    #[must_use]
    pub fn is_manual(&self, name: &str) -> bool {
        self.manually_added.iter().any(|v| v == name)
    }
}
