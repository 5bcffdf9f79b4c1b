use serde::{Deserialize, Serialize};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Severity bucket shared by checklists, scanner findings and the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// Case-insensitive parse; anything outside the four buckets is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(RiskLevel::Critical),
            "high" => Some(RiskLevel::High),
            "medium" => Some(RiskLevel::Medium),
            "low" => Some(RiskLevel::Low),
            _ => None,
        }
    }

    #[must_use]
    pub fn camel(self) -> &'static str {
        match self {
            RiskLevel::Critical => "Critical",
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
        }
    }

    /// Sort key for report rows, most severe first.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            RiskLevel::Critical => 1,
            RiskLevel::High => 2,
            RiskLevel::Medium => 3,
            RiskLevel::Low => 4,
        }
    }

    /// Fill colour of the risk cell as `0xRRGGBB`.
    #[must_use]
    pub fn fill(self) -> u32 {
        match self {
            RiskLevel::Critical => 0x8B_0000,
            RiskLevel::High => 0xFF_0000,
            RiskLevel::Medium => 0xFF_A500,
            RiskLevel::Low => 0x00_8000,
        }
    }
}

/// Fill used for risk text that is not one of the four buckets.
pub const UNKNOWN_RISK_FILL: u32 = 0x80_8080;

/// Priority of an unrecognised risk label; sorts after `Low`.
pub const UNKNOWN_RISK_PRIORITY: u8 = 5;

#[must_use]
pub fn risk_fill(raw: &str) -> u32 {
    RiskLevel::parse(raw).map_or(UNKNOWN_RISK_FILL, RiskLevel::fill)
}

#[must_use]
pub fn risk_priority(raw: &str) -> u8 {
    RiskLevel::parse(raw).map_or(UNKNOWN_RISK_PRIORITY, RiskLevel::priority)
}

/// Normalises a risk label: known levels become `Critical`/`High`/...,
/// anything else is capitalised.
///
/// # Examples
///
/// ```
/// use audit_reports::core::models::camel_case_risk;
///
/// assert_eq!(camel_case_risk("HIGH"), "High");
/// assert_eq!(camel_case_risk("informational"), "Informational");
/// assert_eq!(camel_case_risk(""), "");
/// ```
#[must_use]
pub fn camel_case_risk(raw: &str) -> String {
    if let Some(level) = RiskLevel::parse(raw) {
        return level.camel().to_string();
    }
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// The auditor's answer to a checklist question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Compliance,
    NonCompliance,
    #[default]
    NotApplicable,
}

impl Answer {
    /// Lenient parse of a form value; unknown or empty values mean
    /// `NotApplicable`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "compliance" | "compliant" => Answer::Compliance,
            "non_compliance" | "noncompliance" | "non_compliant" => Answer::NonCompliance,
            _ => Answer::NotApplicable,
        }
    }

    /// Key used in the checklist catalogs.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Answer::Compliance => "compliance",
            Answer::NonCompliance => "non_compliance",
            Answer::NotApplicable => "not_applicable",
        }
    }
}

/// Follow-up classification of a vulnerability name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingStatus {
    Open,
    Closed,
    New,
}

impl FindingStatus {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            FindingStatus::Open => "Open",
            FindingStatus::Closed => "Closed",
            FindingStatus::New => "New",
        }
    }
}

/// A generated file ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ReportFile {
    pub fn xlsx(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: XLSX_CONTENT_TYPE,
            bytes,
        }
    }

    pub fn docx(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: DOCX_CONTENT_TYPE,
            bytes,
        }
    }
}
