//! Mapping evidence file names to report rows.
//!
//! Evidence screenshots are named after the checklist point they prove,
//! e.g. `17.4 session timeout.png` or `18.12_2.jpg`.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::error;

use super::archive::EvidenceImage;
use crate::xlsx::SheetModel;

#[derive(Debug, Deserialize)]
struct QuestionNumber {
    question: String,
    number: String,
}

#[derive(Debug, Deserialize)]
struct QuestionMap {
    questions: Vec<QuestionNumber>,
}

static APPLICATION_QUESTIONS: Lazy<Vec<(String, String)>> = Lazy::new(|| {
    let raw = include_str!("../../checklists/evidence-application.json");
    match serde_json::from_str::<QuestionMap>(raw) {
        Ok(map) => map
            .questions
            .into_iter()
            .map(|q| (q.question.trim().to_string(), q.number))
            .collect(),
        Err(e) => {
            error!("Failed to load application evidence questions: {}", e);
            Vec::new()
        }
    }
});

/// Naming rule for one family of evidence archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceProfile {
    /// Application security review, points `17.1` to `17.41`, rows located
    /// by question text.
    Application,
    /// Internet banking review, points `18.1` to `18.29`, point `N` sits on
    /// row `N + 1`.
    InternetBanking,
}

impl EvidenceProfile {
    /// Resolves the profile named in a request path.
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug.trim().to_ascii_lowercase().as_str() {
            "application" => Some(EvidenceProfile::Application),
            "internet-banking" | "internet_banking" => Some(EvidenceProfile::InternetBanking),
            _ => None,
        }
    }

    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            EvidenceProfile::Application => "application",
            EvidenceProfile::InternetBanking => "internet-banking",
        }
    }

    #[must_use]
    pub fn prefix(self) -> u32 {
        match self {
            EvidenceProfile::Application => 17,
            EvidenceProfile::InternetBanking => 18,
        }
    }

    #[must_use]
    pub fn max_point(self) -> u32 {
        match self {
            EvidenceProfile::Application => 41,
            EvidenceProfile::InternetBanking => 29,
        }
    }

    /// Point number encoded in an evidence file stem.
    ///
    /// The stem is cut at the first space and then the first underscore; the
    /// remainder must read `prefix.N` with `N` inside the profile's range.
    ///
    /// # Examples
    ///
    /// ```
    /// use audit_reports::evidence::EvidenceProfile;
    ///
    /// let profile = EvidenceProfile::Application;
    /// assert_eq!(profile.point_number("17.4 session timeout"), Some(4));
    /// assert_eq!(profile.point_number("17.04_b"), Some(4));
    /// assert_eq!(profile.point_number("18.4"), None);
    /// assert_eq!(profile.point_number("17.42"), None);
    /// ```
    #[must_use]
    pub fn point_number(self, stem: &str) -> Option<u32> {
        let head = stem.trim().split(' ').next()?;
        let head = head.split('_').next()?;
        let (prefix, rest) = head.split_once('.')?;
        if prefix.trim().parse::<u32>().ok()? != self.prefix() {
            return None;
        }
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        let n = digits.parse::<u32>().ok()?;
        (1..=self.max_point()).contains(&n).then_some(n)
    }

    /// `prefix.N` label for the stem, e.g. `17.4`.
    #[must_use]
    pub fn base_number(self, stem: &str) -> Option<String> {
        self.point_number(stem)
            .map(|n| format!("{}.{}", self.prefix(), n))
    }

    /// 0-based row that holds point `n` in `sheet`.
    #[must_use]
    pub fn row_for(self, sheet: &SheetModel, header_row: usize, n: u32) -> Option<usize> {
        match self {
            EvidenceProfile::InternetBanking => Some(n as usize),
            EvidenceProfile::Application => {
                let label = format!("{}.{}", self.prefix(), n);
                let question = APPLICATION_QUESTIONS
                    .iter()
                    .find(|(_, number)| *number == label)
                    .map(|(q, _)| q.as_str())?;
                find_question_row(sheet, header_row, question)
            }
        }
    }
}

/// Locates the row whose column B holds `question`: an exact match first,
/// then containment in either direction.
#[must_use]
pub fn find_question_row(sheet: &SheetModel, header_row: usize, question: &str) -> Option<usize> {
    let wanted = question.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    let candidates = || {
        (header_row + 1..sheet.row_count()).filter_map(|r| {
            let text = sheet.cell(r, 1).trim().to_lowercase();
            (!text.is_empty()).then_some((r, text))
        })
    };

    candidates()
        .find(|(_, text)| *text == wanted)
        .or_else(|| candidates().find(|(_, text)| text.contains(&wanted) || wanted.contains(text.as_str())))
        .map(|(r, _)| r)
}

/// Evidence images that share one point number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceGroup {
    pub point: u32,
    pub label: String,
    pub images: Vec<EvidenceImage>,
}

/// Groups images by point number, in ascending point order.
///
/// Images whose names carry no valid point are dropped. Within a group
/// archive order is kept.
#[must_use]
pub fn group_by_base_number(images: Vec<EvidenceImage>, profile: EvidenceProfile) -> Vec<EvidenceGroup> {
    let mut groups: BTreeMap<u32, Vec<EvidenceImage>> = BTreeMap::new();
    for image in images {
        if let Some(n) = profile.point_number(&image.stem) {
            groups.entry(n).or_default().push(image);
        }
    }
    groups
        .into_iter()
        .map(|(point, images)| EvidenceGroup {
            point,
            label: format!("{}.{}", profile.prefix(), point),
            images,
        })
        .collect()
}
