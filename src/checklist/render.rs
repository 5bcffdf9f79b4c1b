use std::collections::HashMap;

use rust_xlsxwriter::Workbook;
use tracing::info;

use super::catalog::Checklist;
use crate::core::models::Answer;
use crate::errors::Result;
use crate::xlsx::style;

pub const HEADERS: [&str; 8] = [
    "Sr. No.",
    "Questionnaire/Points",
    "Compliance/Non-Compliance/Not Applicable",
    "Observation (Short/Brief)",
    "Risk Factor",
    "Observation",
    "Impact",
    "Recommendation",
];

pub const COLUMN_WIDTHS: [f64; 8] = [10.0, 50.0, 20.0, 30.0, 20.0, 50.0, 50.0, 50.0];
const ROW_HEIGHT: f64 = 30.0;
const NOT_APPLICABLE: &str = "Not Applicable";

/// Values of one rendered checklist row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistRow {
    pub serial: usize,
    pub question: String,
    pub status: String,
    pub brief: String,
    pub risk: String,
    pub observation: String,
    pub impact: String,
    pub recommendation: String,
}

impl ChecklistRow {
    /// Cells in column order A..H.
    #[must_use]
    pub fn cells(&self) -> [String; 8] {
        [
            self.serial.to_string(),
            self.question.clone(),
            self.status.clone(),
            self.brief.clone(),
            self.risk.clone(),
            self.observation.clone(),
            self.impact.clone(),
            self.recommendation.clone(),
        ]
    }
}

fn or_not_applicable(text: Option<&str>) -> String {
    match text {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => NOT_APPLICABLE.to_string(),
    }
}

/// Resolves every question against the submitted answers.
///
/// A field missing from `answers` is treated as not applicable; an answer
/// whose narrative is absent from the catalog renders as "Not Applicable".
#[must_use]
pub fn checklist_rows(checklist: &Checklist, answers: &HashMap<String, String>) -> Vec<ChecklistRow> {
    checklist
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let answer = answers
                .get(&q.field)
                .map_or(Answer::NotApplicable, |v| Answer::parse(v));
            let response = q.response(answer);
            ChecklistRow {
                serial: i + 1,
                question: q.question.clone(),
                status: or_not_applicable(response.map(|r| r.status.as_str())),
                brief: or_not_applicable(response.map(|r| r.brief.as_str())),
                risk: q.risk.clone(),
                observation: or_not_applicable(response.map(|r| r.observation.as_str())),
                impact: or_not_applicable(response.map(|r| r.impact.as_str())),
                recommendation: or_not_applicable(response.map(|r| r.recommendation.as_str())),
            }
        })
        .collect()
}

/// Renders a checklist into a single-sheet workbook.
///
/// # Arguments
///
/// * `checklist` - Catalog describing the questions and canned narratives
/// * `answers` - Form values keyed by question field
///
/// # Returns
///
/// The `.xlsx` bytes, one row per question below the header.
#[tracing::instrument(level = "info", skip_all, fields(checklist = %checklist.id))]
pub fn render_checklist(checklist: &Checklist, answers: &HashMap<String, String>) -> Result<Vec<u8>> {
    let rows = checklist_rows(checklist, answers);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(&checklist.sheet_title)?;

    let header = style::checklist_header();
    for (col, title) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }
    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }

    let centered = style::checklist_cell(true);
    let left = style::checklist_cell(false);

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, value) in row.cells().iter().enumerate() {
            let col = col as u16;
            match col {
                4 => {
                    let risk = style::risk_cell(value, "Calibri");
                    sheet.write_string_with_format(r, col, value, &risk)?
                }
                0 | 2 => sheet.write_string_with_format(r, col, value, &centered)?,
                _ => sheet.write_string_with_format(r, col, value, &left)?,
            };
        }
        sheet.set_row_height(r, ROW_HEIGHT)?;
    }

    info!(rows = rows.len(), "Rendered checklist workbook");
    Ok(workbook.save_to_buffer()?)
}
