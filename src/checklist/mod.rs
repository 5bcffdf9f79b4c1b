//! Data-driven checklist reports.

pub mod catalog;
pub mod render;

pub use catalog::{Checklist, ChecklistRegistry, ChecklistSummary, Question, ResponseText};
pub use render::{ChecklistRow, checklist_rows, render_checklist};
