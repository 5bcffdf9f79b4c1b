//! Cell values of an uploaded workbook, laid out at absolute positions.

use std::io::Cursor;

use calamine::{Data, DataType, Reader, open_workbook_auto_from_rs};
use tracing::{debug, warn};

use crate::errors::{ReportError, Result};

/// One worksheet as a dense grid of display strings.
///
/// `rows[r][c]` is cell `(r, c)` with `(0, 0)` being `A1`, whatever the used
/// range of the source sheet was. Missing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetModel {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl SheetModel {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map_or("", String::as_str)
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Finds the first column of `header_row` whose trimmed text satisfies
    /// `predicate`.
    pub fn find_column<P>(&self, header_row: usize, predicate: P) -> Option<usize>
    where
        P: Fn(&str) -> bool,
    {
        self.rows
            .get(header_row)?
            .iter()
            .position(|h| predicate(h.trim()))
    }

    /// Column whose header equals `name`, ignoring case and surrounding space.
    #[must_use]
    pub fn column_named(&self, header_row: usize, name: &str) -> Option<usize> {
        self.find_column(header_row, |h| h.eq_ignore_ascii_case(name))
    }

    /// Row whose column A reads like a `Sr. No.` header, searched within the
    /// first ten rows.
    #[must_use]
    pub fn serial_header_row(&self) -> Option<usize> {
        (0..self.rows.len().min(10)).find(|&r| is_serial_header(self.cell(r, 0)))
    }

    /// Index of the last row whose column `col` is non-empty.
    #[must_use]
    pub fn last_filled_row(&self, col: usize) -> Option<usize> {
        (0..self.rows.len())
            .rev()
            .find(|&r| !self.cell(r, col).trim().is_empty())
    }
}

/// Every sheet of a workbook, in tab order.
#[derive(Debug, Clone, Default)]
pub struct WorkbookModel {
    pub sheets: Vec<SheetModel>,
}

impl WorkbookModel {
    /// Reads all sheet values from an `.xlsx` buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Workbook`] if the buffer is not a readable
    /// workbook. A single unreadable sheet is logged and kept as empty.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let names = workbook.sheet_names();
        let mut sheets = Vec::with_capacity(names.len());

        for name in names {
            let range = match workbook.worksheet_range(&name) {
                Ok(range) => range,
                Err(e) => {
                    warn!(sheet = %name, "Failed to read worksheet range: {}", e);
                    sheets.push(SheetModel::new(name, Vec::new()));
                    continue;
                }
            };

            let (start_row, start_col) = range.start().unwrap_or((0, 0));
            let mut rows: Vec<Vec<String>> = vec![Vec::new(); start_row as usize];
            for source in range.rows() {
                let mut row = vec![String::new(); start_col as usize];
                row.extend(source.iter().map(cell_text));
                trim_trailing_empty(&mut row);
                rows.push(row);
            }
            while rows.last().is_some_and(Vec::is_empty) {
                rows.pop();
            }

            debug!(sheet = %name, rows = rows.len(), "Loaded worksheet");
            sheets.push(SheetModel::new(name, rows));
        }

        Ok(Self { sheets })
    }

    #[must_use]
    pub fn sheet(&self, name: &str) -> Option<&SheetModel> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// First sheet, or a workbook error when there is none.
    pub fn first_sheet(&self) -> Result<&SheetModel> {
        self.sheets
            .first()
            .ok_or_else(|| ReportError::Workbook("workbook has no worksheets".to_string()))
    }
}

/// Display text of a calamine cell.
///
/// Whole floats lose the `.0` Excel adds to integers typed into a cell, and
/// date serials become `YYYY-MM-DD` (plus time when it is not midnight).
#[must_use]
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(v) => v.to_string(),
        Data::Float(v) => format_number(*v),
        Data::Bool(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) if dt.time() == chrono::NaiveTime::MIN => dt.format("%Y-%m-%d").to_string(),
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => cell.to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    }
}

/// Whether a cell reads like `Sr. No.`, `Sr No` or `SR.NO`.
#[must_use]
pub fn is_serial_header(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("sr") && lower.contains("no")
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

fn trim_trailing_empty(row: &mut Vec<String>) {
    while row.last().is_some_and(|c| c.is_empty()) {
        row.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_drop_integral_fraction() {
        assert_eq!(cell_text(&Data::Float(17.0)), "17");
        assert_eq!(cell_text(&Data::Float(7.5)), "7.5");
        assert_eq!(cell_text(&Data::Int(3)), "3");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    #[test]
    fn sheet_lookup_helpers() {
        let sheet = SheetModel::new(
            "S",
            vec![
                vec!["Sr. No.".into(), " Name of Vulnerability ".into()],
                vec!["1".into(), "SSL".into()],
                vec![String::new(), String::new()],
            ],
        );
        assert_eq!(sheet.column_named(0, "name of vulnerability"), Some(1));
        assert_eq!(sheet.last_filled_row(0), Some(1));
        assert_eq!(sheet.cell(9, 9), "");
        assert_eq!(sheet.column_count(), 2);
    }
}
