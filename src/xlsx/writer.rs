//! Writing a [`SheetModel`] back out in the house style.

use rust_xlsxwriter::{Format, Worksheet};

use super::reader::SheetModel;
use super::style;
use crate::errors::Result;

/// How a re-rendered table sheet is laid out.
pub struct TableLayout<'a> {
    /// Row holding the column titles; earlier rows are written unstyled.
    pub header_row: usize,
    /// Column holding risk ratings, painted with the risk palette.
    pub risk_col: Option<usize>,
    /// Source columns rendered centered.
    pub centered_cols: &'a [usize],
    /// Maps a source column to its output column.
    pub target_col: &'a dyn Fn(usize) -> u16,
}

impl TableLayout<'_> {
    /// Layout with headers on `header_row`, risk detection and no column shift.
    #[must_use]
    pub fn detect(model: &SheetModel, header_row: usize) -> TableLayout<'static> {
        TableLayout {
            header_row,
            risk_col: model.find_column(header_row, |h| h.to_lowercase().contains("risk")),
            centered_cols: &[0, 2],
            target_col: &identity_col,
        }
    }
}

fn identity_col(col: usize) -> u16 {
    u16::try_from(col).unwrap_or(u16::MAX)
}

/// Writes every row of `model` into `sheet`.
///
/// Rows from the header down become a bordered table; integers in column A
/// stay numeric so serial numbers keep sorting correctly.
pub fn write_table(sheet: &mut Worksheet, model: &SheetModel, layout: &TableLayout<'_>) -> Result<()> {
    let header = style::checklist_header();
    let centered = style::checklist_cell(true);
    let left = style::checklist_cell(false);
    let plain = Format::new().set_bold();
    let width = model.column_count();

    for (r, row) in model.rows.iter().enumerate() {
        let out_row = r as u32;
        let in_table = r >= layout.header_row;

        for c in 0..width {
            let value = row.get(c).map_or("", String::as_str);
            let col = (layout.target_col)(c);

            if !in_table {
                if !value.is_empty() {
                    sheet.write_string_with_format(out_row, col, value, &plain)?;
                }
                continue;
            }

            let format = if r == layout.header_row {
                header.clone()
            } else if Some(c) == layout.risk_col && !value.trim().is_empty() {
                style::risk_cell(value, "Calibri")
            } else if layout.centered_cols.contains(&c) {
                centered.clone()
            } else {
                left.clone()
            };

            if value.is_empty() {
                sheet.write_blank(out_row, col, &format)?;
            } else if c == 0 && r > layout.header_row && value.parse::<u32>().is_ok() {
                let n: f64 = value.parse().unwrap_or_default();
                sheet.write_number_with_format(out_row, col, n, &format)?;
            } else {
                sheet.write_string_with_format(out_row, col, value, &format)?;
            }
        }
    }
    Ok(())
}
