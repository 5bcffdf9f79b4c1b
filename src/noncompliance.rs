//! Asset review reduction: keep only the non-compliant points of a
//! reviewed checklist workbook, with their evidence.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet};
use tracing::{info, warn};

use crate::checklist::render::COLUMN_WIDTHS;
use crate::errors::Result;
use crate::xlsx::style;
use crate::xlsx::{AnchoredImage, SheetModel, TableLayout, WorkbookModel, read_anchored_images, write_table};

pub const OUTPUT_FILE_NAME: &str = "Asset_Review_Non_Compliance_Points.xlsx";
pub const SUMMARY_FILE_NAME: &str = "Asset_Review_Processing_Summary.xlsx";
pub const ALL_COMPLIANT_MESSAGE: &str = "As per Auditor's observation All the points are compliance.";

/// Column judged by the filter (`C`).
const STATUS_COL: usize = 2;
/// POC columns `I`, `J`, `K`.
const POC_COLS: [u16; 3] = [8, 9, 10];
const BANNER_ROW: u32 = 2;
const BANNER_LAST_COL: u16 = 10;
const COMPACT_ROW_LIMIT: usize = 60;
const COMPACT_ROW_HEIGHT: f64 = 15.0;
const ROW_HEIGHT: f64 = 30.0;

/// Whether a status cell marks a row worth keeping.
///
/// Multi-valued cells (`Compliance/Non-Compliance`, `a, b`, ...) are kept
/// whatever they say, which also keeps the header row.
///
/// # Examples
///
/// ```
/// use audit_reports::noncompliance::should_keep_row;
///
/// assert!(should_keep_row("Non-Compliance"));
/// assert!(should_keep_row(" noncompliance "));
/// assert!(should_keep_row("Compliance/Non-Compliance/Not Applicable"));
/// assert!(!should_keep_row("Compliance"));
/// assert!(!should_keep_row(""));
/// ```
#[must_use]
pub fn should_keep_row(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    if value.contains(['/', '\\', '|', ',']) {
        return true;
    }
    matches!(value.to_lowercase().as_str(), "non-compliance" | "noncompliance")
}

fn mentions_non_compliance(value: &str) -> bool {
    let lower = value.to_lowercase();
    lower.contains("non-compliance") || lower.contains("noncompliance")
}

/// Row an image anchored at `row` moves to once `deleted` rows are gone.
///
/// # Examples
///
/// ```
/// use audit_reports::noncompliance::repositioned_row;
///
/// assert_eq!(repositioned_row(10, &[2, 5, 12]), 8);
/// assert_eq!(repositioned_row(1, &[2, 5]), 1);
/// ```
#[must_use]
pub fn repositioned_row(row: u32, deleted: &[u32]) -> u32 {
    let before = deleted.iter().filter(|&&d| d < row).count() as u32;
    row - before
}

/// Drops images on deleted rows and moves the rest up.
///
/// Images anchored to a deleted row go with it, whether they sit in the
/// POC columns or elsewhere.
#[must_use]
pub fn reposition_images(images: &[AnchoredImage], deleted: &BTreeSet<u32>) -> Vec<AnchoredImage> {
    let sorted: Vec<u32> = deleted.iter().copied().collect();
    images
        .iter()
        .filter(|img| {
            if deleted.contains(&img.row) {
                if !POC_COLS.contains(&img.col) {
                    warn!(row = img.row, col = img.col, "Dropping non-POC image on removed row");
                }
                false
            } else {
                true
            }
        })
        .map(|img| AnchoredImage {
            row: repositioned_row(img.row, &sorted),
            ..img.clone()
        })
        .collect()
}

/// Rewrites column A as 1..n over its non-empty cells, below the header
/// when `A1` is a serial-number title.
pub fn renumber_serials(sheet: &mut SheetModel) {
    let start = usize::from(crate::xlsx::reader::is_serial_header(sheet.cell(0, 0)));
    let mut next = 1;
    for row in sheet.rows.iter_mut().skip(start) {
        if let Some(cell) = row.first_mut() {
            if !cell.trim().is_empty() {
                *cell = next.to_string();
                next += 1;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SheetSummary {
    pub name: String,
    pub original_rows: usize,
    pub filtered_rows: usize,
    pub rows_removed: usize,
    pub non_compliance_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessingSummary {
    pub sheets: Vec<SheetSummary>,
    pub total_rows_before: usize,
    pub total_rows_after: usize,
    pub rows_removed: usize,
    pub non_compliance_rows_found: usize,
}

/// A sheet after filtering, ready to be written.
#[derive(Debug, Clone)]
pub struct FilteredSheet {
    pub model: SheetModel,
    pub images: Vec<AnchoredImage>,
    /// No non-compliance in `C2:C10`; the sheet gets the compliance banner.
    pub all_compliant: bool,
}

/// Applies the row filter to one sheet.
#[must_use]
pub fn filter_sheet(sheet: &SheetModel, images: &[AnchoredImage]) -> (FilteredSheet, SheetSummary) {
    let mut kept = Vec::new();
    let mut deleted = BTreeSet::new();
    for (r, row) in sheet.rows.iter().enumerate() {
        let status = row.get(STATUS_COL).map_or("", String::as_str);
        if should_keep_row(status) {
            kept.push(row.clone());
        } else {
            deleted.insert(r as u32);
        }
    }

    let mut model = SheetModel::new(sheet.name.clone(), kept);
    if !deleted.is_empty() {
        renumber_serials(&mut model);
    }
    let images = reposition_images(images, &deleted);

    let all_compliant = !(1..10).any(|r| mentions_non_compliance(model.cell(r, STATUS_COL)));

    let summary = SheetSummary {
        name: sheet.name.clone(),
        original_rows: sheet.row_count(),
        filtered_rows: model.row_count(),
        rows_removed: deleted.len(),
        non_compliance_rows: model.row_count(),
    };
    (
        FilteredSheet {
            model,
            images,
            all_compliant,
        },
        summary,
    )
}

fn write_filtered_sheet(sheet: &mut Worksheet, filtered: &FilteredSheet) -> Result<()> {
    let model = &filtered.model;
    let header_row = model.serial_header_row().unwrap_or(0);
    write_table(sheet, model, &TableLayout::detect(model, header_row))?;

    let width = model.column_count().max(usize::from(BANNER_LAST_COL) + 1);
    for col in 0..width {
        let w = COLUMN_WIDTHS.get(col).copied().unwrap_or(if (8..=10).contains(&col) {
            12.0
        } else {
            20.0
        });
        sheet.set_column_width(col as u16, w)?;
    }

    for r in 0..model.row_count() {
        let compact = (1..COMPACT_ROW_LIMIT).contains(&r) && model.cell(r, 0).trim().is_empty();
        let height = if compact { COMPACT_ROW_HEIGHT } else { ROW_HEIGHT };
        sheet.set_row_height(r as u32, height)?;
    }

    if filtered.all_compliant {
        sheet.merge_range(
            BANNER_ROW,
            0,
            BANNER_ROW,
            BANNER_LAST_COL,
            ALL_COMPLIANT_MESSAGE,
            &style::all_compliant_banner(),
        )?;
        sheet.set_row_height(BANNER_ROW, ROW_HEIGHT)?;
    }

    for image in &filtered.images {
        if let Err(e) = image.insert_at(sheet, image.row, image.col) {
            warn!(row = image.row, col = image.col, "Failed to re-insert image: {}", e);
        }
    }
    Ok(())
}

/// Filters every sheet of an asset review workbook.
///
/// # Returns
///
/// The filtered workbook bytes and the per-sheet statistics.
#[tracing::instrument(level = "info", skip_all)]
pub fn filter_workbook(bytes: &[u8]) -> Result<(Vec<u8>, ProcessingSummary)> {
    let model = WorkbookModel::from_bytes(bytes)?;
    let images = read_anchored_images(bytes).unwrap_or_else(|e| {
        warn!("Could not read anchored images: {}", e);
        Default::default()
    });

    let mut workbook = Workbook::new();
    let mut summary = ProcessingSummary::default();

    for source in &model.sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(&source.name)?;

        if source.row_count() == 0 {
            warn!(sheet = %source.name, "Sheet is empty, copying as is");
            continue;
        }

        let sheet_images = images.get(&source.name).map_or(&[][..], Vec::as_slice);
        let (filtered, sheet_summary) = filter_sheet(source, sheet_images);
        write_filtered_sheet(sheet, &filtered)?;

        info!(
            sheet = %source.name,
            before = sheet_summary.original_rows,
            after = sheet_summary.filtered_rows,
            "Filtered sheet"
        );
        summary.total_rows_before += sheet_summary.original_rows;
        summary.total_rows_after += sheet_summary.filtered_rows;
        summary.rows_removed += sheet_summary.rows_removed;
        summary.non_compliance_rows_found += sheet_summary.non_compliance_rows;
        summary.sheets.push(sheet_summary);
    }

    Ok((workbook.save_to_buffer()?, summary))
}

const PROCESSING_NOTES: [&str; 5] = [
    "• Only rows with 'Non-Compliance' values or multiple entries in Column C were retained",
    "• Valid Non-Compliance variations include: Non-Compliance, Non-compliance, non-Compliance, Noncompliance, noncompliance, NonCompliance",
    "• Rows with multiple entries (like 'Compliance/Non-Compliance') were kept regardless of content",
    "• All other single-entry rows were removed along with their associated POC images in columns I, J, K",
    "• Serial numbers in Column A were renumbered and remaining images moved up with their rows",
];

/// Renders the "Processing Summary" workbook for a filter run.
pub fn summary_workbook(summary: &ProcessingSummary, generated_at: NaiveDateTime) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Processing Summary")?;

    let title = Format::new()
        .set_font_name("Calibri")
        .set_font_size(14)
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(style::HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let subheader = Format::new().set_font_name("Calibri").set_font_size(12).set_bold();
    let table_header = subheader
        .clone()
        .set_background_color(Color::RGB(style::HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let data = Format::new().set_font_name("Calibri").set_font_size(11);

    sheet.merge_range(0, 0, 0, 3, "Asset Review Non Compliance Points - Processing Summary", &title)?;
    sheet.write_string_with_format(
        1,
        0,
        format!("Generated on: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        &data,
    )?;

    let mut row: u32 = 3;
    sheet.write_string_with_format(row, 0, "Overall Processing Statistics:", &subheader)?;
    row += 2;

    let stats = [
        ("Total Sheets Processed:", summary.sheets.len()),
        ("Total Rows Before Processing:", summary.total_rows_before),
        ("Total Rows After Processing:", summary.total_rows_after),
        ("Total Rows Removed:", summary.rows_removed),
        ("Total Non-Compliance Rows Found:", summary.non_compliance_rows_found),
    ];
    for (label, value) in stats {
        sheet.write_string_with_format(row, 0, label, &data)?;
        sheet.write_number_with_format(row, 1, value as f64, &data)?;
        row += 1;
    }

    row += 2;
    sheet.write_string_with_format(row, 0, "Sheet-wise Processing Breakdown:", &subheader)?;
    row += 2;

    let headers = ["Sheet Name", "Original Rows", "Filtered Rows", "Rows Removed", "Non-Compliance Rows"];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(row, col as u16, *header, &table_header)?;
    }
    row += 1;

    for s in &summary.sheets {
        sheet.write_string_with_format(row, 0, &s.name, &data)?;
        let counts = [s.original_rows, s.filtered_rows, s.rows_removed, s.non_compliance_rows];
        for (i, count) in counts.iter().enumerate() {
            sheet.write_number_with_format(row, (i + 1) as u16, *count as f64, &data)?;
        }
        row += 1;
    }

    row += 2;
    sheet.write_string_with_format(row, 0, "Processing Notes:", &subheader)?;
    row += 2;
    for note in PROCESSING_NOTES {
        sheet.write_string_with_format(row, 0, note, &data)?;
        row += 1;
    }

    for (col, width) in [30.0, 15.0, 15.0, 15.0, 20.0].iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }

    Ok(workbook.save_to_buffer()?)
}
