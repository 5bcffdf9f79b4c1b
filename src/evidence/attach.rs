//! Placing evidence screenshots into a checklist workbook.

use rust_xlsxwriter::{Image, Workbook, Worksheet};
use tracing::{info, warn};

use super::archive::{EvidenceImage, extract_images};
use super::naming::{EvidenceProfile, group_by_base_number};
use crate::checklist::render::COLUMN_WIDTHS;
use crate::errors::{ReportError, Result};
use crate::xlsx::style::{self, PocEdge};
use crate::xlsx::{AnchoredImage, SheetModel, TableLayout, WorkbookModel, read_anchored_images, write_table};

/// First POC column (`I`), 0-based.
pub const POC_FIRST_COL: u16 = 8;
/// Number of POC columns (`I`, `J`, `K`).
pub const POC_COLUMNS: u16 = 3;
/// Fill order of the POC columns: `J`, `K`, then `I`.
pub const POC_FILL_ORDER: [u16; 3] = [9, 10, 8];

const POC_COLUMN_WIDTH: f64 = 12.0;
const OTHER_COLUMN_WIDTH: f64 = 20.0;
const ROW_HEIGHT: f64 = 30.0;
const THUMB_HEIGHT_PX: f64 = 25.0;
const CELL_BOX_WIDTH_PX: f64 = 96.0;
const CELL_BOX_HEIGHT_PX: f64 = 25.0;

/// Result of an evidence run.
#[derive(Debug, Clone)]
pub struct AttachOutcome {
    pub bytes: Vec<u8>,
    /// Number of screenshots written into the workbook.
    pub placed: usize,
    /// Point labels that had evidence but no matching row.
    pub unmatched_points: Vec<String>,
}

/// Output column of a source column once the POC block is inserted.
#[must_use]
pub fn shifted_col(col: usize) -> u16 {
    let col = u16::try_from(col).unwrap_or(u16::MAX - POC_COLUMNS);
    if col >= POC_FIRST_COL {
        col + POC_COLUMNS
    } else {
        col
    }
}

/// Thumbnail of a screenshot, 25 px high and centered in a 96 x 25 px box.
///
/// Returns the image with its horizontal and vertical offsets.
fn thumbnail(image: &EvidenceImage) -> Result<(Image, u32, u32)> {
    let source = Image::new_from_buffer(&image.data)?;
    if source.height() <= 0.0 {
        return Err(ReportError::Workbook(format!("image '{}' has no height", image.path)));
    }
    let scale = THUMB_HEIGHT_PX / source.height();
    let width = source.width() * scale;
    let x = ((CELL_BOX_WIDTH_PX - width) / 2.0).max(0.0).round() as u32;
    let y = ((CELL_BOX_HEIGHT_PX - THUMB_HEIGHT_PX) / 2.0).max(0.0).round() as u32;
    Ok((source.set_scale_width(scale).set_scale_height(scale), x, y))
}

fn write_poc_block(sheet: &mut Worksheet, model: &SheetModel, header_row: usize) -> Result<()> {
    let header_row = header_row as u32;
    sheet.merge_range(
        header_row,
        POC_FIRST_COL,
        header_row,
        POC_FIRST_COL + POC_COLUMNS - 1,
        "POC",
        &style::checklist_header(),
    )?;

    let edges = [PocEdge::First, PocEdge::Middle, PocEdge::Last];
    for r in (header_row as usize + 1)..model.row_count() {
        for (i, edge) in edges.iter().enumerate() {
            sheet.write_blank(r as u32, POC_FIRST_COL + i as u16, &style::poc_cell(*edge))?;
        }
    }
    Ok(())
}

fn set_widths(sheet: &mut Worksheet, model: &SheetModel) -> Result<()> {
    let total = shifted_col(model.column_count().max(8)).max(POC_FIRST_COL + POC_COLUMNS);
    for col in 0..total {
        let width = if (POC_FIRST_COL..POC_FIRST_COL + POC_COLUMNS).contains(&col) {
            POC_COLUMN_WIDTH
        } else {
            COLUMN_WIDTHS
                .get(col as usize)
                .copied()
                .unwrap_or(OTHER_COLUMN_WIDTH)
        };
        sheet.set_column_width(col, width)?;
    }
    Ok(())
}

fn copy_existing_images(sheet: &mut Worksheet, images: &[AnchoredImage], shift: bool) -> Result<()> {
    for image in images {
        let col = if shift {
            shifted_col(usize::from(image.col))
        } else {
            image.col
        };
        if let Err(e) = image.insert_at(sheet, image.row, col) {
            warn!(row = image.row, col = image.col, "Failed to carry over existing image: {}", e);
        }
    }
    Ok(())
}

/// Adds `POC` columns to the first worksheet and fills them with the
/// screenshots from `zip_bytes`.
///
/// Screenshots are grouped by the point number in their file names; each
/// group goes on the row the profile maps it to, at most three per row.
/// Remaining worksheets are copied through unchanged.
///
/// # Errors
///
/// Fails when either upload cannot be read or the workbook cannot be
/// written. Individual images that cannot be decoded are skipped.
#[tracing::instrument(level = "info", skip(workbook_bytes, zip_bytes))]
pub fn attach_evidence(
    workbook_bytes: &[u8],
    zip_bytes: &[u8],
    profile: EvidenceProfile,
) -> Result<AttachOutcome> {
    let model = WorkbookModel::from_bytes(workbook_bytes)?;
    let existing = read_anchored_images(workbook_bytes).unwrap_or_else(|e| {
        warn!("Could not read existing images: {}", e);
        Default::default()
    });
    let groups = group_by_base_number(extract_images(zip_bytes)?, profile);
    info!(groups = groups.len(), "Grouped evidence images");

    let mut workbook = Workbook::new();
    let mut placed = 0;
    let mut unmatched_points = Vec::new();

    for (index, source) in model.sheets.iter().enumerate() {
        let sheet = workbook.add_worksheet();
        sheet.set_name(&source.name)?;
        let images = existing.get(&source.name).map_or(&[][..], Vec::as_slice);

        if index > 0 {
            let layout = TableLayout::detect(source, source.serial_header_row().unwrap_or(0));
            write_table(sheet, source, &layout)?;
            copy_existing_images(sheet, images, false)?;
            continue;
        }

        let header_row = source.serial_header_row().unwrap_or(0);
        let target_col = |c: usize| shifted_col(c);
        let layout = TableLayout {
            target_col: &target_col,
            ..TableLayout::detect(source, header_row)
        };
        write_table(sheet, source, &layout)?;
        write_poc_block(sheet, source, header_row)?;
        set_widths(sheet, source)?;
        for r in 0..source.row_count().max(header_row + 1) {
            sheet.set_row_height(r as u32, ROW_HEIGHT)?;
        }
        copy_existing_images(sheet, images, true)?;

        for group in &groups {
            let Some(row) = profile.row_for(source, header_row, group.point) else {
                warn!(point = %group.label, "No row found for evidence point");
                unmatched_points.push(group.label.clone());
                continue;
            };
            for (image, col) in group.images.iter().zip(POC_FILL_ORDER) {
                match thumbnail(image) {
                    Ok((thumb, x, y)) => {
                        sheet.insert_image_with_offset(row as u32, col, &thumb, x, y)?;
                        placed += 1;
                    }
                    Err(e) => warn!(file = %image.path, "Skipping unreadable evidence image: {}", e),
                }
            }
            if group.images.len() > POC_FILL_ORDER.len() {
                warn!(
                    point = %group.label,
                    dropped = group.images.len() - POC_FILL_ORDER.len(),
                    "More than three images for one point"
                );
            }
        }
    }

    info!(placed, unmatched = unmatched_points.len(), "Evidence attached");
    Ok(AttachOutcome {
        bytes: workbook.save_to_buffer()?,
        placed,
        unmatched_points,
    })
}

/// `<stem>_with_POC.xlsx` for an uploaded workbook name.
#[must_use]
pub fn output_file_name(uploaded: &str) -> String {
    let base = uploaded.rsplit(['/', '\\']).next().unwrap_or(uploaded);
    let stem = base.rsplit_once('.').map_or(base, |(s, _)| s);
    let stem = if stem.is_empty() { "Evidence" } else { stem };
    format!("{}_with_POC.xlsx", stem)
}
