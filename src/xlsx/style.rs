//! House formats shared by every workbook writer.

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder};

use crate::core::models::risk_fill;

pub const HEADER_FILL: u32 = 0x36_6092;
pub const COMPLIANT_GREEN: u32 = 0x00_8000;

/// Calibri 12 white-on-blue header used by checklist style reports.
#[must_use]
pub fn checklist_header() -> Format {
    Format::new()
        .set_font_name("Calibri")
        .set_font_size(12)
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
}

/// Bordered, wrapped body cell; `centered` for serial, status and risk columns.
#[must_use]
pub fn checklist_cell(centered: bool) -> Format {
    let align = if centered {
        FormatAlign::Center
    } else {
        FormatAlign::Left
    };
    Format::new()
        .set_font_name("Calibri")
        .set_font_size(11)
        .set_align(align)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
}

/// White bold text on the palette colour for `risk`.
#[must_use]
pub fn risk_cell(risk: &str, font: &str) -> Format {
    Format::new()
        .set_font_name(font)
        .set_font_size(11)
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(risk_fill(risk)))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
}

/// Arial 11 header used by the scan-derived sheets.
#[must_use]
pub fn scan_header() -> Format {
    Format::new()
        .set_font_name("Arial")
        .set_font_size(11)
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
}

#[must_use]
pub fn scan_cell(centered: bool) -> Format {
    let align = if centered {
        FormatAlign::Center
    } else {
        FormatAlign::Left
    };
    Format::new()
        .set_font_name("Arial")
        .set_font_size(10)
        .set_align(align)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
}

/// Green banner written when a sheet has no non-compliant rows left.
#[must_use]
pub fn all_compliant_banner() -> Format {
    Format::new()
        .set_font_name("Calibri")
        .set_font_size(12)
        .set_bold()
        .set_font_color(Color::RGB(COMPLIANT_GREEN))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
}

/// Border style of one column in the three-wide POC block.
///
/// The block reads as a single cell: outer edges are thin, the two inner
/// vertical edges are blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PocEdge {
    First,
    Middle,
    Last,
}

#[must_use]
pub fn poc_cell(edge: PocEdge) -> Format {
    let base = Format::new()
        .set_border_top(FormatBorder::Thin)
        .set_border_bottom(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    match edge {
        PocEdge::First => base.set_border_left(FormatBorder::Thin),
        PocEdge::Middle => base,
        PocEdge::Last => base.set_border_right(FormatBorder::Thin),
    }
}
