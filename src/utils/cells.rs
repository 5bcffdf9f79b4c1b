//! Cell text helpers.

use rust_xlsxwriter::{Format, Worksheet, XlsxError};

/// Maximum number of characters Excel accepts in one cell.
pub const MAX_CELL_CHARS: usize = 32_767;

const FORMULA_PREFIXES: [char; 6] = ['=', '+', '-', '@', '\t', '\r'];

const DANGEROUS_TOKENS: [&str; 8] = [
    "CMD",
    "POWERSHELL",
    "RUNDLL32",
    "REGSVR32",
    "HYPERLINK",
    "IMPORTXML",
    "WEBSERVICE",
    "FILTERXML",
];

/// Whether a spreadsheet application could evaluate `value`: it starts like
/// a formula or mentions a shell or web-fetching function.
#[must_use]
pub fn needs_quote_prefix(value: &str) -> bool {
    let upper = value.to_uppercase();
    (value.chars().count() > 1 && value.starts_with(FORMULA_PREFIXES))
        || DANGEROUS_TOKENS.iter().any(|t| upper.contains(t))
}

/// Strips NUL and truncates to the Excel cell limit. The text is otherwise
/// kept as is, so it reads back unchanged.
#[must_use]
pub fn clean_cell_value(value: &str) -> String {
    truncate_chars(&value.replace('\0', ""), MAX_CELL_CHARS)
}

/// `format` with Excel's quote prefix set when `value` needs one.
///
/// The prefix lives in the cell style, not in the text.
#[must_use]
pub fn text_format(value: &str, format: &Format) -> Format {
    if needs_quote_prefix(value) {
        format.clone().set_quote_prefix()
    } else {
        format.clone()
    }
}

/// Writes scan or auditor text that must not be evaluated.
///
/// # Examples
///
/// ```
/// use audit_reports::utils::cells::write_text;
/// use rust_xlsxwriter::{Format, Workbook};
///
/// let mut workbook = Workbook::new();
/// let sheet = workbook.add_worksheet();
/// write_text(sheet, 0, 0, "=1+1", &Format::new()).unwrap();
/// ```
pub fn write_text(sheet: &mut Worksheet, row: u32, col: u16, value: &str, format: &Format) -> Result<(), XlsxError> {
    sheet.write_string_with_format(row, col, clean_cell_value(value), &text_format(value, format))?;
    Ok(())
}

/// Text of a cell written by an older build that stored the quote prefix
/// as a literal `'`.
#[must_use]
pub fn unquoted(value: &str) -> &str {
    match value.strip_prefix('\'') {
        Some(rest) if needs_quote_prefix(rest) => rest,
        _ => value,
    }
}

/// First `max` characters of `s`, respecting char boundaries.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Spreadsheet column letters for a 0-based index (`0` → `A`, `26` → `AA`).
#[must_use]
pub fn column_letter(col: u16) -> String {
    let mut n = u32::from(col) + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangerous_values_need_a_prefix() {
        assert!(needs_quote_prefix("cmd /c calc"));
        assert!(needs_quote_prefix("-5"));
        assert!(needs_quote_prefix("Microsoft PowerShell Remote Code Execution"));
        // A lone dash is the placeholder used in paired scan tables.
        assert!(!needs_quote_prefix("-"));
        assert!(!needs_quote_prefix("SSL Certificate Expiry"));
    }

    #[test]
    fn cleaning_keeps_the_text() {
        assert_eq!(clean_cell_value("a\0b"), "ab");
        assert_eq!(clean_cell_value("=1+1"), "=1+1");
    }

    #[test]
    fn legacy_literal_prefix_is_removed() {
        assert_eq!(unquoted("'=1+1"), "=1+1");
        assert_eq!(unquoted("'tis a name"), "'tis a name");
        assert_eq!(unquoted("Plain"), "Plain");
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        let long = "x".repeat(MAX_CELL_CHARS + 5);
        assert_eq!(clean_cell_value(&long).chars().count(), MAX_CELL_CHARS);
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(10), "K");
        assert_eq!(column_letter(26), "AA");
    }
}
