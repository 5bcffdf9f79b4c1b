//! Date wording used on report cover pages.

use chrono::{Datelike, NaiveDate};

/// Input layouts accepted by [`to_dd_mm_yyyy`], tried in order.
const INPUT_FORMATS: [&str; 6] = ["%d.%m.%Y", "%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"];

fn parse_any(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn parse_iso(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Normalizes a date to `DD.MM.YYYY`, returning the input unchanged when no
/// known layout matches.
///
/// # Examples
///
/// ```
/// use audit_reports::docx::dates::to_dd_mm_yyyy;
///
/// assert_eq!(to_dd_mm_yyyy("2025-10-21"), "21.10.2025");
/// assert_eq!(to_dd_mm_yyyy("someday"), "someday");
/// ```
#[must_use]
pub fn to_dd_mm_yyyy(raw: &str) -> String {
    match parse_any(raw) {
        Some(date) => date.format("%d.%m.%Y").to_string(),
        None => raw.to_string(),
    }
}

/// Zero-padded day with a superscript ordinal suffix, e.g. `01ˢᵗ`.
#[must_use]
pub fn ordinal(day: u32) -> String {
    let suffix = if (10..=20).contains(&(day % 100)) {
        "ᵗʰ"
    } else {
        match day % 10 {
            1 => "ˢᵗ",
            2 => "ⁿᵈ",
            3 => "ʳᵈ",
            _ => "ᵗʰ",
        }
    };
    format!("{:02}{}", day, suffix)
}

/// `YYYY-MM-DD` as `21ˢᵗ October 2025`; other input is returned unchanged.
#[must_use]
pub fn superscript_date(raw: &str) -> String {
    match parse_iso(raw) {
        Some(date) => format!("{} {} {}", ordinal(date.day()), date.format("%B"), date.year()),
        None => raw.to_string(),
    }
}

/// Indian financial year (April to March) containing a `YYYY-MM-DD` date.
///
/// Returns an empty string when the date does not parse.
///
/// # Examples
///
/// ```
/// use audit_reports::docx::dates::financial_year;
///
/// assert_eq!(financial_year("2025-02-10"), "01ˢᵗ April 2024 to 31ˢᵗ March 2025");
/// assert_eq!(financial_year(""), "");
/// ```
#[must_use]
pub fn financial_year(raw: &str) -> String {
    let Some(date) = parse_iso(raw) else {
        return String::new();
    };
    let start = if date.month() >= 4 { date.year() } else { date.year() - 1 };
    format!(
        "{} April {} to {} March {}",
        ordinal(1),
        start,
        ordinal(31),
        start + 1
    )
}

/// `DD.MM.YYYY To DD.MM.YYYY`, keeping either side raw when it does not parse.
#[must_use]
pub fn date_range(start: &str, end: &str) -> String {
    format!("{} To {}", to_dd_mm_yyyy(start), to_dd_mm_yyyy(end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_cover_the_teens() {
        assert_eq!(ordinal(1), "01ˢᵗ");
        assert_eq!(ordinal(2), "02ⁿᵈ");
        assert_eq!(ordinal(3), "03ʳᵈ");
        assert_eq!(ordinal(11), "11ᵗʰ");
        assert_eq!(ordinal(12), "12ᵗʰ");
        assert_eq!(ordinal(13), "13ᵗʰ");
        assert_eq!(ordinal(21), "21ˢᵗ");
        assert_eq!(ordinal(22), "22ⁿᵈ");
        assert_eq!(ordinal(30), "30ᵗʰ");
    }

    #[test]
    fn superscript_dates() {
        assert_eq!(superscript_date("2025-10-21"), "21ˢᵗ October 2025");
        assert_eq!(superscript_date("21/10/2025"), "21/10/2025");
    }

    #[test]
    fn financial_year_turns_in_april() {
        assert_eq!(financial_year("2025-04-01"), "01ˢᵗ April 2025 to 31ˢᵗ March 2026");
        assert_eq!(financial_year("2025-03-31"), "01ˢᵗ April 2024 to 31ˢᵗ March 2025");
    }

    #[test]
    fn ranges_accept_mixed_layouts() {
        assert_eq!(date_range("2025-01-05", "20/01/2025"), "05.01.2025 To 20.01.2025");
        assert_eq!(date_range("soon", "2025/02/01"), "soon To 01.02.2025");
    }
}
