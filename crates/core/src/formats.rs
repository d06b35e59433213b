//! Locale-aware value parsing for dates and numbers.
//!
//! Spreadsheets arrive with no type information, so the importing user
//! picks a [`DateFormat`] and [`NumberFormat`] once per session and every
//! cell is interpreted under those. Parsers return `Option`: a `None` is
//! "this text is not a date/number under the configured format", never a
//! panic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Date format
// ---------------------------------------------------------------------------

/// Two-digit years at or below this value are read as 20xx; above it, 19xx.
pub const TWO_DIGIT_YEAR_PIVOT: i32 = 69;

/// Field order used when interpreting a date cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// `MM/DD/YYYY` (US convention).
    #[default]
    MonthDayYear,
    /// `DD/MM/YYYY`.
    DayMonthYear,
    /// `YYYY-MM-DD` (ISO-like).
    YearMonthDay,
}

impl DateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MonthDayYear => "month_day_year",
            Self::DayMonthYear => "day_month_year",
            Self::YearMonthDay => "year_month_day",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "month_day_year" => Some(Self::MonthDayYear),
            "day_month_year" => Some(Self::DayMonthYear),
            "year_month_day" => Some(Self::YearMonthDay),
            _ => None,
        }
    }

    pub const ALL: &'static [&'static str] =
        &["month_day_year", "day_month_year", "year_month_day"];

    /// Human-readable pattern for error messages, e.g. `MM/DD/YYYY`.
    pub fn expected_pattern(&self) -> &'static str {
        match self {
            Self::MonthDayYear => "MM/DD/YYYY",
            Self::DayMonthYear => "DD/MM/YYYY",
            Self::YearMonthDay => "YYYY-MM-DD",
        }
    }
}

impl std::fmt::Display for DateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a date cell under the given format.
///
/// Accepts `/`, `-`, and `.` as segment separators. Two-digit years are
/// expanded around [`TWO_DIGIT_YEAR_PIVOT`]. A date whose first segment
/// has four digits is always read year-first: that segment cannot be a
/// day or month, and spreadsheet normalization emits ISO dates. Returns
/// `None` for anything that does not form a real calendar date.
pub fn parse_date(value: &str, format: DateFormat) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parts: Vec<&str> = trimmed.split(['/', '-', '.']).map(str::trim).collect();
    if parts.len() != 3 {
        return None;
    }

    let year_first = parts[0].len() == 4 && parts[0].bytes().all(|b| b.is_ascii_digit());
    let (year_idx, month_idx, day_idx) = if year_first {
        (0, 1, 2)
    } else {
        match format {
            DateFormat::MonthDayYear => (2, 0, 1),
            DateFormat::DayMonthYear => (2, 1, 0),
            DateFormat::YearMonthDay => (0, 1, 2),
        }
    };

    let year = parse_year_segment(parts[year_idx])?;
    let month = parse_day_or_month_segment(parts[month_idx])?;
    let day = parse_day_or_month_segment(parts[day_idx])?;

    NaiveDate::from_ymd_opt(year, month, day)
}

/// A year segment is 2 or 4 digits; anything else is rejected.
fn parse_year_segment(segment: &str) -> Option<i32> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match segment.len() {
        4 => segment.parse().ok(),
        2 => {
            let two: i32 = segment.parse().ok()?;
            Some(if two <= TWO_DIGIT_YEAR_PIVOT {
                2000 + two
            } else {
                1900 + two
            })
        }
        _ => None,
    }
}

/// A day or month segment is 1 or 2 digits.
fn parse_day_or_month_segment(segment: &str) -> Option<u32> {
    if segment.is_empty() || segment.len() > 2 || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

// ---------------------------------------------------------------------------
// Number format
// ---------------------------------------------------------------------------

/// Thousands/decimal separator convention used when interpreting a
/// numeric cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    /// `1,234.56` (comma thousands, point decimal).
    #[default]
    Point,
    /// `1.234,56` (point thousands, comma decimal).
    Comma,
    /// `1 234,56` (space thousands, comma decimal).
    SpaceComma,
}

impl NumberFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Comma => "comma",
            Self::SpaceComma => "space_comma",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "point" => Some(Self::Point),
            "comma" => Some(Self::Comma),
            "space_comma" => Some(Self::SpaceComma),
            _ => None,
        }
    }

    pub const ALL: &'static [&'static str] = &["point", "comma", "space_comma"];

    /// Example value for error messages.
    pub fn example(&self) -> &'static str {
        match self {
            Self::Point => "1,234.56",
            Self::Comma => "1.234,56",
            Self::SpaceComma => "1 234,56",
        }
    }

    fn separators(&self) -> (char, char) {
        match self {
            Self::Point => (',', '.'),
            Self::Comma => ('.', ','),
            Self::SpaceComma => (' ', ','),
        }
    }
}

impl std::fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a numeric cell under the given format.
///
/// Strips the thousands separator, normalizes the decimal separator to
/// `.`, then parses as `f64`. Returns `None` for non-numeric text, more
/// than one decimal separator, or non-finite results.
pub fn parse_number(value: &str, format: NumberFormat) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (thousands, decimal) = format.separators();
    let mut cleaned = String::with_capacity(trimmed.len());

    for (i, ch) in trimmed.chars().enumerate() {
        if ch == thousands || (format == NumberFormat::SpaceComma && ch == '\u{00a0}') {
            continue;
        }
        if ch == decimal {
            cleaned.push('.');
        } else if ch == '-' || ch == '+' {
            if i != 0 {
                return None;
            }
            cleaned.push(ch);
        } else if ch.is_ascii_digit() {
            cleaned.push(ch);
        } else {
            return None;
        }
    }

    if !cleaned.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    if cleaned.matches('.').count() > 1 {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // -- parse_date -----------------------------------------------------------

    #[test]
    fn month_day_year_parses_us_dates() {
        assert_eq!(
            parse_date("3/14/2024", DateFormat::MonthDayYear),
            Some(date(2024, 3, 14))
        );
    }

    #[test]
    fn day_month_year_swaps_day_and_month() {
        assert_eq!(
            parse_date("3/14/2024", DateFormat::DayMonthYear),
            None // month 14 does not exist
        );
        assert_eq!(
            parse_date("14/3/2024", DateFormat::DayMonthYear),
            Some(date(2024, 3, 14))
        );
    }

    #[test]
    fn year_month_day_parses_iso_style() {
        assert_eq!(
            parse_date("2024-03-14", DateFormat::YearMonthDay),
            Some(date(2024, 3, 14))
        );
    }

    #[test]
    fn four_digit_leading_year_reads_year_first_under_any_format() {
        for format in [DateFormat::MonthDayYear, DateFormat::DayMonthYear] {
            assert_eq!(
                parse_date("2024-03-14", format),
                Some(date(2024, 3, 14)),
                "format: {format}"
            );
        }
    }

    #[test]
    fn all_three_separators_accepted() {
        for raw in ["3/14/2024", "3-14-2024", "3.14.2024"] {
            assert_eq!(
                parse_date(raw, DateFormat::MonthDayYear),
                Some(date(2024, 3, 14)),
                "input: {raw}"
            );
        }
    }

    #[test]
    fn two_digit_years_pivot_around_69() {
        assert_eq!(
            parse_date("1/15/24", DateFormat::MonthDayYear),
            Some(date(2024, 1, 15))
        );
        assert_eq!(
            parse_date("1/15/69", DateFormat::MonthDayYear),
            Some(date(2069, 1, 15))
        );
        assert_eq!(
            parse_date("1/15/70", DateFormat::MonthDayYear),
            Some(date(1970, 1, 15))
        );
        assert_eq!(
            parse_date("1/15/99", DateFormat::MonthDayYear),
            Some(date(1999, 1, 15))
        );
    }

    #[test]
    fn impossible_calendar_dates_rejected() {
        assert_eq!(parse_date("2/30/2024", DateFormat::MonthDayYear), None);
        assert_eq!(parse_date("13/1/2024", DateFormat::MonthDayYear), None);
        assert_eq!(parse_date("2023-02-29", DateFormat::YearMonthDay), None);
    }

    #[test]
    fn malformed_dates_rejected() {
        assert_eq!(parse_date("", DateFormat::MonthDayYear), None);
        assert_eq!(parse_date("notadate", DateFormat::MonthDayYear), None);
        assert_eq!(parse_date("3/14", DateFormat::MonthDayYear), None);
        assert_eq!(parse_date("3/14/20/24", DateFormat::MonthDayYear), None);
        assert_eq!(parse_date("3/14/024", DateFormat::MonthDayYear), None);
    }

    #[test]
    fn date_input_is_trimmed() {
        assert_eq!(
            parse_date("  3/14/2024  ", DateFormat::MonthDayYear),
            Some(date(2024, 3, 14))
        );
    }

    #[test]
    fn date_format_round_trip() {
        for s in DateFormat::ALL {
            let f = DateFormat::from_str(s).unwrap();
            assert_eq!(f.as_str(), *s);
        }
        assert!(DateFormat::from_str("ymd").is_none());
    }

    // -- parse_number ---------------------------------------------------------

    #[test]
    fn point_format_parses_us_numbers() {
        assert_eq!(parse_number("1,234.56", NumberFormat::Point), Some(1234.56));
        assert_eq!(parse_number("42", NumberFormat::Point), Some(42.0));
        assert_eq!(parse_number("-1.5", NumberFormat::Point), Some(-1.5));
        assert_eq!(parse_number("+7", NumberFormat::Point), Some(7.0));
    }

    #[test]
    fn comma_format_parses_european_numbers() {
        assert_eq!(parse_number("1.234,56", NumberFormat::Comma), Some(1234.56));
        assert_eq!(parse_number("1.234", NumberFormat::Comma), Some(1234.0));
    }

    #[test]
    fn space_comma_format_parses_spaced_numbers() {
        assert_eq!(
            parse_number("1 234,56", NumberFormat::SpaceComma),
            Some(1234.56)
        );
        // Non-breaking space also counts as a thousands separator.
        assert_eq!(
            parse_number("1\u{00a0}234,56", NumberFormat::SpaceComma),
            Some(1234.56)
        );
    }

    #[test]
    fn non_numeric_text_returns_none() {
        assert_eq!(parse_number("", NumberFormat::Point), None);
        assert_eq!(parse_number("abc", NumberFormat::Point), None);
        assert_eq!(parse_number("12abc", NumberFormat::Point), None);
        assert_eq!(parse_number("$5", NumberFormat::Point), None);
        assert_eq!(parse_number("inf", NumberFormat::Point), None);
    }

    #[test]
    fn multiple_decimal_separators_rejected() {
        assert_eq!(parse_number("1.2.3", NumberFormat::Point), None);
        assert_eq!(parse_number("1,2,3", NumberFormat::Comma), None);
    }

    #[test]
    fn sign_only_allowed_at_start() {
        assert_eq!(parse_number("1-2", NumberFormat::Point), None);
        assert_eq!(parse_number("-", NumberFormat::Point), None);
    }

    #[test]
    fn number_format_round_trip() {
        for s in NumberFormat::ALL {
            let f = NumberFormat::from_str(s).unwrap();
            assert_eq!(f.as_str(), *s);
        }
        assert!(NumberFormat::from_str("dot").is_none());
    }
}
