//! Due-date normalization.
//!
//! Human-entered due dates arrive in several shapes; the first format in
//! the ladder that parses wins. Year-less forms assume the current year.

use chrono::{Datelike, NaiveDate, Utc};

const FULL_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y年%m月%d日",
];

/// Normalize a raw due-date string, or `None` when no format matches.
pub fn normalize_due_date(raw: &str) -> Option<NaiveDate> {
    normalize_with_year(raw, Utc::now().year())
}

pub(crate) fn normalize_with_year(raw: &str, current_year: i32) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in FULL_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    // Month-day-only forms, current year assumed.
    if let Ok(date) =
        NaiveDate::parse_from_str(&format!("{current_year}年{raw}"), "%Y年%m月%d日")
    {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{current_year}-{raw}"), "%Y-%m-%d") {
        return Some(date);
    }

    None
}

/// Canonical rendering used in issue payloads and descriptions.
pub fn canonical(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect(raw: &str, year: i32, want: (i32, u32, u32)) {
        let date = normalize_with_year(raw, year)
            .unwrap_or_else(|| panic!("'{}' should parse", raw));
        assert_eq!(
            date,
            NaiveDate::from_ymd_opt(want.0, want.1, want.2).unwrap(),
            "input '{}'",
            raw
        );
    }

    #[test]
    fn numeric_separators() {
        expect("2025-12-31", 2025, (2025, 12, 31));
        expect("2025/12/31", 2025, (2025, 12, 31));
        expect("2025.12.31", 2025, (2025, 12, 31));
    }

    #[test]
    fn us_month_day_year_wins_over_day_month_year() {
        // 03/04 is ambiguous; the US form is tried first.
        expect("03/04/2026", 2026, (2026, 3, 4));
        // Month 13 is impossible, so the day/month form catches it.
        expect("13/04/2026", 2026, (2026, 4, 13));
    }

    #[test]
    fn localized_long_forms() {
        expect("2026年1月5日", 2026, (2026, 1, 5));
        expect("1月5日", 2026, (2026, 1, 5));
    }

    #[test]
    fn bare_month_day_assumes_current_year() {
        expect("12-31", 2025, (2025, 12, 31));
        expect("2-3", 2027, (2027, 2, 3));
    }

    #[test]
    fn canonical_round_trip() {
        for raw in ["2025-12-31", "2025/12/31", "12/31/2025", "2025年12月31日"] {
            let date = normalize_with_year(raw, 2025).expect("parse");
            assert_eq!(canonical(date), "2025-12-31", "input '{}'", raw);
        }
    }

    #[test]
    fn unparseable_signals_none() {
        assert_eq!(normalize_with_year("not-a-date", 2025), None);
        assert_eq!(normalize_with_year("", 2025), None);
        assert_eq!(normalize_with_year("2025-13-45", 2025), None);
    }
}
