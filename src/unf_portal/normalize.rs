use chrono::{Datelike, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TIME_TOKEN: Regex = Regex::new(r"\d{1,2}:\d{2}").unwrap();
    static ref DIGIT_RUN: Regex = Regex::new(r"\d+").unwrap();
    static ref ISO_DATE: Regex = Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap();
    static ref NUMERIC_DATE: Regex =
        Regex::new(r"(\d{1,2})[./-](\d{1,2})(?:[./-](\d{2,4}))?").unwrap();
    static ref TEXTUAL_DATE: Regex =
        Regex::new(r"(?i)(\d{1,2})\.?\s+([a-zæøå]+)\.?(?:\s+(\d{4}))?").unwrap();
}

/// Month names as the portal prints them, Danish first. Matching is by
/// prefix so abbreviated cells ("sep.") resolve too.
const MONTHS: [(&str, u32); 14] = [
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("maj", 5),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("okt", 10),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

/// Extracts the first `H:MM`/`HH:MM` token verbatim. Cells without one come
/// back trimmed as-is, empty input stays empty.
pub fn normalize_time(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match TIME_TOKEN.find(trimmed) {
        Some(token) => token.as_str().to_string(),
        None => trimmed.to_string(),
    }
}

/// Canonicalizes a date cell to `YYYY-MM-DD`, or empty when it cannot be
/// read as a day-first date. Never panics.
pub fn normalize_date(raw: &str) -> String {
    parse_date(raw)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Day-first date recognition behind [`normalize_date`]; also used by the
/// calendar encoder to resolve already-canonical dates to concrete days.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(captures) = ISO_DATE.captures(trimmed) {
        let date = ymd_opt(&captures[1], &captures[2], &captures[3]);
        if date.is_some() {
            return date;
        }
    }

    if let Some(captures) = NUMERIC_DATE.captures(trimmed) {
        let year = match captures.get(3) {
            Some(year) => expand_year(year.as_str().parse().ok()?),
            None => Utc::now().year(),
        };
        let date = NaiveDate::from_ymd_opt(
            year,
            captures[2].parse().ok()?,
            captures[1].parse().ok()?,
        );
        if date.is_some() {
            return date;
        }
    }

    if let Some(captures) = TEXTUAL_DATE.captures(trimmed) {
        let month = month_number(&captures[2])?;
        let year = match captures.get(3) {
            Some(year) => year.as_str().parse().ok()?,
            None => Utc::now().year(),
        };
        return NaiveDate::from_ymd_opt(year, month, captures[1].parse().ok()?);
    }

    None
}

/// First run of digits as a number, 0 when there is none.
pub fn to_int(raw: &str) -> u32 {
    DIGIT_RUN
        .find(raw)
        .and_then(|run| run.as_str().parse().ok())
        .unwrap_or(0)
}

fn ymd_opt(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

// Two-digit years pivot at 70, like the fuzzy parsers the portal's cells
// were written against.
fn expand_year(year: i32) -> i32 {
    if year >= 100 {
        year
    } else if year < 70 {
        2000 + year
    } else {
        1900 + year
    }
}

fn month_number(name: &str) -> Option<u32> {
    let lowered = name.to_lowercase();
    MONTHS
        .iter()
        .find(|(prefix, _)| lowered.starts_with(prefix))
        .map(|(_, month)| *month)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn should_extract_the_first_time_token_verbatim() {
        assert_eq!(normalize_time("kl. 18:30 - 21:00"), "18:30");
        assert_eq!(normalize_time("9:05"), "9:05");
    }

    #[test_log::test]
    fn cells_without_a_time_token_should_come_back_trimmed() {
        assert_eq!(normalize_time("  hele dagen "), "hele dagen");
        assert_eq!(normalize_time(""), "");
        assert_eq!(normalize_time("   "), "");
    }

    #[test_log::test]
    fn should_normalize_iso_dates() {
        assert_eq!(normalize_date("2025-06-10"), "2025-06-10");
        assert_eq!(normalize_date(" 2025-06-10 (tirsdag)"), "2025-06-10");
    }

    #[test_log::test]
    fn should_normalize_day_first_numeric_dates() {
        assert_eq!(normalize_date("24/09/2025"), "2025-09-24");
        assert_eq!(normalize_date("24.9.2025"), "2025-09-24");
        assert_eq!(normalize_date("24-09-25"), "2025-09-24");
    }

    #[test_log::test]
    fn should_normalize_danish_month_names() {
        assert_eq!(normalize_date("24. september 2025"), "2025-09-24");
        assert_eq!(normalize_date("3 maj 2026"), "2026-05-03");
        assert_eq!(normalize_date("1. okt. 2025"), "2025-10-01");
    }

    #[test_log::test]
    fn unparseable_dates_should_become_empty_not_panic() {
        assert_eq!(normalize_date("tba"), "");
        assert_eq!(normalize_date(""), "");
        assert_eq!(normalize_date("99/99/9999"), "");
    }

    #[test_log::test]
    fn dates_without_a_year_should_use_the_current_year() {
        let expected = format!("{}-09-24", Utc::now().year());

        assert_eq!(normalize_date("24/9"), expected);
        assert_eq!(normalize_date("24. september"), expected);
    }

    #[test_log::test]
    fn should_extract_the_first_digit_run() {
        assert_eq!(to_int("Vagter: 12 (3 free)"), 12);
        assert_eq!(to_int("7"), 7);
    }

    #[test_log::test]
    fn missing_digit_runs_should_count_as_zero() {
        assert_eq!(to_int(""), 0);
        assert_eq!(to_int("ingen"), 0);
    }
}
