//! String format validation.
//!
//! Query and path arguments may declare a [`StringFormat`]. A present value
//! that does not satisfy its format makes the request fail with `400`.
//!
//! # Accepted date shapes
//!
//! | Shape | Example |
//! |---|---|
//! | Calendar date | `2020-01-01`, basic `20200101` |
//! | Reduced precision | `2020`, `2020-05` |
//! | Ordinal date | `2020-123`, `2020123` |
//! | Week date | `2020-W05`, `2020-W05-3`, `2020W053` |
//! | Date and time | `2020-01-01T10`, `2020-01-01T10:30`, `2020-01-01T103015` |
//! | Fractional seconds | `2020-01-01T10:30:15.250` |
//! | Zone designator | `2020-01-01T10:30:15Z`, `2020-01-01T10:30+02:00` |
//!
//! A time needs a complete date. Components must form a real calendar date
//! and clock time. Missing month or day default to the first.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

static ISO8601: OnceLock<Regex> = OnceLock::new();

fn iso8601_regex() -> &'static Regex {
    ISO8601.get_or_init(|| {
        Regex::new(concat!(
            r"^(?P<year>[+-]?[0-9]{4})",
            r"(?:-(?P<month>[0-9]{2})(?:-(?P<day>[0-9]{2}))?",
            r"|(?P<bmonth>[0-9]{2})(?P<bday>[0-9]{2})",
            r"|-?W(?P<week>[0-9]{2})(?:-?(?P<weekday>[1-7]))?",
            r"|-?(?P<ordinal>[0-9]{3}))?",
            r"(?:[Tt ](?P<hour>[0-9]{2})(?::?(?P<minute>[0-9]{2})",
            r"(?::?(?P<second>[0-9]{2})(?:[.,](?P<fraction>[0-9]+))?)?)?",
            r"(?P<zone>[Zz]|[+-][0-9]{2}(?::?[0-9]{2})?)?)?$",
        ))
        .expect("valid regex")
    })
}

/// A named string format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum StringFormat {
    /// ISO-8601 date or date-time.
    Date,
}

impl fmt::Display for StringFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date => f.write_str("Date"),
        }
    }
}

/// Returns `true` if `value` satisfies `format`.
pub fn is_string_satisfy_format(value: &str, format: StringFormat) -> bool {
    match format {
        StringFormat::Date => is_iso8601(value),
    }
}

/// Returns `true` if `value` is an ISO-8601 date or date-time.
pub fn is_iso8601(value: &str) -> bool {
    parse_iso8601(value).is_some()
}

/// Parses an ISO-8601 date or date-time.
///
/// Date-only values are midnight UTC. Values without a zone designator are
/// read as UTC.
pub fn parse_iso8601(value: &str) -> Option<DateTime<FixedOffset>> {
    let caps = iso8601_regex().captures(value)?;
    let number = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());
    let has = |name: &str| caps.name(name).is_some();

    let year = caps.name("year")?.as_str().parse::<i32>().ok()?;
    let date = if let Some(week) = number("week") {
        let weekday = number("weekday").map_or(Some(Weekday::Mon), iso_weekday)?;
        NaiveDate::from_isoywd_opt(year, week, weekday)?
    } else if let Some(ordinal) = number("ordinal") {
        NaiveDate::from_yo_opt(year, ordinal)?
    } else {
        let month = number("month").or_else(|| number("bmonth")).unwrap_or(1);
        let day = number("day").or_else(|| number("bday")).unwrap_or(1);
        NaiveDate::from_ymd_opt(year, month, day)?
    };

    let time = match number("hour") {
        Some(hour) => {
            let complete = has("day") || has("bday") || has("week") || has("ordinal");
            if !complete {
                return None;
            }
            let nanos = caps
                .name("fraction")
                .map_or(Some(0), |m| fraction_to_nanos(m.as_str()))?;
            let minute = number("minute").unwrap_or(0);
            let second = number("second").unwrap_or(0);
            NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)?
        }
        None => NaiveTime::from_hms_opt(0, 0, 0)?,
    };

    let offset = match caps.name("zone") {
        Some(zone) => parse_offset(zone.as_str())?,
        None => FixedOffset::east_opt(0)?,
    };

    date.and_time(time).and_local_timezone(offset).single()
}

/// ISO weekday number, Monday is 1.
fn iso_weekday(day: u32) -> Option<Weekday> {
    const DAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    let index = usize::try_from(day.checked_sub(1)?).ok()?;
    DAYS.get(index).copied()
}

fn fraction_to_nanos(digits: &str) -> Option<u32> {
    let significant: String = digits.chars().take(9).collect();
    let padded = format!("{significant:0<9}");
    padded.parse().ok()
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    if zone.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }
    let sign = if zone.starts_with('-') { -1 } else { 1 };
    let digits: String = zone[1..].chars().filter(char::is_ascii_digit).collect();
    let hours: i32 = digits.get(0..2)?.parse().ok()?;
    let minutes: i32 = digits.get(2..4).map_or(Some(0), |m| m.parse().ok())?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_calendar_date() {
        assert!(is_iso8601("2020-01-01"));
        let parsed = parse_iso8601("2020-01-01").unwrap();
        assert_eq!(parsed.year(), 2020);
        assert_eq!(parsed.hour(), 0);
        assert_eq!(parsed.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_full_datetime_with_millis() {
        let parsed = parse_iso8601("2020-01-01T00:00:00.000Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_offsets() {
        let parsed = parse_iso8601("2021-06-01T12:00:00+02:00").unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 7200);

        let compact = parse_iso8601("2021-06-01T12:00-0530").unwrap();
        assert_eq!(compact.offset().local_minus_utc(), -(5 * 3600 + 30 * 60));

        let hours_only = parse_iso8601("2021-06-01T12:00:00+01").unwrap();
        assert_eq!(hours_only.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_fraction_precision() {
        let parsed = parse_iso8601("2020-01-01T10:30:15.25").unwrap();
        assert_eq!(parsed.nanosecond(), 250_000_000);

        let long = parse_iso8601("2020-01-01T10:30:15,1234567891234").unwrap();
        assert_eq!(long.nanosecond(), 123_456_789);
    }

    #[test]
    fn test_space_separator() {
        assert!(is_iso8601("2020-01-01 10:30"));
    }

    #[test]
    fn test_rejects_impossible_dates() {
        assert!(!is_iso8601("2020-02-30"));
        assert!(!is_iso8601("2020-13-01"));
        assert!(!is_iso8601("2020-01-01T25:00"));
        assert!(!is_iso8601("2020-01-01T10:61"));
        assert!(!is_iso8601("2020-01-01T10:00+24:00"));
    }

    #[test]
    fn test_rejects_non_dates() {
        assert!(!is_iso8601(""));
        assert!(!is_iso8601("42"));
        assert!(!is_iso8601("not-a-date"));
        assert!(!is_iso8601("2020/01/01"));
        assert!(!is_iso8601("2020-01-01T"));
        assert!(!is_iso8601(" 2020-01-01"));
        assert!(!is_iso8601("2020-01-01Z"));
    }

    #[test]
    fn test_reduced_precision_and_basic_dates() {
        assert_eq!(parse_iso8601("2020"), parse_iso8601("2020-01-01"));
        assert_eq!(parse_iso8601("2020-05"), parse_iso8601("2020-05-01"));
        assert_eq!(parse_iso8601("20200501"), parse_iso8601("2020-05-01"));
        assert_eq!(
            parse_iso8601("20200501T103015Z"),
            parse_iso8601("2020-05-01T10:30:15Z")
        );
        assert!(!is_iso8601("202005"));
        assert!(!is_iso8601("2020-05T10:00"));
    }

    #[test]
    fn test_ordinal_and_week_dates() {
        assert_eq!(parse_iso8601("2020-032"), parse_iso8601("2020-02-01"));
        assert_eq!(parse_iso8601("2020032"), parse_iso8601("2020-02-01"));
        assert!(!is_iso8601("2021-366"));

        // Week 1 of 2020 starts on Monday 2019-12-30.
        assert_eq!(parse_iso8601("2020-W01"), parse_iso8601("2019-12-30"));
        assert_eq!(parse_iso8601("2020-W01-3"), parse_iso8601("2020-01-01"));
        assert_eq!(parse_iso8601("2020W013"), parse_iso8601("2020-01-01"));
        assert!(!is_iso8601("2020-W54"));
    }

    #[test]
    fn test_hour_only_time() {
        let parsed = parse_iso8601("2020-01-01T10").unwrap();
        assert_eq!(parsed.hour(), 10);
        assert_eq!(parsed.minute(), 0);
    }

    #[test]
    fn test_leap_day() {
        assert!(is_iso8601("2020-02-29"));
        assert!(!is_iso8601("2021-02-29"));
    }

    #[test]
    fn test_is_string_satisfy_format_date() {
        assert!(is_string_satisfy_format("2020-01-01", StringFormat::Date));
        assert!(!is_string_satisfy_format("42", StringFormat::Date));
    }

    #[test]
    fn test_format_display() {
        assert_eq!(StringFormat::Date.to_string(), "Date");
    }
}
