//! Date fragment parsing and earliest-date selection.
//!
//! Three textual shapes are recognised, most specific first:
//!
//! 1. `January 5, 2023 at 3:15 PM` (seconds optional)
//! 2. `January 5, 2023`
//! 3. `5 January, 2023` / `5 Jan 2023`
//!
//! Months may be written in full or as the standard three-letter
//! abbreviation. Matching is case-sensitive. Dates without a time of day sit
//! at midnight.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};
use std::sync::LazyLock;

const MONTHS: &str = "January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec";

static TIMED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?P<month>{MONTHS}) (?P<day>\d{{1,2}}), (?P<year>\d{{4}}) at (?P<hour>\d{{1,2}}):(?P<minute>\d{{2}})(?::(?P<second>\d{{2}}))? (?P<meridiem>[AP]M)"
    ))
    .expect("timed date pattern")
});

static MONTH_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?P<month>{MONTHS}) (?P<day>\d{{1,2}}), (?P<year>\d{{4}})"
    ))
    .expect("month-first date pattern")
});

static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?P<day>\d{{1,2}}) (?P<month>{MONTHS}),? (?P<year>\d{{4}})"
    ))
    .expect("day-first date pattern")
});

/// All three shapes as one alternation, timed first, for left-to-right scans.
static ANY_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?P<t_month>{MONTHS}) (?P<t_day>\d{{1,2}}), (?P<t_year>\d{{4}}) at (?P<t_hour>\d{{1,2}}):(?P<t_minute>\d{{2}})(?::(?P<t_second>\d{{2}}))? (?P<t_meridiem>[AP]M)|(?P<m_month>{MONTHS}) (?P<m_day>\d{{1,2}}), (?P<m_year>\d{{4}})|(?P<d_day>\d{{1,2}}) (?P<d_month>{MONTHS}),? (?P<d_year>\d{{4}})"
    ))
    .expect("combined date pattern")
});

const APPROX_PREFIX: &str = "Approx.";

/// A parsed date paired with the string shown to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateCandidate {
    pub timestamp: NaiveDateTime,
    pub display: String,
}

/// Month number for a full or abbreviated English month name.
///
/// Unrecognised tokens map to January.
pub fn month_number(token: &str) -> u32 {
    match token {
        "January" | "Jan" => 1,
        "February" | "Feb" => 2,
        "March" | "Mar" => 3,
        "April" | "Apr" => 4,
        "May" => 5,
        "June" | "Jun" => 6,
        "July" | "Jul" => 7,
        "August" | "Aug" => 8,
        "September" | "Sep" => 9,
        "October" | "Oct" => 10,
        "November" | "Nov" => 11,
        "December" | "Dec" => 12,
        _ => 1,
    }
}

/// Convert a 12-hour clock reading to 24-hour form.
///
/// `12 AM` is midnight, `12 PM` is noon, other PM hours gain twelve.
pub fn to_24_hour(hour: u32, meridiem: &str) -> u32 {
    match meridiem {
        "AM" if hour == 12 => 0,
        "PM" if hour < 12 => hour + 12,
        _ => hour,
    }
}

fn calendar_day(month: &str, day: &str, year: &str) -> Option<(NaiveDate, u32, i32)> {
    let day: u32 = day.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month_number(month), day)?;
    Some((date, day, year))
}

fn timed(
    month: &str,
    day: &str,
    year: &str,
    hour: &str,
    minute: &str,
    second: Option<&str>,
    meridiem: &str,
) -> Option<DateCandidate> {
    let (date, day_num, year_num) = calendar_day(month, day, year)?;
    let hour_24 = to_24_hour(hour.parse().ok()?, meridiem);
    let minute_num: u32 = minute.parse().ok()?;
    let second_num: u32 = match second {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    let time = NaiveTime::from_hms_opt(hour_24, minute_num, second_num)?;

    let mut display = format!("{month} {day_num}, {year_num} at {hour}:{minute}");
    if let Some(s) = second {
        display.push(':');
        display.push_str(s);
    }
    display.push(' ');
    display.push_str(meridiem);

    Some(DateCandidate {
        timestamp: date.and_time(time),
        display,
    })
}

fn untimed(month: &str, day: &str, year: &str) -> Option<DateCandidate> {
    let (date, day_num, year_num) = calendar_day(month, day, year)?;
    Some(DateCandidate {
        timestamp: date.and_time(NaiveTime::MIN),
        display: format!("{month} {day_num}, {year_num}"),
    })
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map_or("", |m| m.as_str())
}

/// Parse the most specific date found in `text`.
///
/// Shapes are tried top-down and the first one that matches decides the
/// outcome, even if its components turn out to be out of range.
pub fn parse_fragment(text: &str) -> Option<DateCandidate> {
    if let Some(c) = TIMED.captures(text) {
        return timed(
            group(&c, "month"),
            group(&c, "day"),
            group(&c, "year"),
            group(&c, "hour"),
            group(&c, "minute"),
            c.name("second").map(|m| m.as_str()),
            group(&c, "meridiem"),
        );
    }
    if let Some(c) = MONTH_FIRST.captures(text) {
        return untimed(group(&c, "month"), group(&c, "day"), group(&c, "year"));
    }
    if let Some(c) = DAY_FIRST.captures(text) {
        return untimed(group(&c, "month"), group(&c, "day"), group(&c, "year"));
    }
    None
}

/// Every date in a large blob of text, in order of appearance.
///
/// A timed date is reported once, never again as its untimed prefix.
pub fn scan_text(text: &str) -> Vec<DateCandidate> {
    ANY_DATE
        .captures_iter(text)
        .filter_map(|c| {
            if c.name("t_month").is_some() {
                timed(
                    group(&c, "t_month"),
                    group(&c, "t_day"),
                    group(&c, "t_year"),
                    group(&c, "t_hour"),
                    group(&c, "t_minute"),
                    c.name("t_second").map(|m| m.as_str()),
                    group(&c, "t_meridiem"),
                )
            } else if c.name("m_month").is_some() {
                untimed(group(&c, "m_month"), group(&c, "m_day"), group(&c, "m_year"))
            } else {
                untimed(group(&c, "d_month"), group(&c, "d_day"), group(&c, "d_year"))
            }
        })
        .collect()
}

/// The candidate with the smallest timestamp; ties keep the first seen.
pub fn earliest(candidates: &[DateCandidate]) -> Option<&DateCandidate> {
    candidates.iter().min_by_key(|c| c.timestamp)
}

/// Low-confidence stand-in used when no date could be resolved.
pub fn approximate(today: NaiveDate) -> String {
    format!("{APPROX_PREFIX} {}", today.format("%B %d, %Y"))
}

/// Whether a post date is the approximation sentinel rather than a resolved date.
pub fn is_approximate(post_date: &str) -> bool {
    post_date.starts_with(APPROX_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn meridiem_conversion() {
        assert_eq!(to_24_hour(12, "AM"), 0);
        assert_eq!(to_24_hour(12, "PM"), 12);
        assert_eq!(to_24_hour(3, "PM"), 15);
        assert_eq!(to_24_hour(9, "AM"), 9);
    }

    #[test]
    fn timed_fragment_is_rebuilt() {
        let c = parse_fragment("Answer written January 5, 2023 at 3:15 PM by someone").unwrap();
        assert_eq!(c.timestamp, at(2023, 1, 5, 15, 15, 0));
        assert_eq!(c.display, "January 5, 2023 at 3:15 PM");

        let c = parse_fragment("Oct 09, 2021 at 12:00:30 AM").unwrap();
        assert_eq!(c.timestamp, at(2021, 10, 9, 0, 0, 30));
        assert_eq!(c.display, "Oct 9, 2021 at 12:00:30 AM");
    }

    #[test]
    fn noon_stays_noon() {
        let c = parse_fragment("March 1, 2020 at 12:00 PM").unwrap();
        assert_eq!(c.timestamp.hour(), 12);
    }

    #[test]
    fn timed_pattern_wins_over_untimed() {
        let c = parse_fragment("June 2, 2022 at 8:05 AM").unwrap();
        assert_eq!(c.timestamp, at(2022, 6, 2, 8, 5, 0));
        assert!(c.display.contains(" at "));
    }

    #[test]
    fn untimed_and_day_first_default_to_midnight() {
        let c = parse_fragment("Updated Feb 3, 2019").unwrap();
        assert_eq!(c.timestamp, at(2019, 2, 3, 0, 0, 0));
        assert_eq!(c.display, "Feb 3, 2019");

        let c = parse_fragment("edited 14 September, 2018").unwrap();
        assert_eq!(c.timestamp, at(2018, 9, 14, 0, 0, 0));
        assert_eq!(c.display, "September 14, 2018");

        let c = parse_fragment("7 Dec 2017").unwrap();
        assert_eq!(c.display, "Dec 7, 2017");
    }

    #[test]
    fn impossible_dates_are_discarded() {
        assert!(parse_fragment("February 30, 2023").is_none());
        assert!(parse_fragment("January 5, 2023 at 13:99 PM").is_none());
        assert!(parse_fragment("no dates here").is_none());
    }

    #[test]
    fn month_names_are_case_sensitive() {
        assert!(parse_fragment("january 5, 2023").is_none());
    }

    #[test]
    fn unknown_month_tokens_fall_back_to_january() {
        assert_eq!(month_number("Smarch"), 1);
        assert_eq!(month_number("Sep"), 9);
        assert_eq!(month_number("May"), 5);
    }

    #[test]
    fn scan_does_not_double_count_timed_dates() {
        let html = "<span>January 5, 2023 at 3:15 PM</span><span>1 Feb 2022</span>";
        let found = scan_text(html);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].timestamp, at(2023, 1, 5, 15, 15, 0));
        assert_eq!(found[1].display, "Feb 1, 2022");
    }

    #[test]
    fn earliest_picks_minimum_and_keeps_first_tie() {
        let candidates = vec![
            DateCandidate { timestamp: at(2023, 1, 5, 0, 0, 0), display: "a".into() },
            DateCandidate { timestamp: at(2023, 1, 1, 8, 0, 0), display: "b".into() },
            DateCandidate { timestamp: at(2023, 6, 1, 0, 0, 0), display: "c".into() },
            DateCandidate { timestamp: at(2023, 1, 1, 8, 0, 0), display: "d".into() },
        ];
        assert_eq!(earliest(&candidates).unwrap().display, "b");
        assert!(earliest(&[]).is_none());
    }

    #[test]
    fn approximation_sentinel() {
        let s = approximate(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(s, "Approx. March 07, 2024");
        assert!(is_approximate(&s));
        assert!(!is_approximate("March 7, 2024"));
    }
}
