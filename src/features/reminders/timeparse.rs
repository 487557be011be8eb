//! Free-text time expression parser
//!
//! Pure function turning user input like "5 min", "tomorrow 10:00",
//! "18:15" or "15 october" into an absolute timestamp. Rules are tried in
//! fixed priority; the first matching rule decides, no match is a failure.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Datelike, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+)\s*(min|hour|h)").expect("duration regex"));
static TOMORROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\btomorrow\s+(\d{1,2}):(\d{2})\b").expect("tomorrow regex"));
static CLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("clock regex"));
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(\d{1,2})\s+(january|february|march|april|may|june|july|august|september|october|november|december)\b",
    )
    .expect("date regex")
});

/// Parse a reminder time expression relative to `now`.
///
/// Rules, first match wins:
/// 1. `<n> min` / `<n> h` — offset from now
/// 2. `tomorrow HH:MM` — next calendar day
/// 3. `HH:MM` — today; rolls to tomorrow unless strictly in the future
/// 4. `DD <month>` — this year at `default_time`; rolls to next year if past
///
/// Out-of-range clock fields make a rule fall through to the next one;
/// an impossible calendar date (e.g. 31 february) is a failure.
pub fn parse_remind_time(
    input: &str,
    now: NaiveDateTime,
    default_time: NaiveTime,
) -> Option<NaiveDateTime> {
    let input = input.trim().to_lowercase();

    if let Some(caps) = DURATION_RE.captures(&input) {
        let value: i64 = caps[1].parse().ok()?;
        let delta = match &caps[2] {
            "min" => Duration::try_minutes(value)?,
            _ => Duration::try_hours(value)?,
        };
        return now.checked_add_signed(delta)?.with_nanosecond(0);
    }

    if let Some(caps) = TOMORROW_RE.captures(&input) {
        let (hour, minute) = clock_fields(&caps)?;
        if hour <= 23 && minute <= 59 {
            return now.date().succ_opt()?.and_hms_opt(hour, minute, 0);
        }
    }

    if let Some(caps) = CLOCK_RE.captures(&input) {
        let (hour, minute) = clock_fields(&caps)?;
        if hour <= 23 && minute <= 59 {
            let candidate = now.date().and_hms_opt(hour, minute, 0)?;
            // No same-instant acceptance: exactly now still rolls over
            if candidate <= now {
                return Some(candidate + Duration::days(1));
            }
            return Some(candidate);
        }
    }

    if let Some(caps) = DATE_RE.captures(&input) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_number(&caps[2])?;
        let date = NaiveDate::from_ymd_opt(now.year(), month, day)?;
        let candidate = date.and_time(default_time);
        if candidate < now {
            return Some(NaiveDate::from_ymd_opt(now.year() + 1, month, day)?.and_time(default_time));
        }
        return Some(candidate);
    }

    None
}

fn clock_fields(caps: &regex::Captures<'_>) -> Option<(u32, u32)> {
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

fn month_number(name: &str) -> Option<u32> {
    let number = match name {
        "january" => 1,
        "february" => 2,
        "march" => 3,
        "april" => 4,
        "may" => 5,
        "june" => 6,
        "july" => 7,
        "august" => 8,
        "september" => 9,
        "october" => 10,
        "november" => 11,
        "december" => 12,
        _ => return None,
    };
    Some(number)
}
