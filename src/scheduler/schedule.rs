//! Cron schedule expressions
//!
//! Accepts standard 5-field cron (`"<min> <hour> <dom> <month> <dow>"`),
//! the 6/7-field form with seconds understood by the `cron` crate, and the
//! `@daily`-style macros. Times are evaluated in the configured timezone.

use crate::error::{AppError, Result};
use chrono::{DateTime, LocalResult, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

// Candidate wall times examined per lookup; covers a second-resolution
// schedule across a repeated DST hour
const SEARCH_LIMIT: usize = 10_000;

const WEEKDAYS: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    inner: cron::Schedule,
    timezone: Tz,
}

impl Schedule {
    pub fn parse(expression: &str, timezone: Tz) -> Result<Self> {
        let expression = expression.trim();
        let normalized = normalize(expression)?;
        let inner = cron::Schedule::from_str(&normalized)
            .map_err(|e| AppError::Schedule(format!("Invalid schedule '{}': {}", expression, e)))?;

        Ok(Self {
            expression: expression.split_whitespace().collect::<Vec<_>>().join(" "),
            inner,
            timezone,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First fire time strictly after `after`
    ///
    /// The expression is matched against local wall time. Wall times that
    /// fall into a DST gap are skipped; repeated wall times fire on their
    /// first occurrence.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone).naive_local();
        let wall = Utc.from_utc_datetime(&local);

        for candidate in self.inner.after(&wall).take(SEARCH_LIMIT) {
            let fire = match self.timezone.from_local_datetime(&candidate.naive_utc()) {
                LocalResult::Single(fire) => fire,
                LocalResult::Ambiguous(earliest, _) => earliest,
                LocalResult::None => continue,
            };
            let fire = fire.with_timezone(&Utc);
            if fire > after {
                return Some(fire);
            }
        }
        None
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.expression, self.timezone)
    }
}

/// Rewrite a 5-field expression into the seconds-first form of the `cron`
/// crate; other forms pass through unchanged
fn normalize(expression: &str) -> Result<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        0 => Err(AppError::Schedule("Empty schedule expression".to_string())),
        1 if fields[0].starts_with('@') => Ok(fields[0].to_string()),
        5 => Ok(format!(
            "0 {} {} {} {} {}",
            fields[0],
            fields[1],
            fields[2],
            fields[3],
            weekday_names(fields[4])?
        )),
        6 | 7 => Ok(fields.join(" ")),
        n => Err(AppError::Schedule(format!(
            "Expected 5 to 7 fields in '{}', found {}",
            expression, n
        ))),
    }
}

/// Unix cron counts weekdays from Sunday = 0 (7 is Sunday too); the `cron`
/// crate counts from Sunday = 1. Numeric days become names so both agree.
fn weekday_names(field: &str) -> Result<String> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars().peekable();
    let mut after_step = false;

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            let mut digits = c.to_string();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            if after_step {
                out.push_str(&digits);
            } else {
                let day = digits
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| WEEKDAYS.get(n))
                    .ok_or_else(|| {
                        AppError::Schedule(format!("Invalid day of week '{}'", digits))
                    })?;
                out.push_str(day);
            }
            after_step = false;
        } else {
            after_step = c == '/';
            out.push(c);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use chrono_tz::America::New_York;
    use chrono_tz::Asia::Jakarta;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_rejects_invalid_expressions() {
        let invalid = [
            "",
            "0 1 * *",
            "60 1 * * *",
            "0 24 * * *",
            "a 1 * * *",
            "0 1 * * 8",
            "@sometimes",
        ];
        for expression in invalid {
            assert!(
                matches!(Schedule::parse(expression, Jakarta), Err(AppError::Schedule(_))),
                "accepted '{}'",
                expression
            );
        }
    }

    #[test]
    fn test_parse_accepts_standard_cron() {
        let valid = [
            "*/30 * * * *",
            "0 1 * * 1-5",
            "0 1,13 * * *",
            "0 0 1 * *",
            "@daily",
            "0 0 1 * * *",
        ];
        for expression in valid {
            assert!(Schedule::parse(expression, Jakarta).is_ok(), "rejected '{}'", expression);
        }
    }

    #[test]
    fn test_daily_in_jakarta() {
        let schedule = Schedule::parse("0 1 * * *", Jakarta).unwrap();

        // 00:00 WIB, later the same local day
        assert_eq!(
            schedule.next_after(utc(2024, 5, 1, 17, 0, 0)),
            Some(utc(2024, 5, 1, 18, 0, 0))
        );
        // 01:30 WIB, tomorrow
        assert_eq!(
            schedule.next_after(utc(2024, 5, 1, 18, 30, 0)),
            Some(utc(2024, 5, 2, 18, 0, 0))
        );
        // exactly at the fire time, tomorrow
        assert_eq!(
            schedule.next_after(utc(2024, 5, 1, 18, 0, 0)),
            Some(utc(2024, 5, 2, 18, 0, 0))
        );
    }

    #[test]
    fn test_steps_and_lists() {
        let every_half_hour = Schedule::parse("*/30 * * * *", Jakarta).unwrap();
        assert_eq!(
            every_half_hour.next_after(utc(2024, 5, 1, 10, 45, 30)),
            Some(utc(2024, 5, 1, 11, 0, 0))
        );

        let twice_daily = Schedule::parse("0 1,13 * * *", Jakarta).unwrap();
        // 09:00 WIB -> 13:00 WIB
        assert_eq!(
            twice_daily.next_after(utc(2024, 5, 1, 2, 0, 0)),
            Some(utc(2024, 5, 1, 6, 0, 0))
        );
    }

    #[test]
    fn test_weekdays_use_unix_numbering() {
        let weekdays = Schedule::parse("0 1 * * 1-5", chrono_tz::UTC).unwrap();
        // Friday 2024-05-03 02:00 -> Monday 2024-05-06 01:00
        let next = weekdays.next_after(utc(2024, 5, 3, 2, 0, 0)).unwrap();
        assert_eq!(next, utc(2024, 5, 6, 1, 0, 0));
        assert_eq!(next.weekday(), chrono::Weekday::Mon);

        let sunday = Schedule::parse("0 1 * * 7", chrono_tz::UTC).unwrap();
        assert_eq!(sunday.next_after(utc(2024, 5, 1, 0, 0, 0)), Some(utc(2024, 5, 5, 1, 0, 0)));
    }

    #[test]
    fn test_macro_and_monthly() {
        let daily = Schedule::parse("@daily", Jakarta).unwrap();
        // midnight WIB
        assert_eq!(daily.next_after(utc(2024, 5, 1, 10, 0, 0)), Some(utc(2024, 5, 1, 17, 0, 0)));

        let monthly = Schedule::parse("0 0 1 * *", chrono_tz::UTC).unwrap();
        assert_eq!(monthly.next_after(utc(2024, 5, 15, 0, 0, 0)), Some(utc(2024, 6, 1, 0, 0, 0)));
    }

    #[test]
    fn test_skips_dst_gap() {
        let schedule = Schedule::parse("30 2 * * *", New_York).unwrap();
        // 2024-03-10 02:30 does not exist in New York
        assert_eq!(
            schedule.next_after(utc(2024, 3, 10, 5, 0, 0)),
            Some(utc(2024, 3, 11, 6, 30, 0))
        );
    }

    #[test]
    fn test_repeated_hour_fires_once() {
        let schedule = Schedule::parse("30 1 * * *", New_York).unwrap();
        // 2024-11-03 01:30 EDT is the first occurrence
        let first = schedule.next_after(utc(2024, 11, 3, 4, 0, 0)).unwrap();
        assert_eq!(first, utc(2024, 11, 3, 5, 30, 0));
        // Not again at 01:30 EST
        assert_eq!(schedule.next_after(first), Some(utc(2024, 11, 4, 6, 30, 0)));
    }

    #[test]
    fn test_display() {
        let schedule = Schedule::parse(" 0  1 * * * ", Jakarta).unwrap();
        assert_eq!(schedule.to_string(), "0 1 * * * (Asia/Jakarta)");
    }
}
