//! Five-field cron expressions (`minute hour day-of-month month day-of-week`).
//!
//! Supported syntax per field: `*`, single values, `a-b` ranges, `*/n`, `a-b/n`
//! and `a/n` steps, comma-separated lists, three-letter month and weekday
//! names. Day-of-week accepts both `0` and `7` for Sunday.
//!
//! Day matching follows POSIX cron: when both day-of-month and day-of-week are
//! restricted (neither starts with `*`), a day matches if *either* field does.

use std::fmt;
use std::str::FromStr;

use jiff::ToSpan;
use jiff::civil::{Date, DateTime, Time};
use thiserror::Error;

/// How far `upcoming` searches before giving up on expressions that (almost)
/// never fire, such as `0 0 30 2 *`.
const MAX_SEARCH_DAYS: i32 = 366 * 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid {field} field '{value}': {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
}

struct FieldSpec {
    name: &'static str,
    min: u8,
    max: u8,
    names: &'static [&'static str],
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &[
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ],
};
// 7 is accepted as an alias for Sunday and folded into bit 0 after parsing
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &["sun", "mon", "tue", "wed", "thu", "fri", "sat"],
};

/// A parsed cron expression, evaluated against local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::FieldCount(fields.len()));
        }

        let mut days_of_week = parse_field(fields[4], &DAY_OF_WEEK)?;
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week | 1) & !(1 << 7);
        }

        Ok(Self {
            expression: fields.join(" "),
            minutes: parse_field(fields[0], &MINUTE)?,
            hours: parse_field(fields[1], &HOUR)?,
            days_of_month: parse_field(fields[2], &DAY_OF_MONTH)?,
            months: parse_field(fields[3], &MONTH)?,
            days_of_week,
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    /// Normalized expression (fields separated by single spaces).
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the schedule fires in the minute containing `at`.
    pub fn matches(&self, at: DateTime) -> bool {
        has(self.minutes, at.minute())
            && has(self.hours, at.hour())
            && self.day_matches(at.date())
    }

    fn day_matches(&self, date: Date) -> bool {
        if !has(self.months, date.month()) {
            return false;
        }
        let dom = has(self.days_of_month, date.day());
        let dow = has(self.days_of_week, date.weekday().to_sunday_zero_offset());
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// The next `count` firing minutes strictly after `after`.
    ///
    /// Returns fewer entries when the expression stops firing within the
    /// search horizon.
    pub fn upcoming(&self, after: DateTime, count: usize) -> Vec<DateTime> {
        let mut found = Vec::with_capacity(count);
        let Some(mut cursor) = next_minute(after) else {
            return found;
        };
        let Ok(horizon) = after.date().checked_add(MAX_SEARCH_DAYS.days()) else {
            return found;
        };

        while found.len() < count && cursor.date() <= horizon {
            let next = if !self.day_matches(cursor.date()) {
                cursor
                    .date()
                    .tomorrow()
                    .ok()
                    .map(|day| day.to_datetime(Time::midnight()))
            } else if !has(self.hours, cursor.hour()) {
                cursor
                    .with()
                    .minute(0)
                    .build()
                    .ok()
                    .and_then(|hour| hour.checked_add(1.hour()).ok())
            } else {
                if has(self.minutes, cursor.minute()) {
                    found.push(cursor);
                }
                cursor.checked_add(1.minute()).ok()
            };

            match next {
                Some(next) => cursor = next,
                None => break,
            }
        }

        found
    }
}

impl FromStr for CronSchedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn has(set: u64, value: i8) -> bool {
    (0..64).contains(&value) && set & (1u64 << value) != 0
}

/// Start of the minute following the one containing `at`.
fn next_minute(at: DateTime) -> Option<DateTime> {
    at.with()
        .second(0)
        .subsec_nanosecond(0)
        .build()
        .ok()?
        .checked_add(1.minute())
        .ok()
}

fn parse_field(field: &str, spec: &FieldSpec) -> Result<u64, CronError> {
    let invalid = |reason: String| CronError::InvalidField {
        field: spec.name,
        value: field.to_string(),
        reason,
    };

    let mut set = 0u64;
    for item in field.split(',') {
        if item.is_empty() {
            return Err(invalid("empty list item".to_string()));
        }

        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u8 = step
                    .parse()
                    .map_err(|_| invalid(format!("step '{step}' is not a number")))?;
                if step == 0 {
                    return Err(invalid("step must be at least 1".to_string()));
                }
                (range, Some(step))
            }
            None => (item, None),
        };

        let (start, end) = if range == "*" {
            (spec.min, spec.max)
        } else if let Some((low, high)) = range.split_once('-') {
            let low = parse_value(low, spec).map_err(invalid)?;
            let high = parse_value(high, spec).map_err(invalid)?;
            if low > high {
                return Err(invalid(format!("range {low}-{high} is reversed")));
            }
            (low, high)
        } else {
            let value = parse_value(range, spec).map_err(invalid)?;
            // `a/n` runs from a to the end of the field
            match step {
                Some(_) => (value, spec.max),
                None => (value, value),
            }
        };

        let step = step.unwrap_or(1) as usize;
        for value in (start..=end).step_by(step) {
            set |= 1u64 << value;
        }
    }

    Ok(set)
}

fn parse_value(raw: &str, spec: &FieldSpec) -> Result<u8, String> {
    let lower = raw.to_ascii_lowercase();
    if let Some(index) = spec.names.iter().position(|name| *name == lower) {
        // Month names are 1-based, weekday names 0-based
        return Ok(index as u8 + spec.min);
    }

    let value: u8 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number or known name"))?;
    if value < spec.min || value > spec.max {
        return Err(format!(
            "{value} is outside {}-{}",
            spec.min, spec.max
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;
    use proptest::prelude::*;

    fn cron(expr: &str) -> CronSchedule {
        CronSchedule::parse(expr).expect("valid cron expression")
    }

    #[test]
    fn test_daily_at_two() {
        let schedule = cron("0 2 * * *");
        assert!(schedule.matches(date(2024, 1, 15).at(2, 0, 0, 0)));
        assert!(schedule.matches(date(2024, 1, 15).at(2, 0, 59, 0)));
        assert!(!schedule.matches(date(2024, 1, 15).at(2, 1, 0, 0)));
        assert!(!schedule.matches(date(2024, 1, 15).at(14, 0, 0, 0)));
    }

    #[test]
    fn test_every_six_minutes() {
        let schedule = cron("*/6 * * * *");
        for minute in [0, 6, 12, 54] {
            assert!(schedule.matches(date(2024, 3, 1).at(9, minute, 0, 0)));
        }
        for minute in [1, 5, 7, 59] {
            assert!(!schedule.matches(date(2024, 3, 1).at(9, minute, 0, 0)));
        }
    }

    #[test]
    fn test_weekdays_only() {
        let schedule = cron("30 3 * * 1-5");
        // 2024-01-15 is a Monday, 2024-01-20 a Saturday
        assert!(schedule.matches(date(2024, 1, 15).at(3, 30, 0, 0)));
        assert!(schedule.matches(date(2024, 1, 19).at(3, 30, 0, 0)));
        assert!(!schedule.matches(date(2024, 1, 20).at(3, 30, 0, 0)));
        assert!(!schedule.matches(date(2024, 1, 21).at(3, 30, 0, 0)));
    }

    #[test]
    fn test_day_of_month_or_day_of_week() {
        // The 13th of the month or any Friday
        let schedule = cron("0 0 13 * 5");
        // Thursday 2024-06-13
        assert!(schedule.matches(date(2024, 6, 13).at(0, 0, 0, 0)));
        // Friday 2024-06-14
        assert!(schedule.matches(date(2024, 6, 14).at(0, 0, 0, 0)));
        // Saturday 2024-06-15
        assert!(!schedule.matches(date(2024, 6, 15).at(0, 0, 0, 0)));
    }

    #[test]
    fn test_star_day_field_is_not_ored() {
        // Only day-of-week is restricted, so the 13th alone does not match
        let schedule = cron("0 0 * * 5");
        assert!(!schedule.matches(date(2024, 6, 13).at(0, 0, 0, 0)));
        assert!(schedule.matches(date(2024, 6, 14).at(0, 0, 0, 0)));
    }

    #[test]
    fn test_names_and_sunday_alias() {
        let by_name = cron("0 12 * jan-mar sun");
        let by_number = cron("0 12 * 1-3 7");
        // Sunday 2024-01-14
        let at = date(2024, 1, 14).at(12, 0, 0, 0);
        assert!(by_name.matches(at));
        assert!(by_number.matches(at));
        assert!(!by_name.matches(date(2024, 4, 14).at(12, 0, 0, 0)));
    }

    #[test]
    fn test_lists_and_offset_steps() {
        let schedule = cron("5/20 8,20 * * *");
        for minute in [5, 25, 45] {
            assert!(schedule.matches(date(2024, 2, 2).at(20, minute, 0, 0)));
        }
        assert!(!schedule.matches(date(2024, 2, 2).at(8, 0, 0, 0)));
        assert!(!schedule.matches(date(2024, 2, 2).at(9, 5, 0, 0)));
    }

    #[test]
    fn test_invalid_expressions() {
        assert_eq!(CronSchedule::parse("* * * *"), Err(CronError::FieldCount(4)));
        assert_eq!(CronSchedule::parse(""), Err(CronError::FieldCount(0)));
        for bad in [
            "60 * * * *",
            "* 24 * * *",
            "* * 0 * *",
            "* * * 13 *",
            "* * * * 8",
            "*/0 * * * *",
            "5-1 * * * *",
            "a * * * *",
            "1,,2 * * * *",
        ] {
            assert!(
                matches!(CronSchedule::parse(bad), Err(CronError::InvalidField { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_expression_is_normalized() {
        assert_eq!(cron("  0   2 * *  * ").to_string(), "0 2 * * *");
    }

    #[test]
    fn test_upcoming_runs() {
        let schedule = cron("0 2 * * *");
        let runs = schedule.upcoming(date(2024, 1, 15).at(2, 0, 30, 0), 3);
        assert_eq!(
            runs,
            vec![
                date(2024, 1, 16).at(2, 0, 0, 0),
                date(2024, 1, 17).at(2, 0, 0, 0),
                date(2024, 1, 18).at(2, 0, 0, 0),
            ]
        );
    }

    #[test]
    fn test_upcoming_is_strictly_after() {
        let schedule = cron("* * * * *");
        let runs = schedule.upcoming(date(2024, 1, 15).at(10, 0, 0, 0), 2);
        assert_eq!(
            runs,
            vec![date(2024, 1, 15).at(10, 1, 0, 0), date(2024, 1, 15).at(10, 2, 0, 0)]
        );
    }

    #[test]
    fn test_upcoming_leap_day() {
        let schedule = cron("0 0 29 2 *");
        let runs = schedule.upcoming(date(2024, 3, 1).at(0, 0, 0, 0), 1);
        assert_eq!(runs, vec![date(2028, 2, 29).at(0, 0, 0, 0)]);
    }

    #[test]
    fn test_upcoming_never_firing() {
        assert!(cron("0 0 31 2 *").upcoming(date(2024, 1, 1).at(0, 0, 0, 0), 1).is_empty());
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(input in "[0-9a-z*/,\\- ]{0,40}") {
            let _ = CronSchedule::parse(&input);
        }

        #[test]
        fn prop_upcoming_entries_match(
            minute in 0u8..60,
            hour_step in 1u8..12,
            day in 1i8..28,
        ) {
            let schedule = cron(&format!("{minute} */{hour_step} * * *"));
            let start = date(2024, 5, day).at(7, 13, 0, 0);
            let runs = schedule.upcoming(start, 5);
            prop_assert_eq!(runs.len(), 5);
            for run in runs {
                prop_assert!(run > start);
                prop_assert!(schedule.matches(run));
            }
        }
    }
}
