//! Five-field crontab expressions
//!
//! The `cron` crate expects a leading seconds field and numbers weekdays
//! 1-7 starting on Sunday, while crontab uses 0-7 with both 0 and 7 meaning
//! Sunday. Expressions are translated before parsing so operators can keep
//! writing the syntax they know.

use chrono::{DateTime, Utc};
use ::cron::Schedule;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing a cron expression
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("cron expression {expression:?} must have 5 fields, found {found}")]
    FieldCount { expression: String, found: usize },

    #[error("invalid day-of-week value {0:?}")]
    DayOfWeek(String),

    #[error("invalid cron expression {expression:?}: {reason}")]
    Parse { expression: String, reason: String },
}

/// A parsed crontab schedule, evaluated in UTC
#[derive(Clone)]
pub struct CronSchedule {
    expression: String,
    inner: Schedule,
}

impl CronSchedule {
    /// Parse a standard five-field crontab expression or an `@daily`-style shortcut
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let trimmed = expression.trim();
        let expanded = expand_shortcut(trimmed).unwrap_or(trimmed);

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = fields[..] else {
            return Err(ScheduleError::FieldCount {
                expression: expression.to_string(),
                found: fields.len(),
            });
        };

        let day_of_week = translate_day_of_week(day_of_week)?;
        let translated = format!("0 {minute} {hour} {day_of_month} {month} {day_of_week}");

        let inner = Schedule::from_str(&translated).map_err(|e| ScheduleError::Parse {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            expression: trimmed.to_string(),
            inner,
        })
    }

    /// The expression as written by the operator
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.inner.after(after).next()
    }

    /// Number of fire times in `(after, until]`
    pub fn fires_between(&self, after: &DateTime<Utc>, until: &DateTime<Utc>) -> u64 {
        self.inner
            .after(after)
            .take_while(|t| t <= until)
            .count() as u64
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronSchedule").field(&self.expression).finish()
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl FromStr for CronSchedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn expand_shortcut(expression: &str) -> Option<&'static str> {
    let expanded = match expression.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => "0 0 1 1 *",
        "@monthly" => "0 0 1 * *",
        "@weekly" => "0 0 * * 0",
        "@daily" | "@midnight" => "0 0 * * *",
        "@hourly" => "0 * * * *",
        _ => return None,
    };
    Some(expanded)
}

const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Crontab weekday (0-7, 7 is Sunday again) from a number or three-letter name
fn crontab_day(token: &str) -> Option<u8> {
    if let Ok(day) = token.parse::<u8>() {
        return (day <= 7).then_some(day);
    }
    let lower = token.to_ascii_lowercase();
    DAY_NAMES
        .iter()
        .position(|name| *name == lower)
        .map(|day| day as u8)
}

/// `cron` crate ordinal (1 = Sunday) for a crontab weekday
fn ordinal(day: u8) -> u8 {
    if day == 7 {
        1
    } else {
        day + 1
    }
}

fn translate_day_of_week(field: &str) -> Result<String, ScheduleError> {
    let invalid = || ScheduleError::DayOfWeek(field.to_string());
    let mut items = Vec::new();

    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => {
                let step: u8 = step.parse().ok().filter(|s| *s > 0).ok_or_else(invalid)?;
                (base, Some(step))
            }
            None => (item, None),
        };
        let suffix = step.map(|s| format!("/{s}")).unwrap_or_default();

        if base == "*" || base == "?" {
            // Both numberings start on Sunday, so stepping from the start lines up
            items.push(format!("{base}{suffix}"));
            continue;
        }

        match base.split_once('-') {
            Some((start, end)) => {
                let start = crontab_day(start).ok_or_else(invalid)?;
                let end = crontab_day(end).ok_or_else(invalid)?;
                if start > end {
                    return Err(invalid());
                }

                if end < 7 {
                    items.push(format!("{}-{}{suffix}", ordinal(start), ordinal(end)));
                } else if start == 7 {
                    items.push(ordinal(7).to_string());
                } else {
                    // Crontab 7 wraps to Sunday, which sits at the bottom of the ordinal range
                    items.push(format!("{}-7{suffix}", ordinal(start)));
                    let hits_sunday = step.map_or(true, |s| (7 - start) % s == 0);
                    if hits_sunday {
                        items.push(ordinal(7).to_string());
                    }
                }
            }
            None => {
                let day = crontab_day(base).ok_or_else(invalid)?;
                items.push(format!("{}{suffix}", ordinal(day)));
            }
        }
    }

    if items.is_empty() {
        return Err(invalid());
    }
    Ok(items.join(","))
}
