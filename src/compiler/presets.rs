//! Relative date presets.
//!
//! Single-date presets (`today`, `yesterday`, `tomorrow`) resolve to one
//! calendar date. Range presets resolve to an inclusive `[start, end]`
//! window; open-ended presets carry only one bound.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde_json::Value;

/// Inclusive date window; a `None` bound is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn until(end: NaiveDate) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    pub fn from(start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }
}

/// A resolved preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePreset {
    Single(NaiveDate),
    Range(DateRange),
}

/// Resolve a preset name against `today`; `None` if the name is not a preset
pub fn resolve_preset(name: &str, today: NaiveDate) -> Option<DatePreset> {
    let preset = match name {
        "today" => DatePreset::Single(today),
        "yesterday" => DatePreset::Single(today.checked_sub_days(Days::new(1))?),
        "tomorrow" => DatePreset::Single(today.checked_add_days(Days::new(1))?),

        "this_week" => DatePreset::Range(week_of(today)?),
        "next_week" => DatePreset::Range(week_of(today.checked_add_days(Days::new(7))?)?),
        "last_week" => DatePreset::Range(week_of(today.checked_sub_days(Days::new(7))?)?),

        "this_month" => DatePreset::Range(month_of(today)?),
        "next_month" => DatePreset::Range(month_of(shift_months(today, 1)?)?),
        "last_month" => DatePreset::Range(month_of(shift_months(today, -1)?)?),

        "this_quarter" => DatePreset::Range(quarter_of(today)?),
        "next_quarter" => DatePreset::Range(quarter_of(shift_months(today, 3)?)?),
        "last_quarter" => DatePreset::Range(quarter_of(shift_months(today, -3)?)?),

        "next_7_days" => {
            DatePreset::Range(DateRange::between(today, today.checked_add_days(Days::new(7))?))
        }
        "last_7_days" => {
            DatePreset::Range(DateRange::between(today.checked_sub_days(Days::new(7))?, today))
        }

        "today_and_earlier" => DatePreset::Range(DateRange::until(today)),
        "overdue" => DatePreset::Range(DateRange::until(today.checked_sub_days(Days::new(1))?)),
        "later_than_today" => DatePreset::Range(DateRange::from(today.checked_add_days(Days::new(1))?)),

        _ => return None,
    };
    Some(preset)
}

/// Parse a 2-element array of `YYYY-MM-DD` strings into an inclusive range
///
/// Bounds given in descending order are swapped.
pub fn parse_literal_range(value: &Value) -> Option<DateRange> {
    let items = value.as_array()?;
    if items.len() != 2 {
        return None;
    }
    let a = parse_date(items[0].as_str()?)?;
    let b = parse_date(items[1].as_str()?)?;
    Some(DateRange::between(a.min(b), a.max(b)))
}

/// Format a date the way presets bind it
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn week_of(day: NaiveDate) -> Option<DateRange> {
    let from_monday = u64::from(day.weekday().num_days_from_monday());
    let start = day.checked_sub_days(Days::new(from_monday))?;
    let end = start.checked_add_days(Days::new(6))?;
    Some(DateRange::between(start, end))
}

fn month_of(day: NaiveDate) -> Option<DateRange> {
    let start = day.with_day(1)?;
    let end = shift_months(start, 1)?.checked_sub_days(Days::new(1))?;
    Some(DateRange::between(start, end))
}

fn quarter_of(day: NaiveDate) -> Option<DateRange> {
    let first_month = (day.month0() / 3) * 3 + 1;
    let start = NaiveDate::from_ymd_opt(day.year(), first_month, 1)?;
    let end = shift_months(start, 3)?.checked_sub_days(Days::new(1))?;
    Some(DateRange::between(start, end))
}

/// Shift by whole months, clamping the day to the target month's length
fn shift_months(day: NaiveDate, months: i32) -> Option<NaiveDate> {
    let delta = Months::new(months.unsigned_abs());
    if months >= 0 {
        day.checked_add_months(delta)
    } else {
        day.checked_sub_months(delta)
    }
}
