use chrono::{Datelike, Duration, NaiveDate};
use std::ops::RangeInclusive;

/// Years the calendar works with. Week arithmetic near chrono's date limits
/// would overflow.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 1900..=9999;

pub fn is_supported(day: NaiveDate) -> bool {
    SUPPORTED_YEARS.contains(&day.year())
}

/// Monday on or before `day`.
pub fn week_start_for(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

/// The seven dates of the week containing `day`, Monday first.
pub fn week_days(day: NaiveDate) -> [NaiveDate; 7] {
    let start = week_start_for(day);
    std::array::from_fn(|offset| start + Duration::days(offset as i64))
}

/// Navigation anchors for the week grid, all Mondays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekNavigation {
    pub previous: NaiveDate,
    pub current: NaiveDate,
    pub next: NaiveDate,
    pub this_week: NaiveDate,
}

impl WeekNavigation {
    pub fn new(shown: NaiveDate, today: NaiveDate) -> Self {
        let current = week_start_for(shown);
        Self {
            previous: current - Duration::days(7),
            current,
            next: current + Duration::days(7),
            this_week: week_start_for(today),
        }
    }
}
