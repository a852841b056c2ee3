//! Weekend-skipping business-day arithmetic.
//!
//! The calendar knows weekdays only; exchange holidays are a
//! configuration concern the runner does not model.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// True for Monday through Friday.
#[must_use]
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The given date if it is a business day, otherwise the next Monday.
#[must_use]
pub fn business_day_on_or_after(date: NaiveDate) -> NaiveDate {
    let mut day = date;
    while !is_business_day(day) {
        day = day
            .checked_add_days(Days::new(1))
            .unwrap_or(day);
    }
    day
}

/// The first business day strictly after the given date.
#[must_use]
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    business_day_on_or_after(date.checked_add_days(Days::new(1)).unwrap_or(date))
}
