//! Calendar-date arithmetic used throughout scheduling.
//!
//! All dates are civil calendar dates (`chrono::NaiveDate`); the engine never
//! mixes these with instants. Timezone handling, if any, is the caller's
//! concern — these primitives operate purely on dates.

use chrono::{Datelike, Duration, NaiveDate};

/// Returns `true` if `year` is a leap year in the proleptic Gregorian calendar.
#[must_use]
pub fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 1, 1).is_some() && NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Computes the anniversary of `anchor` falling in `year`.
///
/// A Feb 29 anchor in a non-leap `year` falls back to Feb 28, per the
/// calendar policy of the scheduling engine: the anniversary itself never
/// moves to March, only the post-window computation can be steered there via
/// a jurisdiction's `leap_year_override`.
#[must_use]
pub fn anniversary_in(year: i32, anchor: NaiveDate) -> NaiveDate {
    let (month, day) = (anchor.month(), anchor.day());
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 2, 28).expect("Feb 28 always exists"))
}

/// Returns the anniversary of `anchor` that falls on or after `from`: the
/// anniversary in `from`'s year if it has not yet passed, else the
/// anniversary in the following year.
#[must_use]
pub fn next_anniversary_on_or_after(anchor: NaiveDate, from: NaiveDate) -> NaiveDate {
    let candidate = anniversary_in(from.year(), anchor);
    if candidate >= from {
        candidate
    } else {
        anniversary_in(from.year() + 1, anchor)
    }
}

/// Adds (or subtracts, for negative `n`) `n` days to `date`.
#[must_use]
pub fn add_days(date: NaiveDate, n: i64) -> NaiveDate {
    date + Duration::days(n)
}

/// Computes age in whole years as of `on_date`, floored.
///
/// Returns 0 if `on_date` precedes `birth_date` (no contact in this system
/// should have a future birth date, but the function does not panic on one).
#[must_use]
pub fn age_on(birth_date: NaiveDate, on_date: NaiveDate) -> i32 {
    if on_date < birth_date {
        return 0;
    }
    let mut age = on_date.year() - birth_date.year();
    let had_birthday_this_year = (on_date.month(), on_date.day()) >= (birth_date.month(), birth_date.day());
    if !had_birthday_this_year {
        age -= 1;
    }
    age.max(0)
}

/// Signed day count from `a` to `b` (`b - a`).
#[must_use]
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

/// Returns every calendar year touched by the inclusive range `[start, end]`.
#[must_use]
pub fn years_touched(start: NaiveDate, end: NaiveDate) -> Vec<i32> {
    if start > end {
        return Vec::new();
    }
    (start.year()..=end.year()).collect()
}

/// First day of the month containing `date`.
#[must_use]
pub fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).expect("month start always valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn leap_anchor_falls_back_to_feb_28_in_non_leap_year() {
        let anchor = d(1960, 2, 29);
        assert_eq!(anniversary_in(2025, anchor), d(2025, 2, 28));
        assert_eq!(anniversary_in(2024, anchor), d(2024, 2, 29));
    }

    #[test]
    fn next_anniversary_picks_current_or_next_year() {
        let anchor = d(1960, 12, 15);
        assert_eq!(
            next_anniversary_on_or_after(anchor, d(2024, 1, 1)),
            d(2024, 12, 15)
        );
        assert_eq!(
            next_anniversary_on_or_after(anchor, d(2024, 12, 16)),
            d(2025, 12, 15)
        );
    }

    #[test]
    fn age_on_floors_before_birthday() {
        let birth = d(1947, 6, 15);
        assert_eq!(age_on(birth, d(2024, 6, 14)), 76);
        assert_eq!(age_on(birth, d(2024, 6, 15)), 77);
        assert_eq!(age_on(birth, d(2024, 4, 16)), 76);
    }

    #[test]
    fn days_between_is_signed() {
        assert_eq!(days_between(d(2024, 1, 1), d(2024, 1, 10)), 9);
        assert_eq!(days_between(d(2024, 1, 10), d(2024, 1, 1)), -9);
    }

    #[test]
    fn years_touched_spans_inclusive_range() {
        assert_eq!(years_touched(d(2023, 10, 15), d(2024, 12, 31)), vec![2023, 2024]);
        assert_eq!(years_touched(d(2024, 12, 31), d(2023, 10, 15)), Vec::<i32>::new());
    }

    #[test]
    fn month_start_truncates_to_first() {
        assert_eq!(month_start(d(2024, 3, 15)), d(2024, 3, 1));
    }
}
