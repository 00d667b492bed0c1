//! Weekday arithmetic for trading-day iteration.
//!
//! Only weekends are known here. Exchange holidays show up as empty
//! grouped-daily responses and are handled by the callers.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Closest weekday on or before `date`
pub fn weekday_on_or_before(mut date: NaiveDate) -> NaiveDate {
    while is_weekend(date) {
        date -= Duration::days(1);
    }
    date
}

/// Every weekday in `[from, to]`, in chronological order. Empty when `from > to`.
pub fn weekdays_between(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days()
        .take_while(move |day| *day <= to)
        .filter(|day| !is_weekend(*day))
}

/// Candidate dates for the previous trading day before `target`, most recent first.
///
/// Yields at most `max_candidates` weekdays, starting from `target - 1`.
pub fn previous_weekdays(target: NaiveDate, max_candidates: usize) -> Vec<NaiveDate> {
    let mut candidates = Vec::with_capacity(max_candidates);
    let mut date = target - Duration::days(1);
    while candidates.len() < max_candidates {
        date = weekday_on_or_before(date);
        candidates.push(date);
        date -= Duration::days(1);
    }
    candidates
}
