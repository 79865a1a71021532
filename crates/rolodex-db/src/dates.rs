use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

/// Number of distinct (month, day) pairs in a calendar, Feb 29 included.
const CALENDAR_DAYS: usize = 366;

/// The calendar days covered by a birthday lookahead window.
///
/// Matching is on exact (month, day) pairs. Feb 29 birthdays are celebrated on
/// Mar 1 in non-leap years, so a window that reaches Mar 1 of a non-leap year
/// also contains (2, 29).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    pairs: BTreeSet<(u32, u32)>,
}

impl DateWindow {
    pub fn contains(&self, month: u32, day: u32) -> bool {
        self.pairs.contains(&(month, day))
    }

    pub fn pairs(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.pairs.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// True when every calendar day is in the window, so no date filter applies.
    pub fn is_full_year(&self) -> bool {
        self.pairs.len() >= CALENDAR_DAYS
    }

    /// Distinct months touched by the window, ascending.
    pub fn months(&self) -> Vec<u32> {
        self.pairs
            .iter()
            .map(|(m, _)| *m)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct days of month touched by the window, ascending.
    pub fn days(&self) -> Vec<u32> {
        self.pairs
            .iter()
            .map(|(_, d)| *d)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// `MM-DD` keys, comparable with SQLite's `strftime('%m-%d', ...)`.
    pub(crate) fn month_day_keys(&self) -> Vec<String> {
        self.pairs
            .iter()
            .map(|(m, d)| format!("{:02}-{:02}", m, d))
            .collect()
    }
}

/// Calendar days in `[today, today + days]`, inclusive on both ends.
pub fn birthday_window(today: NaiveDate, days: u32) -> DateWindow {
    // One extra day past a full year is enough to see every pair once.
    let span = (days as usize).min(CALENDAR_DAYS) + 1;

    let mut pairs = BTreeSet::new();
    for date in today.iter_days().take(span) {
        pairs.insert((date.month(), date.day()));
        if date.month() == 3 && date.day() == 1 && !is_leap_year(date.year()) {
            pairs.insert((2, 29));
        }
    }

    DateWindow { pairs }
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}
