use crate::calendar::{month_bounds, week_of, CalendarError};
use crate::clock::Clock;
use chrono::{Datelike, NaiveDate};
use journal_core::{JournalEntry, Week, DAYS_PER_WEEK};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Progress of the week containing today, independent of the month on display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentWeekProgress {
    /// Year of the month owning the week's Sunday.
    pub year: i32,
    /// Month owning the week's Sunday.
    pub month: u32,
    pub week: Week,
    /// Rounded percentage in [0, 100].
    pub percent: u8,
    /// Distinct dates written inside the week.
    pub filled_count: u32,
    /// Always 7.
    pub total: u32,
}

/// Distinct entry dates within `[start, end]`; duplicate entries for one date count once.
fn written_dates(entries: &[JournalEntry], start: NaiveDate, end: NaiveDate) -> BTreeSet<NaiveDate> {
    entries
        .iter()
        .map(|e| e.date)
        .filter(|date| start <= *date && *date <= end)
        .collect()
}

/// `round(count / denom * 100)`, capped at 100.
fn percent(count: u32, denom: u32) -> u8 {
    if denom == 0 {
        return 0;
    }
    let rounded = (count * 200 + denom) / (2 * denom);
    rounded.min(100) as u8
}

/// Completion of one week, always measured against 7 days even when the week spills
/// into an adjacent month.
pub fn week_progress(week: &Week, entries: &[JournalEntry]) -> u8 {
    let count = written_dates(entries, week.start, week.end).len() as u32;
    percent(count.min(DAYS_PER_WEEK), DAYS_PER_WEEK)
}

/// Completion per `week_num` for every week in `weeks`.
pub fn weekly_progress(weeks: &[Week], entries: &[JournalEntry]) -> BTreeMap<u32, u8> {
    weeks
        .iter()
        .map(|w| (w.week_num, week_progress(w, entries)))
        .collect()
}

/// A week is complete once its progress reaches 100.
pub fn is_complete(progress: u8) -> bool {
    progress >= 100
}

/// Per-day fill flags for the week, Monday first.
pub fn day_fill_map(week: &Week, entries: &[JournalEntry]) -> [bool; 7] {
    let written = written_dates(entries, week.start, week.end);
    let mut map = [false; 7];
    for (slot, day) in map.iter_mut().zip(week.days()) {
        *slot = written.contains(&day);
    }
    map
}

/// Completion of a calendar month: only entries dated inside the month count,
/// divided by the month's day count.
pub fn monthly_progress(year: i32, month: u32, entries: &[JournalEntry]) -> Result<u8, CalendarError> {
    let (first, last) = month_bounds(year, month)?;
    let count = written_dates(entries, first, last).len() as u32;
    Ok(percent(count, last.day()))
}

/// Progress of the week containing `today`.
pub fn current_week_progress_on(today: NaiveDate, entries: &[JournalEntry]) -> CurrentWeekProgress {
    let located = week_of(today);
    let filled_count = written_dates(entries, located.week.start, located.week.end).len() as u32;
    CurrentWeekProgress {
        year: located.year,
        month: located.month,
        week: located.week,
        percent: percent(filled_count, DAYS_PER_WEEK),
        filled_count,
        total: DAYS_PER_WEEK,
    }
}

/// Progress of the week containing the clock's current date.
pub fn current_week_progress(clock: &dyn Clock, entries: &[JournalEntry]) -> CurrentWeekProgress {
    current_week_progress_on(clock.today(), entries)
}

/// First date of the week without an entry; the target of the "fill journal" action.
pub fn next_unwritten_date(week: &Week, entries: &[JournalEntry]) -> Option<NaiveDate> {
    let written = written_dates(entries, week.start, week.end);
    week.days().find(|day| !written.contains(day))
}

/// The week starts strictly after today.
pub fn is_future_week(week: &Week, today: NaiveDate) -> bool {
    week.start > today
}

/// Today lies in the week and already has an entry.
pub fn has_entry_today(week: &Week, entries: &[JournalEntry], today: NaiveDate) -> bool {
    week.contains(today) && entries.iter().any(|e| e.date == today)
}

/// First image of the earliest in-week entry carrying one, else `default`.
pub fn cover_image(week: &Week, entries: &[JournalEntry], default: &str) -> String {
    entries
        .iter()
        .filter(|e| week.contains(e.date) && e.has_image())
        .min_by_key(|e| e.date)
        .and_then(|e| e.image_urls.first().cloned())
        .unwrap_or_else(|| default.to_string())
}
