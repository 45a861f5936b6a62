use chrono::{Datelike, Duration, Months, NaiveDate};
use journal_core::{Week, DAYS_PER_WEEK};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

/// How far past the 1st of the month the scan may walk before it is treated as a defect.
const SAFEGUARD_MONTHS: u32 = 6;

/// Errors produced by calendar helpers.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CalendarError {
    /// `(year, month)` does not name a calendar month.
    #[error("invalid month {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
    /// The week scan walked past its bound; this is a logic defect, never valid input.
    #[error("week scan for {year}-{month} ran past its six month bound")]
    SafeguardExceeded { year: i32, month: u32 },
}

/// A week located in the month that owns its Sunday.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthWeek {
    pub year: i32,
    pub month: u32,
    pub week: Week,
}

/// First and last calendar day of `(year, month)`.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), CalendarError> {
    let invalid = CalendarError::InvalidMonth { year, month };
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(invalid.clone())?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or(invalid)?;
    Ok((first, last))
}

/// Monday on or before `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Monday and Sunday of the week containing `date`.
pub fn week_containing(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let week = Week::starting(0, monday_of(date));
    (week.start, week.end)
}

/// The Monday-Sunday week containing `date`, numbered within the month of its Sunday.
///
/// A month's first Sunday falls on day 1..=7, so the week number follows from
/// the Sunday's day of month alone.
pub fn week_of(date: NaiveDate) -> MonthWeek {
    let start = monday_of(date);
    let week = Week::starting(0, start);
    let sunday = week.end;
    MonthWeek {
        year: sunday.year(),
        month: sunday.month(),
        week: Week {
            week_num: (sunday.day() - 1) / DAYS_PER_WEEK + 1,
            ..week
        },
    }
}

/// Ordered Monday-start weeks whose Sunday falls in `(year, month)`.
///
/// The first emitted week is always `week_num = 1`, even when its Monday lies
/// in the previous month. A month whose 1st is a Monday starts on that Monday.
pub fn weeks_in_month(year: i32, month: u32) -> Result<Vec<Week>, CalendarError> {
    let invalid = CalendarError::InvalidMonth { year, month };
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(invalid.clone())?;
    let limit = first
        .checked_add_months(Months::new(SAFEGUARD_MONTHS))
        .ok_or(invalid.clone())?;
    let days_back = Duration::days(i64::from(first.weekday().num_days_from_monday()));
    let step = Duration::days(i64::from(DAYS_PER_WEEK));
    let span = Duration::days(i64::from(DAYS_PER_WEEK) - 1);

    let mut weeks: Vec<Week> = Vec::with_capacity(5);
    let mut monday = first.checked_sub_signed(days_back).ok_or(invalid.clone())?;
    loop {
        monday.checked_add_signed(span).ok_or(invalid.clone())?;
        let window = Week::starting(weeks.len() as u32 + 1, monday);
        if window.end.year() == year && window.end.month() == month {
            weeks.push(window);
        } else if !weeks.is_empty() {
            break;
        }
        monday = monday.checked_add_signed(step).ok_or(invalid.clone())?;
        if monday > limit {
            error!(year, month, "week scan exceeded safeguard");
            return Err(CalendarError::SafeguardExceeded { year, month });
        }
    }
    debug!(year, month, weeks = weeks.len(), "computed month weeks");
    Ok(weeks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn leap_february_leading_spill() {
        let weeks = weeks_in_month(2024, 2).unwrap();
        assert_eq!(weeks[0].week_num, 1);
        assert_eq!(weeks[0].start, d(2024, 1, 29));
        assert_eq!(weeks[0].end, d(2024, 2, 4));
        let last = weeks.last().unwrap();
        assert_eq!(last.week_num, 4);
        assert_eq!(last.end, d(2024, 2, 25));

        // Feb 26..29 belong to the week of Sunday 2024-03-03, which is March's first.
        let march = weeks_in_month(2024, 3).unwrap();
        assert_eq!(march[0].start, d(2024, 2, 26));
        assert_eq!(march[0].end, d(2024, 3, 3));
        assert_eq!(march[0].week_num, 1);
    }

    #[test]
    fn month_starting_on_monday_has_no_leading_spill() {
        // 2024-01-01 is a Monday.
        let weeks = weeks_in_month(2024, 1).unwrap();
        assert_eq!(weeks[0].start, d(2024, 1, 1));
        assert_eq!(weeks[0].end, d(2024, 1, 7));
        assert_eq!(weeks.len(), 4);
        assert_eq!(weeks[3].end, d(2024, 1, 28));
    }

    #[test]
    fn month_starting_on_sunday_takes_previous_monday() {
        // 2024-09-01 is a Sunday.
        let weeks = weeks_in_month(2024, 9).unwrap();
        assert_eq!(weeks[0].start, d(2024, 8, 26));
        assert_eq!(weeks[0].end, d(2024, 9, 1));
        assert_eq!(weeks.len(), 5);
    }

    #[test]
    fn december_rolls_into_next_year() {
        // 2025-12-31 is a Wednesday; its week ends 2026-01-04 and belongs to January.
        let weeks = weeks_in_month(2025, 12).unwrap();
        assert_eq!(weeks.last().unwrap().end, d(2025, 12, 28));
        let jan = weeks_in_month(2026, 1).unwrap();
        assert_eq!(jan[0].start, d(2025, 12, 29));
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert_eq!(
            weeks_in_month(2024, 13),
            Err(CalendarError::InvalidMonth {
                year: 2024,
                month: 13
            })
        );
        assert!(weeks_in_month(2024, 0).is_err());
    }

    #[test]
    fn months_at_the_date_range_edges_are_invalid() {
        let (min_year, max_year) = (NaiveDate::MIN.year(), NaiveDate::MAX.year());
        assert_eq!(
            weeks_in_month(min_year, 1),
            Err(CalendarError::InvalidMonth {
                year: min_year,
                month: 1
            })
        );
        assert_eq!(
            weeks_in_month(max_year, 12),
            Err(CalendarError::InvalidMonth {
                year: max_year,
                month: 12
            })
        );
        assert!(weeks_in_month(max_year - 1, 6).is_ok());
    }

    #[test]
    fn week_of_matches_month_listing() {
        let located = week_of(d(2024, 3, 1));
        assert_eq!((located.year, located.month), (2024, 3));
        assert_eq!(located.week.week_num, 1);
        assert_eq!(located.week.start, d(2024, 2, 26));

        let located = week_of(d(2024, 2, 29));
        assert_eq!((located.year, located.month), (2024, 3));
        assert_eq!(located.week.week_num, 1);
    }

    #[test]
    fn month_bounds_handle_leap_years() {
        assert_eq!(month_bounds(2024, 2).unwrap(), (d(2024, 2, 1), d(2024, 2, 29)));
        assert_eq!(month_bounds(2023, 2).unwrap().1, d(2023, 2, 28));
        assert_eq!(month_bounds(2024, 12).unwrap().1, d(2024, 12, 31));
        assert!(month_bounds(2024, 0).is_err());
    }

    #[test]
    fn week_containing_spans_monday_to_sunday() {
        assert_eq!(week_containing(d(2024, 2, 29)), (d(2024, 2, 26), d(2024, 3, 3)));
        assert_eq!(week_containing(d(2024, 2, 26)), (d(2024, 2, 26), d(2024, 3, 3)));
        assert_eq!(week_containing(d(2024, 3, 3)), (d(2024, 2, 26), d(2024, 3, 3)));
    }

    proptest! {
        #[test]
        fn weeks_tile_their_sundays(year in 1971i32..2099, month in 1u32..=12) {
            let weeks = weeks_in_month(year, month).unwrap();
            prop_assert!(weeks.len() == 4 || weeks.len() == 5);
            for (i, w) in weeks.iter().enumerate() {
                prop_assert_eq!(w.week_num, i as u32 + 1);
                prop_assert_eq!(w.start.weekday(), Weekday::Mon);
                prop_assert_eq!(w.end - w.start, Duration::days(6));
                prop_assert_eq!((w.end.year(), w.end.month()), (year, month));
                if i > 0 {
                    prop_assert_eq!(w.start, weeks[i - 1].end + Duration::days(1));
                }
            }
            // Every Sunday of the month is some week's end.
            let sundays = (1..=31u32)
                .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
                .filter(|date| date.weekday() == Weekday::Sun)
                .count();
            prop_assert_eq!(sundays, weeks.len());
        }

        #[test]
        fn week_of_agrees_with_listing(year in 1971i32..2099, month in 1u32..=12, day in 1u32..=28) {
            let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
            let located = week_of(date);
            let listed = weeks_in_month(located.year, located.month).unwrap();
            prop_assert!(listed.contains(&located.week));
        }
    }
}
