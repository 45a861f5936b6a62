#![deny(warnings)]

//! Calendar and progress computations for the journal engine.
//!
//! This crate provides:
//! - Monday-start week partitioning of a month (a week belongs to the month of its Sunday)
//! - Weekly, monthly and current-week journal completion
//! - Small week helpers used to drive the "fill journal" affordance

mod calendar;
mod clock;
mod progress;

pub use calendar::{
    month_bounds, monday_of, week_containing, week_of, weeks_in_month, CalendarError, MonthWeek,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use progress::{
    cover_image, current_week_progress, current_week_progress_on, day_fill_map,
    has_entry_today, is_complete, is_future_week, monthly_progress, next_unwritten_date,
    week_progress, weekly_progress, CurrentWeekProgress,
};
