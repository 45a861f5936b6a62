use chrono::{Local, NaiveDate};

/// Source of "today" for wall-clock anchored computations.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local system date.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one date.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
