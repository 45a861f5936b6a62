//! Month view pipeline: weeks, progress, catalog and card actions for one month.

use crate::repo::RepoError;
use crate::NovelService;
use chrono::NaiveDate;
use journal_calendar::{
    cover_image, current_week_progress, day_fill_map, month_bounds, monday_of, monthly_progress,
    week_containing, week_progress, weeks_in_month, CalendarError, CurrentWeekProgress,
};
use journal_core::{
    Entitlement, Genre, JournalEntry, StoryRecord, UserId, ValidationError, Week, WeekKey,
};
use novel_econ::{RenewalOutcome, WeeklyBonusStatus};
use novel_gate::{
    card_action, genres_for_week, offerable_genres, reduce_to_latest_per_genre, CardAction,
    WeekSnapshot,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A collaborator read that failed; the view was built without its data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Notice {
    JournalUnavailable(String),
    StoriesUnavailable(String),
    EntitlementUnavailable(String),
    RenewalUnavailable(String),
    BonusUnavailable(String),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ViewError {
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Everything one week card renders.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeekCard {
    pub key: WeekKey,
    pub week: Week,
    pub progress: u8,
    /// Monday first.
    pub filled_days: [bool; 7],
    /// Latest story per genre.
    pub stories: BTreeMap<Genre, StoryRecord>,
    pub action: CardAction,
    /// Genres the create screen may offer.
    pub offerable: Vec<Genre>,
    pub cover_image: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<WeekCard>,
    pub month_progress: u8,
    /// Week containing today, whatever month is on display.
    pub current_week: CurrentWeekProgress,
    pub current_bonus: Option<WeeklyBonusStatus>,
    pub entitlement: Entitlement,
    pub renewal: Option<RenewalOutcome>,
    pub notices: Vec<Notice>,
}

/// Keep the value, or fall back to the default and record why.
fn degrade<T: Default>(
    result: Result<T, RepoError>,
    notices: &mut Vec<Notice>,
    notice: fn(String) -> Notice,
) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "collaborator read failed; continuing without it");
            notices.push(notice(err.to_string()));
            T::default()
        }
    }
}

fn distinct_days(week: &Week, entries: &[JournalEntry]) -> u32 {
    day_fill_map(week, entries).iter().filter(|&&filled| filled).count() as u32
}

impl NovelService {
    /// Build the view for `(year, month)`. Only an invalid month is an error;
    /// collaborator failures degrade to empty data plus a [`Notice`].
    pub async fn month_view(&self, user: &UserId, year: i32, month: u32) -> Result<MonthView, ViewError> {
        WeekKey::new(year, month, 1)?;
        let weeks = weeks_in_month(year, month)?;
        let (first, last) = month_bounds(year, month)?;
        let today = self.clock.today();
        let mut notices = Vec::new();

        let renewal = match self.accounts.renew_premium(user, today).await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                warn!(error = %err, "premium renewal check failed");
                notices.push(Notice::RenewalUnavailable(err.to_string()));
                None
            }
        };

        let range_start = weeks.first().map_or(first, |w| w.start.min(first));
        let range_end = weeks.last().map_or(last, |w| w.end.max(last));
        let (current_start, current_end) = week_containing(today);
        let (month_entries, current_entries, records, entitlement) = tokio::join!(
            self.journal.fetch_journal_entries(user, range_start, range_end),
            self.journal.fetch_journal_entries(user, current_start, current_end),
            self.stories.fetch_story_records(user),
            self.accounts.get_entitlement(user),
        );
        let entries = degrade(month_entries, &mut notices, Notice::JournalUnavailable);
        let current_entries = degrade(current_entries, &mut notices, Notice::JournalUnavailable);
        let records = degrade(records, &mut notices, Notice::StoriesUnavailable);
        let entitlement = degrade(entitlement, &mut notices, Notice::EntitlementUnavailable);

        let catalog = reduce_to_latest_per_genre(&records);
        let mut cards = Vec::with_capacity(weeks.len());
        for week in weeks {
            let key = WeekKey::for_week(year, month, &week)?;
            let existing = genres_for_week(&catalog, &key);
            let snapshot = WeekSnapshot::from_entries(week, &entries, today);
            cards.push(WeekCard {
                key,
                week,
                progress: week_progress(&week, &entries),
                filled_days: day_fill_map(&week, &entries),
                stories: catalog.get(&key).cloned().unwrap_or_default(),
                action: card_action(&snapshot, entitlement.tier, &existing),
                offerable: offerable_genres(entitlement.tier, &existing),
                cover_image: cover_image(&week, &entries, &self.config.default_cover_image),
            });
        }

        let current_week = current_week_progress(self.clock.as_ref(), &current_entries);
        let current_bonus = degrade(
            self.accounts
                .weekly_bonus_status(user, current_week.week.start, current_week.filled_count)
                .await
                .map(Some),
            &mut notices,
            Notice::BonusUnavailable,
        );

        debug!(year, month, weeks = cards.len(), notices = notices.len(), "month view built");
        Ok(MonthView {
            year,
            month,
            month_progress: monthly_progress(year, month, &entries)?,
            weeks: cards,
            current_week,
            current_bonus,
            entitlement,
            renewal,
            notices,
        })
    }

    /// Claim the completion bonus for the week containing `date`, counted from a fresh read.
    pub async fn claim_weekly_bonus(&self, user: &UserId, date: NaiveDate) -> Result<u32, RepoError> {
        let week = Week::starting(0, monday_of(date));
        let entries = self
            .journal
            .fetch_journal_entries(user, week.start, week.end)
            .await?;
        let written = distinct_days(&week, &entries);
        self.accounts
            .claim_weekly_bonus(user, week.start, written)
            .await
    }
}
