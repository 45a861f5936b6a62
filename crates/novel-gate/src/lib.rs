#![deny(warnings)]

//! Story catalog reduction and the generation eligibility gate.
//!
//! The gate is the single authority on whether a story may be generated for a
//! week: callers hand it the week's progress, the account's entitlement and the
//! genres already recorded, and render whatever state it returns.

use chrono::NaiveDate;
use journal_calendar::{has_entry_today, is_complete, is_future_week, next_unwritten_date, week_progress};
use journal_core::{Entitlement, Genre, JournalEntry, StoryRecord, Tier, Week, WeekKey};
use novel_econ::{plan_consumption, ConsumptionPlan};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Latest non-deleted record per (week, genre).
pub type Catalog = BTreeMap<WeekKey, BTreeMap<Genre, StoryRecord>>;

/// Collapse raw records to the most recently created one per (week, genre).
///
/// Deleted records and records that cannot be bucketed (missing or out-of-range
/// week fields, unknown genre) are left out. Equal `created_at` values fall back
/// to the greater id so the choice is stable across calls.
pub fn reduce_to_latest_per_genre(records: &[StoryRecord]) -> Catalog {
    let mut catalog = Catalog::new();
    let mut skipped = 0usize;
    for record in records.iter().filter(|r| !r.deleted) {
        let (Some(key), Some(genre)) = (record.week_key(), record.genre) else {
            skipped += 1;
            continue;
        };
        let slot = catalog.entry(key).or_default();
        match slot.get(&genre) {
            Some(current) if (current.created_at, &current.id) >= (record.created_at, &record.id) => {}
            _ => {
                slot.insert(genre, record.clone());
            }
        }
    }
    if skipped > 0 {
        debug!(skipped, "records without a week bucket left out of catalog");
    }
    catalog
}

/// Genres present for `key` in a reduced catalog.
pub fn genres_for_week(catalog: &Catalog, key: &WeekKey) -> BTreeSet<Genre> {
    catalog
        .get(key)
        .map(|by_genre| by_genre.keys().copied().collect())
        .unwrap_or_default()
}

/// What the gate needs to know about one week, computed from its journal entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSnapshot {
    pub week: Week,
    /// Weekly progress in [0, 100].
    pub progress: u8,
    /// Today lies in the week and already has an entry.
    pub has_entry_today: bool,
    /// The week starts after today.
    pub is_future: bool,
    /// First unwritten date, if any.
    pub next_fill: Option<NaiveDate>,
}

impl WeekSnapshot {
    pub fn from_entries(week: Week, entries: &[JournalEntry], today: NaiveDate) -> Self {
        WeekSnapshot {
            week,
            progress: week_progress(&week, entries),
            has_entry_today: has_entry_today(&week, entries, today),
            is_future: is_future_week(&week, today),
            next_fill: next_unwritten_date(&week, entries),
        }
    }

    pub fn is_complete(&self) -> bool {
        is_complete(self.progress)
    }

    /// Whether the "fill journal" action has anything to do right now.
    pub fn can_fill(&self) -> bool {
        !self.is_future && !self.has_entry_today
    }
}

/// Where the UI should send the user after a refusal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Redirect {
    Upgrade,
    CurrencyShop,
}

/// Decision for one (week, genre) request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    /// Week not fully written; only the fill action is offered.
    Locked { fill_enabled: bool },
    /// First story for the week.
    EligibleNoRecord { plan: ConsumptionPlan },
    /// Premium user adding a genre the week does not have yet.
    EligibleAddGenre { plan: ConsumptionPlan },
    /// Free tier already has a story for the week.
    BlockedTierLimit,
    /// Every catalog genre is already recorded for the week.
    BlockedGenreExhausted,
    /// Premium user asked for a genre the week already has.
    GenreAlreadyRecorded { genre: Genre },
    /// No premium credit and no potion of the requested genre.
    BlockedNoCurrency { genre: Genre },
}

impl GateState {
    pub fn is_allowed(&self) -> bool {
        matches!(
            self,
            GateState::EligibleNoRecord { .. } | GateState::EligibleAddGenre { .. }
        )
    }

    /// Currency unit an allowed generation will spend.
    pub fn plan(&self) -> Option<ConsumptionPlan> {
        match self {
            GateState::EligibleNoRecord { plan } | GateState::EligibleAddGenre { plan } => Some(*plan),
            _ => None,
        }
    }

    pub fn redirect(&self) -> Option<Redirect> {
        match self {
            GateState::BlockedTierLimit => Some(Redirect::Upgrade),
            GateState::BlockedNoCurrency { .. } => Some(Redirect::CurrencyShop),
            _ => None,
        }
    }
}

/// Decide whether `requested` may be generated for the week.
///
/// Checks run in order: completion, tier limit, genre exhaustion, repeated
/// genre, then currency. The currency plan always prefers a premium credit.
pub fn evaluate_eligibility(
    snapshot: &WeekSnapshot,
    entitlement: &Entitlement,
    existing: &BTreeSet<Genre>,
    requested: Genre,
    today: NaiveDate,
) -> GateState {
    let state = if !snapshot.is_complete() {
        GateState::Locked {
            fill_enabled: snapshot.can_fill(),
        }
    } else if !existing.is_empty() && !entitlement.tier.is_premium() {
        GateState::BlockedTierLimit
    } else if Genre::ALL.iter().all(|g| existing.contains(g)) {
        GateState::BlockedGenreExhausted
    } else if existing.contains(&requested) {
        GateState::GenreAlreadyRecorded { genre: requested }
    } else {
        match plan_consumption(entitlement, requested, today) {
            ConsumptionPlan::None => GateState::BlockedNoCurrency { genre: requested },
            plan if existing.is_empty() => GateState::EligibleNoRecord { plan },
            plan => GateState::EligibleAddGenre { plan },
        }
    };
    debug!(week = snapshot.week.week_num, genre = %requested, ?state, "eligibility evaluated");
    state
}

/// Genres the create screen may offer for the week.
pub fn offerable_genres(tier: Tier, existing: &BTreeSet<Genre>) -> Vec<Genre> {
    if !existing.is_empty() && !tier.is_premium() {
        return Vec::new();
    }
    Genre::ALL
        .into_iter()
        .filter(|g| !existing.contains(g))
        .collect()
}

/// The single action a week card shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardAction {
    /// Week incomplete; jump to `target` when enabled.
    FillJournal {
        enabled: bool,
        target: Option<NaiveDate>,
    },
    Create,
    CreateOtherGenre,
    PremiumUpsell,
    /// All genres recorded; no further action.
    Complete,
}

impl CardAction {
    /// Translation key for the button label.
    pub fn label_key(&self) -> &'static str {
        match self {
            CardAction::FillJournal { .. } => "novel_fill_diary",
            CardAction::Create => "novel_create",
            CardAction::CreateOtherGenre => "novel_create_other_genre",
            CardAction::PremiumUpsell => "novel_premium",
            CardAction::Complete => "novel_complete",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            CardAction::FillJournal { enabled, .. } => *enabled,
            CardAction::Complete => false,
            _ => true,
        }
    }
}

/// Card action for a week, consistent with [`evaluate_eligibility`].
pub fn card_action(snapshot: &WeekSnapshot, tier: Tier, existing: &BTreeSet<Genre>) -> CardAction {
    if !existing.is_empty() {
        if Genre::ALL.iter().all(|g| existing.contains(g)) {
            CardAction::Complete
        } else if tier.is_premium() {
            CardAction::CreateOtherGenre
        } else {
            CardAction::PremiumUpsell
        }
    } else if snapshot.is_complete() {
        CardAction::Create
    } else {
        CardAction::FillJournal {
            enabled: snapshot.can_fill(),
            target: snapshot.next_fill,
        }
    }
}
