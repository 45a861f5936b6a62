#![deny(warnings)]

//! Currency models for story generation: potions, premium credits and points.
//!
//! This module provides validated utilities for:
//! - Choosing which currency unit a generation would spend (premium credit first)
//! - A per-account ledger with all-or-nothing consume, refund, grant and gift
//! - Premium renewal and the weekly completion bonus

use chrono::{Months, NaiveDate};
use journal_core::{EngineConfig, Entitlement, Genre, Tier, UserId, DAYS_PER_WEEK};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info};

/// A currency unit that can pay for one generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumptionSource {
    PremiumCredit,
    Potion(Genre),
}

/// Which unit a generation would spend, decided before the user confirms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumptionPlan {
    PremiumCredit,
    GenrePotion(Genre),
    None,
}

impl ConsumptionPlan {
    pub fn source(self) -> Option<ConsumptionSource> {
        match self {
            ConsumptionPlan::PremiumCredit => Some(ConsumptionSource::PremiumCredit),
            ConsumptionPlan::GenrePotion(g) => Some(ConsumptionSource::Potion(g)),
            ConsumptionPlan::None => None,
        }
    }
}

/// Errors produced by ledger operations. A failed operation never changes a balance.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("account {0} not found")]
    UnknownAccount(UserId),
    #[error("insufficient balance for {unit:?} on account {user}")]
    InsufficientBalance { user: UserId, unit: ConsumptionSource },
    #[error("cannot gift a potion to oneself")]
    SelfGift,
    #[error("week of {week_start} has {count} of 7 days written")]
    BonusIncomplete { week_start: NaiveDate, count: u32 },
    #[error("bonus for week of {0} already claimed")]
    BonusAlreadyClaimed(NaiveDate),
}

/// Successful debit of one unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumed {
    pub user: UserId,
    pub source: ConsumptionSource,
    /// Balance of that unit after the debit.
    pub remaining: u32,
}

/// One balance movement in an account's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntry {
    Consumed(ConsumptionSource),
    Refunded(ConsumptionSource),
    Granted { genre: Genre, count: u32 },
    GiftSent { to: UserId, genre: Genre },
    GiftReceived { from: UserId, genre: Genre },
    WeeklyBonus { week_start: NaiveDate, points: u32 },
    Renewed { next_renewal: NaiveDate, credits: u32 },
    Lapsed,
}

/// Outcome of a renewal check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenewalOutcome {
    NotPremium,
    NotDue,
    /// Renewal date advanced; credits reset without rollover.
    Renewed { next_renewal: NaiveDate, credits: u32 },
    /// Cancelled subscription reached its renewal date and dropped to Free.
    Lapsed,
}

/// Weekly completion bonus state for one week.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyBonusStatus {
    pub is_completed: bool,
    pub has_received: bool,
    pub can_claim: bool,
    pub count: u32,
    pub total: u32,
}

/// True when any genre has at least one potion.
pub fn has_any(potions: &BTreeMap<Genre, u32>) -> bool {
    potions.values().any(|&n| n > 0)
}

/// A premium credit is usable while the tier is premium, the count is positive and
/// the period has not reached its renewal date. Credits do not roll over.
pub fn premium_credit_available(ent: &Entitlement, today: NaiveDate) -> bool {
    ent.tier.is_premium()
        && ent.premium_credits > 0
        && ent.premium_renewal.map_or(true, |renewal| today < renewal)
}

/// Pick the unit a generation of `genre` would spend: premium credit first, then a
/// potion of that genre, else nothing.
pub fn plan_consumption(ent: &Entitlement, genre: Genre, today: NaiveDate) -> ConsumptionPlan {
    if premium_credit_available(ent, today) {
        ConsumptionPlan::PremiumCredit
    } else if ent.potion_count(genre) > 0 {
        ConsumptionPlan::GenrePotion(genre)
    } else {
        ConsumptionPlan::None
    }
}

/// Apply a renewal check to `ent` in place.
///
/// A monthly subscription advances one month per period, a yearly one twelve;
/// missed periods are caught up so the next renewal always lies after `today`.
pub fn renew_premium(ent: &mut Entitlement, today: NaiveDate, cfg: &EngineConfig) -> RenewalOutcome {
    let step = match ent.tier {
        Tier::Free => return RenewalOutcome::NotPremium,
        Tier::MonthlyPremium => Months::new(1),
        Tier::YearlyPremium => Months::new(12),
    };
    let Some(renewal) = ent.premium_renewal else {
        return RenewalOutcome::NotDue;
    };
    if renewal > today {
        return RenewalOutcome::NotDue;
    }
    if ent.premium_cancelled {
        ent.tier = Tier::Free;
        ent.premium_credits = 0;
        ent.premium_renewal = None;
        ent.premium_cancelled = false;
        return RenewalOutcome::Lapsed;
    }
    let mut next = renewal;
    while next <= today {
        match next.checked_add_months(step) {
            Some(n) => next = n,
            None => return RenewalOutcome::NotDue,
        }
    }
    ent.premium_renewal = Some(next);
    ent.premium_credits = cfg.monthly_premium_credits;
    RenewalOutcome::Renewed {
        next_renewal: next,
        credits: cfg.monthly_premium_credits,
    }
}

/// Bonus state for the week starting `week_start` with `count` distinct days written.
pub fn weekly_bonus_status(
    week_start: NaiveDate,
    count: u32,
    claimed: &BTreeSet<NaiveDate>,
) -> WeeklyBonusStatus {
    let is_completed = count >= DAYS_PER_WEEK;
    let has_received = claimed.contains(&week_start);
    WeeklyBonusStatus {
        is_completed,
        has_received,
        can_claim: is_completed && !has_received,
        count: count.min(DAYS_PER_WEEK),
        total: DAYS_PER_WEEK,
    }
}

#[derive(Clone, Debug, Default)]
struct Account {
    entitlement: Entitlement,
    history: Vec<LedgerEntry>,
    claimed_bonus_weeks: BTreeSet<NaiveDate>,
}

/// Balances per account. Every operation checks the live balance and either
/// applies fully or leaves the account untouched.
#[derive(Clone, Debug, Default)]
pub struct CurrencyLedger {
    accounts: BTreeMap<UserId, Account>,
}

impl CurrencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace an account's entitlement.
    pub fn open_account(&mut self, user: UserId, entitlement: Entitlement) {
        self.accounts.entry(user).or_default().entitlement = entitlement;
    }

    pub fn entitlement(&self, user: &UserId) -> Option<&Entitlement> {
        self.accounts.get(user).map(|a| &a.entitlement)
    }

    pub fn history(&self, user: &UserId) -> &[LedgerEntry] {
        self.accounts
            .get(user)
            .map(|a| a.history.as_slice())
            .unwrap_or(&[])
    }

    fn account_mut(&mut self, user: &UserId) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(user)
            .ok_or_else(|| LedgerError::UnknownAccount(user.clone()))
    }

    /// Debit one potion of `genre`.
    pub fn consume(&mut self, user: &UserId, genre: Genre) -> Result<Consumed, LedgerError> {
        let acct = self.account_mut(user)?;
        let source = ConsumptionSource::Potion(genre);
        let remaining = match acct.entitlement.potions.get_mut(&genre) {
            Some(balance) if *balance > 0 => {
                *balance -= 1;
                *balance
            }
            _ => {
                return Err(LedgerError::InsufficientBalance {
                    user: user.clone(),
                    unit: source,
                })
            }
        };
        acct.history.push(LedgerEntry::Consumed(source));
        info!(user = %user, genre = %genre, remaining, "potion consumed");
        Ok(Consumed {
            user: user.clone(),
            source,
            remaining,
        })
    }

    /// Debit one premium credit if it is usable on `today`.
    pub fn consume_premium_credit(
        &mut self,
        user: &UserId,
        today: NaiveDate,
    ) -> Result<Consumed, LedgerError> {
        let acct = self.account_mut(user)?;
        let source = ConsumptionSource::PremiumCredit;
        if !premium_credit_available(&acct.entitlement, today) {
            return Err(LedgerError::InsufficientBalance {
                user: user.clone(),
                unit: source,
            });
        }
        acct.entitlement.premium_credits -= 1;
        let remaining = acct.entitlement.premium_credits;
        acct.history.push(LedgerEntry::Consumed(source));
        info!(user = %user, remaining, "premium credit consumed");
        Ok(Consumed {
            user: user.clone(),
            source,
            remaining,
        })
    }

    /// Debit whichever unit `source` names.
    pub fn consume_source(
        &mut self,
        user: &UserId,
        source: ConsumptionSource,
        today: NaiveDate,
    ) -> Result<Consumed, LedgerError> {
        match source {
            ConsumptionSource::PremiumCredit => self.consume_premium_credit(user, today),
            ConsumptionSource::Potion(genre) => self.consume(user, genre),
        }
    }

    /// Return a unit taken by a generation that could not be completed.
    pub fn refund(&mut self, user: &UserId, source: ConsumptionSource) -> Result<(), LedgerError> {
        let acct = self.account_mut(user)?;
        match source {
            ConsumptionSource::PremiumCredit => acct.entitlement.premium_credits += 1,
            ConsumptionSource::Potion(genre) => {
                *acct.entitlement.potions.entry(genre).or_insert(0) += 1
            }
        }
        acct.history.push(LedgerEntry::Refunded(source));
        info!(user = %user, ?source, "currency refunded");
        Ok(())
    }

    /// Credit potions bought through the shop.
    pub fn grant_potions(
        &mut self,
        user: &UserId,
        genre: Genre,
        count: u32,
    ) -> Result<u32, LedgerError> {
        let acct = self.account_mut(user)?;
        let balance = acct.entitlement.potions.entry(genre).or_insert(0);
        *balance = balance.saturating_add(count);
        let total = *balance;
        acct.history.push(LedgerEntry::Granted { genre, count });
        Ok(total)
    }

    /// Move one potion of `genre` from `from` to `to` as a unit.
    pub fn gift_potion(&mut self, from: &UserId, to: &UserId, genre: Genre) -> Result<(), LedgerError> {
        if from == to {
            return Err(LedgerError::SelfGift);
        }
        if !self.accounts.contains_key(to) {
            return Err(LedgerError::UnknownAccount(to.clone()));
        }
        let sender = self.account_mut(from)?;
        if sender.entitlement.potion_count(genre) == 0 {
            return Err(LedgerError::InsufficientBalance {
                user: from.clone(),
                unit: ConsumptionSource::Potion(genre),
            });
        }
        *sender.entitlement.potions.entry(genre).or_insert(0) -= 1;
        sender.history.push(LedgerEntry::GiftSent {
            to: to.clone(),
            genre,
        });
        let recipient = self.account_mut(to)?;
        *recipient.entitlement.potions.entry(genre).or_insert(0) += 1;
        recipient.history.push(LedgerEntry::GiftReceived {
            from: from.clone(),
            genre,
        });
        info!(from = %from, to = %to, genre = %genre, "potion gifted");
        Ok(())
    }

    /// Run the renewal check for one account.
    pub fn renew_premium(
        &mut self,
        user: &UserId,
        today: NaiveDate,
        cfg: &EngineConfig,
    ) -> Result<RenewalOutcome, LedgerError> {
        let acct = self.account_mut(user)?;
        let outcome = renew_premium(&mut acct.entitlement, today, cfg);
        match outcome {
            RenewalOutcome::Renewed {
                next_renewal,
                credits,
            } => acct.history.push(LedgerEntry::Renewed {
                next_renewal,
                credits,
            }),
            RenewalOutcome::Lapsed => acct.history.push(LedgerEntry::Lapsed),
            RenewalOutcome::NotDue | RenewalOutcome::NotPremium => {}
        }
        debug!(user = %user, ?outcome, "renewal checked");
        Ok(outcome)
    }

    pub fn weekly_bonus_status(
        &self,
        user: &UserId,
        week_start: NaiveDate,
        count: u32,
    ) -> Result<WeeklyBonusStatus, LedgerError> {
        let acct = self
            .accounts
            .get(user)
            .ok_or_else(|| LedgerError::UnknownAccount(user.clone()))?;
        Ok(weekly_bonus_status(week_start, count, &acct.claimed_bonus_weeks))
    }

    /// Credit the weekly completion bonus once per week; returns the new points balance.
    pub fn claim_weekly_bonus(
        &mut self,
        user: &UserId,
        week_start: NaiveDate,
        count: u32,
        cfg: &EngineConfig,
    ) -> Result<u32, LedgerError> {
        let acct = self.account_mut(user)?;
        let status = weekly_bonus_status(week_start, count, &acct.claimed_bonus_weeks);
        if !status.is_completed {
            return Err(LedgerError::BonusIncomplete { week_start, count });
        }
        if status.has_received {
            return Err(LedgerError::BonusAlreadyClaimed(week_start));
        }
        acct.claimed_bonus_weeks.insert(week_start);
        acct.entitlement.points = acct.entitlement.points.saturating_add(cfg.weekly_bonus_points);
        acct.history.push(LedgerEntry::WeeklyBonus {
            week_start,
            points: cfg.weekly_bonus_points,
        });
        info!(user = %user, %week_start, "weekly bonus claimed");
        Ok(acct.entitlement.points)
    }
}
