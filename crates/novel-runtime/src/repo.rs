//! Repository contracts for the journal, story and account collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;
use journal_core::{Entitlement, JournalEntry, StoryDraft, StoryId, StoryRecord, UserId};
use novel_econ::{Consumed, ConsumptionSource, LedgerError, RenewalOutcome, WeeklyBonusStatus};

/// Failures reported by a collaborator.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RepoError {
    /// Store could not be reached or refused to answer.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Requested document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write was rejected as a whole; nothing was applied.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// Ledger refused the balance movement.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Read access to daily journal entries.
#[async_trait]
pub trait JournalRepository: Send + Sync {
    /// Entries of `user` dated within `[start, end]`.
    async fn fetch_journal_entries(
        &self,
        user: &UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<JournalEntry>, RepoError>;
}

/// Generated story storage.
#[async_trait]
pub trait StoryRepository: Send + Sync {
    /// Every record owned by `user`, deleted ones included.
    async fn fetch_story_records(&self, user: &UserId) -> Result<Vec<StoryRecord>, RepoError>;

    async fn create_story_record(&self, draft: StoryDraft) -> Result<StoryRecord, RepoError>;

    /// Set `is_public` on every id, or on none of them.
    async fn batch_set_visibility(&self, ids: &[StoryId], is_public: bool) -> Result<(), RepoError>;
}

/// Tier, balances and profile lookups.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn get_entitlement(&self, user: &UserId) -> Result<Entitlement, RepoError>;

    /// Debit one unit, checked against the balance at the time of the call.
    async fn consume_currency(
        &self,
        user: &UserId,
        source: ConsumptionSource,
        today: NaiveDate,
    ) -> Result<Consumed, RepoError>;

    /// Give back a unit taken by a generation that did not complete.
    async fn refund_currency(&self, user: &UserId, source: ConsumptionSource) -> Result<(), RepoError>;

    async fn renew_premium(&self, user: &UserId, today: NaiveDate) -> Result<RenewalOutcome, RepoError>;

    async fn weekly_bonus_status(
        &self,
        user: &UserId,
        week_start: NaiveDate,
        written_days: u32,
    ) -> Result<WeeklyBonusStatus, RepoError>;

    /// Credit the completion bonus for the week starting `week_start`; returns the points balance.
    async fn claim_weekly_bonus(
        &self,
        user: &UserId,
        week_start: NaiveDate,
        written_days: u32,
    ) -> Result<u32, RepoError>;

    async fn display_name(&self, user: &UserId) -> Result<String, RepoError>;
}
