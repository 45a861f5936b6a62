//! In-memory implementation of every repository contract.
//!
//! Backs the CLI and the tests. All state sits behind one `tokio::sync::RwLock`,
//! so each call observes and mutates a consistent snapshot.

use crate::repo::{AccountRepository, JournalRepository, RepoError, StoryRepository};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use journal_core::{EngineConfig, Entitlement, JournalEntry, StoryDraft, StoryId, StoryRecord, UserId};
use novel_econ::{Consumed, ConsumptionSource, CurrencyLedger, RenewalOutcome, WeeklyBonusStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Initial contents of a [`MemoryStore`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub entries: Vec<JournalEntry>,
    pub stories: Vec<StoryRecord>,
    pub accounts: BTreeMap<UserId, Entitlement>,
    pub display_names: BTreeMap<UserId, String>,
}

/// Failures the store should simulate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FailurePlan {
    pub journal_reads: bool,
    pub story_reads: bool,
    pub entitlement_reads: bool,
    pub story_creates: bool,
    /// 1-based position in a visibility batch at which the write fails.
    pub visibility_fail_at: Option<usize>,
    /// Users whose display name lookup fails.
    pub name_lookups: BTreeSet<UserId>,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<JournalEntry>,
    stories: Vec<StoryRecord>,
    ledger: CurrencyLedger,
    display_names: BTreeMap<UserId, String>,
    next_story: u64,
    failures: FailurePlan,
}

#[derive(Debug)]
pub struct MemoryStore {
    config: EngineConfig,
    state: RwLock<State>,
}

fn unavailable(what: &str) -> RepoError {
    RepoError::Unavailable(format!("{what} (injected)"))
}

impl MemoryStore {
    pub fn new(config: EngineConfig) -> Self {
        Self::from_seed(Seed::default(), config)
    }

    pub fn from_seed(seed: Seed, config: EngineConfig) -> Self {
        let mut ledger = CurrencyLedger::new();
        for (user, entitlement) in seed.accounts {
            ledger.open_account(user, entitlement);
        }
        let state = State {
            next_story: seed
                .stories
                .iter()
                .filter_map(|r| r.id.0.strip_prefix("story-")?.parse::<u64>().ok())
                .max()
                .unwrap_or(0),
            entries: seed.entries,
            stories: seed.stories,
            ledger,
            display_names: seed.display_names,
            failures: FailurePlan::default(),
        };
        MemoryStore {
            config,
            state: RwLock::new(state),
        }
    }

    pub async fn set_failures(&self, failures: FailurePlan) {
        self.state.write().await.failures = failures;
    }

    pub async fn open_account(&self, user: UserId, entitlement: Entitlement) {
        self.state.write().await.ledger.open_account(user, entitlement);
    }

    pub async fn add_entry(&self, entry: JournalEntry) {
        self.state.write().await.entries.push(entry);
    }

    pub async fn add_story(&self, record: StoryRecord) {
        self.state.write().await.stories.push(record);
    }

    pub async fn set_display_name(&self, user: UserId, name: impl Into<String>) {
        self.state.write().await.display_names.insert(user, name.into());
    }

    /// Copy of a stored record, deleted or not.
    pub async fn story(&self, id: &StoryId) -> Option<StoryRecord> {
        self.state
            .read()
            .await
            .stories
            .iter()
            .find(|r| &r.id == id)
            .cloned()
    }
}

#[async_trait]
impl JournalRepository for MemoryStore {
    async fn fetch_journal_entries(
        &self,
        user: &UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<JournalEntry>, RepoError> {
        let state = self.state.read().await;
        if state.failures.journal_reads {
            return Err(unavailable("journal"));
        }
        Ok(state
            .entries
            .iter()
            .filter(|e| &e.user_id == user && start <= e.date && e.date <= end)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoryRepository for MemoryStore {
    async fn fetch_story_records(&self, user: &UserId) -> Result<Vec<StoryRecord>, RepoError> {
        let state = self.state.read().await;
        if state.failures.story_reads {
            return Err(unavailable("stories"));
        }
        Ok(state
            .stories
            .iter()
            .filter(|r| &r.user_id == user)
            .cloned()
            .collect())
    }

    async fn create_story_record(&self, draft: StoryDraft) -> Result<StoryRecord, RepoError> {
        let mut state = self.state.write().await;
        if state.failures.story_creates {
            return Err(unavailable("story create"));
        }
        state.next_story += 1;
        let record = StoryRecord {
            id: StoryId(format!("story-{:06}", state.next_story)),
            user_id: draft.user_id,
            year: Some(draft.key.year),
            month: Some(draft.key.month),
            week_num: Some(draft.key.week_num),
            genre: Some(draft.genre),
            title: draft.title,
            cover_image: Some(draft.cover_image),
            created_at: Utc::now(),
            is_public: true,
            deleted: false,
            purchase_count: 0,
        };
        state.stories.push(record.clone());
        debug!(id = %record.id, "story record created");
        Ok(record)
    }

    async fn batch_set_visibility(&self, ids: &[StoryId], is_public: bool) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let fail_at = state.failures.visibility_fail_at;
        let mut staged = Vec::with_capacity(ids.len());
        for (pos, id) in ids.iter().enumerate() {
            if fail_at == Some(pos + 1) {
                warn!(%id, pos = pos + 1, "visibility batch rejected");
                return Err(RepoError::Rejected(format!("visibility update failed at {id}")));
            }
            let index = state
                .stories
                .iter()
                .position(|r| &r.id == id)
                .ok_or_else(|| RepoError::NotFound(id.to_string()))?;
            staged.push(index);
        }
        for index in staged {
            state.stories[index].is_public = is_public;
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn get_entitlement(&self, user: &UserId) -> Result<Entitlement, RepoError> {
        let state = self.state.read().await;
        if state.failures.entitlement_reads {
            return Err(unavailable("entitlement"));
        }
        state
            .ledger
            .entitlement(user)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(user.to_string()))
    }

    async fn consume_currency(
        &self,
        user: &UserId,
        source: ConsumptionSource,
        today: NaiveDate,
    ) -> Result<Consumed, RepoError> {
        let mut state = self.state.write().await;
        Ok(state.ledger.consume_source(user, source, today)?)
    }

    async fn refund_currency(&self, user: &UserId, source: ConsumptionSource) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        Ok(state.ledger.refund(user, source)?)
    }

    async fn renew_premium(&self, user: &UserId, today: NaiveDate) -> Result<RenewalOutcome, RepoError> {
        let mut state = self.state.write().await;
        Ok(state.ledger.renew_premium(user, today, &self.config)?)
    }

    async fn weekly_bonus_status(
        &self,
        user: &UserId,
        week_start: NaiveDate,
        written_days: u32,
    ) -> Result<WeeklyBonusStatus, RepoError> {
        let state = self.state.read().await;
        Ok(state.ledger.weekly_bonus_status(user, week_start, written_days)?)
    }

    async fn claim_weekly_bonus(
        &self,
        user: &UserId,
        week_start: NaiveDate,
        written_days: u32,
    ) -> Result<u32, RepoError> {
        let mut state = self.state.write().await;
        Ok(state
            .ledger
            .claim_weekly_bonus(user, week_start, written_days, &self.config)?)
    }

    async fn display_name(&self, user: &UserId) -> Result<String, RepoError> {
        let state = self.state.read().await;
        if state.failures.name_lookups.contains(user) {
            return Err(unavailable("profile"));
        }
        state
            .display_names
            .get(user)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(user.to_string()))
    }
}
