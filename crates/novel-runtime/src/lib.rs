#![deny(warnings)]

//! Async orchestration of the journal novel engine over its collaborators.
//!
//! The computations themselves live in the calendar, ledger and gate crates and
//! are synchronous. [`NovelService`] reads snapshots through the repository
//! contracts, runs the pipeline, and performs the few mutating calls with the
//! checks each of them needs right before the write.

mod generate;
mod library;
mod memory;
mod repo;
mod view;

pub use generate::{GenerateError, GenerationRequest, Generated};
pub use library::{LibrarySort, PurchasedStory, VisibilityError};
pub use memory::{FailurePlan, MemoryStore, Seed};
pub use repo::{AccountRepository, JournalRepository, RepoError, StoryRepository};
pub use view::{MonthView, Notice, ViewError, WeekCard};

use journal_calendar::Clock;
use journal_core::EngineConfig;
use std::sync::Arc;

/// Entry point for the UI layer.
#[derive(Clone)]
pub struct NovelService {
    journal: Arc<dyn JournalRepository>,
    stories: Arc<dyn StoryRepository>,
    accounts: Arc<dyn AccountRepository>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl NovelService {
    pub fn new(
        journal: Arc<dyn JournalRepository>,
        stories: Arc<dyn StoryRepository>,
        accounts: Arc<dyn AccountRepository>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        NovelService {
            journal,
            stories,
            accounts,
            clock,
            config,
        }
    }

    /// Service whose three collaborators are the same in-memory store.
    pub fn in_memory(store: Arc<MemoryStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        NovelService::new(store.clone(), store.clone(), store, clock, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
