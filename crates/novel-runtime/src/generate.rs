//! Story generation: re-check, consume, create, and refund on a failed create.

use crate::repo::RepoError;
use crate::NovelService;
use journal_calendar::{cover_image, weeks_in_month, CalendarError};
use journal_core::{Genre, StoryDraft, StoryRecord, UserId, ValidationError, WeekKey};
use novel_econ::ConsumptionSource;
use novel_gate::{
    evaluate_eligibility, genres_for_week, reduce_to_latest_per_genre, GateState, WeekSnapshot,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub user: UserId,
    pub key: WeekKey,
    pub genre: Genre,
    /// Empty titles are replaced by `"{key} {genre label}"`.
    #[serde(default)]
    pub title: String,
}

/// A created story and the unit that paid for it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Generated {
    pub record: StoryRecord,
    pub spent: ConsumptionSource,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GenerateError {
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// `key` names a week the month does not have.
    #[error("{0} does not exist")]
    UnknownWeek(WeekKey),

    /// Gate refused; the state tells the caller what to show instead.
    #[error("generation refused: {0:?}")]
    Refused(GateState),

    /// A pre-check read failed; nothing was spent.
    #[error("could not read current state: {0}")]
    Read(#[source] RepoError),

    /// Debit failed; nothing was spent.
    #[error("currency debit failed: {0}")]
    Consume(#[source] RepoError),

    /// Record creation failed after the debit.
    #[error("story creation failed (refunded: {refunded}): {source}")]
    Create {
        #[source]
        source: RepoError,
        refunded: bool,
    },
}

impl NovelService {
    /// Generate one story for the requested week and genre.
    ///
    /// Eligibility and balances are evaluated on state read within this call,
    /// never on a view built earlier.
    pub async fn generate(&self, request: GenerationRequest) -> Result<Generated, GenerateError> {
        let GenerationRequest {
            user,
            key,
            genre,
            title,
        } = request;
        let today = self.clock.today();
        let week = weeks_in_month(key.year, key.month)?
            .into_iter()
            .find(|w| w.week_num == key.week_num)
            .ok_or(GenerateError::UnknownWeek(key))?;

        let renewal = self
            .accounts
            .renew_premium(&user, today)
            .await
            .map_err(GenerateError::Read)?;
        debug!(user = %user, ?renewal, "premium renewal checked");

        let (entitlement, entries, records) = tokio::try_join!(
            self.accounts.get_entitlement(&user),
            self.journal.fetch_journal_entries(&user, week.start, week.end),
            self.stories.fetch_story_records(&user),
        )
        .map_err(GenerateError::Read)?;

        let existing = genres_for_week(&reduce_to_latest_per_genre(&records), &key);
        let snapshot = WeekSnapshot::from_entries(week, &entries, today);
        let state = evaluate_eligibility(&snapshot, &entitlement, &existing, genre, today);
        let Some(source) = state.plan().and_then(|plan| plan.source()) else {
            debug!(user = %user, %key, %genre, ?state, "generation refused");
            return Err(GenerateError::Refused(state));
        };

        self.accounts
            .consume_currency(&user, source, today)
            .await
            .map_err(GenerateError::Consume)?;

        let title = if title.trim().is_empty() {
            format!("{key} {}", genre.label())
        } else {
            title
        };
        let draft = StoryDraft {
            user_id: user.clone(),
            key,
            genre,
            title,
            cover_image: cover_image(&week, &entries, &self.config.default_cover_image),
            week_start: week.start,
            week_end: week.end,
        };
        match self.stories.create_story_record(draft).await {
            Ok(record) => {
                info!(user = %user, id = %record.id, %key, %genre, ?source, "story generated");
                Ok(Generated {
                    record,
                    spent: source,
                })
            }
            Err(err) => {
                warn!(user = %user, %key, %genre, error = %err, "story creation failed; refunding");
                let refunded = match self.accounts.refund_currency(&user, source).await {
                    Ok(()) => true,
                    Err(refund_err) => {
                        error!(user = %user, ?source, error = %refund_err, "refund failed");
                        false
                    }
                };
                Err(GenerateError::Create {
                    source: err,
                    refunded,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::FailurePlan;
    use crate::{AccountRepository, StoryRepository};
    use journal_core::{Entitlement, Tier};

    fn request(week_num: u32, genre: Genre) -> GenerationRequest {
        GenerationRequest {
            user: alice(),
            key: WeekKey::new(2024, 2, week_num).unwrap(),
            genre,
            title: String::new(),
        }
    }

    fn with_potion(genre: Genre, count: u32) -> Entitlement {
        let mut ent = Entitlement::default();
        ent.potions.insert(genre, count);
        ent
    }

    #[tokio::test]
    async fn free_user_spends_a_potion() {
        let (service, store) = service(with_potion(Genre::Mystery, 1)).await;
        let out = service.generate(request(2, Genre::Mystery)).await.unwrap();
        assert_eq!(out.spent, ConsumptionSource::Potion(Genre::Mystery));
        assert_eq!(out.record.genre, Some(Genre::Mystery));
        assert_eq!(out.record.week_num, Some(2));
        assert_eq!(out.record.title, "2024-02 week 2 추리");
        let ent = store.get_entitlement(&alice()).await.unwrap();
        assert_eq!(ent.potion_count(Genre::Mystery), 0);

        // Second story in the same week hits the tier limit even with a potion.
        store.open_account(alice(), with_potion(Genre::Horror, 1)).await;
        let err = service.generate(request(2, Genre::Horror)).await.unwrap_err();
        assert_eq!(err, GenerateError::Refused(GateState::BlockedTierLimit));
    }

    #[tokio::test]
    async fn incomplete_week_is_refused_without_spending() {
        let (service, store) = service(with_potion(Genre::Mystery, 1)).await;
        let err = service.generate(request(3, Genre::Mystery)).await.unwrap_err();
        assert!(matches!(err, GenerateError::Refused(GateState::Locked { .. })));
        let ent = store.get_entitlement(&alice()).await.unwrap();
        assert_eq!(ent.potion_count(Genre::Mystery), 1);
    }

    #[tokio::test]
    async fn no_currency_is_refused() {
        let (service, _) = service(Entitlement::default()).await;
        let err = service.generate(request(2, Genre::Fantasy)).await.unwrap_err();
        assert_eq!(
            err,
            GenerateError::Refused(GateState::BlockedNoCurrency { genre: Genre::Fantasy })
        );
    }

    #[tokio::test]
    async fn premium_prefers_credit_then_potion() {
        let mut ent = premium();
        ent.potions.insert(Genre::Horror, 1);
        let (service, store) = service(ent).await;

        let first = service.generate(request(2, Genre::Romance)).await.unwrap();
        assert_eq!(first.spent, ConsumptionSource::PremiumCredit);
        let second = service.generate(request(2, Genre::Horror)).await.unwrap();
        assert_eq!(second.spent, ConsumptionSource::Potion(Genre::Horror));

        let err = service.generate(request(2, Genre::Romance)).await.unwrap_err();
        assert_eq!(
            err,
            GenerateError::Refused(GateState::GenreAlreadyRecorded { genre: Genre::Romance })
        );
        let ent = store.get_entitlement(&alice()).await.unwrap();
        assert_eq!(ent.tier, Tier::MonthlyPremium);
        assert_eq!(ent.premium_credits, 0);
        assert_eq!(store.fetch_story_records(&alice()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_create_refunds() {
        let (service, store) = service(with_potion(Genre::Historical, 1)).await;
        store
            .set_failures(FailurePlan {
                story_creates: true,
                ..FailurePlan::default()
            })
            .await;
        let err = service.generate(request(2, Genre::Historical)).await.unwrap_err();
        assert!(matches!(err, GenerateError::Create { refunded: true, .. }));
        let ent = store.get_entitlement(&alice()).await.unwrap();
        assert_eq!(ent.potion_count(Genre::Historical), 1);
        assert!(store.fetch_story_records(&alice()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_failure_spends_nothing() {
        let (service, store) = service(with_potion(Genre::Historical, 1)).await;
        store
            .set_failures(FailurePlan {
                journal_reads: true,
                ..FailurePlan::default()
            })
            .await;
        let err = service.generate(request(2, Genre::Historical)).await.unwrap_err();
        assert!(matches!(err, GenerateError::Read(RepoError::Unavailable(_))));
        store.set_failures(FailurePlan::default()).await;
        let ent = store.get_entitlement(&alice()).await.unwrap();
        assert_eq!(ent.potion_count(Genre::Historical), 1);
    }

    #[tokio::test]
    async fn week_outside_month_is_unknown() {
        let (service, _) = service(Entitlement::default()).await;
        let err = service.generate(request(5, Genre::Romance)).await.unwrap_err();
        assert_eq!(err, GenerateError::UnknownWeek(WeekKey::new(2024, 2, 5).unwrap()));
    }

    #[tokio::test]
    async fn deleted_story_frees_the_genre_slot() {
        let (service, store) = service(with_potion(Genre::Fairytale, 1)).await;
        let mut old = story("s-old", 2, Genre::Fairytale, 8);
        old.deleted = true;
        store.add_story(old).await;
        let out = service.generate(request(2, Genre::Fairytale)).await.unwrap();
        assert_eq!(out.spent, ConsumptionSource::Potion(Genre::Fairytale));
    }

    #[tokio::test]
    async fn expired_period_renews_before_generating() {
        let mut ent = premium();
        ent.premium_credits = 0;
        ent.premium_renewal = Some(d(2024, 2, 1));
        let (service, store) = service(ent).await;

        let out = service.generate(request(2, Genre::Romance)).await.unwrap();
        assert_eq!(out.spent, ConsumptionSource::PremiumCredit);
        let ent = store.get_entitlement(&alice()).await.unwrap();
        assert_eq!(ent.premium_credits, 0);
        assert_eq!(ent.premium_renewal, Some(d(2024, 3, 1)));
    }

    #[tokio::test]
    async fn concurrent_same_genre_keeps_one_catalog_entry() {
        let mut ent = premium();
        ent.premium_credits = 0;
        ent.potions.insert(Genre::Romance, 2);
        let (service, store) = service(ent).await;

        let (a, b) = tokio::join!(
            service.generate(request(2, Genre::Romance)),
            service.generate(request(2, Genre::Romance)),
        );
        let mut made = 0u32;
        for result in [a, b] {
            match result {
                Ok(out) => {
                    assert_eq!(out.spent, ConsumptionSource::Potion(Genre::Romance));
                    made += 1;
                }
                Err(err) => assert_eq!(
                    err,
                    GenerateError::Refused(GateState::GenreAlreadyRecorded { genre: Genre::Romance })
                ),
            }
        }
        assert!(made >= 1);

        // Every created record was paid for exactly once.
        let ent = store.get_entitlement(&alice()).await.unwrap();
        assert_eq!(ent.potion_count(Genre::Romance), 2 - made);
        let records = store.fetch_story_records(&alice()).await.unwrap();
        assert_eq!(records.len() as u32, made);

        let key = WeekKey::new(2024, 2, 2).unwrap();
        let catalog = reduce_to_latest_per_genre(&records);
        assert_eq!(catalog[&key].len(), 1);
        assert_eq!(
            genres_for_week(&catalog, &key).into_iter().collect::<Vec<_>>(),
            vec![Genre::Romance]
        );
    }
}
