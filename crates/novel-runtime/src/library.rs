//! Story library: visibility toggles, purchased stories and the completed list.

use crate::repo::RepoError;
use crate::NovelService;
use futures::future::join_all;
use journal_core::{Genre, StoryId, StoryRecord, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VisibilityError {
    /// The id is not a story owned by the caller.
    #[error("story {0} is not owned by the caller")]
    NotOwner(StoryId),

    #[error("could not read owned stories: {0}")]
    Read(#[source] RepoError),

    /// The batch failed as a unit; no visibility changed.
    #[error("visibility update failed: {0}")]
    Write(#[source] RepoError),
}

/// Ordering of the completed list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibrarySort {
    #[default]
    Latest,
    Oldest,
    /// Most purchased first.
    Popular,
}

/// A story bought from another user, with its author's name resolved.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PurchasedStory {
    pub record: StoryRecord,
    /// Display name, or the raw owner id when the lookup failed.
    pub owner_name: String,
}

impl NovelService {
    /// Set `is_public` on the caller's stories in one atomic write.
    pub async fn set_visibility(
        &self,
        owner: &UserId,
        ids: &[StoryId],
        is_public: bool,
    ) -> Result<(), VisibilityError> {
        if ids.is_empty() {
            return Ok(());
        }
        let owned: BTreeSet<StoryId> = self
            .stories
            .fetch_story_records(owner)
            .await
            .map_err(VisibilityError::Read)?
            .into_iter()
            .filter(|r| !r.deleted)
            .map(|r| r.id)
            .collect();
        if let Some(foreign) = ids.iter().find(|id| !owned.contains(*id)) {
            return Err(VisibilityError::NotOwner(foreign.clone()));
        }
        self.stories
            .batch_set_visibility(ids, is_public)
            .await
            .map_err(|err| {
                warn!(owner = %owner, count = ids.len(), error = %err, "visibility batch failed");
                VisibilityError::Write(err)
            })?;
        debug!(owner = %owner, count = ids.len(), is_public, "visibility updated");
        Ok(())
    }

    /// Attach owner display names, looked up concurrently once per distinct owner.
    pub async fn purchased_library(&self, records: Vec<StoryRecord>) -> Vec<PurchasedStory> {
        let owners: Vec<UserId> = records
            .iter()
            .map(|r| r.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let lookups = join_all(owners.iter().map(|owner| self.accounts.display_name(owner))).await;
        let names: BTreeMap<UserId, String> = owners
            .into_iter()
            .zip(lookups)
            .map(|(owner, lookup)| {
                let name = lookup.unwrap_or_else(|err| {
                    warn!(owner = %owner, error = %err, "owner name lookup failed; using id");
                    owner.to_string()
                });
                (owner, name)
            })
            .collect();
        records
            .into_iter()
            .map(|record| PurchasedStory {
                owner_name: names
                    .get(&record.user_id)
                    .cloned()
                    .unwrap_or_else(|| record.user_id.to_string()),
                record,
            })
            .collect()
    }

    /// The owner's non-deleted stories, optionally of one genre.
    pub async fn completed_library(
        &self,
        owner: &UserId,
        genre: Option<Genre>,
        sort: LibrarySort,
    ) -> Result<Vec<StoryRecord>, RepoError> {
        let mut stories: Vec<StoryRecord> = self
            .stories
            .fetch_story_records(owner)
            .await?
            .into_iter()
            .filter(|r| !r.deleted)
            .filter(|r| genre.map_or(true, |g| r.genre == Some(g)))
            .collect();
        match sort {
            LibrarySort::Latest => stories.sort_by_key(|r| Reverse(r.created_at)),
            LibrarySort::Oldest => stories.sort_by_key(|r| r.created_at),
            LibrarySort::Popular => {
                stories.sort_by_key(|r| (Reverse(r.purchase_count), Reverse(r.created_at)))
            }
        }
        Ok(stories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::FailurePlan;
    use journal_core::Entitlement;

    #[tokio::test]
    async fn failed_batch_applies_nothing() {
        let (service, store) = service(Entitlement::default()).await;
        let ids: Vec<StoryId> = (1..=5).map(|i| StoryId(format!("s{i}"))).collect();
        for (i, id) in ids.iter().enumerate() {
            store.add_story(story(&id.0, 1, Genre::ALL[i], 9)).await;
        }
        store
            .set_failures(FailurePlan {
                visibility_fail_at: Some(3),
                ..FailurePlan::default()
            })
            .await;
        let err = service.set_visibility(&alice(), &ids, false).await.unwrap_err();
        assert!(matches!(err, VisibilityError::Write(RepoError::Rejected(_))));
        for id in &ids {
            assert!(store.story(id).await.unwrap().is_public);
        }

        store.set_failures(FailurePlan::default()).await;
        service.set_visibility(&alice(), &ids, false).await.unwrap();
        for id in &ids {
            assert!(!store.story(id).await.unwrap().is_public);
        }
    }

    #[tokio::test]
    async fn foreign_ids_are_rejected_before_writing() {
        let (service, store) = service(Entitlement::default()).await;
        store.add_story(story("mine", 1, Genre::Romance, 9)).await;
        let mut theirs = story("theirs", 1, Genre::Romance, 9);
        theirs.user_id = UserId("bob".into());
        store.add_story(theirs).await;

        let ids = vec![StoryId("mine".into()), StoryId("theirs".into())];
        assert_eq!(
            service.set_visibility(&alice(), &ids, false).await,
            Err(VisibilityError::NotOwner(StoryId("theirs".into())))
        );
        assert!(store.story(&StoryId("mine".into())).await.unwrap().is_public);
        assert_eq!(service.set_visibility(&alice(), &[], false).await, Ok(()));
    }

    #[tokio::test]
    async fn purchased_names_fall_back_per_owner() {
        let (service, store) = service(Entitlement::default()).await;
        store.set_display_name(UserId("bob".into()), "Bob").await;
        store
            .set_failures(FailurePlan {
                name_lookups: [UserId("carol".into())].into_iter().collect(),
                ..FailurePlan::default()
            })
            .await;

        let owned_by = |id: &str, owner: &str| {
            let mut r = story(id, 1, Genre::Mystery, 9);
            r.user_id = UserId(owner.into());
            r
        };
        let records = vec![
            owned_by("p1", "bob"),
            owned_by("p2", "carol"),
            owned_by("p3", "bob"),
            owned_by("p4", "dave"),
        ];
        let library = service.purchased_library(records).await;
        let names: Vec<&str> = library.iter().map(|p| p.owner_name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "carol", "Bob", "dave"]);
        assert_eq!(library[1].record.id, StoryId("p2".into()));
    }

    #[tokio::test]
    async fn completed_library_sorts_and_filters() {
        let (service, store) = service(Entitlement::default()).await;
        let mut a = story("a", 1, Genre::Romance, 8);
        a.purchase_count = 5;
        let mut b = story("b", 2, Genre::Horror, 10);
        b.purchase_count = 1;
        let c = story("c", 3, Genre::Romance, 12);
        let mut gone = story("gone", 4, Genre::Romance, 13);
        gone.deleted = true;
        for r in [a, b, c, gone] {
            store.add_story(r).await;
        }

        let ids = |list: Vec<StoryRecord>| list.into_iter().map(|r| r.id.0).collect::<Vec<_>>();
        let latest = service.completed_library(&alice(), None, LibrarySort::Latest).await.unwrap();
        assert_eq!(ids(latest), vec!["c", "b", "a"]);
        let oldest = service.completed_library(&alice(), None, LibrarySort::Oldest).await.unwrap();
        assert_eq!(ids(oldest), vec!["a", "b", "c"]);
        let popular = service.completed_library(&alice(), None, LibrarySort::Popular).await.unwrap();
        assert_eq!(ids(popular), vec!["a", "b", "c"]);
        let romance = service
            .completed_library(&alice(), Some(Genre::Romance), LibrarySort::Latest)
            .await
            .unwrap();
        assert_eq!(ids(romance), vec!["c", "a"]);
    }
}
