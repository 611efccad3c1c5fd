use super::{LoadType, PagingState};
use crate::database::models::RemoteKeyRecord;
use crate::database::repositories::{RemoteKeyRepository, StoryRepository};
use crate::database::Database;
use crate::remote::{RemoteError, StoryPageSource};
use anyhow::Context;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// First page of the remote feed. Refreshes always start here.
pub const INITIAL_PAGE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediationOutcome {
    pub end_of_pagination_reached: bool,
}

#[derive(Debug, Error)]
pub enum MediatorError {
    #[error("failed to fetch story page {page}: {source}")]
    Fetch {
        page: u32,
        #[source]
        source: RemoteError,
    },

    #[error("cached story {0} has no remote key")]
    MissingRemoteKey(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

enum PageTarget {
    Fetch { load_type: LoadType, page: u32 },
    EndReached,
}

/// Fetches remote story pages and merges them into the cache.
///
/// Cycles are serialised: a second trigger waits until the first has either
/// committed its merge or failed. A cycle writes nothing unless the fetch
/// succeeds and the whole merge commits, so a failed or cancelled cycle
/// leaves stories and remote keys exactly as they were.
pub struct RemoteMediator {
    database: Database,
    source: Arc<dyn StoryPageSource>,
    token: String,
    page_size: u32,
    gate: Mutex<()>,
}

impl RemoteMediator {
    pub fn new(
        database: Database,
        source: Arc<dyn StoryPageSource>,
        token: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            database,
            source,
            token: token.into(),
            page_size: u32::try_from(page_size.max(1)).unwrap_or(u32::MAX),
            gate: Mutex::new(()),
        }
    }

    pub async fn load(
        &self,
        load_type: LoadType,
        state: &PagingState,
    ) -> Result<MediationOutcome, MediatorError> {
        let _cycle = self.gate.lock().await;

        let (load_type, page) = match self.resolve_target(load_type, state)? {
            PageTarget::Fetch { load_type, page } => (load_type, page),
            PageTarget::EndReached => {
                tracing::debug!(?load_type, "end of pagination already reached");
                return Ok(MediationOutcome {
                    end_of_pagination_reached: true,
                });
            }
        };

        tracing::debug!(?load_type, page, "fetching story page");
        let stories = self
            .source
            .fetch_page(&self.token, page, self.page_size)
            .await
            .map_err(|source| {
                tracing::warn!(?load_type, page, error = %source, "story page fetch failed");
                MediatorError::Fetch { page, source }
            })?;

        let end_of_pagination_reached = stories.is_empty();
        if end_of_pagination_reached && load_type != LoadType::Refresh {
            tracing::debug!(?load_type, page, "remote returned an empty page");
            return Ok(MediationOutcome {
                end_of_pagination_reached,
            });
        }

        let prev_key = if page == INITIAL_PAGE { None } else { Some(page - 1) };
        let next_key = if end_of_pagination_reached {
            None
        } else {
            Some(page + 1)
        };
        let keys: Vec<RemoteKeyRecord> = stories
            .iter()
            .map(|story| RemoteKeyRecord {
                story_id: story.id.clone(),
                prev_key,
                next_key,
            })
            .collect();

        self.database
            .write_transaction(|repos| {
                if load_type == LoadType::Refresh {
                    repos.remote_keys().clear_all()?;
                    repos.stories().clear_all()?;
                }
                repos.stories().upsert_batch(&stories)?;
                repos.remote_keys().upsert_batch(&keys)?;
                Ok(())
            })
            .with_context(|| format!("failed to merge story page {page}"))?;

        tracing::info!(
            ?load_type,
            page,
            stories = stories.len(),
            end_of_pagination_reached,
            "merged story page"
        );
        Ok(MediationOutcome {
            end_of_pagination_reached,
        })
    }

    fn resolve_target(
        &self,
        load_type: LoadType,
        state: &PagingState,
    ) -> Result<PageTarget, MediatorError> {
        let edge_id = match load_type {
            LoadType::Refresh => None,
            LoadType::Prepend => state.first_item().map(|story| story.id.clone()),
            LoadType::Append => state.last_item().map(|story| story.id.clone()),
        };
        let edge_id = match (load_type, edge_id) {
            (LoadType::Refresh, _) => None,
            (_, Some(id)) => Some(id),
            (_, None) => self.cached_edge(load_type)?,
        };
        // Only an empty cache turns an edge load into a refresh.
        let Some(edge_id) = edge_id else {
            return Ok(PageTarget::Fetch {
                load_type: LoadType::Refresh,
                page: INITIAL_PAGE,
            });
        };

        let key = self
            .database
            .with_repositories(|repos| repos.remote_keys().key_for(&edge_id))?
            .ok_or_else(|| MediatorError::MissingRemoteKey(edge_id.clone()))?;
        let page = match load_type {
            LoadType::Prepend => key.prev_key,
            _ => key.next_key,
        };
        Ok(match page {
            Some(page) => PageTarget::Fetch { load_type, page },
            None => PageTarget::EndReached,
        })
    }

    /// Newest (prepend) or oldest (append) cached story, for callers that
    /// have nothing loaded yet.
    fn cached_edge(&self, load_type: LoadType) -> Result<Option<String>, MediatorError> {
        let edge = self.database.with_repositories(|repos| {
            let stories = repos.stories();
            let count = stories.count()?;
            if count == 0 {
                return Ok(None);
            }
            let offset = match load_type {
                LoadType::Append => count - 1,
                _ => 0,
            };
            Ok(stories.page(offset, 1)?.pop())
        })?;
        Ok(edge.map(|story| story.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::StoryRecord;
    use crate::paging::testing::{memory_database, story, FakeStorySource};
    use crate::paging::LoadedPage;
    use std::time::Duration;

    const PAGE_SIZE: usize = 5;

    fn mediator(database: &Database, source: &Arc<FakeStorySource>) -> RemoteMediator {
        RemoteMediator::new(database.clone(), source.clone(), "token", PAGE_SIZE)
    }

    /// The cache as the reader would see it after a full reload.
    fn cached_state(database: &Database) -> PagingState {
        let data = database
            .with_repositories(|repos| repos.stories().page(0, 1000))
            .unwrap();
        let len = data.len();
        PagingState::new(
            vec![LoadedPage {
                data,
                prev_key: None,
                next_key: None,
                items_before: 0,
                items_after: 0,
            }],
            len.checked_sub(1),
        )
    }

    fn all_stories(database: &Database) -> Vec<StoryRecord> {
        cached_state(database).items().cloned().collect()
    }

    fn all_keys(database: &Database) -> Vec<RemoteKeyRecord> {
        database
            .with_repositories(|repos| {
                let stories = repos.stories().page(0, 1000)?;
                let keys = repos.remote_keys();
                let mut out = Vec::new();
                for story in stories {
                    out.extend(keys.key_for(&story.id)?);
                }
                Ok(out)
            })
            .unwrap()
    }

    fn counts(database: &Database) -> (usize, usize) {
        database
            .with_repositories(|repos| Ok((repos.stories().count()?, repos.remote_keys().count()?)))
            .unwrap()
    }

    #[tokio::test]
    async fn refresh_returns_success_when_more_data_is_present() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(3, PAGE_SIZE));
        let outcome = mediator(&database, &source)
            .load(LoadType::Refresh, &PagingState::default())
            .await
            .unwrap();
        assert!(!outcome.end_of_pagination_reached);
        assert_eq!(source.calls(), vec![INITIAL_PAGE]);
    }

    #[tokio::test]
    async fn refresh_then_append_builds_the_feed_in_order() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(3, PAGE_SIZE));
        let mediator = mediator(&database, &source);

        mediator
            .load(LoadType::Refresh, &PagingState::default())
            .await
            .unwrap();
        let ids: Vec<String> = all_stories(&database).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
        for key in all_keys(&database) {
            assert_eq!(key.prev_key, None);
            assert_eq!(key.next_key, Some(2));
        }

        let state = cached_state(&database);
        assert_eq!(state.last_item().unwrap().id, "4");
        let outcome = mediator.load(LoadType::Append, &state).await.unwrap();
        assert!(!outcome.end_of_pagination_reached);
        assert_eq!(source.calls(), vec![1, 2]);

        let stories = all_stories(&database);
        assert_eq!(stories.len(), 10);
        let ids: Vec<&str> = stories.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]);
        let created: Vec<&str> = stories.iter().map(|s| s.created_at.as_str()).collect();
        let mut sorted = created.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(created, sorted);

        for key in all_keys(&database).into_iter().skip(5) {
            assert_eq!(key.prev_key, Some(1));
            assert_eq!(key.next_key, Some(3));
        }
        assert_eq!(counts(&database), (10, 10));
    }

    #[tokio::test]
    async fn refresh_replaces_previous_contents() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(2, PAGE_SIZE));
        let mediator = mediator(&database, &source);

        mediator
            .load(LoadType::Refresh, &PagingState::default())
            .await
            .unwrap();
        mediator
            .load(LoadType::Append, &cached_state(&database))
            .await
            .unwrap();
        assert_eq!(counts(&database), (10, 10));

        source.set_page(1, (100..103).map(story).collect());
        let outcome = mediator
            .load(LoadType::Refresh, &cached_state(&database))
            .await
            .unwrap();
        assert!(!outcome.end_of_pagination_reached);

        let ids: Vec<String> = all_stories(&database).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["100", "101", "102"]);
        assert_eq!(counts(&database), (3, 3));
        assert!(all_keys(&database).iter().all(|key| key.prev_key.is_none()));
    }

    #[tokio::test]
    async fn empty_append_reports_end_and_inserts_nothing() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(1, PAGE_SIZE));
        let mediator = mediator(&database, &source);
        mediator
            .load(LoadType::Refresh, &PagingState::default())
            .await
            .unwrap();
        let generation = database.invalidation().generation();

        let outcome = mediator
            .load(LoadType::Append, &cached_state(&database))
            .await
            .unwrap();
        assert!(outcome.end_of_pagination_reached);
        assert_eq!(source.calls(), vec![1, 2]);
        assert_eq!(counts(&database), (5, 5));
        assert_eq!(database.invalidation().generation(), generation);
    }

    #[tokio::test]
    async fn empty_refresh_clears_the_cache_and_ends_pagination() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(1, PAGE_SIZE));
        let mediator = mediator(&database, &source);
        mediator
            .load(LoadType::Refresh, &PagingState::default())
            .await
            .unwrap();

        source.set_page(1, Vec::new());
        let outcome = mediator
            .load(LoadType::Refresh, &cached_state(&database))
            .await
            .unwrap();
        assert!(outcome.end_of_pagination_reached);
        assert_eq!(counts(&database), (0, 0));
    }

    #[tokio::test]
    async fn fetch_failure_leaves_the_cache_untouched() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(3, PAGE_SIZE));
        let mediator = mediator(&database, &source);
        mediator
            .load(LoadType::Refresh, &PagingState::default())
            .await
            .unwrap();
        let before_stories = all_stories(&database);
        let before_keys = all_keys(&database);
        let generation = database.invalidation().generation();

        source.set_failing(true);
        let err = mediator
            .load(LoadType::Append, &cached_state(&database))
            .await
            .unwrap_err();
        assert!(matches!(err, MediatorError::Fetch { page: 2, .. }));

        assert_eq!(all_stories(&database), before_stories);
        assert_eq!(all_keys(&database), before_keys);
        assert_eq!(database.invalidation().generation(), generation);

        // A fresh trigger of the same kind is the retry.
        source.set_failing(false);
        mediator
            .load(LoadType::Append, &cached_state(&database))
            .await
            .unwrap();
        assert_eq!(counts(&database), (10, 10));
    }

    #[tokio::test]
    async fn prepend_from_first_page_ends_without_fetching() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(3, PAGE_SIZE));
        let mediator = mediator(&database, &source);
        mediator
            .load(LoadType::Refresh, &PagingState::default())
            .await
            .unwrap();

        let outcome = mediator
            .load(LoadType::Prepend, &cached_state(&database))
            .await
            .unwrap();
        assert!(outcome.end_of_pagination_reached);
        assert_eq!(source.calls(), vec![1]);
    }

    #[tokio::test]
    async fn prepend_fetches_the_previous_page() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(3, PAGE_SIZE));
        let mediator = mediator(&database, &source);

        // Seed the cache with page 2 only, as if page 1 had been evicted.
        let page_two: Vec<StoryRecord> = (5..10).map(story).collect();
        database
            .write_transaction(|repos| {
                repos.stories().upsert_batch(&page_two)?;
                let keys: Vec<RemoteKeyRecord> = page_two
                    .iter()
                    .map(|s| RemoteKeyRecord {
                        story_id: s.id.clone(),
                        prev_key: Some(1),
                        next_key: Some(3),
                    })
                    .collect();
                repos.remote_keys().upsert_batch(&keys)
            })
            .unwrap();

        let outcome = mediator
            .load(LoadType::Prepend, &cached_state(&database))
            .await
            .unwrap();
        assert!(!outcome.end_of_pagination_reached);
        assert_eq!(source.calls(), vec![1]);
        assert_eq!(counts(&database), (10, 10));
        assert_eq!(all_stories(&database)[0].id, "0");
    }

    #[tokio::test]
    async fn append_on_empty_state_falls_back_to_refresh() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(2, PAGE_SIZE));
        let outcome = mediator(&database, &source)
            .load(LoadType::Append, &PagingState::default())
            .await
            .unwrap();
        assert!(!outcome.end_of_pagination_reached);
        assert_eq!(source.calls(), vec![INITIAL_PAGE]);
        assert_eq!(counts(&database), (5, 5));
    }

    #[tokio::test]
    async fn edge_load_without_a_loaded_state_keeps_the_cache() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(3, PAGE_SIZE));
        let mediator = mediator(&database, &source);
        mediator
            .load(LoadType::Refresh, &PagingState::default())
            .await
            .unwrap();

        let outcome = mediator
            .load(LoadType::Append, &PagingState::default())
            .await
            .unwrap();
        assert!(!outcome.end_of_pagination_reached);
        assert_eq!(source.calls(), vec![1, 2]);
        assert_eq!(counts(&database), (10, 10));

        let outcome = mediator
            .load(LoadType::Prepend, &PagingState::default())
            .await
            .unwrap();
        assert!(outcome.end_of_pagination_reached);
        assert_eq!(source.calls(), vec![1, 2]);
        assert_eq!(counts(&database), (10, 10));
    }

    #[tokio::test]
    async fn missing_remote_key_is_reported() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(2, PAGE_SIZE));
        database
            .write_transaction(|repos| repos.stories().upsert_batch(&[story(0)]))
            .unwrap();
        let err = mediator(&database, &source)
            .load(LoadType::Append, &cached_state(&database))
            .await
            .unwrap_err();
        assert!(matches!(err, MediatorError::MissingRemoteKey(id) if id == "0"));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn concurrent_triggers_are_serialised() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(4, PAGE_SIZE));
        let mediator = mediator(&database, &source);
        mediator
            .load(LoadType::Refresh, &PagingState::default())
            .await
            .unwrap();

        source.set_delay(Some(Duration::from_millis(20)));
        let state = cached_state(&database);
        let (append, prepend, again) = tokio::join!(
            mediator.load(LoadType::Append, &state),
            mediator.load(LoadType::Prepend, &state),
            mediator.load(LoadType::Append, &state),
        );
        append.unwrap();
        assert!(prepend.unwrap().end_of_pagination_reached);
        again.unwrap();

        assert_eq!(source.max_in_flight(), 1);
        assert_eq!(counts(&database), (10, 10));
    }

    #[tokio::test]
    async fn cancelled_cycle_writes_nothing() {
        let database = memory_database();
        let source = Arc::new(FakeStorySource::new(3, PAGE_SIZE));
        let mediator = mediator(&database, &source);
        mediator
            .load(LoadType::Refresh, &PagingState::default())
            .await
            .unwrap();
        let before = all_stories(&database);

        source.set_delay(Some(Duration::from_secs(5)));
        let state = cached_state(&database);
        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), mediator.load(LoadType::Append, &state))
                .await;
        assert!(cancelled.is_err());
        assert_eq!(all_stories(&database), before);
        assert_eq!(counts(&database), (5, 5));

        // The cycle lock was released with the dropped future.
        source.set_delay(None);
        mediator.load(LoadType::Append, &state).await.unwrap();
        assert_eq!(counts(&database), (10, 10));
    }
}
