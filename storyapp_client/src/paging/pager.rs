use super::mediator::{MediatorError, RemoteMediator};
use super::source::{LoadParams, LoadResult, StoryPagingSource};
use super::{LoadType, LoadedPage, PagingState};
use crate::config::PagingConfig;
use crate::database::models::StoryRecord;
use crate::database::Database;
use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

const MAX_RELOAD_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub enum LoadState {
    NotLoading { end_of_pagination_reached: bool },
    Loading,
    Error(Arc<MediatorError>),
}

impl LoadState {
    const IDLE: LoadState = LoadState::NotLoading {
        end_of_pagination_reached: false,
    };

    pub fn is_end_of_pagination(&self) -> bool {
        matches!(
            self,
            LoadState::NotLoading {
                end_of_pagination_reached: true
            }
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LoadState::Error(_))
    }
}

impl Default for LoadState {
    fn default() -> Self {
        Self::IDLE
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadStates {
    pub refresh: LoadState,
    pub prepend: LoadState,
    pub append: LoadState,
}

impl LoadStates {
    pub fn get(&self, load_type: LoadType) -> &LoadState {
        match load_type {
            LoadType::Refresh => &self.refresh,
            LoadType::Prepend => &self.prepend,
            LoadType::Append => &self.append,
        }
    }

    fn get_mut(&mut self, load_type: LoadType) -> &mut LoadState {
        match load_type {
            LoadType::Refresh => &mut self.refresh,
            LoadType::Prepend => &mut self.prepend,
            LoadType::Append => &mut self.append,
        }
    }
}

/// What the presentation layer renders: the loaded stories with their
/// absolute offset in the feed, and the state of each load direction.
#[derive(Debug, Clone, Default)]
pub struct PagingSnapshot {
    pub stories: Vec<StoryRecord>,
    pub items_before: usize,
    pub items_after: usize,
    pub load_states: LoadStates,
    pub generation: u64,
}

impl PagingSnapshot {
    pub fn total(&self) -> usize {
        self.items_before + self.stories.len() + self.items_after
    }
}

struct PagerInner {
    source: StoryPagingSource,
    state: PagingState,
    load_states: LoadStates,
    last_failed: Option<LoadType>,
}

/// Presents the cached feed as position-addressable windows and drives the
/// mediator at the edges.
///
/// Pager operations are serialised. Snapshots are published on a watch
/// channel only after windows have been re-derived from the current cache
/// generation.
pub struct Pager {
    config: PagingConfig,
    database: Database,
    mediator: RemoteMediator,
    inner: Mutex<PagerInner>,
    updates: watch::Sender<PagingSnapshot>,
}

impl Pager {
    pub fn new(config: PagingConfig, database: Database, mediator: RemoteMediator) -> Self {
        let source = StoryPagingSource::new(database.clone());
        let (updates, _rx) = watch::channel(PagingSnapshot::default());
        Self {
            config,
            database,
            mediator,
            inner: Mutex::new(PagerInner {
                source,
                state: PagingState::default(),
                load_states: LoadStates::default(),
                last_failed: None,
            }),
            updates,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PagingSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> PagingSnapshot {
        self.updates.borrow().clone()
    }

    /// Publishes whatever is cached, then refreshes from the first remote page.
    pub async fn start(&self) -> Result<PagingSnapshot> {
        let mut inner = self.inner.lock().await;
        self.reset_interrupted(&mut inner);
        self.reload(&mut inner)?;
        self.publish(&inner);
        self.mediate(&mut inner, LoadType::Refresh).await?;
        Ok(self.publish(&inner))
    }

    pub async fn refresh(&self) -> Result<PagingSnapshot> {
        let mut inner = self.inner.lock().await;
        self.reset_interrupted(&mut inner);
        self.mediate(&mut inner, LoadType::Refresh).await?;
        Ok(self.publish(&inner))
    }

    /// Re-issues the trigger that failed last, if any.
    pub async fn retry(&self) -> Result<PagingSnapshot> {
        let mut inner = self.inner.lock().await;
        self.reset_interrupted(&mut inner);
        if let Some(load_type) = inner.last_failed {
            tracing::info!(?load_type, "retrying failed story load");
            self.mediate(&mut inner, load_type).await?;
            self.fill_window(&mut inner)?;
        }
        Ok(self.publish(&inner))
    }

    /// Moves the anchor to `position`, loading cached windows around it and
    /// fetching remote pages when it nears either end of the cache.
    pub async fn scroll_to(&self, position: usize) -> Result<PagingSnapshot> {
        let mut inner = self.inner.lock().await;
        self.reset_interrupted(&mut inner);
        if inner.source.is_invalid() {
            self.reload(&mut inner)?;
        }

        inner.state.anchor_position = Some(position);
        self.fill_window(&mut inner)?;

        for load_type in [LoadType::Append, LoadType::Prepend] {
            if self.needs_remote(&inner, load_type, position) {
                self.mediate(&mut inner, load_type).await?;
                self.fill_window(&mut inner)?;
            }
        }
        Ok(self.publish(&inner))
    }

    /// A pager future dropped mid-fetch leaves `Loading` behind. Operations
    /// are serialised, so any `Loading` seen here belongs to such a dropped
    /// operation.
    fn reset_interrupted(&self, inner: &mut PagerInner) {
        for load_type in [LoadType::Refresh, LoadType::Prepend, LoadType::Append] {
            let state = inner.load_states.get_mut(load_type);
            if matches!(state, LoadState::Loading) {
                *state = LoadState::IDLE;
            }
        }
    }

    async fn mediate(&self, inner: &mut PagerInner, load_type: LoadType) -> Result<()> {
        *inner.load_states.get_mut(load_type) = LoadState::Loading;
        self.publish(inner);

        match self.mediator.load(load_type, &inner.state).await {
            Ok(outcome) => {
                if load_type == LoadType::Refresh || inner.last_failed == Some(load_type) {
                    inner.last_failed = None;
                }
                if load_type == LoadType::Refresh {
                    inner.state = PagingState::default();
                    inner.load_states.prepend = LoadState::IDLE;
                }
                *inner.load_states.get_mut(load_type) = LoadState::NotLoading {
                    end_of_pagination_reached: outcome.end_of_pagination_reached,
                };
                if load_type == LoadType::Refresh {
                    inner.load_states.append = LoadState::NotLoading {
                        end_of_pagination_reached: outcome.end_of_pagination_reached,
                    };
                }
                self.reload(inner)?;
            }
            Err(err) => {
                tracing::warn!(?load_type, error = %err, "story load failed");
                *inner.load_states.get_mut(load_type) = LoadState::Error(Arc::new(err));
                inner.last_failed = Some(load_type);
            }
        }
        Ok(())
    }

    /// Edge distance in stories. The anchor's own item always counts, so a
    /// configured distance of zero still reaches the last cached story.
    fn prefetch_distance(&self) -> usize {
        self.config.prefetch_distance.max(1)
    }

    fn needs_remote(&self, inner: &PagerInner, load_type: LoadType, anchor: usize) -> bool {
        if !matches!(
            inner.load_states.get(load_type),
            LoadState::NotLoading {
                end_of_pagination_reached: false
            }
        ) {
            return false;
        }
        let pages = &inner.state.pages;
        match load_type {
            LoadType::Append => pages.last().map_or(true, |last| {
                last.next_key.is_none() && anchor + self.prefetch_distance() >= last.end()
            }),
            LoadType::Prepend => pages.first().map_or(false, |first| {
                first.prev_key.is_none()
                    && anchor < first.items_before + self.prefetch_distance()
            }),
            LoadType::Refresh => false,
        }
    }

    /// Replaces the loaded windows with a fresh read around the anchor,
    /// restarting whenever the cache moves on mid-read.
    fn reload(&self, inner: &mut PagerInner) -> Result<()> {
        for attempt in 0..MAX_RELOAD_ATTEMPTS {
            let source = StoryPagingSource::new(self.database.clone());
            let key = match inner.state.anchor_position {
                Some(anchor) if inner.state.is_empty() => {
                    Some(anchor.saturating_sub(self.prefetch_distance()))
                }
                _ => source.refresh_key(&inner.state),
            };
            let params = LoadParams::Refresh {
                key,
                load_size: self.config.initial_load_size,
            };
            match source.load(params)? {
                LoadResult::Page(page) => {
                    tracing::debug!(
                        generation = source.generation(),
                        items_before = page.items_before,
                        loaded = page.data.len(),
                        "reloaded story window"
                    );
                    inner.source = source;
                    inner.state.pages = vec![page];
                    return Ok(());
                }
                LoadResult::Invalid => {
                    tracing::debug!(attempt, "story cache changed during reload");
                }
            }
        }
        bail!("story cache kept changing during reload")
    }

    fn fill_window(&self, inner: &mut PagerInner) -> Result<()> {
        let Some(anchor) = inner.state.anchor_position else {
            return Ok(());
        };
        let distance = self.prefetch_distance();
        let load_size = self.config.page_size;
        let mut restarts = 0;

        if let (Some(first), Some(last)) = (inner.state.pages.first(), inner.state.pages.last()) {
            let far_after = anchor >= last.end() + self.config.initial_load_size;
            let far_before = anchor + self.config.initial_load_size < first.items_before;
            if far_after || far_before {
                tracing::debug!(anchor, "anchor jumped away from loaded window");
                inner.state.pages.clear();
                self.reload(inner)?;
            }
        }

        loop {
            let params = {
                let pages = &inner.state.pages;
                let after = pages
                    .last()
                    .and_then(|last| last.next_key.filter(|_| anchor + distance >= last.end()));
                let before = pages.first().and_then(|first| {
                    first
                        .prev_key
                        .filter(|_| anchor < first.items_before + distance)
                });
                match (after, before) {
                    (Some(key), _) => LoadParams::Append { key, load_size },
                    (None, Some(key)) => LoadParams::Prepend { key, load_size },
                    (None, None) => return Ok(()),
                }
            };

            match inner.source.load(params)? {
                LoadResult::Page(page) => self.insert_page(&mut inner.state, params, page),
                LoadResult::Invalid => {
                    restarts += 1;
                    if restarts > MAX_RELOAD_ATTEMPTS {
                        bail!("story cache kept changing while filling the window");
                    }
                    self.reload(inner)?;
                }
            }
        }
    }

    fn insert_page(&self, state: &mut PagingState, params: LoadParams, page: LoadedPage) {
        match params {
            LoadParams::Prepend { .. } => state.pages.insert(0, page),
            _ => state.pages.push(page),
        }
    }

    fn publish(&self, inner: &PagerInner) -> PagingSnapshot {
        let pages = &inner.state.pages;
        let snapshot = PagingSnapshot {
            stories: inner.state.items().cloned().collect(),
            items_before: pages.first().map_or(0, |page| page.items_before),
            items_after: pages.last().map_or(0, |page| page.items_after),
            load_states: inner.load_states.clone(),
            generation: inner.source.generation(),
        };
        self.updates.send_replace(snapshot.clone());
        snapshot
    }
}
