use super::{LoadedPage, PagingState};
use crate::database::repositories::StoryRepository;
use crate::database::Database;
use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadParams {
    /// Load `load_size` stories starting at `key` (or the top).
    Refresh { key: Option<usize>, load_size: usize },
    /// Load up to `load_size` stories ending just before `key`.
    Prepend { key: usize, load_size: usize },
    /// Load `load_size` stories starting at `key`.
    Append { key: usize, load_size: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    Page(LoadedPage),
    /// The cache changed since this source was created; ask for a new one.
    Invalid,
}

/// Reads the cached feed for a single cache generation.
pub struct StoryPagingSource {
    database: Database,
    generation: u64,
}

impl StoryPagingSource {
    pub fn new(database: Database) -> Self {
        let generation = database.invalidation().generation();
        Self {
            database,
            generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_invalid(&self) -> bool {
        self.database.invalidation().generation() != self.generation
    }

    pub fn load(&self, params: LoadParams) -> Result<LoadResult> {
        if self.is_invalid() {
            return Ok(LoadResult::Invalid);
        }

        let (start, data, total) = self.database.with_repositories(|repos| {
            let stories = repos.stories();
            let total = stories.count()?;
            let (start, len) = match params {
                LoadParams::Refresh { key, load_size } => {
                    let mut start = key.unwrap_or(0);
                    if start >= total {
                        start = total.saturating_sub(load_size);
                    }
                    (start, load_size)
                }
                LoadParams::Prepend { key, load_size } => {
                    let key = key.min(total);
                    let start = key.saturating_sub(load_size);
                    (start, key - start)
                }
                LoadParams::Append { key, load_size } => (key, load_size),
            };
            let data = if len == 0 {
                Vec::new()
            } else {
                stories.page(start, len)?
            };
            Ok((start, data, total))
        })?;

        // A merge that committed while we were reading makes this page stale.
        if self.is_invalid() {
            return Ok(LoadResult::Invalid);
        }

        let end = start + data.len();
        Ok(LoadResult::Page(LoadedPage {
            prev_key: (start > 0).then_some(start),
            next_key: (end < total).then_some(end),
            items_before: start,
            items_after: total.saturating_sub(end),
            data,
        }))
    }

    /// Start of the loaded window nearest the anchor, used to reload the
    /// reader's neighbourhood after an invalidation.
    pub fn refresh_key(&self, state: &PagingState) -> Option<usize> {
        let anchor = state.anchor_position?;
        state
            .closest_page_to_position(anchor)
            .map(|page| page.items_before)
    }
}
