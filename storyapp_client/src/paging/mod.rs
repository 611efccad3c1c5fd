//! Remote-mediated pagination of the story feed.
//!
//! The local SQLite cache is the single source of truth for the feed. A
//! [`Pager`] reads it in windows through a [`StoryPagingSource`] and asks the
//! [`RemoteMediator`] for more remote pages whenever the reader approaches an
//! edge of the cached data. Every committed merge invalidates the current
//! paging source, and the pager re-derives its windows from the new
//! generation before publishing them.

mod mediator;
mod pager;
mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use mediator::{MediationOutcome, MediatorError, RemoteMediator, INITIAL_PAGE};
pub use pager::{LoadState, LoadStates, Pager, PagingSnapshot};
pub use source::{LoadParams, LoadResult, StoryPagingSource};

use crate::database::models::StoryRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadType {
    Refresh,
    Prepend,
    Append,
}

/// A contiguous window of the cached feed. Keys are item offsets into the
/// `created_at DESC` ordering of the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPage {
    pub data: Vec<StoryRecord>,
    pub prev_key: Option<usize>,
    pub next_key: Option<usize>,
    pub items_before: usize,
    pub items_after: usize,
}

impl LoadedPage {
    pub fn end(&self) -> usize {
        self.items_before + self.data.len()
    }
}

/// What the reader currently has loaded, plus where it is looking.
#[derive(Debug, Clone, Default)]
pub struct PagingState {
    pub pages: Vec<LoadedPage>,
    /// Absolute position in the cached feed.
    pub anchor_position: Option<usize>,
}

impl PagingState {
    pub fn new(pages: Vec<LoadedPage>, anchor_position: Option<usize>) -> Self {
        Self {
            pages,
            anchor_position,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|page| page.data.is_empty())
    }

    pub fn items(&self) -> impl Iterator<Item = &StoryRecord> {
        self.pages.iter().flat_map(|page| page.data.iter())
    }

    pub fn first_item(&self) -> Option<&StoryRecord> {
        self.items().next()
    }

    pub fn last_item(&self) -> Option<&StoryRecord> {
        self.pages
            .iter()
            .rev()
            .find_map(|page| page.data.last())
    }

    pub fn closest_page_to_position(&self, position: usize) -> Option<&LoadedPage> {
        self.pages
            .iter()
            .filter(|page| !page.data.is_empty())
            .min_by_key(|page| {
                if position < page.items_before {
                    page.items_before - position
                } else if position >= page.end() {
                    position + 1 - page.end()
                } else {
                    0
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::testing::story;
    use super::*;

    fn page(start: usize, len: usize, total: usize) -> LoadedPage {
        let end = start + len;
        LoadedPage {
            data: (start..end).map(story).collect(),
            prev_key: (start > 0).then_some(start),
            next_key: (end < total).then_some(end),
            items_before: start,
            items_after: total - end,
        }
    }

    #[test]
    fn closest_page_prefers_the_containing_window() {
        let state = PagingState::new(vec![page(5, 5, 20), page(10, 5, 20)], Some(12));
        let closest = state.closest_page_to_position(12).unwrap();
        assert_eq!(closest.items_before, 10);
        assert_eq!(closest.data[2].id, "12");

        // Outside the loaded range the nearest edge wins.
        assert_eq!(state.closest_page_to_position(0).unwrap().items_before, 5);
        assert_eq!(state.closest_page_to_position(40).unwrap().items_before, 10);
    }

    #[test]
    fn edges_skip_empty_pages() {
        let mut empty = page(0, 0, 0);
        empty.next_key = None;
        let state = PagingState::new(vec![page(0, 3, 3), empty], None);
        assert_eq!(state.first_item().unwrap().id, "0");
        assert_eq!(state.last_item().unwrap().id, "2");
        assert!(!state.is_empty());
        assert!(PagingState::default().is_empty());
        assert!(PagingState::default().closest_page_to_position(0).is_none());
    }
}
