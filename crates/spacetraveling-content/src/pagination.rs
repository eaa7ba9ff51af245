// File: spacetraveling-content/src/pagination.rs
// Purpose: Incremental "load more" over a cursor-paginated listing

use crate::error::Result;
use crate::model::{Cursor, Entry, Page};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Fetches the page a cursor points at.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, cursor: &Cursor) -> Result<Page>;
}

/// Entries loaded so far plus the cursor of the next page.
///
/// The entry list is the concatenation, in server order, of every page
/// accepted so far. Operations return a new state instead of mutating.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PaginationState {
    entries: Vec<Entry>,
    cursor: Option<Cursor>,
}

impl PaginationState {
    /// Seed the state with the first page of a query.
    pub fn initialize(page: Page) -> Self {
        Self {
            entries: page.entries,
            cursor: page.next_cursor,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a page fetched with `requested`.
    ///
    /// Returns `None` when `requested` is not the stored cursor, i.e. the
    /// response belongs to a request this state has already moved past.
    pub fn accept(&self, requested: &Cursor, page: Page) -> Option<Self> {
        if self.cursor.as_ref() != Some(requested) {
            return None;
        }

        let mut entries = Vec::with_capacity(self.entries.len() + page.entries.len());
        entries.extend_from_slice(&self.entries);
        entries.extend(page.entries);

        Some(Self {
            entries,
            cursor: page.next_cursor,
        })
    }

    /// Fetch the next page and return the extended state.
    ///
    /// Without a cursor this performs no I/O and returns an identical state.
    /// A failed fetch leaves `self` as it was, so retrying with the same
    /// state asks for the same page again.
    pub async fn load_more<F>(&self, fetcher: &F) -> Result<Self>
    where
        F: PageFetcher + ?Sized,
    {
        let Some(cursor) = self.cursor.as_ref() else {
            return Ok(self.clone());
        };

        let page = fetcher.fetch_page(cursor).await?;
        tracing::debug!(
            "Loaded {} more entries (last page: {})",
            page.entries.len(),
            page.is_last()
        );

        Ok(self.accept(cursor, page).unwrap_or_else(|| self.clone()))
    }
}

/// Result of a [`Paginator::load_more`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was appended; holds the number of new entries.
    Appended(usize),
    /// There is no next page; nothing was fetched.
    Exhausted,
    /// Another call advanced the cursor while this one was in flight, so the
    /// response was dropped.
    Discarded,
}

/// Shared holder for a [`PaginationState`] that tolerates overlapping
/// "load more" actions.
pub struct Paginator<F> {
    fetcher: F,
    state: RwLock<PaginationState>,
}

impl<F: PageFetcher> Paginator<F> {
    pub fn new(fetcher: F, first_page: Page) -> Self {
        Self {
            fetcher,
            state: RwLock::new(PaginationState::initialize(first_page)),
        }
    }

    /// Current state.
    pub async fn snapshot(&self) -> PaginationState {
        self.state.read().await.clone()
    }

    /// Fetch the next page without holding the state lock, then apply it
    /// only if the cursor it was requested with is still current.
    pub async fn load_more(&self) -> Result<LoadOutcome> {
        let requested = match self.state.read().await.cursor() {
            Some(cursor) => cursor.clone(),
            None => return Ok(LoadOutcome::Exhausted),
        };

        let page = self.fetcher.fetch_page(&requested).await?;

        let mut state = self.state.write().await;
        match state.accept(&requested, page) {
            Some(next) => {
                let added = next.len() - state.len();
                *state = next;
                Ok(LoadOutcome::Appended(added))
            }
            None => {
                tracing::debug!("Discarding late page for cursor {}", requested);
                Ok(LoadOutcome::Discarded)
            }
        }
    }
}
