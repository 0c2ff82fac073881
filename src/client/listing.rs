use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::api::{ListingQuery, RecipeApi};
use super::error::ClientError;
use super::favorites::FavoritesStore;
use super::storage::LocalStorage;
use crate::models::{Page, Recipe, RecipeFilter, MAX_TIME_LIMIT};

/// Page sizes offered by the size selector.
pub const PAGE_SIZES: [i64; 10] = [3, 6, 9, 12, 15, 18, 21, 24, 27, 30];
pub const DEFAULT_PAGE_SIZE: i64 = 9;
/// Quiet period before typed search input is applied.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

pub const MAX_RATING: f64 = 5.0;
pub const RATING_STEP: f64 = 0.5;
pub const MIN_TIME: i32 = 10;
pub const TIME_STEP: i32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ListingState {
    /// What the user has typed so far.
    pub search_input: String,
    /// The debounced term actually sent to the server.
    pub search: String,
    pub min_rating: f64,
    /// `MAX_TIME_LIMIT` means no ceiling.
    pub max_time: i32,
    pub cuisine: Option<String>,
    pub continent: Option<String>,
    pub region: Option<String>,
    pub page: i64,
    pub page_size: i64,
    /// Last page received. Kept when a later fetch fails.
    pub current: Option<Page<Recipe>>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for ListingState {
    fn default() -> Self {
        Self {
            search_input: String::new(),
            search: String::new(),
            min_rating: 0.0,
            max_time: MAX_TIME_LIMIT,
            cuisine: None,
            continent: None,
            region: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            current: None,
            loading: false,
            error: None,
        }
    }
}

impl ListingState {
    pub fn filter(&self) -> RecipeFilter {
        RecipeFilter {
            title: Some(self.search.clone()),
            min_rating: Some(self.min_rating),
            max_time: Some(self.max_time),
            cuisine: self.cuisine.clone(),
            continent: self.continent.clone(),
            region: self.region.clone(),
            cuisine_contains: None,
        }
        .normalized()
    }

    pub fn query(&self) -> ListingQuery {
        ListingQuery {
            page: self.page,
            limit: self.page_size,
            filter: self.filter(),
        }
    }

    pub fn recipes(&self) -> &[Recipe] {
        self.current.as_ref().map(|p| p.data.as_slice()).unwrap_or(&[])
    }

    /// Pagination control for the page on screen, or `None` when everything
    /// fits on one page.
    pub fn pager(&self) -> Option<Pager> {
        let shown = self.current.as_ref()?;
        if shown.total_pages <= 1 {
            return None;
        }
        Some(Pager {
            page: shown.page,
            total_pages: shown.total_pages,
            has_prev: shown.page > 1,
            has_next: shown.page < shown.total_pages,
        })
    }

    /// Puts page, size and filters back to the values behind `query`.
    fn restore(&mut self, query: &ListingQuery) {
        let f = &query.filter;
        self.search = f.title.clone().unwrap_or_default();
        self.min_rating = f.min_rating.unwrap_or(0.0);
        self.max_time = f.max_time.unwrap_or(MAX_TIME_LIMIT);
        self.cuisine = f.cuisine.clone();
        self.continent = f.continent.clone();
        self.region = f.region.clone();
        self.page = query.page;
        self.page_size = query.limit;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page: i64,
    pub total_pages: i64,
    pub has_prev: bool,
    pub has_next: bool,
}

/// A listed recipe with its favorite flag merged in for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeCard {
    pub recipe: Recipe,
    pub favorited: bool,
}

struct Shared {
    state: ListingState,
    /// Number of the most recently issued fetch.
    generation: u64,
    /// Query that produced `state.current`.
    shown: Option<ListingQuery>,
}

struct Inner<A> {
    api: A,
    shared: Mutex<Shared>,
    pending_search: Mutex<Option<JoinHandle<()>>>,
}

/// Drives the recipe listing: holds filter and page state, fetches pages from
/// the API and keeps only the answer to the latest request.
///
/// Every filter is evaluated by the server, so the page count always
/// describes the filtered set. Setters that change a filter or the page size
/// reset the page to 1 before the fetch reads its parameters, and issue
/// exactly one fetch. Setting a value equal to the current one does nothing
/// unless the previous fetch failed.
pub struct ListingClient<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for ListingClient<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: RecipeApi + 'static> ListingClient<A> {
    pub fn new(api: A) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                shared: Mutex::new(Shared {
                    state: ListingState::default(),
                    generation: 0,
                    shown: None,
                }),
                pending_search: Mutex::new(None),
            }),
        }
    }

    pub fn api(&self) -> &A {
        &self.inner.api
    }

    pub fn state(&self) -> ListingState {
        self.lock().state.clone()
    }

    pub fn pager(&self) -> Option<Pager> {
        self.lock().state.pager()
    }

    pub fn cards<S: LocalStorage>(&self, favorites: &FavoritesStore<S>) -> Vec<RecipeCard> {
        self.lock()
            .state
            .recipes()
            .iter()
            .map(|r| RecipeCard {
                recipe: r.clone(),
                favorited: favorites.is_favorite(r.id),
            })
            .collect()
    }

    /// Detail view fetch; `None` when the recipe does not exist.
    pub async fn fetch_recipe(&self, id: i64) -> Result<Option<Recipe>, ClientError> {
        self.inner.api.get(id).await
    }

    /// Fetches the page described by the current state.
    ///
    /// A response that arrives after a newer fetch was issued is dropped. On
    /// failure the previous page stays in place, page and filters return to
    /// the values that produced it, and the error is recorded.
    pub async fn load(&self) -> Result<(), ClientError> {
        let (generation, query) = {
            let mut shared = self.lock();
            shared.generation += 1;
            shared.state.loading = true;
            (shared.generation, shared.state.query())
        };
        debug!(generation, ?query, "fetching recipes");

        let result = self.inner.api.list(&query).await;

        let mut shared = self.lock();
        if shared.generation != generation {
            debug!(generation, latest = shared.generation, "discarding stale response");
            return Ok(());
        }
        shared.state.loading = false;
        match result {
            Ok(page) => {
                shared.state.current = Some(page);
                shared.state.error = None;
                shared.shown = Some(query);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "recipe fetch failed");
                if let Some(shown) = shared.shown.clone() {
                    shared.state.restore(&shown);
                }
                shared.state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// After a failed fetch the same page may be requested again.
    pub async fn set_page(&self, page: i64) -> Result<(), ClientError> {
        let page = page.max(1);
        if self.update(|st| replace(&mut st.page, page) || st.error.is_some()) {
            self.load().await?;
        }
        Ok(())
    }

    pub async fn next_page(&self) -> Result<(), ClientError> {
        match self.pager() {
            Some(p) if p.has_next => self.set_page(p.page + 1).await,
            _ => Ok(()),
        }
    }

    pub async fn prev_page(&self) -> Result<(), ClientError> {
        match self.pager() {
            Some(p) if p.has_prev => self.set_page(p.page - 1).await,
            _ => Ok(()),
        }
    }

    /// Only sizes in [`PAGE_SIZES`] are accepted.
    pub async fn set_page_size(&self, size: i64) -> Result<(), ClientError> {
        if !PAGE_SIZES.contains(&size) {
            return Err(ClientError::InvalidPageSize(size));
        }
        self.reset_and_load(|st| replace(&mut st.page_size, size)).await
    }

    /// Snaps to the 0..=5 slider in steps of 0.5.
    pub async fn set_min_rating(&self, rating: f64) -> Result<(), ClientError> {
        let rating = snap_rating(rating);
        self.reset_and_load(|st| {
            if st.min_rating == rating {
                return false;
            }
            st.min_rating = rating;
            true
        })
        .await
    }

    /// Snaps to the 10..=120 slider in steps of 10.
    pub async fn set_max_time(&self, minutes: i32) -> Result<(), ClientError> {
        let minutes = snap_time(minutes);
        self.reset_and_load(|st| replace(&mut st.max_time, minutes)).await
    }

    pub async fn set_cuisine(&self, cuisine: Option<String>) -> Result<(), ClientError> {
        let cuisine = blank_to_none(cuisine);
        self.reset_and_load(|st| replace(&mut st.cuisine, cuisine)).await
    }

    pub async fn set_continent(&self, continent: Option<String>) -> Result<(), ClientError> {
        let continent = blank_to_none(continent);
        self.reset_and_load(|st| replace(&mut st.continent, continent)).await
    }

    pub async fn set_region(&self, region: Option<String>) -> Result<(), ClientError> {
        let region = blank_to_none(region);
        self.reset_and_load(|st| replace(&mut st.region, region)).await
    }

    /// Records a keystroke. The term is applied once no further keystroke
    /// has arrived for [`SEARCH_DEBOUNCE`]; each call cancels the pending
    /// timer. Must be called from within a tokio runtime.
    pub fn type_search(&self, input: impl Into<String>) {
        let input = input.into();
        self.lock().state.search_input = input.clone();

        let client = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(SEARCH_DEBOUNCE).await;
            client.commit_search(input);
        });

        let mut pending = self
            .inner
            .pending_search
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.replace(timer) {
            previous.abort();
        }
    }

    /// Applies `term` as the search, resetting the page. The fetch runs on
    /// its own task so that cancelling a later timer never cancels it.
    fn commit_search(&self, term: String) {
        if !self.update(|st| {
            if st.search == term {
                return false;
            }
            debug!(term = %term, "search applied");
            st.search = term;
            st.page = 1;
            true
        }) {
            return;
        }
        let client = self.clone();
        tokio::spawn(async move {
            let _ = client.load().await;
        });
    }

    /// Runs `change`; if it reports a change, or the last fetch failed,
    /// resets the page to 1 in the same critical section and fetches once.
    async fn reset_and_load(
        &self,
        change: impl FnOnce(&mut ListingState) -> bool,
    ) -> Result<(), ClientError> {
        let changed = self.update(|st| {
            let changed = change(st) || st.error.is_some();
            if changed {
                st.page = 1;
            }
            changed
        });
        if changed {
            self.load().await?;
        }
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut ListingState) -> bool) -> bool {
        f(&mut self.lock().state)
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn blank_to_none(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

fn snap_rating(rating: f64) -> f64 {
    if !rating.is_finite() {
        return 0.0;
    }
    let clamped = rating.clamp(0.0, MAX_RATING);
    (clamped / RATING_STEP).round() * RATING_STEP
}

fn snap_time(minutes: i32) -> i32 {
    let clamped = minutes.clamp(MIN_TIME, MAX_TIME_LIMIT);
    ((clamped + TIME_STEP / 2) / TIME_STEP) * TIME_STEP
}
