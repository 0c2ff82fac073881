use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use super::repo::RecipeStore;
use crate::error::ApiError;
use crate::models::{Page, Recipe, RecipeFilter};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 12;
pub const MAX_LIMIT: i64 = 30;

/// Effective page and page size after clamping raw query input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// `page` below 1 or unparseable becomes 1. `limit` below 1 or
    /// unparseable becomes the default, above the cap becomes the cap.
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = parse_int(page).unwrap_or(DEFAULT_PAGE).max(1);
        let limit = match parse_int(limit) {
            Some(l) if l > MAX_LIMIT => MAX_LIMIT,
            Some(l) if l >= 1 => l,
            _ => DEFAULT_LIMIT,
        };
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Leading integer of the trimmed input, so `"9abc"` reads as 9 and `"2.7"`
/// as 2. Input without leading digits is `None`.
fn parse_int(raw: Option<&str>) -> Option<i64> {
    lazy_static! {
        static ref LEADING_INT: Regex = Regex::new(r"^[+-]?\d+").unwrap();
    }
    let raw = raw?.trim();
    LEADING_INT
        .find(raw)
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

/// `ceil(total / limit)`; `limit` is at least 1.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    let limit = limit.max(1);
    (total + limit - 1) / limit
}

/// Page of recipes matching `filter`, with the total over the same filter.
pub async fn list_recipes(
    store: &dyn RecipeStore,
    filter: &RecipeFilter,
    req: PageRequest,
) -> Result<Page<Recipe>, ApiError> {
    let (data, total) = tokio::try_join!(
        store.fetch_page(filter, req.limit, req.offset()),
        store.count(filter),
    )?;
    debug!(page = req.page, limit = req.limit, total, rows = data.len(), "recipes page");
    Ok(Page {
        page: req.page,
        limit: req.limit,
        total,
        total_pages: total_pages(total, req.limit),
        data,
    })
}

/// Case-insensitive substring search on cuisine. An absent or blank term is
/// rejected before the store is touched.
pub async fn search_recipes(
    store: &dyn RecipeStore,
    cuisine: Option<&str>,
    req: PageRequest,
) -> Result<Page<Recipe>, ApiError> {
    let cuisine = cuisine
        .filter(|c| !c.trim().is_empty())
        .ok_or(ApiError::MissingQuery("Cuisine"))?;
    let filter = RecipeFilter {
        cuisine_contains: Some(cuisine.to_string()),
        ..Default::default()
    };
    list_recipes(store, &filter, req).await
}

pub async fn get_recipe(store: &dyn RecipeStore, id: i64) -> Result<Recipe, ApiError> {
    match store.find_by_id(id).await? {
        Some(recipe) => Ok(recipe),
        None => {
            info!(recipe_id = id, "recipe not found");
            Err(ApiError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_recipe;
    use crate::recipes::repo::memory::MemoryRecipeStore;

    fn table(n: i64) -> MemoryRecipeStore {
        MemoryRecipeStore::new((1..=n).map(sample_recipe).collect())
    }

    #[test]
    fn limit_is_clamped() {
        let limit = |raw: &str| PageRequest::from_raw(None, Some(raw)).limit;
        assert_eq!(limit("0"), 12);
        assert_eq!(limit("-4"), 12);
        assert_eq!(limit("lots"), 12);
        assert_eq!(limit("31"), 30);
        assert_eq!(limit("1"), 1);
        assert_eq!(limit("30"), 30);
        assert_eq!(PageRequest::from_raw(None, None).limit, 12);
    }

    #[test]
    fn leading_digits_are_read() {
        assert_eq!(PageRequest::from_raw(None, Some("9abc")).limit, 9);
        assert_eq!(PageRequest::from_raw(Some("2.7"), None).page, 2);
        assert_eq!(PageRequest::from_raw(Some(" 3 "), None).page, 3);
        assert_eq!(PageRequest::from_raw(Some("x2"), None).page, 1);
    }

    #[test]
    fn page_is_at_least_one() {
        let page = |raw: &str| PageRequest::from_raw(Some(raw), None).page;
        assert_eq!(page("0"), 1);
        assert_eq!(page("-3"), 1);
        assert_eq!(page("two"), 1);
        assert_eq!(page("4"), 4);
        assert_eq!(PageRequest::from_raw(None, None).page, 1);
    }

    #[test]
    fn offset_does_not_overflow() {
        let req = PageRequest {
            page: i64::MAX,
            limit: 30,
        };
        assert_eq!(req.offset(), i64::MAX);
    }

    #[test]
    fn total_pages_is_ceiling() {
        assert_eq!(total_pages(0, 12), 0);
        assert_eq!(total_pages(20, 9), 3);
        assert_eq!(total_pages(18, 9), 2);
        assert_eq!(total_pages(1, 30), 1);
    }

    #[tokio::test]
    async fn second_page_of_twenty() {
        let store = table(20);
        let req = PageRequest::from_raw(Some("2"), Some("9"));
        let page = list_recipes(&store, &RecipeFilter::default(), req)
            .await
            .unwrap();

        assert_eq!(page.data.len(), 9);
        assert_eq!(page.total, 20);
        assert_eq!(page.total_pages, 3);
        let ids: Vec<i64> = page.data.iter().map(|r| r.id).collect();
        assert_eq!(ids, (10..=18).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn total_follows_filter() {
        let mut rows: Vec<Recipe> = (1..=10).map(sample_recipe).collect();
        for r in rows.iter_mut().take(4) {
            r.cuisine = Some("Mexican".into());
        }
        let store = MemoryRecipeStore::new(rows);
        let req = PageRequest::from_raw(None, Some("3"));

        let page = search_recipes(&store, Some("mex"), req).await.unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 3);
        assert!(page
            .data
            .iter()
            .all(|r| r.cuisine.as_deref() == Some("Mexican")));
    }

    #[tokio::test]
    async fn search_without_cuisine_skips_store() {
        let store = table(5);
        for term in [None, Some(""), Some("   ")] {
            let err = search_recipes(&store, term, PageRequest::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::MissingQuery(_)));
        }
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_database_error() {
        let store = MemoryRecipeStore::failing();
        let err = list_recipes(&store, &RecipeFilter::default(), PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Database(_)));
    }

    #[tokio::test]
    async fn missing_recipe_is_not_found() {
        let store = table(3);
        assert_eq!(get_recipe(&store, 2).await.unwrap().id, 2);
        assert!(matches!(
            get_recipe(&store, 999).await.unwrap_err(),
            ApiError::NotFound
        ));
    }
}
